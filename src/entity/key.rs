use {
    super::{optional_document, parse_definition, permission_statements, state_failure, Entity, SetupContext},
    crate::{
        differ::compare_documents,
        serutil::OneOrMany,
        state::{KeyState, KeyStore, LiveState},
        Change, Changes, Grant, GrantIdentity, SelfKind, StateError, Statement, StatementCompiler, SyncrError,
    },
    log::{debug, info},
    serde::Deserialize,
    serde_json::Value,
    std::collections::BTreeSet,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyDefinition {
    location: Option<String>,
    description: Option<String>,
    permission: OneOrMany<Value>,
    allow_permission: OneOrMany<Value>,
    deny_permission: OneOrMany<Value>,
    grant: OneOrMany<GrantDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrantDefinition {
    grantee: Value,
    #[serde(default)]
    retiree: Option<Value>,
    #[serde(default)]
    operations: OneOrMany<String>,
    #[serde(default)]
    constraints: Option<Value>,
    #[serde(default)]
    grant_tokens: OneOrMany<String>,
}

/// An encryption key, addressed by its alias, with its key policy and grants.
#[derive(Clone, Debug)]
pub struct Key {
    name: String,
    definition: Value,
    location: String,
    description: String,
    permission: Vec<Statement>,
    permission_document: Option<String>,
    grants: Vec<Grant>,
}

impl Key {
    pub fn new<S: Into<String>>(name: S, definition: Value) -> Self {
        Self {
            name: name.into(),
            definition,
            location: String::new(),
            description: String::new(),
            permission: Vec::new(),
            permission_document: None,
            grants: Vec::new(),
        }
    }

    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn permission(&self) -> &[Statement] {
        &self.permission
    }

    #[inline]
    pub fn permission_document(&self) -> Option<&str> {
        self.permission_document.as_deref()
    }

    #[inline]
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    fn entity(&self) -> String {
        format!("key={}", self.name)
    }

    fn failure(&self, message: &str, error: StateError, document: Option<&str>) -> SyncrError {
        state_failure(SelfKind::Key, &self.name, message, error, document)
    }

    /// Expand one grant definition. Each grantee ARN becomes its own grant.
    fn compile_grants(
        &self,
        compiler: &StatementCompiler,
        definition: &GrantDefinition,
    ) -> Result<Vec<Grant>, SyncrError> {
        let grantees = compiler.iam_arn_expansion(&definition.grantee)?;
        let retiree = match &definition.retiree {
            None | Some(Value::Null) => None,
            Some(retiree) => {
                let mut retirees = compiler.iam_arn_expansion(retiree)?;
                if retirees.len() != 1 {
                    return Err(SyncrError::bad_policy(self.entity(), "A grant needs exactly one retiree")
                        .with_fragment(retiree));
                }
                retirees.pop()
            }
        };

        let operations: Vec<String> = definition.operations.to_vec().into_iter().cloned().collect();
        let grant_tokens: Vec<String> = definition.grant_tokens.to_vec().into_iter().cloned().collect();

        let mut grants = Vec::with_capacity(grantees.len());
        for grantee in grantees {
            let mut builder = Grant::builder();
            builder.grantee(grantee).operations(operations.clone()).grant_tokens(grant_tokens.clone());
            if let Some(retiree) = &retiree {
                builder.retiree(retiree.clone());
            }
            if let Some(constraints) = &definition.constraints {
                builder.constraints(constraints.clone());
            }
            grants.push(builder.build().map_err(|e| SyncrError::bad_policy(self.entity(), e.to_string()))?);
        }

        Ok(grants)
    }

    fn grant_change(&self, grant: &Grant) -> Change {
        Change::create("key_grant")
            .field("key", &self.name)
            .field("grantee", grant.grantee())
            .field("operations", grant.operations().join(","))
    }

    fn create(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        let policy = self.permission_document.as_deref();
        let mut change = Change::create("key").field("alias", &self.name).field("description", &self.description);
        if let Some(policy) = policy {
            change = change.document(policy);
        }

        let mut key_id = None;
        changes
            .record(change, || {
                key_id = Some(state.create_key(&self.name, &self.location, &self.description, policy)?);
                Ok(())
            })
            .map_err(|e| self.failure("Couldn't create key", e, policy))?;

        for grant in &self.grants {
            changes
                .record(self.grant_change(grant), || match &key_id {
                    Some(key_id) => state.create_grant(key_id, grant),
                    None => Err(StateError::NotFound(format!("alias/{}", self.name))),
                })
                .map_err(|e| self.failure("Couldn't create grant", e, None))?;
        }

        Ok(())
    }

    fn modify(&self, current: &KeyState, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        if current.description != self.description {
            let change =
                Change::modify("key_description").field("key", &self.name).field("description", &self.description);
            changes
                .record(change, || state.update_key_description(&current.key_id, &self.description))
                .map_err(|e| self.failure("Couldn't update key description", e, None))?;
        }

        if let Some(document) = &self.permission_document {
            let diff = compare_documents(current.policy.as_deref(), Some(document));
            if !diff.is_empty() {
                let change = Change::modify("key_policy").field("key", &self.name).diff(diff);
                changes
                    .record(change, || state.put_key_policy(&current.key_id, document))
                    .map_err(|e| self.failure("Couldn't modify policy", e, Some(document)))?;
            }
        }

        let existing: BTreeSet<GrantIdentity> = current.grants.iter().map(Grant::identity).collect();
        for grant in &self.grants {
            if existing.contains(&grant.identity()) {
                debug!("Grant already exists\tkey={}\tgrantee={}", self.name, grant.grantee());
                continue;
            }

            changes
                .record(self.grant_change(grant), || state.create_grant(&current.key_id, grant))
                .map_err(|e| self.failure("Couldn't create grant", e, None))?;
        }

        Ok(())
    }
}

impl Entity for Key {
    fn kind(&self) -> &'static str {
        "keys"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, context: &SetupContext) -> Result<(), SyncrError> {
        let parsed: KeyDefinition = parse_definition(SelfKind::Key, &self.name, &self.definition)?;

        self.location = match parsed.location {
            Some(location) if !location.is_empty() => location,
            _ => return Err(SyncrError::bad_policy(self.entity(), "Please define a location")),
        };
        self.description = match parsed.description {
            Some(description) if !description.is_empty() => description,
            _ => return Err(SyncrError::bad_policy(self.entity(), "Please define a description")),
        };

        let compiler = StatementCompiler::new(self.name.clone(), SelfKind::Key, context.accounts())
            .with_location(Some(self.location.clone()));
        self.permission = permission_statements(
            &compiler,
            &parsed.permission,
            &parsed.allow_permission,
            &parsed.deny_permission,
        )?;
        self.permission_document = optional_document(&compiler, &self.permission)?;

        let mut grants = Vec::new();
        for definition in parsed.grant.to_vec() {
            grants.extend(self.compile_grants(&compiler, definition)?);
        }
        self.grants = grants;
        Ok(())
    }

    fn resolve(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        info!("Inspecting key\talias={}\tlocation={}", self.name, self.location);
        let current = state
            .describe_key(&self.name, &self.location)
            .map_err(|e| self.failure("Couldn't describe key", e, None))?;
        match current {
            None => self.create(state, changes),
            Some(current) => self.modify(&current, state, changes),
        }
    }
}
