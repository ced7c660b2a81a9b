use {
    super::{
        merge_definitions, optional_document, parse_definition, permission_statements, state_failure, Entity,
        SetupContext,
    },
    crate::{
        differ::compare_documents,
        serutil::OneOrMany,
        state::{LiveState, RoleState, RoleStore},
        Change, Changes, SelfKind, StateError, Statement, StatementCompiler, SyncrError,
    },
    log::{debug, info, warn},
    serde::Deserialize,
    serde_json::Value,
    std::collections::BTreeSet,
};

const DEFAULT_DESCRIPTION: &str = "No description provided!";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RoleDefinition {
    description: Option<String>,
    allow_to_assume_me: OneOrMany<Value>,
    disallow_to_assume_me: OneOrMany<Value>,
    permission: OneOrMany<Value>,
    allow_permission: OneOrMany<Value>,
    deny_permission: OneOrMany<Value>,
    make_instance_profile: bool,
    unmanaged_policies: OneOrMany<String>,
}

/// Split `path/to/role` into the bare role name and its IAM path (`role`, `/path/to/`).
pub fn split_role_name(name: &str) -> (String, Option<String>) {
    let mut parts: Vec<&str> = name.split('/').collect();
    let role_name = parts.pop().unwrap_or_default().to_string();
    let path = parts.join("/");

    if path.is_empty() {
        return (role_name, None);
    }

    let mut path = if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    };
    if !path.ends_with('/') {
        path.push('/');
    }
    (role_name, Some(path))
}

/// The name of the inline policy this tool manages on a role.
pub fn policy_name_for(name: &str) -> String {
    format!("syncr_policy_{}", name.replace('/', "__"))
}

/// A role, its trust document, its managed inline policy, and optionally an instance profile of the same name.
#[derive(Clone, Debug)]
pub struct Role {
    name: String,
    definition: Value,
    role_name: String,
    path: Option<String>,
    policy_name: String,
    description: String,
    trust: Vec<Statement>,
    distrust: Vec<Statement>,
    permission: Vec<Statement>,
    make_instance_profile: bool,
    unmanaged_policies: BTreeSet<String>,
    trust_document: Option<String>,
    permission_document: Option<String>,
}

impl Role {
    pub fn new<S: Into<String>>(name: S, definition: Value) -> Self {
        let name = name.into();
        let (role_name, path) = split_role_name(&name);
        let policy_name = policy_name_for(&name);

        Self {
            name,
            definition,
            role_name,
            path,
            policy_name,
            description: DEFAULT_DESCRIPTION.to_string(),
            trust: Vec::new(),
            distrust: Vec::new(),
            permission: Vec::new(),
            make_instance_profile: false,
            unmanaged_policies: BTreeSet::new(),
            trust_document: None,
            permission_document: None,
        }
    }

    #[inline]
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    #[inline]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[inline]
    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn trust(&self) -> &[Statement] {
        &self.trust
    }

    #[inline]
    pub fn distrust(&self) -> &[Statement] {
        &self.distrust
    }

    #[inline]
    pub fn permission(&self) -> &[Statement] {
        &self.permission
    }

    /// The trust document, once set up. `None` when the role declares no trust or distrust.
    #[inline]
    pub fn trust_document(&self) -> Option<&str> {
        self.trust_document.as_deref()
    }

    /// The permission document, once set up. `None` when the role declares no permissions.
    #[inline]
    pub fn permission_document(&self) -> Option<&str> {
        self.permission_document.as_deref()
    }

    fn failure(&self, message: &str, error: StateError, document: Option<&str>) -> SyncrError {
        state_failure(SelfKind::Role, &self.role_name, message, error, document)
    }

    fn merged_definition(&self, context: &SetupContext) -> Result<Value, SyncrError> {
        let template = match self.definition.get("use") {
            None | Some(Value::Null) => return Ok(self.definition.clone()),
            Some(Value::String(template)) => template,
            Some(other) => {
                return Err(SyncrError::bad_policy(format!("role={}", self.name), "use should name a template")
                    .with_fragment(other))
            }
        };

        let templates = context.templates();
        if templates.is_empty() {
            return Err(SyncrError::NoTemplates {
                name: self.name.clone(),
                template: template.clone(),
            });
        }

        match templates.get(template) {
            Some(base) => {
                debug!("Role {} uses template {}", self.name, template);
                Ok(merge_definitions(base, &self.definition))
            }
            None => Err(SyncrError::CantFindTemplate {
                name: self.name.clone(),
                template: template.clone(),
                available: templates.keys().cloned().collect(),
            }),
        }
    }

    fn create(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        let trust = self.trust_document.as_deref();
        let mut change = Change::create("role").field("role", &self.role_name);
        if let Some(trust) = trust {
            change = change.document(trust);
        }

        changes
            .record(change, || state.create_role(&self.role_name, self.path.as_deref(), trust, &self.description))
            .map_err(|e| self.failure("Couldn't create role", e, trust))?;

        if let Some(document) = &self.permission_document {
            let change = Change::create("role_policy")
                .field("role", &self.role_name)
                .field("policy", &self.policy_name)
                .document(document.as_str());
            changes
                .record(change, || state.put_role_policy(&self.role_name, &self.policy_name, document))
                .map_err(|e| self.failure("Couldn't add policy", e, Some(document)))?;
        }

        Ok(())
    }

    fn modify(&self, current: &RoleState, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        if let Some(trust) = &self.trust_document {
            let diff = compare_documents(current.trust_document.as_deref(), Some(trust));
            if !diff.is_empty() {
                let change = Change::modify("trust_document").field("role", &self.role_name).diff(diff);
                changes
                    .record(change, || state.update_trust_document(&self.role_name, trust))
                    .map_err(|e| self.failure("Couldn't modify trust document", e, Some(trust)))?;
            }
        }

        let remote = state
            .list_role_policies(&self.role_name)
            .map_err(|e| self.failure("Couldn't get policies for a role", e, None))?;

        for policy in remote.iter().filter(|policy| **policy != self.policy_name) {
            if self.unmanaged_policies.contains(policy) {
                warn!("Leaving unmanaged policy alone\trole={}\tpolicy={}", self.role_name, policy);
                continue;
            }

            info!("Role has unknown policy that will be disassociated\trole={}\tpolicy={}", self.role_name, policy);
            let change = Change::delete("role_policy").field("role", &self.role_name).field("policy", policy);
            changes
                .record(change, || state.delete_role_policy(&self.role_name, policy))
                .map_err(|e| self.failure("Couldn't delete a policy from a role", e, None))?;
        }

        let ours_exists = remote.contains(&self.policy_name);
        match (&self.permission_document, ours_exists) {
            (None, false) => (),
            (None, true) => {
                let change =
                    Change::delete("role_policy").field("role", &self.role_name).field("policy", &self.policy_name);
                changes
                    .record(change, || state.delete_role_policy(&self.role_name, &self.policy_name))
                    .map_err(|e| self.failure("Couldn't delete a policy from a role", e, None))?;
            }
            (Some(document), true) => {
                let current_document = state
                    .get_role_policy(&self.role_name, &self.policy_name)
                    .map_err(|e| self.failure("Couldn't get policy document for some policy", e, None))?;
                let diff = compare_documents(current_document.as_deref(), Some(document));
                if !diff.is_empty() {
                    info!("Overriding existing policy\trole={}\tpolicy={}", self.role_name, self.policy_name);
                    let change = Change::modify("role_policy")
                        .field("role", &self.role_name)
                        .field("policy", &self.policy_name)
                        .diff(diff);
                    changes
                        .record(change, || state.put_role_policy(&self.role_name, &self.policy_name, document))
                        .map_err(|e| self.failure("Couldn't add policy document", e, Some(document)))?;
                }
            }
            (Some(document), false) => {
                info!("Adding policy to existing role\trole={}\tpolicy={}", self.role_name, self.policy_name);
                let change = Change::create("role_policy")
                    .field("role", &self.role_name)
                    .field("policy", &self.policy_name)
                    .document(document.as_str());
                changes
                    .record(change, || state.put_role_policy(&self.role_name, &self.policy_name, document))
                    .map_err(|e| self.failure("Couldn't add policy document", e, Some(document)))?;
            }
        }

        Ok(())
    }

    /// Make sure an instance profile named after the role exists and holds exactly this role.
    fn ensure_instance_profile(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        let profile = &self.role_name;
        let existing = state
            .instance_profile_roles(profile)
            .map_err(|e| self.failure("Couldn't list instance profiles associated with a role", e, None))?;

        if existing.is_none() {
            let change = Change::create("instance_profile").field("profile", profile);
            changes
                .record(change, || match state.create_instance_profile(profile) {
                    Err(StateError::Conflict(what)) => {
                        debug!("Instance profile already exists, not associated with the role: {}", what);
                        Ok(())
                    }
                    other => other,
                })
                .map_err(|e| self.failure("Couldn't create instance profile", e, None))?;
        }

        let existing = existing.unwrap_or_default();
        for other in existing.iter().filter(|role| *role != profile) {
            let change = Change::delete("instance_profile_role").field("profile", profile).field("role", other);
            changes
                .record(change, || state.remove_role_from_instance_profile(profile, other))
                .map_err(|e| self.failure("Couldn't remove role from an instance profile", e, None))?;
        }

        if !existing.contains(profile) {
            let change = Change::create("instance_profile_role").field("profile", profile).field("role", profile);
            changes
                .record(change, || state.add_role_to_instance_profile(profile, profile))
                .map_err(|e| self.failure("Couldn't add role to an instance profile", e, None))?;
        }

        Ok(())
    }
}

impl Entity for Role {
    fn kind(&self) -> &'static str {
        "roles"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, context: &SetupContext) -> Result<(), SyncrError> {
        let definition = self.merged_definition(context)?;
        let parsed: RoleDefinition = parse_definition(SelfKind::Role, &self.name, &definition)?;
        let compiler = StatementCompiler::new(self.name.clone(), SelfKind::Role, context.accounts());

        self.description = parsed.description.unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
        self.trust = parsed
            .allow_to_assume_me
            .to_vec()
            .into_iter()
            .map(|statement| compiler.expand_trust_statement(statement, true))
            .collect::<Result<_, _>>()?;
        self.distrust = parsed
            .disallow_to_assume_me
            .to_vec()
            .into_iter()
            .map(|statement| compiler.expand_trust_statement(statement, false))
            .collect::<Result<_, _>>()?;
        self.permission = permission_statements(
            &compiler,
            &parsed.permission,
            &parsed.allow_permission,
            &parsed.deny_permission,
        )?;
        self.make_instance_profile = parsed.make_instance_profile;
        self.unmanaged_policies = parsed.unmanaged_policies.to_vec().into_iter().cloned().collect();

        let trust: Vec<Statement> = self.trust.iter().chain(self.distrust.iter()).cloned().collect();
        self.trust_document = optional_document(&compiler, &trust)?;
        self.permission_document = optional_document(&compiler, &self.permission)?;
        Ok(())
    }

    fn resolve(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        info!("Inspecting role\trole={}", self.name);
        let current =
            state.describe_role(&self.role_name).map_err(|e| self.failure("Couldn't describe role", e, None))?;

        match current {
            None => self.create(state, changes)?,
            Some(current) => self.modify(&current, state, changes)?,
        }

        if self.make_instance_profile {
            self.ensure_instance_profile(state, changes)?;
        }

        Ok(())
    }
}

/// A role that must not exist.
#[derive(Clone, Debug)]
pub struct RoleRemoval {
    name: String,
    role_name: String,
}

impl RoleRemoval {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        let (role_name, _) = split_role_name(&name);
        Self {
            name,
            role_name,
        }
    }

    fn failure(&self, message: &str, error: StateError) -> SyncrError {
        state_failure(SelfKind::Role, &self.role_name, message, error, None)
    }
}

impl Entity for RoleRemoval {
    fn kind(&self) -> &'static str {
        "remove_roles"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, _context: &SetupContext) -> Result<(), SyncrError> {
        if self.role_name.is_empty() {
            return Err(SyncrError::BadRole {
                name: self.name.clone(),
                message: "Told to remove a role, but no role name was given".to_string(),
            });
        }
        Ok(())
    }

    fn resolve(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        let current = state.describe_role(&self.role_name).map_err(|e| self.failure("Couldn't describe role", e))?;
        if current.is_none() {
            info!("Role already deleted\trole={}", self.role_name);
            return Ok(());
        }

        let policies = state
            .list_role_policies(&self.role_name)
            .map_err(|e| self.failure("Couldn't get policies for a role", e))?;
        for policy in &policies {
            let change = Change::delete("role_policy").field("role", &self.role_name).field("policy", policy);
            changes
                .record(change, || state.delete_role_policy(&self.role_name, policy))
                .map_err(|e| self.failure("Couldn't delete a policy from a role", e))?;
        }

        changes
            .record(Change::delete("role").field("role", &self.role_name), || state.delete_role(&self.role_name))
            .map_err(|e| self.failure("Couldn't delete a role", e))
    }
}
