mod iam;
mod resource;

use {
    crate::{
        serutil::{as_list, string_list},
        AccountRegistry, Document, Effect, Principal, SpecifiedPrincipal, Statement, SyncrError,
    },
    log::{debug, trace},
    serde_json::{Map, Value},
    std::{collections::BTreeMap, str::FromStr},
};

/// The kind of entity a compiler works on behalf of. Determines what `__self__` refers to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SelfKind {
    Role,
    Bucket,
    Key,
}

impl SelfKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Bucket => "bucket",
            Self::Key => "key",
        }
    }
}

/// Expands DSL fragments into [Statement]s for a single named entity.
#[derive(Clone, Debug)]
pub struct StatementCompiler<'a> {
    name: String,
    self_kind: SelfKind,
    accounts: &'a AccountRegistry,
    location: Option<String>,
}

/// The capitalized keys of a fragment, parsed into their typed forms.
#[derive(Debug, Default)]
struct RawFields {
    sid: Option<String>,
    effect: Option<Effect>,
    action: Option<Vec<String>>,
    not_action: Option<Vec<String>>,
    resource: Option<Vec<String>>,
    not_resource: Option<Vec<String>>,
    principal: Option<Principal>,
    not_principal: Option<Principal>,
    condition: Option<Value>,
    overrides: BTreeMap<String, Value>,
}

fn is_raw_key(key: &str) -> bool {
    key.chars().next().map(char::is_uppercase).unwrap_or(false)
}

impl<'a> StatementCompiler<'a> {
    pub fn new<S: Into<String>>(name: S, self_kind: SelfKind, accounts: &'a AccountRegistry) -> Self {
        Self {
            name: name.into(),
            self_kind,
            accounts,
            location: None,
        }
    }

    /// Set the region used for `kms` and `sns` resources that do not name their own `location`.
    pub fn with_location<S: Into<String>>(mut self, location: Option<S>) -> Self {
        self.location = location.map(Into::into);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn self_kind(&self) -> SelfKind {
        self.self_kind
    }

    /// How this entity is named in errors, e.g. `role=deploy`.
    pub fn entity(&self) -> String {
        format!("{}={}", self.self_kind.label(), self.name)
    }

    pub(crate) fn bad_policy<M: Into<String>>(&self, message: M, fragment: &Value) -> SyncrError {
        SyncrError::bad_policy(self.entity(), message).with_fragment(fragment)
    }

    /// Compile one permission policy.
    ///
    /// `allow_override` is `Some` when the policy was listed under `allow_permission` or `deny_permission`; it takes
    /// precedence over any `Effect` or `allow` in the fragment itself.
    pub fn make_permission_statement(
        &self,
        policy: &Value,
        allow_override: Option<bool>,
    ) -> Result<Statement, SyncrError> {
        let map = self.fragment_map(policy)?;
        let mut raw = self.raw_fields(map, policy)?;

        let effect = match (allow_override, raw.effect) {
            (Some(allow), _) => Effect::from(allow),
            (None, Some(effect)) => effect,
            (None, None) => match map.get("allow") {
                Some(Value::Bool(allow)) => Effect::from(*allow),
                _ => return Err(self.bad_policy("Need to specify whether we allow this policy or not", policy)),
            },
        };

        for (key, dest) in [("action", &mut raw.action), ("notaction", &mut raw.not_action)] {
            if let Some(value) = map.get(key) {
                let actions = string_list(value).ok_or_else(|| {
                    self.bad_policy(format!("{} should be a string or a list of strings", key), policy)
                })?;
                if !actions.is_empty() {
                    dest.get_or_insert_with(Vec::new).extend(actions);
                }
            }
        }

        for (key, dest) in [("resource", &mut raw.resource), ("notresource", &mut raw.not_resource)] {
            if let Some(value) = map.get(key) {
                let resources = self.resource_expansion(value).map_err(|e| e.with_fragment(policy))?;
                if !resources.is_empty() {
                    dest.get_or_insert_with(Vec::new).extend(resources);
                }
            }
        }

        if raw.resource.is_none() && raw.not_resource.is_none() {
            return Err(self.bad_policy("No Resource or NotResource was defined for policy", policy));
        }

        if raw.action.is_none() && raw.not_action.is_none() {
            return Err(self.bad_policy("No Action or NotAction defined for this policy", policy));
        }

        raw.effect = Some(effect);
        let statement = self.build(raw, policy)?;
        debug!("Compiled permission statement for {}: {:?}", self.entity(), statement);
        Ok(statement)
    }

    /// Compile one `allow_to_assume_me` (`allow = true`) or `disallow_to_assume_me` (`allow = false`) entry.
    pub fn expand_trust_statement(&self, statement: &Value, allow: bool) -> Result<Statement, SyncrError> {
        let map = self.fragment_map(statement)?;
        let mut raw = self.raw_fields(map, statement)?;

        let slot = if allow {
            &mut raw.principal
        } else {
            &mut raw.not_principal
        };

        let mut principal = match slot.take() {
            None => SpecifiedPrincipal::default(),
            Some(Principal::Specified(specified)) => specified,
            Some(Principal::Any) => {
                if ["service", "federated", "iam"].iter().any(|key| map.contains_key(*key)) {
                    return Err(self.bad_policy("Can't add principals to a wildcard principal", statement));
                }
                *slot = Some(Principal::Any);
                SpecifiedPrincipal::default()
            }
        };

        if let Some(services) = map.get("service") {
            let services = string_list(services)
                .ok_or_else(|| self.bad_policy("service should be a string or a list of strings", statement))?;
            for service in services {
                if service == "ec2" {
                    principal.add_service("ec2.amazonaws.com");
                } else {
                    principal.add_service(service);
                }
            }
        }

        if let Some(federated) = map.get("federated") {
            for spec in as_list(federated) {
                let arns = self.iam_arn_expansion(spec).map_err(|e| e.with_fragment(statement))?;
                principal.add_federated(arns);
            }
            if raw.action.is_none() && raw.not_action.is_none() {
                raw.action = Some(vec!["sts:AssumeRoleWithSAML".to_string()]);
            }
        }

        if map.contains_key("iam") {
            principal.add_aws(self.iam_arn_expansion(statement)?);
        }

        if slot.is_none() {
            *slot = Some(Principal::Specified(principal));
        }

        if raw.action.is_none() && raw.not_action.is_none() {
            raw.action = Some(vec!["sts:AssumeRole".to_string()]);
        }
        raw.effect.get_or_insert(Effect::Allow);
        raw.sid.get_or_insert_with(String::new);

        let statement = self.build(raw, statement)?;
        trace!("Compiled trust statement for {}: {:?}", self.entity(), statement);
        Ok(statement)
    }

    /// Wrap statements in a document and render it.
    pub fn make_document(&self, statements: Vec<Statement>) -> Result<String, SyncrError> {
        Document::new(statements).to_json(&self.entity())
    }

    fn fragment_map<'v>(&self, fragment: &'v Value) -> Result<&'v Map<String, Value>, SyncrError> {
        match fragment {
            Value::Object(map) => Ok(map),
            _ => Err(self.bad_policy("Policy should be a dictionary", fragment)),
        }
    }

    fn raw_fields(&self, map: &Map<String, Value>, fragment: &Value) -> Result<RawFields, SyncrError> {
        let mut raw = RawFields::default();

        for (key, value) in map.iter().filter(|(key, _)| is_raw_key(key)) {
            let list = || {
                string_list(value).ok_or_else(|| {
                    self.bad_policy(format!("{} should be a string or a list of strings", key), fragment)
                })
            };

            match key.as_str() {
                "Sid" => match value {
                    Value::String(sid) => raw.sid = Some(sid.clone()),
                    _ => return Err(self.bad_policy("Sid should be a string", fragment)),
                },
                "Effect" => {
                    let effect = value
                        .as_str()
                        .ok_or_else(|| self.bad_policy("Effect should be a string", fragment))
                        .and_then(|s| Effect::from_str(s).map_err(|e| self.bad_policy(e, fragment)))?;
                    raw.effect = Some(effect);
                }
                "Action" => raw.action = Some(list()?),
                "NotAction" => raw.not_action = Some(list()?),
                "Resource" => raw.resource = Some(list()?),
                "NotResource" => raw.not_resource = Some(list()?),
                "Principal" => {
                    raw.principal = Some(Principal::from_value(value).map_err(|e| self.bad_policy(e, fragment))?)
                }
                "NotPrincipal" => {
                    raw.not_principal = Some(Principal::from_value(value).map_err(|e| self.bad_policy(e, fragment))?)
                }
                "Condition" => raw.condition = Some(value.clone()),
                _ => {
                    raw.overrides.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(raw)
    }

    fn build(&self, raw: RawFields, fragment: &Value) -> Result<Statement, SyncrError> {
        let mut builder = Statement::builder();
        builder.overrides(raw.overrides);

        if let Some(sid) = raw.sid {
            builder.sid(sid);
        }
        if let Some(effect) = raw.effect {
            builder.effect(effect);
        }
        if let Some(action) = raw.action {
            builder.action(action);
        }
        if let Some(not_action) = raw.not_action {
            builder.not_action(not_action);
        }
        if let Some(resource) = raw.resource {
            builder.resource(resource);
        }
        if let Some(not_resource) = raw.not_resource {
            builder.not_resource(not_resource);
        }
        if let Some(principal) = raw.principal {
            builder.principal(principal);
        }
        if let Some(not_principal) = raw.not_principal {
            builder.not_principal(not_principal);
        }
        if let Some(condition) = raw.condition {
            builder.condition(condition);
        }

        builder.build().map_err(|e| self.bad_policy(e.to_string(), fragment))
    }
}

#[cfg(test)]
mod tests;
