mod bucket;
mod key;
mod role;
mod template;

pub use {
    bucket::Bucket,
    key::Key,
    role::{Role, RoleRemoval},
    template::Template,
};

use {
    crate::{
        serutil::OneOrMany, state::LiveState, AccountRegistry, Changes, SelfKind, StateError, Statement,
        StatementCompiler, SyncrError,
    },
    serde::de::DeserializeOwned,
    serde_json::Value,
    std::{collections::BTreeMap, fmt::Debug},
};

/// What an entity can see while it is being set up.
#[derive(Clone, Copy, Debug)]
pub struct SetupContext<'a> {
    accounts: &'a AccountRegistry,
    templates: &'a BTreeMap<String, Value>,
    default_bucket_location: &'a str,
}

impl<'a> SetupContext<'a> {
    pub fn new(
        accounts: &'a AccountRegistry,
        templates: &'a BTreeMap<String, Value>,
        default_bucket_location: &'a str,
    ) -> Self {
        Self {
            accounts,
            templates,
            default_bucket_location,
        }
    }

    #[inline]
    pub fn accounts(&self) -> &'a AccountRegistry {
        self.accounts
    }

    #[inline]
    pub fn templates(&self) -> &'a BTreeMap<String, Value> {
        self.templates
    }

    #[inline]
    pub fn default_bucket_location(&self) -> &'a str {
        self.default_bucket_location
    }
}

/// One declared resource.
///
/// `setup` validates the definition and compiles its statements; it never touches live state. `resolve` then
/// brings the live account in line with the definition, recording every change it makes.
pub trait Entity: Debug {
    fn kind(&self) -> &'static str;

    fn name(&self) -> &str;

    fn setup(&mut self, context: &SetupContext) -> Result<(), SyncrError>;

    fn resolve(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError>;

    /// The definition other entities can `use`, for templates.
    fn as_template(&self) -> Option<&Value> {
        None
    }
}

/// Merge `overlay` on top of `base`. Mappings merge key by key; any other value in `overlay` replaces what was in
/// `base`.
pub fn merge_definitions(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let value = match base.get(key) {
                    Some(existing) => merge_definitions(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Deserialize a definition mapping into its typed form.
pub(crate) fn parse_definition<T: DeserializeOwned>(
    kind: SelfKind,
    name: &str,
    definition: &Value,
) -> Result<T, SyncrError> {
    if !definition.is_object() {
        return Err(SyncrError::bad_policy(
            format!("{}={}", kind.label(), name),
            format!("A {} definition should be a dictionary", kind.label()),
        )
        .with_fragment(definition));
    }

    serde_json::from_value(definition.clone()).map_err(|e| {
        SyncrError::bad_policy(format!("{}={}", kind.label(), name), format!("Invalid definition: {}", e))
            .with_fragment(definition)
    })
}

/// Compile the `permission`, `allow_permission` and `deny_permission` entries of a definition, in that order.
pub(crate) fn permission_statements(
    compiler: &StatementCompiler,
    permission: &OneOrMany<Value>,
    allow_permission: &OneOrMany<Value>,
    deny_permission: &OneOrMany<Value>,
) -> Result<Vec<Statement>, SyncrError> {
    let mut statements = Vec::new();
    for (policies, allow) in [(permission, None), (allow_permission, Some(true)), (deny_permission, Some(false))] {
        for policy in policies.to_vec() {
            statements.push(compiler.make_permission_statement(policy, allow)?);
        }
    }
    Ok(statements)
}

/// The document for a set of statements, or `None` when there are none.
pub(crate) fn optional_document(
    compiler: &StatementCompiler,
    statements: &[Statement],
) -> Result<Option<String>, SyncrError> {
    if statements.is_empty() {
        Ok(None)
    } else {
        compiler.make_document(statements.to_vec()).map(Some)
    }
}

/// Classify a live-state failure that happened while working on an entity.
pub(crate) fn state_failure(
    kind: SelfKind,
    name: &str,
    message: &str,
    error: StateError,
    document: Option<&str>,
) -> SyncrError {
    let entity = format!("{}={}", kind.label(), name);
    match error {
        StateError::MalformedDocument(_) => SyncrError::BadAmazon {
            entity,
            message: message.to_string(),
            error,
            document: document.map(str::to_string),
        },
        StateError::NotFound(ref what) => match kind {
            SelfKind::Role => SyncrError::BadRole {
                name: name.to_string(),
                message: format!("{}: {} disappeared", message, what),
            },
            SelfKind::Key => SyncrError::BadAlias {
                alias: name.to_string(),
                message: format!("{}: {} disappeared", message, what),
            },
            SelfKind::Bucket => SyncrError::bad_policy(entity, format!("{}: {} disappeared", message, what)),
        },
        _ => SyncrError::State {
            entity,
            message: message.to_string(),
            error,
        },
    }
}
