use {
    serde_json::Value,
    std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
    },
};

/// Errors reported by a live-state collaborator. The collaborator is responsible for classifying the provider's
/// responses into one of these buckets; the resolvers never retry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StateError {
    NotFound(String),
    Conflict(String),
    MalformedDocument(String),
    AccessDenied(String),
    Transient(String),
}

impl Display for StateError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::Conflict(what) => write!(f, "Conflict: {}", what),
            Self::MalformedDocument(details) => write!(f, "Malformed document: {}", details),
            Self::AccessDenied(what) => write!(f, "Access denied: {}", what),
            Self::Transient(what) => write!(f, "Transient failure: {}", what),
        }
    }
}

impl Error for StateError {}

/// The ways a configuration source can have the wrong shape.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigurationProblem {
    NotAMapping {
        found: &'static str,
    },
    UnexpectedType {
        kind: String,
        expected: &'static str,
        found: &'static str,
    },
    DuplicatesInList {
        kind: String,
        duplicates: Vec<String>,
    },
    NonStringName {
        kind: String,
        found: &'static str,
    },
}

impl Display for ConfigurationProblem {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::NotAMapping {
                found,
            } => write!(f, "Configuration needs to be a mapping\tfound={}", found),
            Self::UnexpectedType {
                kind,
                expected,
                found,
            } => write!(
                f,
                "Expected configuration of a different type\texpected_type={}\tfound={}\tkey={}",
                expected, found, kind
            ),
            Self::DuplicatesInList {
                kind,
                duplicates,
            } => write!(f, "Found duplicates in a list\tduplicates={}\tkey={}", duplicates.join(","), kind),
            Self::NonStringName {
                kind,
                found,
            } => write!(f, "Names in a list must be strings\tfound={}\tkey={}", found, kind),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SyncrError {
    /// A configuration source does not have the shape its entity kind expects.
    InvalidConfiguration {
        location: String,
        problem: ConfigurationProblem,
    },

    /// A mapping-shaped entity was defined by more than one source.
    DuplicateItem {
        kind: String,
        name: String,
        locations: Vec<String>,
    },

    /// The same name appears under kinds that are registered as conflicting.
    ConflictingConfiguration {
        name: String,
        found_in: String,
    },

    /// Every validation error found in one pass.
    BadConfiguration(Vec<SyncrError>),

    /// A DSL fragment could not be compiled.
    BadPolicy {
        entity: String,
        message: String,
        fragment: Option<Value>,
    },

    /// A compiled document could not be serialized.
    InvalidDocument {
        entity: String,
        message: String,
    },

    /// The live-state collaborator rejected a well-formed document.
    BadAmazon {
        entity: String,
        message: String,
        error: StateError,
        document: Option<String>,
    },

    BadRole {
        name: String,
        message: String,
    },

    BadAlias {
        alias: String,
        message: String,
    },

    CantFindTemplate {
        name: String,
        template: String,
        available: Vec<String>,
    },

    NoTemplates {
        name: String,
        template: String,
    },

    UnknownAccount {
        account: String,
    },

    UnknownKinds {
        unknown: Vec<String>,
        known: Vec<String>,
    },

    NoKindsRegistered,

    /// Any other live-state failure; aborts the run.
    State {
        entity: String,
        message: String,
        error: StateError,
    },
}

impl SyncrError {
    pub fn bad_policy<E: Into<String>, M: Into<String>>(entity: E, message: M) -> Self {
        Self::BadPolicy {
            entity: entity.into(),
            message: message.into(),
            fragment: None,
        }
    }

    /// Attach the offending fragment to a [SyncrError::BadPolicy]. Other variants are returned unchanged.
    pub fn with_fragment(self, value: &Value) -> Self {
        match self {
            Self::BadPolicy {
                entity,
                message,
                fragment: None,
            } => Self::BadPolicy {
                entity,
                message,
                fragment: Some(value.clone()),
            },
            other => other,
        }
    }

    /// The errors wrapped by [SyncrError::BadConfiguration], or this error alone.
    pub fn errors(&self) -> Vec<&SyncrError> {
        match self {
            Self::BadConfiguration(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration {
                ..
            } => "Something wrong with this configuration",
            Self::DuplicateItem {
                ..
            } => "Item defined multiple times",
            Self::ConflictingConfiguration {
                ..
            } => "The configuration conflicts with itself",
            Self::BadConfiguration(_) => "Something wrong with the configuration",
            Self::BadPolicy {
                ..
            } => "Bad definition of a policy",
            Self::InvalidDocument {
                ..
            } => "Something wrong with this iam document",
            Self::BadAmazon {
                ..
            } => "Amazon said no",
            Self::BadRole {
                ..
            } => "Bad definition of a role",
            Self::BadAlias {
                ..
            } => "Bad key alias",
            Self::CantFindTemplate {
                ..
            } => "Can't find a template",
            Self::NoTemplates {
                ..
            } => "No templates defined",
            Self::UnknownAccount {
                ..
            } => "Please add this account to the accounts registry",
            Self::UnknownKinds {
                ..
            } => "Told to sync unknown types",
            Self::NoKindsRegistered => "Syncr doesn't know about anything, register some kinds first",
            Self::State {
                ..
            } => "Failed talking to amazon",
        }
    }
}

fn write_described(f: &mut Formatter, desc: &str, message: &str, info: &[(&str, String)]) -> FmtResult {
    if message.is_empty() {
        write!(f, "\"{}\"", desc)?;
    } else {
        write!(f, "\"{}. {}\"", desc, message)?;
    }

    let mut info: Vec<&(&str, String)> = info.iter().collect();
    info.sort_by_key(|(key, _)| *key);
    for (key, value) in info {
        write!(f, "\t{}={}", key, value)?;
    }
    Ok(())
}

impl Display for SyncrError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let desc = self.description();
        match self {
            Self::InvalidConfiguration {
                location,
                problem,
            } => write!(f, "\"{}. {}\"\tlocation={}", desc, problem, location),
            Self::DuplicateItem {
                kind,
                name,
                locations,
            } => write_described(
                f,
                desc,
                "",
                &[("key", kind.clone()), ("name", name.clone()), ("found", locations.join(", "))],
            ),
            Self::ConflictingConfiguration {
                name,
                found_in,
            } => write_described(
                f,
                desc,
                "Found item in conflicting specifications",
                &[("conflicting", name.clone()), ("found_in", found_in.clone())],
            ),
            Self::BadConfiguration(errors) => {
                write_described(f, desc, &format!("{} error(s)", errors.len()), &[])?;
                for error in errors {
                    write!(f, "\n\t{}", error)?;
                }
                Ok(())
            }
            Self::BadPolicy {
                entity,
                message,
                fragment,
            } => {
                let mut info = vec![("entity", entity.clone())];
                if let Some(fragment) = fragment {
                    info.push(("policy", fragment.to_string()));
                }
                write_described(f, desc, message, &info)
            }
            Self::InvalidDocument {
                entity,
                message,
            } => write_described(f, desc, message, &[("entity", entity.clone())]),
            Self::BadAmazon {
                entity,
                message,
                error,
                document,
            } => {
                write_described(f, desc, message, &[("entity", entity.clone()), ("error", error.to_string())])?;
                if let Some(document) = document {
                    for line in document.lines() {
                        write!(f, "\n\t{}", line)?;
                    }
                }
                Ok(())
            }
            Self::BadRole {
                name,
                message,
            } => write_described(f, desc, message, &[("role", name.clone())]),
            Self::BadAlias {
                alias,
                message,
            } => write_described(f, desc, message, &[("alias", alias.clone())]),
            Self::CantFindTemplate {
                name,
                template,
                available,
            } => write_described(
                f,
                desc,
                "",
                &[
                    ("name", name.clone()),
                    ("looking_for_template", template.clone()),
                    ("available", available.join(", ")),
                ],
            ),
            Self::NoTemplates {
                name,
                template,
            } => write_described(f, desc, "", &[("name", name.clone()), ("looking_for_template", template.clone())]),
            Self::UnknownAccount {
                account,
            } => write_described(f, desc, "", &[("account_name", account.clone())]),
            Self::UnknownKinds {
                unknown,
                known,
            } => write_described(
                f,
                desc,
                "",
                &[("only_sync", known.join(", ")), ("unknown_types", unknown.join(", "))],
            ),
            Self::NoKindsRegistered => write_described(f, desc, "", &[]),
            Self::State {
                entity,
                message,
                error,
            } => write_described(f, desc, message, &[("entity", entity.clone()), ("error", error.to_string())]),
        }
    }
}

impl Error for SyncrError {}

#[cfg(test)]
mod tests {
    use {
        crate::{ConfigurationProblem, StateError, SyncrError},
        pretty_assertions::{assert_eq, assert_ne},
        serde_json::json,
    };

    #[test_log::test]
    fn test_display() {
        let e = SyncrError::bad_policy("role=deploy", "No Action or NotAction defined for this policy");
        assert_eq!(
            e.to_string(),
            "\"Bad definition of a policy. No Action or NotAction defined for this policy\"\tentity=role=deploy"
        );

        let e = e.with_fragment(&json!({"allow": true}));
        assert_eq!(
            e.to_string(),
            "\"Bad definition of a policy. No Action or NotAction defined for this policy\"\tentity=role=deploy\tpolicy={\"allow\":true}"
        );

        let e = SyncrError::DuplicateItem {
            kind: "roles".to_string(),
            name: "deploy".to_string(),
            locations: vec!["a.yaml".to_string(), "b.yaml".to_string()],
        };
        assert_eq!(e.to_string(), "\"Item defined multiple times\"\tfound=a.yaml, b.yaml\tkey=roles\tname=deploy");

        let e = SyncrError::InvalidConfiguration {
            location: "a.yaml".to_string(),
            problem: ConfigurationProblem::UnexpectedType {
                kind: "roles".to_string(),
                expected: "mapping",
                found: "list",
            },
        };
        assert_eq!(
            e.to_string(),
            "\"Something wrong with this configuration. Expected configuration of a different type\texpected_type=mapping\tfound=list\tkey=roles\"\tlocation=a.yaml"
        );

        assert_eq!(
            SyncrError::NoKindsRegistered.to_string(),
            "\"Syncr doesn't know about anything, register some kinds first\""
        );
        assert_eq!(StateError::NotFound("role/x".to_string()).to_string(), "Not found: role/x");
    }

    #[test_log::test]
    fn test_bad_configuration_lists_everything() {
        let e = SyncrError::BadConfiguration(vec![
            SyncrError::NoKindsRegistered,
            SyncrError::UnknownAccount {
                account: "dev".to_string(),
            },
        ]);
        assert_eq!(e.errors().len(), 2);
        let rendered = e.to_string();
        assert!(rendered.starts_with("\"Something wrong with the configuration. 2 error(s)\""));
        assert!(rendered.contains("\n\t\"Please add this account to the accounts registry\"\taccount_name=dev"));
    }

    #[test_log::test]
    fn test_eq() {
        let e1a = SyncrError::bad_policy("bucket=b", "Unknown resource type");
        let e1b = SyncrError::bad_policy("bucket=b", "Unknown resource type");
        let e2 = SyncrError::bad_policy("bucket=c", "Unknown resource type");
        assert_eq!(e1a, e1b);
        assert_ne!(e1a, e2);
        assert_ne!(e1a, e1b.clone().with_fragment(&json!("x")));
        assert_eq!(SyncrError::NoKindsRegistered.with_fragment(&json!(1)), SyncrError::NoKindsRegistered);
    }
}
