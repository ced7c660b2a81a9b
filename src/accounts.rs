use {
    crate::{serutil::value_kind, ConfigurationProblem, SyncrError},
    log::debug,
    serde_json::Value,
    std::collections::BTreeMap,
};

/// Read-only lookup from human-readable account aliases (and from every account id to itself) to account ids,
/// plus the identity of the account being synced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AccountRegistry {
    accounts: BTreeMap<String, String>,
    account_id: String,
    account_name: String,
}

impl AccountRegistry {
    /// Build a registry from alias → id pairs. `current` names the account being synced, either by alias or by id.
    pub fn new<I, A, S>(accounts: I, current: &str) -> Result<Self, SyncrError>
    where
        I: IntoIterator<Item = (A, S)>,
        A: Into<String>,
        S: Into<String>,
    {
        let mut registry: BTreeMap<String, String> =
            accounts.into_iter().map(|(alias, id)| (alias.into(), id.into())).collect();

        let ids: Vec<String> = registry.values().cloned().collect();
        for id in ids {
            registry.entry(id.clone()).or_insert(id);
        }

        let account_id = match registry.get(current) {
            Some(id) => id.clone(),
            None => {
                return Err(SyncrError::UnknownAccount {
                    account: current.to_string(),
                })
            }
        };

        debug!("Account registry has {} entries; syncing {} ({})", registry.len(), current, account_id);
        Ok(Self {
            accounts: registry,
            account_id,
            account_name: current.to_string(),
        })
    }

    /// Build a registry from a parsed mapping of alias → id. Ids may be strings or numbers.
    pub fn from_value(value: &Value, current: &str) -> Result<Self, SyncrError> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(SyncrError::InvalidConfiguration {
                    location: "accounts".to_string(),
                    problem: ConfigurationProblem::NotAMapping {
                        found: value_kind(other),
                    },
                })
            }
        };

        let mut accounts = Vec::with_capacity(map.len());
        for (alias, id) in map {
            let id = match id {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(SyncrError::InvalidConfiguration {
                        location: "accounts".to_string(),
                        problem: ConfigurationProblem::UnexpectedType {
                            kind: alias.clone(),
                            expected: "string",
                            found: value_kind(other),
                        },
                    })
                }
            };
            accounts.push((alias.clone(), id));
        }

        Self::new(accounts, current)
    }

    /// The account id for an alias or id, if known.
    #[inline]
    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.accounts.get(alias).map(String::as_str)
    }

    /// The id of the account being synced.
    #[inline]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The alias (or id) the account being synced was selected by.
    #[inline]
    pub fn account_name(&self) -> &str {
        &self.account_name
    }
}
