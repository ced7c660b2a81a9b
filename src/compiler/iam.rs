use {
    super::{SelfKind, StatementCompiler},
    crate::{
        serutil::{as_list, string_list},
        Arn, SyncrError,
    },
    log::debug,
    serde_json::{Map, Value},
};

impl<'a> StatementCompiler<'a> {
    /// Expand an IAM specification into ARNs.
    ///
    /// Strings are returned unchanged. A mapping names one or more `iam` paths, optionally one or more `account`
    /// aliases (defaulting to the account being synced) and optionally `users` suffixes; every combination of
    /// account, path and user is produced, in that order.
    pub fn iam_arn_expansion(&self, spec: &Value) -> Result<Vec<String>, SyncrError> {
        let mut result = Vec::new();
        for item in as_list(spec) {
            match item {
                Value::String(arn) => result.push(arn.clone()),
                Value::Object(map) => result.extend(self.expand_iam_mapping(map, item)?),
                _ => return Err(self.bad_policy("IAM specification should be a string or a dictionary", item)),
            }
        }

        Ok(result)
    }

    fn expand_iam_mapping(&self, map: &Map<String, Value>, spec: &Value) -> Result<Vec<String>, SyncrError> {
        let account_ids = self.account_ids(map, spec)?;

        let paths = match map.get("iam") {
            Some(paths) => string_list(paths)
                .ok_or_else(|| self.bad_policy("iam should be a string or a list of strings", spec))?,
            None => return Err(self.bad_policy("IAM specification needs an iam path", spec)),
        };

        let users = match map.get("users") {
            None | Some(Value::Null) => Vec::new(),
            Some(users) => string_list(users)
                .ok_or_else(|| self.bad_policy("users should be a string or a list of strings", spec))?,
        };

        let mut result: Vec<String> = Vec::with_capacity(account_ids.len() * paths.len() * users.len().max(1));
        for account_id in &account_ids {
            for path in &paths {
                let arn = if path == "__self__" {
                    if self.self_kind != SelfKind::Role {
                        return Err(self.bad_policy(
                            format!("{} policy has no __self__ iam role", capitalized(self.self_kind.label())),
                            spec,
                        ));
                    }
                    Arn::iam(self.accounts.account_id(), &format!("role/{}", self.name))
                } else {
                    Arn::iam(account_id, path)
                };

                if users.is_empty() {
                    push_unique(&mut result, arn.into());
                } else {
                    for user in &users {
                        push_unique(&mut result, arn.child(user).into());
                    }
                }
            }
        }

        debug!("Expanded iam specification for {} into {:?}", self.entity(), result);
        Ok(result)
    }

    /// The account ids named by the `account` field of a fragment, or the current account when there is none.
    pub(crate) fn account_ids(&self, map: &Map<String, Value>, spec: &Value) -> Result<Vec<String>, SyncrError> {
        let aliases = match map.get("account") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Number(n)) => vec![n.to_string()],
            Some(accounts) => string_list(accounts)
                .ok_or_else(|| self.bad_policy("account should be a string or a list of strings", spec))?,
        };

        let aliases: Vec<String> = aliases.into_iter().filter(|alias| !alias.is_empty()).collect();
        if aliases.is_empty() {
            return Ok(vec![self.accounts.account_id().to_string()]);
        }

        let mut ids = Vec::with_capacity(aliases.len());
        for alias in &aliases {
            match self.accounts.resolve(alias) {
                Some(id) => ids.push(id.to_string()),
                None => {
                    debug!("No account registered for alias {}", alias);
                    return Err(SyncrError::bad_policy(self.entity(), "Unknown account specified").with_fragment(spec));
                }
            }
        }

        Ok(ids)
    }
}

/// Append `arn` unless it was already produced. `__self__` always names the current account, so a fragment naming
/// several accounts would otherwise repeat it.
pub(super) fn push_unique(result: &mut Vec<String>, arn: String) {
    if !result.contains(&arn) {
        result.push(arn);
    }
}

fn capitalized(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
