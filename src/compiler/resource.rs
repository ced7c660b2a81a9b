use {
    super::{iam::push_unique, SelfKind, StatementCompiler},
    crate::{
        arn::AWS_PARTITION,
        serutil::{as_list, string_list},
        Arn, SyncrError,
    },
    lazy_static::lazy_static,
    regex::Regex,
    serde_json::{Map, Value},
};

lazy_static! {
    /// KMS key ids: a UUID, or (in older accounts) all digits. Anything else is treated as an alias.
    static ref KMS_KEY_ID: Regex =
        Regex::new(r"^([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}|[0-9]+)$").unwrap();
}

const RESOURCE_TYPES: &[&str] = &["iam", "kms", "sns", "s3"];

impl<'a> StatementCompiler<'a> {
    /// Expand a `resource`/`notresource` value into ARNs.
    pub fn resource_expansion(&self, resource: &Value) -> Result<Vec<String>, SyncrError> {
        let mut result: Vec<String> = Vec::new();
        for item in as_list(resource) {
            match item {
                Value::String(arn) => result.push(arn.clone()),
                Value::Object(map) => result.extend(self.expand_resource(map, item)?),
                _ => return Err(self.bad_policy("Resource should be a string or a dictionary", item)),
            }
        }
        Ok(result)
    }

    fn expand_resource(&self, map: &Map<String, Value>, resource: &Value) -> Result<Vec<String>, SyncrError> {
        let found: Vec<&str> = RESOURCE_TYPES.iter().copied().filter(|key| map.contains_key(*key)).collect();
        match found.as_slice() {
            ["iam"] => self.iam_arn_expansion(resource),
            ["s3"] => self.s3_expansion(&map["s3"], resource),
            ["kms"] => self.kms_expansion(map, resource),
            ["sns"] => self.sns_expansion(map, resource),
            _ => Err(self.bad_policy("Unknown resource type", resource)),
        }
    }

    fn tokens(&self, value: &Value, key: &str, resource: &Value) -> Result<Vec<String>, SyncrError> {
        string_list(value)
            .ok_or_else(|| self.bad_policy(format!("{} should be a string or a list of strings", key), resource))
    }

    fn s3_expansion(&self, value: &Value, resource: &Value) -> Result<Vec<String>, SyncrError> {
        let mut result: Vec<String> = Vec::new();
        for bucket_key in self.tokens(value, "s3", resource)? {
            let bucket_key = if bucket_key == "__self__" {
                if self.self_kind != SelfKind::Bucket {
                    return Err(self.bad_policy(
                        format!("A {} policy has no __self__ bucket", self.self_kind.label()),
                        resource,
                    ));
                }
                self.name.clone()
            } else {
                bucket_key
            };

            result.push(Arn::s3(&bucket_key).into());
            if !bucket_key.contains('/') {
                result.push(Arn::s3(&format!("{}/*", bucket_key)).into());
            }
        }
        Ok(result)
    }

    fn region(&self, map: &Map<String, Value>, resource: &Value) -> Result<String, SyncrError> {
        match map.get("location") {
            Some(Value::String(location)) => Ok(location.clone()),
            Some(_) => Err(self.bad_policy("location should be a string", resource)),
            None => match &self.location {
                Some(location) => Ok(location.clone()),
                None => Err(self.bad_policy("No location specified", resource)),
            },
        }
    }

    fn kms_expansion(&self, map: &Map<String, Value>, resource: &Value) -> Result<Vec<String>, SyncrError> {
        let tokens = self.tokens(&map["kms"], "kms", resource)?;
        let region = self.region(map, resource)?;
        let account_ids = self.account_ids(map, resource)?;

        let mut result: Vec<String> = Vec::with_capacity(tokens.len() * account_ids.len());
        for account_id in &account_ids {
            for token in &tokens {
                let arn = if token == "__self__" {
                    if self.self_kind != SelfKind::Key {
                        return Err(self.bad_policy(
                            format!("A {} policy has no __self__ key", self.self_kind.label()),
                            resource,
                        ));
                    }
                    kms_arn(&region, self.accounts.account_id(), &self.name)
                } else {
                    kms_arn(&region, account_id, token)
                };
                push_unique(&mut result, arn.into());
            }
        }
        Ok(result)
    }

    fn sns_expansion(&self, map: &Map<String, Value>, resource: &Value) -> Result<Vec<String>, SyncrError> {
        let topics = self.tokens(&map["sns"], "sns", resource)?;
        if topics.iter().any(|topic| topic == "__self__") {
            return Err(self.bad_policy("Sns resources have no __self__", resource));
        }

        let region = self.region(map, resource)?;
        let account_ids = self.account_ids(map, resource)?;

        let mut result: Vec<String> = Vec::with_capacity(topics.len() * account_ids.len());
        for account_id in &account_ids {
            for topic in &topics {
                result.push(Arn::new(AWS_PARTITION, "sns", &region, account_id, topic).into());
            }
        }
        Ok(result)
    }
}

fn kms_arn(region: &str, account_id: &str, token: &str) -> Arn {
    if KMS_KEY_ID.is_match(token) {
        Arn::new(AWS_PARTITION, "kms", region, account_id, &format!("key/{}", token))
    } else {
        let alias = token.strip_prefix("alias/").unwrap_or(token);
        Arn::new(AWS_PARTITION, "kms", region, account_id, &format!("alias/{}", alias))
    }
}
