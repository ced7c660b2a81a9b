use {
    super::{BucketState, BucketStore, KeyState, KeyStore, RoleState, RoleStore},
    crate::{Grant, StateError},
    log::trace,
    std::collections::BTreeMap,
};

#[derive(Clone, Debug, Default, PartialEq)]
struct MemoryRole {
    path: Option<String>,
    state: RoleState,
    policies: BTreeMap<String, String>,
}

/// An in-memory account.
///
/// Every mutation is applied to the in-memory model and appended to [MemoryState::calls] as a short line such as
/// `put_role_policy deploy syncr_policy_deploy`, so callers can check exactly what a sync run did. A failure can be
/// injected for any operation name with [MemoryState::fail_on]; it is returned the next time that operation runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    roles: BTreeMap<String, MemoryRole>,
    profiles: BTreeMap<String, Vec<String>>,
    buckets: BTreeMap<String, BucketState>,
    keys: BTreeMap<(String, String), KeyState>,
    failures: BTreeMap<String, StateError>,
    calls: Vec<String>,
    next_key: usize,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, name: &str, trust_document: Option<&str>) -> Self {
        self.roles.insert(
            name.to_string(),
            MemoryRole {
                path: None,
                state: RoleState {
                    trust_document: trust_document.map(str::to_string),
                    description: None,
                },
                policies: BTreeMap::new(),
            },
        );
        self
    }

    /// Attach an inline policy to a role added with [MemoryState::with_role].
    pub fn with_role_policy(mut self, name: &str, policy: &str, document: &str) -> Self {
        if let Some(role) = self.roles.get_mut(name) {
            role.policies.insert(policy.to_string(), document.to_string());
        }
        self
    }

    pub fn with_instance_profile(mut self, profile: &str, roles: &[&str]) -> Self {
        self.profiles.insert(profile.to_string(), roles.iter().map(|role| role.to_string()).collect());
        self
    }

    pub fn with_bucket(mut self, name: &str, bucket: BucketState) -> Self {
        self.buckets.insert(name.to_string(), bucket);
        self
    }

    pub fn with_key(mut self, alias: &str, location: &str, key: KeyState) -> Self {
        self.keys.insert((alias.to_string(), location.to_string()), key);
        self
    }

    /// Make the next call to `operation` (e.g. `"put_role_policy"`) fail with `error`.
    pub fn fail_on(mut self, operation: &str, error: StateError) -> Self {
        self.failures.insert(operation.to_string(), error);
        self
    }

    /// The mutations applied so far, in order.
    #[inline]
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    pub fn role(&self, name: &str) -> Option<&RoleState> {
        self.roles.get(name).map(|role| &role.state)
    }

    pub fn role_path(&self, name: &str) -> Option<&str> {
        self.roles.get(name).and_then(|role| role.path.as_deref())
    }

    pub fn role_policy(&self, name: &str, policy: &str) -> Option<&str> {
        self.roles.get(name).and_then(|role| role.policies.get(policy)).map(String::as_str)
    }

    pub fn profile(&self, profile: &str) -> Option<&[String]> {
        self.profiles.get(profile).map(Vec::as_slice)
    }

    pub fn bucket(&self, name: &str) -> Option<&BucketState> {
        self.buckets.get(name)
    }

    pub fn key(&self, alias: &str, location: &str) -> Option<&KeyState> {
        self.keys.get(&(alias.to_string(), location.to_string()))
    }

    fn call(&mut self, operation: &str, args: &[&str]) -> Result<(), StateError> {
        let line = if args.is_empty() {
            operation.to_string()
        } else {
            format!("{} {}", operation, args.join(" "))
        };
        trace!("MemoryState: {}", line);

        if let Some(error) = self.failures.remove(operation) {
            return Err(error);
        }
        self.calls.push(line);
        Ok(())
    }

    fn role_mut(&mut self, name: &str) -> Result<&mut MemoryRole, StateError> {
        self.roles.get_mut(name).ok_or_else(|| StateError::NotFound(format!("role/{}", name)))
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut BucketState, StateError> {
        self.buckets.get_mut(name).ok_or_else(|| StateError::NotFound(format!("bucket/{}", name)))
    }

    fn key_mut(&mut self, key_id: &str) -> Result<&mut KeyState, StateError> {
        self.keys
            .values_mut()
            .find(|key| key.key_id == key_id)
            .ok_or_else(|| StateError::NotFound(format!("key/{}", key_id)))
    }
}

impl RoleStore for MemoryState {
    fn describe_role(&self, name: &str) -> Result<Option<RoleState>, StateError> {
        Ok(self.roles.get(name).map(|role| role.state.clone()))
    }

    fn create_role(
        &mut self,
        name: &str,
        path: Option<&str>,
        trust_document: Option<&str>,
        description: &str,
    ) -> Result<(), StateError> {
        self.call("create_role", &[name])?;
        if self.roles.contains_key(name) {
            return Err(StateError::Conflict(format!("role/{}", name)));
        }

        self.roles.insert(
            name.to_string(),
            MemoryRole {
                path: path.map(str::to_string),
                state: RoleState {
                    trust_document: trust_document.map(str::to_string),
                    description: Some(description.to_string()),
                },
                policies: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn update_trust_document(&mut self, name: &str, document: &str) -> Result<(), StateError> {
        self.call("update_trust_document", &[name])?;
        self.role_mut(name)?.state.trust_document = Some(document.to_string());
        Ok(())
    }

    fn delete_role(&mut self, name: &str) -> Result<(), StateError> {
        self.call("delete_role", &[name])?;
        match self.roles.remove(name) {
            Some(_) => Ok(()),
            None => Err(StateError::NotFound(format!("role/{}", name))),
        }
    }

    fn list_role_policies(&self, name: &str) -> Result<Vec<String>, StateError> {
        match self.roles.get(name) {
            Some(role) => Ok(role.policies.keys().cloned().collect()),
            None => Err(StateError::NotFound(format!("role/{}", name))),
        }
    }

    fn get_role_policy(&self, name: &str, policy: &str) -> Result<Option<String>, StateError> {
        Ok(self.roles.get(name).and_then(|role| role.policies.get(policy)).cloned())
    }

    fn put_role_policy(&mut self, name: &str, policy: &str, document: &str) -> Result<(), StateError> {
        self.call("put_role_policy", &[name, policy])?;
        self.role_mut(name)?.policies.insert(policy.to_string(), document.to_string());
        Ok(())
    }

    fn delete_role_policy(&mut self, name: &str, policy: &str) -> Result<(), StateError> {
        self.call("delete_role_policy", &[name, policy])?;
        match self.role_mut(name)?.policies.remove(policy) {
            Some(_) => Ok(()),
            None => Err(StateError::NotFound(format!("role/{}/policy/{}", name, policy))),
        }
    }

    fn instance_profile_roles(&self, profile: &str) -> Result<Option<Vec<String>>, StateError> {
        Ok(self.profiles.get(profile).cloned())
    }

    fn create_instance_profile(&mut self, profile: &str) -> Result<(), StateError> {
        self.call("create_instance_profile", &[profile])?;
        if self.profiles.contains_key(profile) {
            return Err(StateError::Conflict(format!("instance-profile/{}", profile)));
        }
        self.profiles.insert(profile.to_string(), Vec::new());
        Ok(())
    }

    fn add_role_to_instance_profile(&mut self, profile: &str, role: &str) -> Result<(), StateError> {
        self.call("add_role_to_instance_profile", &[profile, role])?;
        match self.profiles.get_mut(profile) {
            Some(roles) => {
                roles.push(role.to_string());
                Ok(())
            }
            None => Err(StateError::NotFound(format!("instance-profile/{}", profile))),
        }
    }

    fn remove_role_from_instance_profile(&mut self, profile: &str, role: &str) -> Result<(), StateError> {
        self.call("remove_role_from_instance_profile", &[profile, role])?;
        match self.profiles.get_mut(profile) {
            Some(roles) => {
                roles.retain(|existing| existing != role);
                Ok(())
            }
            None => Err(StateError::NotFound(format!("instance-profile/{}", profile))),
        }
    }
}

impl BucketStore for MemoryState {
    fn describe_bucket(&self, name: &str) -> Result<Option<BucketState>, StateError> {
        Ok(self.buckets.get(name).cloned())
    }

    fn create_bucket(&mut self, name: &str, location: &str) -> Result<(), StateError> {
        self.call("create_bucket", &[name, location])?;
        self.buckets.insert(
            name.to_string(),
            BucketState {
                location: location.to_string(),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn put_bucket_policy(&mut self, name: &str, document: &str) -> Result<(), StateError> {
        self.call("put_bucket_policy", &[name])?;
        self.bucket_mut(name)?.policy = Some(document.to_string());
        Ok(())
    }

    fn delete_bucket_policy(&mut self, name: &str) -> Result<(), StateError> {
        self.call("delete_bucket_policy", &[name])?;
        self.bucket_mut(name)?.policy = None;
        Ok(())
    }

    fn put_bucket_tags(&mut self, name: &str, tags: &BTreeMap<String, String>) -> Result<(), StateError> {
        self.call("put_bucket_tags", &[name])?;
        self.bucket_mut(name)?.tags = tags.clone();
        Ok(())
    }

    fn delete_bucket_tags(&mut self, name: &str) -> Result<(), StateError> {
        self.call("delete_bucket_tags", &[name])?;
        self.bucket_mut(name)?.tags.clear();
        Ok(())
    }
}

impl KeyStore for MemoryState {
    fn describe_key(&self, alias: &str, location: &str) -> Result<Option<KeyState>, StateError> {
        Ok(self.key(alias, location).cloned())
    }

    fn create_key(
        &mut self,
        alias: &str,
        location: &str,
        description: &str,
        policy: Option<&str>,
    ) -> Result<String, StateError> {
        self.call("create_key", &[alias, location])?;
        self.next_key += 1;
        let key_id = format!("key-{:04}", self.next_key);
        self.keys.insert(
            (alias.to_string(), location.to_string()),
            KeyState {
                key_id: key_id.clone(),
                description: description.to_string(),
                policy: policy.map(str::to_string),
                grants: Vec::new(),
            },
        );
        Ok(key_id)
    }

    fn update_key_description(&mut self, key_id: &str, description: &str) -> Result<(), StateError> {
        self.call("update_key_description", &[key_id])?;
        self.key_mut(key_id)?.description = description.to_string();
        Ok(())
    }

    fn put_key_policy(&mut self, key_id: &str, document: &str) -> Result<(), StateError> {
        self.call("put_key_policy", &[key_id])?;
        self.key_mut(key_id)?.policy = Some(document.to_string());
        Ok(())
    }

    fn create_grant(&mut self, key_id: &str, grant: &Grant) -> Result<(), StateError> {
        self.call("create_grant", &[key_id, grant.grantee()])?;
        self.key_mut(key_id)?.grants.push(grant.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::MemoryState,
        crate::{
            state::{BucketStore, RoleStore},
            StateError,
        },
        pretty_assertions::assert_eq,
    };

    #[test_log::test]
    fn test_records_calls() {
        let mut state = MemoryState::new().with_role("deploy", None);
        state.put_role_policy("deploy", "p", "{}").unwrap();
        state.create_bucket("b", "us-east-1").unwrap();
        assert_eq!(state.calls(), ["put_role_policy deploy p".to_string(), "create_bucket b us-east-1".to_string()]);
        assert_eq!(state.role_policy("deploy", "p"), Some("{}"));
        assert_eq!(state.list_role_policies("deploy").unwrap(), vec!["p"]);
        assert_eq!(state.bucket("b").unwrap().location, "us-east-1");
    }

    #[test_log::test]
    fn test_injected_failure() {
        let mut state = MemoryState::new().fail_on("create_role", StateError::AccessDenied("role/x".to_string()));
        assert_eq!(
            state.create_role("x", None, None, "d").unwrap_err(),
            StateError::AccessDenied("role/x".to_string())
        );
        assert!(state.calls().is_empty());
        state.create_role("x", Some("/a/"), None, "d").unwrap();
        assert_eq!(state.role_path("x"), Some("/a/"));
        assert_eq!(state.create_role("x", None, None, "d").unwrap_err(), StateError::Conflict("role/x".to_string()));
    }
}
