//! The live-state collaborator: what the resolvers need to read from and do to a cloud account.
//!
//! Implementations own transport, credentials and retries. Every failure is classified into a [StateError];
//! documents are exchanged as JSON text that has already been URL-decoded.

pub mod memory;

use {
    crate::{Grant, StateError},
    std::collections::BTreeMap,
};

/// What the account knows about a role.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RoleState {
    pub trust_document: Option<String>,
    pub description: Option<String>,
}

/// What the account knows about a bucket.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BucketState {
    pub location: String,
    pub policy: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// What the account knows about a key, looked up by alias.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyState {
    pub key_id: String,
    pub description: String,
    pub policy: Option<String>,
    pub grants: Vec<Grant>,
}

/// Roles, their inline policies, and the instance profiles named after them.
///
/// Roles are addressed by their bare name (without path).
pub trait RoleStore {
    fn describe_role(&self, name: &str) -> Result<Option<RoleState>, StateError>;

    fn create_role(
        &mut self,
        name: &str,
        path: Option<&str>,
        trust_document: Option<&str>,
        description: &str,
    ) -> Result<(), StateError>;

    fn update_trust_document(&mut self, name: &str, document: &str) -> Result<(), StateError>;

    fn delete_role(&mut self, name: &str) -> Result<(), StateError>;

    fn list_role_policies(&self, name: &str) -> Result<Vec<String>, StateError>;

    /// The document of an inline policy, if the role has one by that name.
    fn get_role_policy(&self, name: &str, policy: &str) -> Result<Option<String>, StateError>;

    fn put_role_policy(&mut self, name: &str, policy: &str, document: &str) -> Result<(), StateError>;

    fn delete_role_policy(&mut self, name: &str, policy: &str) -> Result<(), StateError>;

    /// The roles in an instance profile, or `None` if there is no such profile.
    fn instance_profile_roles(&self, profile: &str) -> Result<Option<Vec<String>>, StateError>;

    fn create_instance_profile(&mut self, profile: &str) -> Result<(), StateError>;

    fn add_role_to_instance_profile(&mut self, profile: &str, role: &str) -> Result<(), StateError>;

    fn remove_role_from_instance_profile(&mut self, profile: &str, role: &str) -> Result<(), StateError>;
}

/// Buckets, their policies, and their tags.
pub trait BucketStore {
    fn describe_bucket(&self, name: &str) -> Result<Option<BucketState>, StateError>;

    fn create_bucket(&mut self, name: &str, location: &str) -> Result<(), StateError>;

    fn put_bucket_policy(&mut self, name: &str, document: &str) -> Result<(), StateError>;

    fn delete_bucket_policy(&mut self, name: &str) -> Result<(), StateError>;

    /// Replace the full tag set.
    fn put_bucket_tags(&mut self, name: &str, tags: &BTreeMap<String, String>) -> Result<(), StateError>;

    fn delete_bucket_tags(&mut self, name: &str) -> Result<(), StateError>;
}

/// Encryption keys, addressed by alias and region for lookup and by key id for mutation.
pub trait KeyStore {
    fn describe_key(&self, alias: &str, location: &str) -> Result<Option<KeyState>, StateError>;

    /// Create a key with the given alias in `location` and return its key id.
    fn create_key(
        &mut self,
        alias: &str,
        location: &str,
        description: &str,
        policy: Option<&str>,
    ) -> Result<String, StateError>;

    fn update_key_description(&mut self, key_id: &str, description: &str) -> Result<(), StateError>;

    fn put_key_policy(&mut self, key_id: &str, document: &str) -> Result<(), StateError>;

    fn create_grant(&mut self, key_id: &str, grant: &Grant) -> Result<(), StateError>;
}

/// Everything a sync run talks to.
pub trait LiveState: RoleStore + BucketStore + KeyStore {}

impl<T: RoleStore + BucketStore + KeyStore> LiveState for T {}
