use {
    super::{optional_document, parse_definition, permission_statements, state_failure, Entity, SetupContext},
    crate::{
        differ::{compare_documents, documents_equal},
        serutil::OneOrMany,
        state::{BucketState, BucketStore, LiveState},
        Change, Changes, SelfKind, StateError, Statement, StatementCompiler, SyncrError,
    },
    log::info,
    serde::Deserialize,
    serde_json::{json, Value},
    std::collections::BTreeMap,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BucketDefinition {
    location: Option<String>,
    tags: BTreeMap<String, String>,
    permission: OneOrMany<Value>,
    allow_permission: OneOrMany<Value>,
    deny_permission: OneOrMany<Value>,
}

/// A storage bucket, its resource policy and its tags.
#[derive(Clone, Debug)]
pub struct Bucket {
    name: String,
    definition: Value,
    location: String,
    tags: BTreeMap<String, String>,
    permission: Vec<Statement>,
    permission_document: Option<String>,
}

/// The difference between two tag sets, one line per tag: `create|modify|delete <tag> from <old> to <new>`.
fn tag_changes(current: &BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> Vec<String> {
    let mut lines = Vec::new();
    for (tag, value) in desired {
        match current.get(tag) {
            None => lines.push(format!("create {} from None to {}", tag, value)),
            Some(existing) if existing != value => lines.push(format!("modify {} from {} to {}", tag, existing, value)),
            Some(_) => (),
        }
    }

    for (tag, value) in current {
        if !desired.contains_key(tag) {
            lines.push(format!("delete {} from {} to None", tag, value));
        }
    }

    lines
}

impl Bucket {
    pub fn new<S: Into<String>>(name: S, definition: Value) -> Self {
        Self {
            name: name.into(),
            definition,
            location: String::new(),
            tags: BTreeMap::new(),
            permission: Vec::new(),
            permission_document: None,
        }
    }

    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[inline]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    #[inline]
    pub fn permission(&self) -> &[Statement] {
        &self.permission
    }

    #[inline]
    pub fn permission_document(&self) -> Option<&str> {
        self.permission_document.as_deref()
    }

    fn failure(&self, message: &str, error: StateError, document: Option<&str>) -> SyncrError {
        state_failure(SelfKind::Bucket, &self.name, message, error, document)
    }

    fn create(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        let change = Change::create("bucket").field("name", &self.name).field("location", &self.location);
        changes
            .record(change, || state.create_bucket(&self.name, &self.location))
            .map_err(|e| self.failure("Couldn't create bucket", e, None))?;

        if let Some(document) = &self.permission_document {
            let change = Change::create("bucket_policy").field("bucket", &self.name).document(document.as_str());
            changes
                .record(change, || state.put_bucket_policy(&self.name, document))
                .map_err(|e| self.failure("Couldn't add policy", e, Some(document)))?;
        }

        if !self.tags.is_empty() {
            let change = Change::create("bucket_tags")
                .field("bucket", &self.name)
                .diff(tag_changes(&BTreeMap::new(), &self.tags));
            changes
                .record(change, || state.put_bucket_tags(&self.name, &self.tags))
                .map_err(|e| self.failure("Couldn't tag bucket", e, None))?;
        }

        Ok(())
    }

    fn modify(
        &self,
        current: &BucketState,
        state: &mut dyn LiveState,
        changes: &mut Changes,
    ) -> Result<(), SyncrError> {
        if current.location != self.location {
            return Err(SyncrError::bad_policy(
                format!("bucket={}", self.name),
                "The location of the bucket is wrong. You need to delete and recreate the bucket to have it in your specified location",
            )
            .with_fragment(&json!({"current": current.location, "wanted": self.location})));
        }

        let remote_policy = current.policy.as_deref().filter(|policy| !documents_equal(Some(*policy), Some("{}")));
        match (&self.permission_document, remote_policy) {
            (Some(document), None) => {
                let change = Change::create("bucket_policy").field("bucket", &self.name).document(document.as_str());
                changes
                    .record(change, || state.put_bucket_policy(&self.name, document))
                    .map_err(|e| self.failure("Couldn't add policy", e, Some(document)))?;
            }
            (Some(document), Some(remote)) => {
                let diff = compare_documents(Some(remote), Some(document));
                if !diff.is_empty() {
                    let change = Change::modify("bucket_policy").field("bucket", &self.name).diff(diff);
                    changes
                        .record(change, || state.put_bucket_policy(&self.name, document))
                        .map_err(|e| self.failure("Couldn't modify policy", e, Some(document)))?;
                }
            }
            (None, Some(_)) => {
                let change = Change::delete("bucket_policy").field("bucket", &self.name);
                changes
                    .record(change, || state.delete_bucket_policy(&self.name))
                    .map_err(|e| self.failure("Couldn't delete policy", e, None))?;
            }
            (None, None) => (),
        }

        self.modify_tags(&current.tags, state, changes)
    }

    fn modify_tags(
        &self,
        current: &BTreeMap<String, String>,
        state: &mut dyn LiveState,
        changes: &mut Changes,
    ) -> Result<(), SyncrError> {
        let lines = tag_changes(current, &self.tags);
        if lines.is_empty() {
            return Ok(());
        }

        if self.tags.is_empty() {
            let change =
                Change::delete("bucket_tags").field("bucket", &self.name).diff(vec!["Delete all tags".to_string()]);
            return changes
                .record(change, || state.delete_bucket_tags(&self.name))
                .map_err(|e| self.failure("Couldn't delete tags", e, None));
        }

        let change = Change::modify("bucket_tags").field("bucket", &self.name).diff(lines);
        changes
            .record(change, || state.put_bucket_tags(&self.name, &self.tags))
            .map_err(|e| self.failure("Couldn't tag bucket", e, None))
    }
}

impl Entity for Bucket {
    fn kind(&self) -> &'static str {
        "buckets"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, context: &SetupContext) -> Result<(), SyncrError> {
        let parsed: BucketDefinition = parse_definition(SelfKind::Bucket, &self.name, &self.definition)?;
        let compiler = StatementCompiler::new(self.name.clone(), SelfKind::Bucket, context.accounts());

        self.location = parsed.location.unwrap_or_else(|| context.default_bucket_location().to_string());
        self.tags = parsed.tags;
        self.permission = permission_statements(
            &compiler,
            &parsed.permission,
            &parsed.allow_permission,
            &parsed.deny_permission,
        )?;
        self.permission_document = optional_document(&compiler, &self.permission)?;
        Ok(())
    }

    fn resolve(&self, state: &mut dyn LiveState, changes: &mut Changes) -> Result<(), SyncrError> {
        info!("Inspecting bucket\tname={}", self.name);
        match state.describe_bucket(&self.name).map_err(|e| self.failure("Couldn't describe bucket", e, None))? {
            None => self.create(state, changes),
            Some(current) => self.modify(&current, state, changes),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::tag_changes, pretty_assertions::assert_eq, std::collections::BTreeMap};

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test_log::test]
    fn test_tag_changes() {
        assert!(tag_changes(&tags(&[("env", "prod")]), &tags(&[("env", "prod")])).is_empty());
        assert_eq!(
            tag_changes(&tags(&[("env", "prod"), ("old", "x")]), &tags(&[("env", "dev"), ("team", "infra")])),
            vec!["modify env from prod to dev", "create team from None to infra", "delete old from x to None"]
        );
    }
}
