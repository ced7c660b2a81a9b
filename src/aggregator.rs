use {
    crate::{
        entity::{Bucket, Entity, Key, Role, RoleRemoval, Template},
        serutil::value_kind,
        ConfigurationProblem, SyncrError,
    },
    log::debug,
    serde_json::Value,
    std::{
        collections::{BTreeMap, BTreeSet},
        fmt::{Debug, Formatter, Result as FmtResult},
    },
};

/// Builds the entity for one declared name. List-shaped kinds receive [Value::Null] as the definition.
pub type EntityFactory = fn(&str, &Value) -> Box<dyn Entity>;

/// The container a kind expects in a configuration source.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Shape {
    List,
    Map,
}

impl Shape {
    fn label(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Map => "mapping",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
        }
    }
}

/// A kind of entity the aggregator knows how to collect.
#[derive(Clone)]
pub struct KindSpec {
    name: String,
    shape: Shape,
    conflicts_with: Vec<String>,
    priority: i32,
    factory: EntityFactory,
}

impl KindSpec {
    pub fn new<S: Into<String>>(name: S, shape: Shape, priority: i32, factory: EntityFactory) -> Self {
        Self {
            name: name.into(),
            shape,
            conflicts_with: Vec::new(),
            priority,
            factory,
        }
    }

    /// Names of kinds that may not declare the same name as this one.
    pub fn conflicts_with<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflicts_with = kinds.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[inline]
    pub fn conflicting_kinds(&self) -> &[String] {
        &self.conflicts_with
    }

    pub fn build(&self, name: &str, definition: &Value) -> Box<dyn Entity> {
        (self.factory)(name, definition)
    }
}

impl Debug for KindSpec {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("KindSpec")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("conflicts_with", &self.conflicts_with)
            .field("priority", &self.priority)
            .finish()
    }
}

/// The declarations of one kind after combining every source.
#[derive(Clone, Debug, PartialEq)]
pub enum KindEntries {
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

impl KindEntries {
    /// Every declared name with its definition; list entries carry [Value::Null].
    pub fn iter(&self) -> Vec<(&str, &Value)> {
        match self {
            Self::List(names) => names.iter().map(|name| (name.as_str(), &Value::Null)).collect(),
            Self::Map(entries) => entries.iter().map(|(name, value)| (name.as_str(), value)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::List(names) => names.len(),
            Self::Map(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The combined, conflict-free declarations of every kind, in processing order.
#[derive(Clone, Debug, Default)]
pub struct DesiredState {
    kinds: Vec<(KindSpec, KindEntries)>,
    known: Vec<String>,
}

impl DesiredState {
    /// Kinds in priority order, each with its entries.
    pub fn kinds(&self) -> impl Iterator<Item = (&KindSpec, &KindEntries)> {
        self.kinds.iter().map(|(spec, entries)| (spec, entries))
    }

    pub fn get(&self, kind: &str) -> Option<&KindEntries> {
        self.kinds.iter().find(|(spec, _)| spec.name == kind).map(|(_, entries)| entries)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Every kind registered with the aggregator that produced this state, including kinds with no entries.
    #[inline]
    pub fn known_kinds(&self) -> &[String] {
        &self.known
    }
}

/// Where one declaration came from. `value` is `None` for list-shaped kinds.
#[derive(Clone, Debug)]
struct Contribution {
    location: String,
    value: Option<Value>,
}

type Combined = BTreeMap<String, BTreeMap<String, Vec<Contribution>>>;

/// Collects configuration sources and combines them into a [DesiredState].
#[derive(Debug, Default)]
pub struct Aggregator {
    kinds: BTreeMap<String, KindSpec>,
    sources: BTreeMap<String, Vec<(String, Value)>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind, replacing any kind of the same name.
    pub fn register_kind(&mut self, spec: KindSpec) {
        debug!("Registering kind {} with priority {}", spec.name, spec.priority);
        self.kinds.insert(spec.name.clone(), spec);
    }

    pub fn register_default_kinds(&mut self) {
        self.register_kind(KindSpec::new("templates", Shape::Map, 0, |name, definition| {
            Box::new(Template::new(name, definition.clone()))
        }));
        self.register_kind(
            KindSpec::new("remove_roles", Shape::List, 10, |name, _| Box::new(RoleRemoval::new(name)))
                .conflicts_with(["roles"]),
        );
        self.register_kind(
            KindSpec::new("roles", Shape::Map, 20, |name, definition| Box::new(Role::new(name, definition.clone())))
                .conflicts_with(["remove_roles"]),
        );
        self.register_kind(KindSpec::new("keys", Shape::Map, 30, |name, definition| {
            Box::new(Key::new(name, definition.clone()))
        }));
        self.register_kind(KindSpec::new("buckets", Shape::Map, 40, |name, definition| {
            Box::new(Bucket::new(name, definition.clone()))
        }));
    }

    /// Registered kinds ordered by priority, then name.
    pub fn kinds_by_priority(&self) -> Vec<&KindSpec> {
        let mut kinds: Vec<&KindSpec> = self.kinds.values().collect();
        kinds.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        kinds
    }

    /// Add one parsed configuration source.
    ///
    /// Only the registered kinds named in `only_consider` are taken from it; an empty `only_consider` takes every
    /// registered kind. Keys that are not registered kinds are ignored.
    pub fn add<S: AsRef<str>>(
        &mut self,
        configuration: &Value,
        location: &str,
        only_consider: &[S],
    ) -> Result<(), SyncrError> {
        if self.kinds.is_empty() {
            return Err(SyncrError::NoKindsRegistered);
        }

        let unknown: Vec<String> = only_consider
            .iter()
            .map(|kind| kind.as_ref().to_string())
            .filter(|kind| !self.kinds.contains_key(kind))
            .collect();
        if !unknown.is_empty() {
            return Err(SyncrError::UnknownKinds {
                unknown,
                known: self.kinds.keys().cloned().collect(),
            });
        }

        let map = match configuration {
            Value::Object(map) => map,
            other => {
                return Err(SyncrError::InvalidConfiguration {
                    location: location.to_string(),
                    problem: ConfigurationProblem::NotAMapping {
                        found: value_kind(other),
                    },
                })
            }
        };

        for kind in self.kinds.keys() {
            if !only_consider.is_empty() && !only_consider.iter().any(|considered| considered.as_ref() == kind) {
                continue;
            }

            if let Some(value) = map.get(kind) {
                debug!("Found {} in {}", kind, location);
                self.sources.entry(kind.clone()).or_default().push((location.to_string(), value.clone()));
            }
        }

        Ok(())
    }

    /// Combine every source added so far.
    ///
    /// All problems are reported together as [SyncrError::BadConfiguration]. When a name is declared more than once
    /// the first declaration, in the order sources were added, is kept.
    pub fn combine(&self) -> Result<DesiredState, SyncrError> {
        let mut errors = Vec::new();
        let mut combined = Combined::new();

        for (kind, sources) in &self.sources {
            let spec = match self.kinds.get(kind) {
                Some(spec) => spec,
                None => continue,
            };

            for (location, configuration) in sources {
                if let Err(e) = add_to_combined(&mut combined, spec, configuration, location) {
                    errors.push(e);
                }
            }
        }

        errors.extend(self.duplicates(&combined));
        errors.extend(self.conflicts(&combined));

        if !errors.is_empty() {
            return Err(SyncrError::BadConfiguration(errors));
        }

        let mut kinds = Vec::new();
        for spec in self.kinds_by_priority() {
            let things = match combined.remove(&spec.name) {
                Some(things) if !things.is_empty() => things,
                _ => continue,
            };

            let entries = match spec.shape {
                Shape::List => KindEntries::List(things.into_keys().collect()),
                Shape::Map => KindEntries::Map(
                    things
                        .into_iter()
                        .filter_map(|(name, found)| {
                            found.into_iter().next().and_then(|first| first.value).map(|value| (name, value))
                        })
                        .collect(),
                ),
            };
            kinds.push((spec.clone(), entries));
        }

        Ok(DesiredState {
            kinds,
            known: self.kinds.keys().cloned().collect(),
        })
    }

    fn duplicates(&self, combined: &Combined) -> Vec<SyncrError> {
        let mut errors = Vec::new();
        for (kind, things) in combined {
            for (name, found) in things {
                if found.len() > 1 && found.iter().any(|contribution| contribution.value.is_some()) {
                    errors.push(SyncrError::DuplicateItem {
                        kind: kind.clone(),
                        name: name.clone(),
                        locations: found.iter().map(|contribution| contribution.location.clone()).collect(),
                    });
                }
            }
        }
        errors
    }

    fn conflicts(&self, combined: &Combined) -> Vec<SyncrError> {
        let mut errors = Vec::new();
        let mut complained_about: BTreeSet<(String, String)> = BTreeSet::new();

        for (kind, spec) in &self.kinds {
            let things = match combined.get(kind) {
                Some(things) if !spec.conflicts_with.is_empty() => things,
                _ => continue,
            };

            for name in things.keys() {
                let conflicting: Vec<&String> = spec
                    .conflicts_with
                    .iter()
                    .filter(|other| combined.get(*other).map(|found| found.contains_key(name)).unwrap_or(false))
                    .collect();
                if conflicting.is_empty() {
                    continue;
                }

                let identities: Vec<(String, String)> = std::iter::once(kind)
                    .chain(conflicting.iter().copied())
                    .map(|k| (k.clone(), name.clone()))
                    .collect();
                if identities.iter().any(|identity| complained_about.contains(identity)) {
                    continue;
                }

                let mut location_to_kinds: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
                for k in std::iter::once(kind).chain(conflicting.iter().copied()) {
                    for contribution in combined.get(k).and_then(|found| found.get(name)).into_iter().flatten() {
                        location_to_kinds.entry(contribution.location.as_str()).or_default().insert(k.as_str());
                    }
                }

                let found_in: Vec<String> = location_to_kinds
                    .into_iter()
                    .map(|(location, kinds)| {
                        let kinds: Vec<&str> = kinds.into_iter().collect();
                        format!("{}({})", location, kinds.join(", "))
                    })
                    .collect();
                errors.push(SyncrError::ConflictingConfiguration {
                    name: name.clone(),
                    found_in: found_in.join("; "),
                });
                complained_about.extend(identities);
            }
        }

        errors
    }
}

fn add_to_combined(
    combined: &mut Combined,
    spec: &KindSpec,
    configuration: &Value,
    location: &str,
) -> Result<(), SyncrError> {
    let invalid = |problem| SyncrError::InvalidConfiguration {
        location: location.to_string(),
        problem,
    };

    if !spec.shape.matches(configuration) {
        return Err(invalid(ConfigurationProblem::UnexpectedType {
            kind: spec.name.clone(),
            expected: spec.shape.label(),
            found: value_kind(configuration),
        }));
    }

    let things = combined.entry(spec.name.clone()).or_default();
    match configuration {
        Value::Array(items) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(name) => names.push(name.clone()),
                    other => {
                        return Err(invalid(ConfigurationProblem::NonStringName {
                            kind: spec.name.clone(),
                            found: value_kind(other),
                        }))
                    }
                }
            }

            let mut seen = BTreeSet::new();
            let duplicates: BTreeSet<&String> = names.iter().filter(|name| !seen.insert(*name)).collect();
            if !duplicates.is_empty() {
                return Err(invalid(ConfigurationProblem::DuplicatesInList {
                    kind: spec.name.clone(),
                    duplicates: duplicates.into_iter().cloned().collect(),
                }));
            }

            for name in names {
                things.entry(name).or_default().push(Contribution {
                    location: location.to_string(),
                    value: None,
                });
            }
        }
        Value::Object(map) => {
            for (name, value) in map {
                things.entry(name.clone()).or_default().push(Contribution {
                    location: location.to_string(),
                    value: Some(value.clone()),
                });
            }
        }
        _ => (),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::{Aggregator, KindEntries, KindSpec, Shape},
        crate::{ConfigurationProblem, SyncrError},
        pretty_assertions::assert_eq,
        serde_json::json,
    };

    const ALL: &[&str] = &[];

    fn aggregator() -> Aggregator {
        let mut aggregator = Aggregator::new();
        aggregator.register_default_kinds();
        aggregator
    }

    fn errors(result: Result<super::DesiredState, SyncrError>) -> Vec<SyncrError> {
        match result.unwrap_err() {
            SyncrError::BadConfiguration(errors) => errors,
            other => panic!("Expected BadConfiguration, got {:?}", other),
        }
    }

    #[test_log::test]
    fn test_priorities() {
        let aggregator = aggregator();
        let names: Vec<&str> = aggregator.kinds_by_priority().iter().map(|spec| spec.name()).collect();
        assert_eq!(names, ["templates", "remove_roles", "roles", "keys", "buckets"]);
        assert_eq!(aggregator.kinds_by_priority()[1].conflicting_kinds(), ["roles".to_string()]);
    }

    #[test_log::test]
    fn test_add_errors() {
        let mut empty = Aggregator::new();
        assert_eq!(empty.add(&json!({}), "a.yaml", ALL).unwrap_err(), SyncrError::NoKindsRegistered);

        let mut aggregator = aggregator();
        assert_eq!(
            aggregator.add(&json!([]), "a.yaml", ALL).unwrap_err(),
            SyncrError::InvalidConfiguration {
                location: "a.yaml".to_string(),
                problem: ConfigurationProblem::NotAMapping {
                    found: "list",
                },
            }
        );

        match aggregator.add(&json!({}), "a.yaml", &["roles", "widgets"]).unwrap_err() {
            SyncrError::UnknownKinds {
                unknown,
                known,
            } => {
                assert_eq!(unknown, ["widgets"]);
                assert_eq!(known.len(), 5);
            }
            other => panic!("Expected UnknownKinds, got {:?}", other),
        }
    }

    #[test_log::test]
    fn test_combine() {
        let mut aggregator = aggregator();
        aggregator
            .add(
                &json!({"roles": {"deploy": {"description": "first"}}, "remove_roles": ["old"], "other": 1}),
                "a.yaml",
                ALL,
            )
            .unwrap();
        aggregator
            .add(&json!({"remove_roles": ["older", "old"], "buckets": {"logs": {}}}), "b.yaml", ALL)
            .unwrap();

        let desired = aggregator.combine().unwrap();
        let kinds: Vec<&str> = desired.kinds().map(|(spec, _)| spec.name()).collect();
        assert_eq!(kinds, ["remove_roles", "roles", "buckets"]);
        assert_eq!(desired.get("remove_roles"), Some(&KindEntries::List(vec!["old".to_string(), "older".to_string()])));
        match desired.get("roles").unwrap() {
            KindEntries::Map(roles) => assert_eq!(roles["deploy"], json!({"description": "first"})),
            other => panic!("Expected a map, got {:?}", other),
        }
        assert!(desired.get("templates").is_none());
    }

    #[test_log::test]
    fn test_only_consider() {
        let mut aggregator = aggregator();
        aggregator.add(&json!({"roles": {"deploy": {}}, "buckets": {"logs": {}}}), "a.yaml", &["buckets"]).unwrap();
        let desired = aggregator.combine().unwrap();
        assert!(desired.get("roles").is_none());
        assert_eq!(desired.get("buckets").map(KindEntries::len), Some(1));
    }

    #[test_log::test]
    fn test_errors_are_batched() {
        let mut aggregator = aggregator();
        aggregator
            .add(&json!({"roles": ["deploy"], "remove_roles": ["a", "a", "b"], "buckets": {"logs": {}}}), "a.yaml", ALL)
            .unwrap();
        aggregator.add(&json!({"buckets": {"logs": {}}, "remove_roles": [1]}), "b.yaml", ALL).unwrap();

        assert_eq!(
            errors(aggregator.combine()),
            vec![
                SyncrError::InvalidConfiguration {
                    location: "a.yaml".to_string(),
                    problem: ConfigurationProblem::DuplicatesInList {
                        kind: "remove_roles".to_string(),
                        duplicates: vec!["a".to_string()],
                    },
                },
                SyncrError::InvalidConfiguration {
                    location: "b.yaml".to_string(),
                    problem: ConfigurationProblem::NonStringName {
                        kind: "remove_roles".to_string(),
                        found: "number",
                    },
                },
                SyncrError::InvalidConfiguration {
                    location: "a.yaml".to_string(),
                    problem: ConfigurationProblem::UnexpectedType {
                        kind: "roles".to_string(),
                        expected: "mapping",
                        found: "list",
                    },
                },
                SyncrError::DuplicateItem {
                    kind: "buckets".to_string(),
                    name: "logs".to_string(),
                    locations: vec!["a.yaml".to_string(), "b.yaml".to_string()],
                },
            ]
        );
    }

    #[test_log::test]
    fn test_conflicts() {
        let mut aggregator = aggregator();
        aggregator
            .add(&json!({"roles": {"deploy": {}, "app": {}}, "remove_roles": ["deploy"]}), "a.yaml", ALL)
            .unwrap();
        aggregator.add(&json!({"remove_roles": ["app"]}), "b.yaml", ALL).unwrap();
        aggregator.add(&json!({"roles": {"other": {}}}), "c.yaml", ALL).unwrap();

        assert_eq!(
            errors(aggregator.combine()),
            vec![
                SyncrError::ConflictingConfiguration {
                    name: "app".to_string(),
                    found_in: "a.yaml(roles); b.yaml(remove_roles)".to_string(),
                },
                SyncrError::ConflictingConfiguration {
                    name: "deploy".to_string(),
                    found_in: "a.yaml(remove_roles, roles)".to_string(),
                },
            ]
        );
    }

    #[test_log::test]
    fn test_custom_kind() {
        let mut aggregator = Aggregator::new();
        aggregator.register_kind(KindSpec::new("things", Shape::List, 5, |name, _| {
            Box::new(crate::entity::RoleRemoval::new(name))
        }));
        aggregator.add(&json!({"things": ["x"]}), "a.yaml", ALL).unwrap();
        let desired = aggregator.combine().unwrap();
        let (spec, entries) = desired.kinds().next().unwrap();
        assert_eq!(spec.shape(), Shape::List);
        let entity = spec.build("x", &serde_json::Value::Null);
        assert_eq!(entity.kind(), "remove_roles");
        assert_eq!(entries.iter(), vec![("x", &serde_json::Value::Null)]);
    }
}
