use {
    crate::{
        entity::{Entity, SetupContext},
        state::LiveState,
        AccountRegistry, ChangeReport, Changes, DesiredState, SyncrError,
    },
    derive_builder::Builder,
    log::{debug, info},
    serde_json::Value,
    std::collections::BTreeMap,
};

pub const DEFAULT_BUCKET_LOCATION: &str = "ap-southeast-2";

/// Run-level settings for a [Syncer].
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[builder(build_fn(validate = "Self::validate"), default)]
pub struct SyncOptions {
    /// Record changes without applying them.
    dry_run: bool,

    /// Kinds to sync. Empty means every kind.
    #[builder(setter(into))]
    only_consider: Vec<String>,

    /// Where buckets go when their definition names no location.
    #[builder(setter(into))]
    default_bucket_location: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            only_consider: Vec::new(),
            default_bucket_location: DEFAULT_BUCKET_LOCATION.to_string(),
        }
    }
}

impl SyncOptions {
    pub fn builder() -> SyncOptionsBuilder {
        SyncOptionsBuilder::default()
    }

    #[inline]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    #[inline]
    pub fn only_consider(&self) -> &[String] {
        &self.only_consider
    }

    #[inline]
    pub fn default_bucket_location(&self) -> &str {
        &self.default_bucket_location
    }

    fn considers(&self, kind: &str) -> bool {
        self.only_consider.is_empty() || self.only_consider.iter().any(|considered| considered == kind)
    }
}

impl SyncOptionsBuilder {
    fn validate(&self) -> Result<(), SyncOptionsBuilderError> {
        match &self.default_bucket_location {
            Some(location) if location.is_empty() => Err(SyncOptionsBuilderError::ValidationError(
                "Default bucket location cannot be empty.".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Brings a live account in line with a [DesiredState].
///
/// Syncing happens in two phases. Every entity is first set up, kind by kind in priority order; templates become
/// visible to later kinds once their own kind is set up. If any entity fails to set up, every such failure is
/// returned together and the live state is never touched. Otherwise every entity is resolved in the same order,
/// and the first live-state failure ends the run.
#[derive(Debug)]
pub struct Syncer<'a> {
    accounts: &'a AccountRegistry,
    options: SyncOptions,
}

impl<'a> Syncer<'a> {
    pub fn new(accounts: &'a AccountRegistry, options: SyncOptions) -> Self {
        Self {
            accounts,
            options,
        }
    }

    #[inline]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn sync(&self, desired: &DesiredState, state: &mut dyn LiveState) -> Result<ChangeReport, SyncrError> {
        info!(
            "Syncing account {} ({})\tdry_run={}",
            self.accounts.account_name(),
            self.accounts.account_id(),
            self.options.dry_run
        );

        let entities = self.setup(desired)?;
        let mut changes = Changes::new(self.options.dry_run);
        for entity in &entities {
            entity.resolve(state, &mut changes)?;
        }

        let report = changes.into_report();
        info!("Finished syncing\tchanges={}\tchanged={}", report.changes().len(), report.changed());
        Ok(report)
    }

    /// Build and set up every entity of every considered kind.
    pub fn setup(&self, desired: &DesiredState) -> Result<Vec<Box<dyn Entity>>, SyncrError> {
        let unknown: Vec<String> = self
            .options
            .only_consider
            .iter()
            .filter(|kind| !desired.known_kinds().contains(kind))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(SyncrError::UnknownKinds {
                unknown,
                known: desired.known_kinds().to_vec(),
            });
        }

        let mut templates: BTreeMap<String, Value> = BTreeMap::new();
        let mut errors = Vec::new();
        let mut entities = Vec::new();

        for (spec, entries) in desired.kinds() {
            if !self.options.considers(spec.name()) {
                debug!("Skipping kind {}", spec.name());
                continue;
            }

            debug!("Setting up {} {}", entries.len(), spec.name());
            let mut ready = Vec::with_capacity(entries.len());
            for (name, definition) in entries.iter() {
                let mut entity = spec.build(name, definition);
                let context = SetupContext::new(self.accounts, &templates, &self.options.default_bucket_location);
                match entity.setup(&context) {
                    Ok(()) => ready.push(entity),
                    Err(e) => errors.extend(e.errors().into_iter().cloned()),
                }
            }

            for entity in &ready {
                if let Some(template) = entity.as_template() {
                    templates.insert(entity.name().to_string(), template.clone());
                }
            }
            entities.extend(ready);
        }

        if errors.is_empty() {
            Ok(entities)
        } else {
            Err(SyncrError::BadConfiguration(errors))
        }
    }
}

/// Sync `desired` into `state` with default options.
pub fn compile(
    desired: &DesiredState,
    accounts: &AccountRegistry,
    state: &mut dyn LiveState,
    dry_run: bool,
) -> Result<ChangeReport, SyncrError> {
    let options = SyncOptions {
        dry_run,
        ..Default::default()
    };
    Syncer::new(accounts, options).sync(desired, state)
}
