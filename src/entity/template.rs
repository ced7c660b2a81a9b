use {
    super::{Entity, SetupContext},
    crate::{state::LiveState, Changes, SyncrError},
    serde_json::Value,
};

/// A named partial role definition that roles can build on with `use`.
#[derive(Clone, Debug)]
pub struct Template {
    name: String,
    definition: Value,
}

impl Template {
    pub fn new<S: Into<String>>(name: S, definition: Value) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }
}

impl Entity for Template {
    fn kind(&self) -> &'static str {
        "templates"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&mut self, _context: &SetupContext) -> Result<(), SyncrError> {
        if self.definition.is_object() {
            Ok(())
        } else {
            Err(SyncrError::bad_policy(format!("template={}", self.name), "A template should be a dictionary")
                .with_fragment(&self.definition))
        }
    }

    fn resolve(&self, _state: &mut dyn LiveState, _changes: &mut Changes) -> Result<(), SyncrError> {
        Ok(())
    }

    fn as_template(&self) -> Option<&Value> {
        Some(&self.definition)
    }
}
