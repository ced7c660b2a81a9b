use {
    crate::{display_json, serutil::to_pretty_json, Statement, SyncrError},
    serde::{ser::Serializer, Serialize},
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        str::FromStr,
    },
};

/// Policy versions.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PolicyVersion {
    V2008_10_17,
    V2012_10_17,
}

impl Default for PolicyVersion {
    fn default() -> Self {
        Self::V2012_10_17
    }
}

impl Display for PolicyVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::V2008_10_17 => f.write_str("2008-10-17"),
            Self::V2012_10_17 => f.write_str("2012-10-17"),
        }
    }
}

impl FromStr for PolicyVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2008-10-17" => Ok(Self::V2008_10_17),
            "2012-10-17" => Ok(Self::V2012_10_17),
            _ => Err(format!("Invalid policy version: {}", s)),
        }
    }
}

impl Serialize for PolicyVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// A permission or trust document: `{"Version": "2012-10-17", "Statement": [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Document {
    version: PolicyVersion,
    statement: Vec<Statement>,
}

impl Document {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: PolicyVersion::default(),
            statement,
        }
    }

    #[inline]
    pub fn version(&self) -> PolicyVersion {
        self.version
    }

    #[inline]
    pub fn statement(&self) -> &[Statement] {
        &self.statement
    }

    /// Render the document as indented JSON text. `entity` identifies the owner in the error.
    pub fn to_json(&self, entity: &str) -> Result<String, SyncrError> {
        to_pretty_json(self).map_err(|e| SyncrError::InvalidDocument {
            entity: entity.to_string(),
            message: format!("Document wasn't valid json: {}", e),
        })
    }
}

display_json!(Document);
