use {
    crate::{display_json, serutil::string_list},
    derive_builder::Builder,
    serde::Serialize,
    serde_json::Value,
};

/// The principal types a statement can name. Each list is kept in declaration order and only collapsed/sorted
/// when serialized.
#[derive(Builder, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SpecifiedPrincipal {
    #[builder(setter(into), default)]
    #[serde(rename = "AWS", skip_serializing_if = "Vec::is_empty", serialize_with = "crate::serutil::collapse_list")]
    aws: Vec<String>,

    #[builder(setter(into), default)]
    #[serde(
        rename = "CanonicalUser",
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "crate::serutil::collapse_list"
    )]
    canonical_user: Vec<String>,

    #[builder(setter(into), default)]
    #[serde(
        rename = "Federated",
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "crate::serutil::collapse_list"
    )]
    federated: Vec<String>,

    #[builder(setter(into), default)]
    #[serde(
        rename = "Service",
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "crate::serutil::collapse_list"
    )]
    service: Vec<String>,
}

display_json!(SpecifiedPrincipal);

impl SpecifiedPrincipal {
    #[inline]
    pub fn builder() -> SpecifiedPrincipalBuilder {
        SpecifiedPrincipalBuilder::default()
    }

    /// Read a raw `{"AWS": ..., "Service": ...}` mapping.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let map = match value {
            Value::Object(map) => map,
            _ => return Err(format!("Principal should be a mapping of principal types to values: {}", value)),
        };

        let mut result = Self::default();
        for (key, entries) in map {
            let entries = string_list(entries)
                .ok_or_else(|| format!("Principal {} should be a string or a list of strings", key))?;
            match key.as_str() {
                "AWS" => result.aws.extend(entries),
                "CanonicalUser" => result.canonical_user.extend(entries),
                "Federated" => result.federated.extend(entries),
                "Service" => result.service.extend(entries),
                _ => return Err(format!("Unknown principal type {}", key)),
            }
        }

        Ok(result)
    }

    #[inline]
    pub fn aws(&self) -> &[String] {
        &self.aws
    }

    #[inline]
    pub fn canonical_user(&self) -> &[String] {
        &self.canonical_user
    }

    #[inline]
    pub fn federated(&self) -> &[String] {
        &self.federated
    }

    #[inline]
    pub fn service(&self) -> &[String] {
        &self.service
    }

    pub fn is_empty(&self) -> bool {
        self.aws.is_empty() && self.canonical_user.is_empty() && self.federated.is_empty() && self.service.is_empty()
    }

    pub(crate) fn add_aws<I: IntoIterator<Item = String>>(&mut self, arns: I) {
        self.aws.extend(arns);
    }

    pub(crate) fn add_federated<I: IntoIterator<Item = String>>(&mut self, arns: I) {
        self.federated.extend(arns);
    }

    pub(crate) fn add_service<S: Into<String>>(&mut self, service: S) {
        self.service.push(service.into());
    }
}

#[cfg(test)]
mod tests {
    use {super::SpecifiedPrincipal, pretty_assertions::assert_eq, serde_json::json};

    #[test_log::test]
    fn test_from_value() {
        let sp = SpecifiedPrincipal::from_value(&json!({
            "AWS": ["arn:aws:iam::123456789012:root"],
            "Service": "ec2.amazonaws.com",
        }))
        .unwrap();
        assert_eq!(sp.aws(), ["arn:aws:iam::123456789012:root".to_string()]);
        assert_eq!(sp.service(), ["ec2.amazonaws.com".to_string()]);
        assert!(sp.federated().is_empty());
        assert!(sp.canonical_user().is_empty());
        assert!(!sp.is_empty());

        assert_eq!(SpecifiedPrincipal::from_value(&json!({"Bogus": "x"})).unwrap_err(), "Unknown principal type Bogus");
        assert!(SpecifiedPrincipal::from_value(&json!({"AWS": 1})).is_err());
        assert!(SpecifiedPrincipal::from_value(&json!("x")).is_err());
    }

    #[test_log::test]
    fn test_builder() {
        let sp = SpecifiedPrincipal::builder().service(vec!["b".to_string(), "a".to_string()]).build().unwrap();
        assert_eq!(serde_json::to_value(&sp).unwrap(), json!({"Service": ["a", "b"]}));
        assert_eq!(serde_json::to_value(SpecifiedPrincipal::default()).unwrap(), json!({}));
    }
}
