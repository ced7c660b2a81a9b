mod specified;

pub use specified::{SpecifiedPrincipal, SpecifiedPrincipalBuilder, SpecifiedPrincipalBuilderError};

use {
    crate::display_json,
    serde::{ser::Serializer, Serialize},
    serde_json::Value,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Principal {
    Any,
    Specified(SpecifiedPrincipal),
}

impl Principal {
    /// Read a raw principal: `"*"` or a mapping of principal types to values.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) if s == "*" => Ok(Self::Any),
            _ => Ok(Self::Specified(SpecifiedPrincipal::from_value(value)?)),
        }
    }

    pub fn specified(&self) -> Option<&SpecifiedPrincipal> {
        match self {
            Self::Any => None,
            Self::Specified(sp) => Some(sp),
        }
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::Specified(SpecifiedPrincipal::default())
    }
}

impl From<SpecifiedPrincipal> for Principal {
    fn from(sp: SpecifiedPrincipal) -> Self {
        Self::Specified(sp)
    }
}

impl Serialize for Principal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Any => serializer.serialize_str("*"),
            Self::Specified(specified) => specified.serialize(serializer),
        }
    }
}

display_json!(Principal);

#[cfg(test)]
mod tests {
    use {
        crate::{Principal, SpecifiedPrincipal},
        indoc::indoc,
        pretty_assertions::assert_eq,
        serde_json::json,
    };

    #[test_log::test]
    fn test_formatting() {
        let p1 = Principal::Any;
        let p2 = Principal::Specified(
            SpecifiedPrincipal::builder()
                .aws(vec!["arn:aws:iam::123456789012:role/test".to_string(), "123456789012".to_string()])
                .build()
                .unwrap(),
        );

        assert_eq!(format!("{}", p1), r#""*""#);
        assert_eq!(
            format!("{}", p2),
            indoc! { r#"
            {
              "AWS": [
                "123456789012",
                "arn:aws:iam::123456789012:role/test"
              ]
            }"#}
        )
    }

    #[test_log::test]
    fn test_from_value() {
        assert_eq!(Principal::from_value(&json!("*")).unwrap(), Principal::Any);
        assert_eq!(
            Principal::from_value(&json!({"Federated": "arn:aws:iam::1:saml-provider/idp"})).unwrap(),
            Principal::Specified(
                SpecifiedPrincipal::builder()
                    .federated(vec!["arn:aws:iam::1:saml-provider/idp".to_string()])
                    .build()
                    .unwrap()
            )
        );
        assert!(Principal::from_value(&json!("someone")).is_err());
        assert!(Principal::default().specified().unwrap().is_empty());
        assert!(Principal::Any.specified().is_none());
    }
}
