use {
    crate::{display_json, Effect, Principal},
    derive_builder::Builder,
    serde::Serialize,
    serde_json::Value,
    std::collections::BTreeMap,
};

/// Keys with a typed field on [Statement]; the raw override map may not shadow them.
const TYPED_KEYS: &[&str] = &[
    "Sid",
    "Effect",
    "Action",
    "NotAction",
    "Resource",
    "NotResource",
    "Principal",
    "NotPrincipal",
    "Condition",
];

/// One Allow/Deny rule of a policy document.
///
/// All list-valued fields are kept as sequences in declaration order. When the statement is serialized, a single
/// element is written as a scalar and longer lists are sorted, matching the provider's own representation so
/// that documents read back from it compare equal.
///
/// `overrides` holds raw IAM keys copied verbatim from the DSL (any capitalized key the compiler does not model).
/// They are serialized after the typed fields.
#[derive(Builder, Clone, Debug, PartialEq, Serialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<String>,

    effect: Effect,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "crate::serutil::collapse_optional_list")]
    action: Option<Vec<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "crate::serutil::collapse_optional_list")]
    not_action: Option<Vec<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "crate::serutil::collapse_optional_list")]
    resource: Option<Vec<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "crate::serutil::collapse_optional_list")]
    not_resource: Option<Vec<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<Principal>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    not_principal: Option<Principal>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<Value>,

    #[builder(setter(into), default)]
    #[serde(flatten)]
    overrides: BTreeMap<String, Value>,
}

impl Statement {
    pub fn builder() -> StatementBuilder {
        StatementBuilder::default()
    }

    #[inline]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    #[inline]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    #[inline]
    pub fn action(&self) -> Option<&[String]> {
        self.action.as_deref()
    }

    #[inline]
    pub fn not_action(&self) -> Option<&[String]> {
        self.not_action.as_deref()
    }

    #[inline]
    pub fn resource(&self) -> Option<&[String]> {
        self.resource.as_deref()
    }

    #[inline]
    pub fn not_resource(&self) -> Option<&[String]> {
        self.not_resource.as_deref()
    }

    #[inline]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[inline]
    pub fn not_principal(&self) -> Option<&Principal> {
        self.not_principal.as_ref()
    }

    #[inline]
    pub fn condition(&self) -> Option<&Value> {
        self.condition.as_ref()
    }

    #[inline]
    pub fn overrides(&self) -> &BTreeMap<String, Value> {
        &self.overrides
    }
}

display_json!(Statement);

impl StatementBuilder {
    fn validate(&self) -> Result<(), StatementBuilderError> {
        let mut errors: Vec<String> = Vec::with_capacity(5);
        if self.effect.is_none() {
            errors.push("Effect must be set.".to_string());
        }

        match (&self.action, &self.not_action) {
            (Some(_), Some(_)) => errors.push("Action and NotAction cannot both be set.".to_string()),
            (None, None) => errors.push("Either Action or NotAction must be set.".to_string()),
            (Some(Some(actions)), None) | (None, Some(Some(actions))) if actions.is_empty() => {
                errors.push("Action lists cannot be empty.".to_string())
            }
            _ => (),
        }

        let has_principal = matches!(self.principal, Some(Some(_))) || matches!(self.not_principal, Some(Some(_)));
        match (&self.resource, &self.not_resource) {
            (Some(_), Some(_)) => errors.push("Resource and NotResource cannot both be set.".to_string()),
            (None, None) if !has_principal => {
                errors.push("Either Resource or NotResource must be set.".to_string())
            }
            _ => (),
        }

        if let (Some(Some(_)), Some(Some(_))) = (&self.principal, &self.not_principal) {
            errors.push("Principal and NotPrincipal cannot both be set.".to_string());
        }

        if let Some(overrides) = &self.overrides {
            for key in overrides.keys() {
                if TYPED_KEYS.contains(&key.as_str()) {
                    errors.push(format!("{} cannot be set as a raw override.", key));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StatementBuilderError::ValidationError(errors.join(" ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        crate::{Effect, Principal, SpecifiedPrincipal, Statement},
        indoc::indoc,
        pretty_assertions::assert_eq,
        serde_json::json,
        std::collections::BTreeMap,
    };

    #[test_log::test]
    fn test_builder_validation() {
        let err = Statement::builder().build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Effect must be set. Either Action or NotAction must be set. Either Resource or NotResource must be set."
        );

        let err = Statement::builder()
            .effect(Effect::Allow)
            .action(vec!["s3:GetObject".to_string()])
            .not_action(vec!["s3:PutObject".to_string()])
            .resource(vec!["*".to_string()])
            .not_resource(vec!["*".to_string()])
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Action and NotAction cannot both be set. Resource and NotResource cannot both be set."
        );

        let err = Statement::builder().effect(Effect::Allow).action(Vec::<String>::new()).resource(vec!["*".to_string()]).build().unwrap_err();
        assert_eq!(err.to_string(), "Action lists cannot be empty.");

        let mut overrides = BTreeMap::new();
        overrides.insert("Effect".to_string(), json!("Allow"));
        let err = Statement::builder()
            .effect(Effect::Allow)
            .action(vec!["s3:GetObject".to_string()])
            .resource(vec!["*".to_string()])
            .overrides(overrides)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Effect cannot be set as a raw override.");

        let err = Statement::builder()
            .effect(Effect::Allow)
            .action(vec!["sts:AssumeRole".to_string()])
            .principal(Principal::Any)
            .not_principal(Principal::Any)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Principal and NotPrincipal cannot both be set.");
    }

    #[test_log::test]
    fn test_trust_statement_needs_no_resource() {
        let s = Statement::builder()
            .sid("")
            .effect(Effect::Allow)
            .action(vec!["sts:AssumeRole".to_string()])
            .principal(SpecifiedPrincipal::builder().service(vec!["ec2.amazonaws.com".to_string()]).build().unwrap())
            .build()
            .unwrap();
        assert_eq!(s.sid(), Some(""));
        assert!(s.resource().is_none());
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            json!({"Sid": "", "Effect": "Allow", "Action": "sts:AssumeRole", "Principal": {"Service": "ec2.amazonaws.com"}})
        );
    }

    #[test_log::test]
    fn test_serialization() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Other".to_string(), json!({"x": 1}));
        let s = Statement::builder()
            .effect(Effect::Deny)
            .action(vec!["s3:PutObject".to_string(), "s3:GetObject".to_string()])
            .resource(vec!["arn:aws:s3:::b".to_string()])
            .condition(json!({"Bool": {"aws:SecureTransport": "false"}}))
            .overrides(overrides)
            .build()
            .unwrap();

        assert_eq!(s.effect(), Effect::Deny);
        assert_eq!(s.action().unwrap(), ["s3:PutObject".to_string(), "s3:GetObject".to_string()]);
        assert_eq!(s.overrides().len(), 1);
        assert_eq!(
            s.to_string(),
            indoc! {r#"
            {
              "Effect": "Deny",
              "Action": [
                "s3:GetObject",
                "s3:PutObject"
              ],
              "Resource": "arn:aws:s3:::b",
              "Condition": {
                "Bool": {
                  "aws:SecureTransport": "false"
                }
              },
              "Other": {
                "x": 1
              }
            }"#}
        );
    }
}
