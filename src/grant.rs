use {
    crate::display_json,
    derive_builder::Builder,
    serde::Serialize,
    serde_json::Value,
};

/// A KMS grant: permission for `grantee` to perform `operations` with a key.
#[derive(Builder, Clone, Debug, PartialEq, Serialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(rename_all = "PascalCase")]
pub struct Grant {
    #[builder(setter(into))]
    #[serde(rename = "GranteePrincipal")]
    grantee: String,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "RetiringPrincipal", skip_serializing_if = "Option::is_none")]
    retiree: Option<String>,

    #[builder(setter(into))]
    operations: Vec<String>,

    #[builder(setter(into, strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    constraints: Option<Value>,

    #[builder(setter(into), default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    grant_tokens: Vec<String>,
}

/// What makes two grants the same grant.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GrantIdentity {
    grantee: String,
    retiree: Option<String>,
    operations: Vec<String>,
    constraints: Option<String>,
    grant_tokens: Vec<String>,
}

impl Grant {
    pub fn builder() -> GrantBuilder {
        GrantBuilder::default()
    }

    #[inline]
    pub fn grantee(&self) -> &str {
        &self.grantee
    }

    #[inline]
    pub fn retiree(&self) -> Option<&str> {
        self.retiree.as_deref()
    }

    #[inline]
    pub fn operations(&self) -> &[String] {
        &self.operations
    }

    #[inline]
    pub fn constraints(&self) -> Option<&Value> {
        self.constraints.as_ref()
    }

    #[inline]
    pub fn grant_tokens(&self) -> &[String] {
        &self.grant_tokens
    }

    /// The equality key used when deciding whether a grant already exists. Operation and token order do not matter.
    pub fn identity(&self) -> GrantIdentity {
        let mut operations = self.operations.clone();
        operations.sort();
        let mut grant_tokens = self.grant_tokens.clone();
        grant_tokens.sort();

        GrantIdentity {
            grantee: self.grantee.clone(),
            retiree: self.retiree.clone(),
            operations,
            constraints: self.constraints.as_ref().map(Value::to_string),
            grant_tokens,
        }
    }
}

display_json!(Grant);

impl GrantBuilder {
    fn validate(&self) -> Result<(), GrantBuilderError> {
        let mut errors = Vec::with_capacity(2);
        match &self.grantee {
            None => errors.push("Grantee must be set."),
            Some(grantee) if grantee.is_empty() => errors.push("Grantee cannot be empty."),
            _ => (),
        }

        match &self.operations {
            None => errors.push("Operations must be set."),
            Some(operations) if operations.is_empty() => errors.push("Operations cannot be empty."),
            _ => (),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GrantBuilderError::ValidationError(errors.join(" ")))
        }
    }
}
