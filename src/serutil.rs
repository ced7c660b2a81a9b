use {
    log::debug,
    serde::{
        de::{self, DeserializeOwned, Deserializer},
        ser::Serializer,
        Deserialize, Serialize,
    },
    serde_json::Value,
};

/// Render a value as JSON indented by two spaces, the layout IAM documents are exchanged in.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut ser = serde_json::Serializer::with_formatter(buf, formatter);
    value.serialize(&mut ser)?;
    String::from_utf8(ser.into_inner()).map_err(|e| {
        log::error!("JSON serialization contained non-UTF-8 characters: {}", e);
        <serde_json::Error as serde::ser::Error>::custom(e)
    })
}

/// Implement Display for a given class by formatting it as pretty-printed JSON.
#[macro_export]
macro_rules! display_json {
    ($cls:ident) => {
        impl std::fmt::Display for $cls {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                match $crate::serutil::to_pretty_json(self) {
                    Ok(s) => f.write_str(&s),
                    Err(e) => {
                        ::log::error!("Failed to serialize: {}", e);
                        Err(::std::fmt::Error {})
                    }
                }
            }
        }
    };
}

/// Serialize a list the way the provider normalizes it: a single element becomes a scalar, anything longer is
/// emitted sorted so the rendering does not depend on declaration order.
pub(crate) fn collapse_list<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    if values.len() == 1 {
        serializer.serialize_str(&values[0])
    } else {
        let mut sorted = values.to_vec();
        sorted.sort();
        sorted.serialize(serializer)
    }
}

pub(crate) fn collapse_optional_list<S: Serializer>(
    values: &Option<Vec<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match values {
        Some(values) => collapse_list(values, serializer),
        None => serializer.serialize_none(),
    }
}

/// Short human name for the JSON type of a value, used in configuration errors.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Read a string or a list of strings. Anything else yields `None`.
pub(crate) fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => {
            let mut result = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => result.push(s.clone()),
                    _ => return None,
                }
            }
            Some(result)
        }
        _ => None,
    }
}

/// The elements of a value if it is a list, or the value itself otherwise.
pub(crate) fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// A definition field that may be written either as a single element or as a list of elements. A null value is
/// treated as an empty list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<&T> {
        match self {
            Self::One(element) => vec![element],
            Self::Many(elements) => elements.iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(_) => false,
            Self::Many(elements) => elements.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(elements) => elements.len(),
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::Many(Vec::new())),
            Value::Array(items) => {
                let mut result = Vec::with_capacity(items.len());
                for item in items {
                    result.push(serde_json::from_value(item).map_err(de::Error::custom)?);
                }
                Ok(Self::Many(result))
            }
            other => match serde_json::from_value(other) {
                Ok(element) => Ok(Self::One(element)),
                Err(e) => {
                    debug!("Failed to deserialize element: {:?}", e);
                    Err(de::Error::custom(e))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{as_list, string_list, to_pretty_json, value_kind, OneOrMany},
        indoc::indoc,
        pretty_assertions::assert_eq,
        serde::Serialize,
        serde_json::json,
    };

    #[derive(Serialize)]
    struct Collapsed {
        #[serde(serialize_with = "super::collapse_list")]
        one: Vec<String>,
        #[serde(serialize_with = "super::collapse_list")]
        many: Vec<String>,
    }

    #[test_log::test]
    fn test_collapse() {
        let c = Collapsed {
            one: vec!["a".to_string()],
            many: vec!["z".to_string(), "b".to_string()],
        };
        assert_eq!(
            to_pretty_json(&c).unwrap(),
            indoc! {r#"
            {
              "one": "a",
              "many": [
                "b",
                "z"
              ]
            }"#}
        );
    }

    #[test_log::test]
    fn test_one_or_many() {
        let one: OneOrMany<String> = serde_json::from_value(json!("x")).unwrap();
        assert_eq!(one, OneOrMany::One("x".to_string()));
        assert_eq!(one.len(), 1);
        assert!(!one.is_empty());

        let many: OneOrMany<String> = serde_json::from_value(json!(["x", "y"])).unwrap();
        assert_eq!(many.to_vec(), vec!["x", "y"]);

        let none: OneOrMany<String> = serde_json::from_value(json!(null)).unwrap();
        assert!(none.is_empty());
        assert_eq!(OneOrMany::<String>::default(), none);

        assert!(serde_json::from_value::<OneOrMany<String>>(json!(3)).is_err());
        assert!(serde_json::from_value::<OneOrMany<String>>(json!(["a", 3])).is_err());
    }

    #[test_log::test]
    fn test_helpers() {
        assert_eq!(string_list(&json!("a")), Some(vec!["a".to_string()]));
        assert_eq!(string_list(&json!(["a", "b"])), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(string_list(&json!(["a", 1])), None);
        assert_eq!(string_list(&json!({})), None);
        assert_eq!(as_list(&json!([1, 2])).len(), 2);
        assert_eq!(as_list(&json!({"a": 1})).len(), 1);
        assert_eq!(value_kind(&json!([])), "list");
        assert_eq!(value_kind(&json!({})), "mapping");
        assert_eq!(value_kind(&json!(true)), "boolean");
    }
}
