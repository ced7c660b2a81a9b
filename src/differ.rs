use {
    crate::serutil::to_pretty_json,
    log::{debug, warn},
    serde_json::Value,
    similar::TextDiff,
};

const LIST_KEYS: &[&str] = &["Action", "NotAction", "Resource", "NotResource"];
const PRINCIPAL_KEYS: &[&str] = &["Principal", "NotPrincipal"];
const PRINCIPAL_TYPES: &[&str] = &["AWS", "CanonicalUser", "Federated", "Service"];
const CONTEXT_LINES: usize = 3;

/// One side of a comparison after parsing.
#[derive(Debug)]
enum Side {
    Absent,
    Unparsable,
    Parsed(String),
}

impl Side {
    fn read(document: Option<&str>, label: &str) -> Self {
        let document = match document {
            None => return Self::Absent,
            Some(document) => document,
        };

        match serde_json::from_str::<Value>(document) {
            Ok(mut value) => {
                canonicalize(&mut value);
                match to_pretty_json(&value) {
                    Ok(mut text) => {
                        text.push('\n');
                        Self::Parsed(text)
                    }
                    Err(e) => {
                        warn!("Unable to render the {} document: {}", label, e);
                        Self::Unparsable
                    }
                }
            }
            Err(e) => {
                warn!("Unable to parse the {} document, treating it as empty: {}", label, e);
                Self::Unparsable
            }
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Parsed(text) => text,
            _ => "",
        }
    }

    fn is_unparsable(&self) -> bool {
        matches!(self, Self::Unparsable)
    }
}

/// Put a policy document into canonical form in place.
///
/// Within every statement (the `Statement` key may hold a single statement or a list of them), the list-valued
/// fields `Action`, `NotAction`, `Resource` and `NotResource`, and the principal lists inside `Principal` and
/// `NotPrincipal`, are sorted; a list of one element becomes that element. Anything that is not shaped like a policy
/// document is left alone.
pub fn canonicalize(document: &mut Value) {
    match document.get_mut("Statement") {
        Some(Value::Array(statements)) => statements.iter_mut().for_each(canonicalize_statement),
        Some(statement) => canonicalize_statement(statement),
        None => (),
    }
}

fn canonicalize_statement(statement: &mut Value) {
    let statement = match statement {
        Value::Object(map) => map,
        _ => return,
    };

    for key in LIST_KEYS {
        if let Some(value) = statement.get_mut(*key) {
            canonicalize_list(value);
        }
    }

    for key in PRINCIPAL_KEYS {
        if let Some(Value::Object(principal)) = statement.get_mut(*key) {
            for principal_type in PRINCIPAL_TYPES {
                if let Some(value) = principal.get_mut(*principal_type) {
                    canonicalize_list(value);
                }
            }
        }
    }
}

fn canonicalize_list(value: &mut Value) {
    if let Value::Array(items) = value {
        if items.len() == 1 {
            let only = items.remove(0);
            *value = only;
        } else {
            items.sort_by_cached_key(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
    }
}

/// Compare the document currently in place with the desired one.
///
/// Returns the lines of a unified diff (`--- current`, `+++ new`, then `@@` hunks) of the canonical forms, or
/// nothing when the documents are semantically equal. A missing side compares as empty, so creating or removing
/// a document always produces a diff. A side that cannot be parsed also compares as empty, and a comparison
/// involving one is never reported as equal.
pub fn compare_documents(current: Option<&str>, desired: Option<&str>) -> Vec<String> {
    let current = Side::read(current, "current");
    let desired = Side::read(desired, "new");

    let diff = TextDiff::from_lines(current.text(), desired.text());
    let rendered = diff.unified_diff().context_radius(CONTEXT_LINES).header("current", "new").to_string();
    let mut lines: Vec<String> = rendered.lines().map(str::to_string).collect();

    let has_hunk = lines.iter().any(|line| line.starts_with("@@") && line.trim_end().ends_with("@@"));
    if !has_hunk {
        lines.clear();
    }

    for (side, label) in [(&current, "current"), (&desired, "new")] {
        if side.is_unparsable() {
            lines.push(format!("! the {} document could not be parsed", label));
        }
    }

    debug!("Document comparison produced {} line(s)", lines.len());
    lines
}

/// True when the two documents are semantically equal.
pub fn documents_equal(current: Option<&str>, desired: Option<&str>) -> bool {
    compare_documents(current, desired).is_empty()
}
