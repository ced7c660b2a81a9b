use {
    crate::StateError,
    log::info,
    std::{
        collections::BTreeMap,
        fmt::{Display, Formatter, Result as FmtResult},
    },
};

/// What a change does to its sub-resource.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ChangeSymbol {
    Create,
    Delete,
    Modify,
}

impl Display for ChangeSymbol {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Create => f.write_str("+"),
            Self::Delete => f.write_str("-"),
            Self::Modify => f.write_str("M"),
        }
    }
}

/// The audit detail attached to a change.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChangeDetail {
    None,

    /// Lines describing what changed (a document diff, or one line per tag).
    Diff(Vec<String>),

    /// The full document being put in place.
    Document(String),
}

impl Default for ChangeDetail {
    fn default() -> Self {
        Self::None
    }
}

/// One entry of a change report.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Change {
    symbol: ChangeSymbol,
    kind: String,
    fields: BTreeMap<String, String>,
    detail: ChangeDetail,
}

impl Change {
    pub fn new<K: Into<String>>(symbol: ChangeSymbol, kind: K) -> Self {
        Self {
            symbol,
            kind: kind.into(),
            fields: BTreeMap::new(),
            detail: ChangeDetail::None,
        }
    }

    pub fn create<K: Into<String>>(kind: K) -> Self {
        Self::new(ChangeSymbol::Create, kind)
    }

    pub fn delete<K: Into<String>>(kind: K) -> Self {
        Self::new(ChangeSymbol::Delete, kind)
    }

    pub fn modify<K: Into<String>>(kind: K) -> Self {
        Self::new(ChangeSymbol::Modify, kind)
    }

    /// Add an identifying field.
    pub fn field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn diff(mut self, lines: Vec<String>) -> Self {
        self.detail = ChangeDetail::Diff(lines);
        self
    }

    pub fn document<D: Into<String>>(mut self, document: D) -> Self {
        self.detail = ChangeDetail::Document(document.into());
        self
    }

    #[inline]
    pub fn symbol(&self) -> ChangeSymbol {
        self.symbol
    }

    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    #[inline]
    pub fn detail(&self) -> &ChangeDetail {
        &self.detail
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let fields: Vec<String> = self.fields.iter().map(|(key, value)| format!("{}={}", key, value)).collect();
        write!(f, "{} {}({})", self.symbol, self.kind, fields.join(", "))?;

        match &self.detail {
            ChangeDetail::None => (),
            ChangeDetail::Diff(lines) => {
                for line in lines {
                    write!(f, "\n\t{}", line)?;
                }
            }
            ChangeDetail::Document(document) => {
                for line in document.lines() {
                    write!(f, "\n\t{}", line)?;
                }
            }
        }

        Ok(())
    }
}

/// Collects the changes of one sync run and applies them unless running dry.
#[derive(Debug)]
pub struct Changes {
    dry_run: bool,
    changes: Vec<Change>,
    changed: bool,
}

impl Changes {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            changes: Vec::new(),
            changed: false,
        }
    }

    #[inline]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    #[inline]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Record a change, then run `mutation` to apply it unless this is a dry run.
    ///
    /// The run counts as having changed something either way.
    pub fn record<F>(&mut self, change: Change, mutation: F) -> Result<(), StateError>
    where
        F: FnOnce() -> Result<(), StateError>,
    {
        info!("{}", change);
        self.changes.push(change);
        self.changed = true;

        if self.dry_run {
            Ok(())
        } else {
            mutation()
        }
    }

    pub fn into_report(self) -> ChangeReport {
        ChangeReport {
            changes: self.changes,
            changed: self.changed,
        }
    }
}

/// The outcome of a sync run: every change, in the order it was made, and whether anything changed at all.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChangeReport {
    changes: Vec<Change>,
    changed: bool,
}

impl ChangeReport {
    #[inline]
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    #[inline]
    pub fn changed(&self) -> bool {
        self.changed
    }
}

impl Display for ChangeReport {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        for (i, change) in self.changes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", change)?;
        }
        Ok(())
    }
}
