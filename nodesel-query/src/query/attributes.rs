//! Attribute maps and the known field set
//!
//!     A candidate node is described by a flat map from field name to string value. The query
//!     library never owns candidates; it only reads them through [AttributeSource], so callers
//!     can match against their own record types without copying them into maps first.
//!
//!     The known field set is the closed vocabulary a query may reference. It is supplied per
//!     compilation and also drives tokenization: a `]` only ends a condition when what follows
//!     starts a condition on a known field (see [lexing](crate::query::lexing)).

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// The default attribute map: field name to value
pub type AttributeMap = BTreeMap<String, String>;

/// Read access to the attributes of one candidate
pub trait AttributeSource {
    /// Value of `field`, or `None` when the candidate does not carry it
    fn attribute(&self, field: &str) -> Option<&str>;
}

impl<S: BuildHasher> AttributeSource for HashMap<String, String, S> {
    fn attribute(&self, field: &str) -> Option<&str> {
        self.get(field).map(String::as_str)
    }
}

impl AttributeSource for BTreeMap<String, String> {
    fn attribute(&self, field: &str) -> Option<&str> {
        self.get(field).map(String::as_str)
    }
}

impl<T: AttributeSource + ?Sized> AttributeSource for &T {
    fn attribute(&self, field: &str) -> Option<&str> {
        (**self).attribute(field)
    }
}

/// Field names a query is allowed to reference.
///
/// Insertion order is kept (it is the order used in the lookahead alternation) and duplicates
/// are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownFields {
    names: Vec<String>,
}

impl KnownFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field name, ignoring it when already present
    pub fn insert(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KnownFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut fields = KnownFields::new();
        fields.extend(iter);
        fields
    }
}

impl<S: Into<String>> Extend<S> for KnownFields {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}
