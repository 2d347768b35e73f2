use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Scalar;

/// Property used when an index is declared with a label only.
pub const DEFAULT_KEY_PROPERTY: &str = "key";

/// A `(label, property)` namespace used to address nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Index {
    pub label: String,
    #[serde(default = "default_property")]
    pub property: String,
}

impl Index {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_property(label, DEFAULT_KEY_PROPERTY)
    }

    pub fn with_property(label: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            property: property.into(),
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.label, self.property)
    }
}

fn default_property() -> String {
    DEFAULT_KEY_PROPERTY.to_string()
}

/// The address of one entity inside one index namespace.
///
/// Equality and hashing are structural, so a `Key` is used directly as a map
/// key. The dotted `Display` form is for reports and logs only: it is
/// ambiguous when labels or values contain dots.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub index: Index,
    pub value: Scalar,
}

impl Key {
    pub fn new(index: Index, value: impl Into<Scalar>) -> Self {
        Self {
            index,
            value: value.into(),
        }
    }

    pub fn labeled(label: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(Index::new(label), value)
    }

    pub fn with_property(
        label: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<Scalar>,
    ) -> Self {
        Self::new(Index::with_property(label, property), value)
    }

    pub fn label(&self) -> &str {
        &self.index.label
    }

    pub fn property(&self) -> &str {
        &self.index.property
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.value)
    }
}
