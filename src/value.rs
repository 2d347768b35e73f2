//! Typed property values carried by fragments and written to the store.
//!
//! Values are serialized untagged, so the JSON form of a fragment reads
//! naturally (`"name": "Ada"`, `"year": 1843`). The store keeps the same JSON
//! text as the canonical encoding, which keeps `1`, `1.0` and `"1"` distinct
//! during key lookups.

use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::errors::GraphImportError;

pub type Properties = BTreeMap<String, PropertyValue>;

/// A single non-collection value. Usable as the value half of a [`crate::Key`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    /// Only for integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    String(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
    List(Vec<Scalar>),
}

impl Scalar {
    pub fn validate(&self) -> Result<(), GraphImportError> {
        match self {
            Scalar::Float(value) if !value.is_finite() => Err(GraphImportError::invalid_input(
                format!("non-finite float {value} cannot be stored"),
            )),
            _ => Ok(()),
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Boolean(a), Scalar::Boolean(b)) => a == b,
            (Scalar::Integer(a), Scalar::Integer(b)) => a == b,
            (Scalar::Unsigned(a), Scalar::Unsigned(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::String(a), Scalar::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::Boolean(value) => value.hash(state),
            Scalar::Integer(value) => value.hash(state),
            Scalar::Unsigned(value) => value.hash(state),
            Scalar::Float(value) => value.to_bits().hash(state),
            Scalar::String(value) => value.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Boolean(value) => write!(f, "{value}"),
            Scalar::Integer(value) => write!(f, "{value}"),
            Scalar::Unsigned(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value:?}"),
            Scalar::String(value) => f.write_str(value),
        }
    }
}

impl PropertyValue {
    pub fn validate(&self) -> Result<(), GraphImportError> {
        match self {
            PropertyValue::Float(value) => Scalar::Float(*value).validate(),
            PropertyValue::List(items) => items.iter().try_for_each(Scalar::validate),
            _ => Ok(()),
        }
    }

    /// Canonical JSON text used as the stored representation.
    pub fn to_json_text(&self) -> Result<String, GraphImportError> {
        self.validate()?;
        serde_json::to_string(self).map_err(|e| GraphImportError::invalid_input(e.to_string()))
    }

    pub fn from_json_text(text: &str) -> Result<Self, GraphImportError> {
        serde_json::from_str(text).map_err(|e| GraphImportError::invalid_input(e.to_string()))
    }

    /// Appends `value` to this one, promoting a scalar into a two-item list.
    /// Appending a list extends the existing items.
    pub fn append(self, value: PropertyValue) -> PropertyValue {
        let mut items = self.into_items();
        items.extend(value.into_items());
        PropertyValue::List(items)
    }

    fn into_items(self) -> Vec<Scalar> {
        match self {
            PropertyValue::Boolean(value) => vec![Scalar::Boolean(value)],
            PropertyValue::Integer(value) => vec![Scalar::Integer(value)],
            PropertyValue::Unsigned(value) => vec![Scalar::Unsigned(value)],
            PropertyValue::Float(value) => vec![Scalar::Float(value)],
            PropertyValue::String(value) => vec![Scalar::String(value)],
            PropertyValue::List(items) => items,
        }
    }
}

impl From<Scalar> for PropertyValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Boolean(value) => PropertyValue::Boolean(value),
            Scalar::Integer(value) => PropertyValue::Integer(value),
            Scalar::Unsigned(value) => PropertyValue::Unsigned(value),
            Scalar::Float(value) => PropertyValue::Float(value),
            Scalar::String(value) => PropertyValue::String(value),
        }
    }
}

impl From<&Scalar> for PropertyValue {
    fn from(value: &Scalar) -> Self {
        PropertyValue::from(value.clone())
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value.into())
                }
            }

            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Boolean,
    i32 => Integer,
    i64 => Integer,
    u32 => Integer,
    f64 => Float,
    String => String,
    &str => String,
}

// A `u64` that fits in `i64` stays `Integer`, so equal numbers make equal keys.
impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => Scalar::Integer(value),
            Err(_) => Scalar::Unsigned(value),
        }
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::from(Scalar::from(value))
    }
}

impl From<Vec<Scalar>> for PropertyValue {
    fn from(items: Vec<Scalar>) -> Self {
        PropertyValue::List(items)
    }
}
