//! The generic document tree handed to the binder by the format front-ends.

use std::{collections::HashMap, fmt};

/// A parsed configuration document, independent of its source format.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// An explicit null (`null`, `~`, `#null`).
    #[default]
    Null,
    /// A boolean scalar.
    Bool(bool),
    /// A numeric scalar.
    Number(Number),
    /// A string scalar.
    String(String),
    /// An ordered list of values.
    Sequence(Vec<Value>),
    /// Keyed values, keys kept as written in the document.
    Mapping(Mapping),
}

impl Value {
    /// Short name of the node kind, used in mismatch messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Returns the mapping if this node is one.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(Number::Float(value))
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Value::Mapping(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Sequence(value.into_iter().map(Into::into).collect())
    }
}

/// A numeric scalar, split the way the parsers report it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// A non-negative integer.
    PosInt(u64),
    /// A negative integer.
    NegInt(i64),
    /// A floating point number.
    Float(f64),
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        if value < 0 {
            Number::NegInt(value)
        } else {
            Number::PosInt(value as u64)
        }
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Number::PosInt(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::PosInt(n) => write!(f, "{n}"),
            Number::NegInt(n) => write!(f, "{n}"),
            Number::Float(n) => write!(f, "{n}"),
        }
    }
}

/// Keyed children of a mapping node.
///
/// Entries keep document order and keys are unique: inserting a key that is
/// already present replaces its value in place.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
    positions: HashMap<String, usize>,
}

impl Mapping {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Mapping::default()
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.positions.get(&key) {
            Some(&at) => Some(std::mem::replace(&mut self.entries[at].1, value)),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Looks a key up by exact spelling.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.positions.get(key).map(|&at| &self.entries[at].1)
    }

    /// Mutable lookup by exact spelling.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        let at = *self.positions.get(key)?;
        Some(&mut self.entries[at].1)
    }

    /// Iterates entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut mapping = Mapping {
            entries: Vec::with_capacity(iter.size_hint().0),
            positions: HashMap::with_capacity(iter.size_hint().0),
        };
        for (key, value) in iter {
            mapping.insert(key, value);
        }
        mapping
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut mapping = Mapping::new();
        mapping.insert("a", Value::from(1i64));
        mapping.insert("b", Value::from(2i64));
        let old = mapping.insert("a", Value::from(3i64));

        assert_eq!(old, Some(Value::from(1i64)));
        let keys: Vec<_> = mapping.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(mapping.get("a"), Some(&Value::from(3i64)));
    }

    #[test]
    fn large_mappings_keep_order_and_last_value() {
        let mapping: Mapping = (0..10_000i64)
            .chain(0..10i64)
            .map(|n| (format!("key{n}"), Value::from(n)))
            .collect();

        assert_eq!(mapping.len(), 10_000);
        assert_eq!(mapping.get("key9999"), Some(&Value::from(9_999i64)));
        assert_eq!(mapping.iter().next().map(|(k, _)| k), Some("key0"));
        assert_eq!(mapping.iter().last().map(|(k, _)| k), Some("key9999"));
    }

    #[test]
    fn equality_ignores_lookup_state() {
        let a: Mapping = [("x", Value::from(1i64))].into_iter().collect();
        let mut b = Mapping::new();
        b.insert("x", Value::from(1i64));
        assert_eq!(a, b);
    }

    #[test]
    fn negative_integers_are_signed() {
        assert_eq!(Number::from(-4i64), Number::NegInt(-4));
        assert_eq!(Number::from(4i64), Number::PosInt(4));
    }
}
