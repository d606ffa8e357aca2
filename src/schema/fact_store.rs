//! Fact stores: sorted key to typed value maps queried by clauses.

use std::collections::BTreeMap;
use thiserror::Error;

use super::value::{FromValue, Value, ValueKind};

#[derive(Debug, Error, PartialEq)]
pub enum FactError {
    #[error("fact '{key}' is present, but is a {found}, not a {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// The contract every fact source must satisfy.
///
/// Keys are unique and case-sensitive, and [`FactStore::iter`] must yield
/// them in ascending order. Rule matching merges several stores by walking
/// them in key order, so an unsorted implementation produces wrong matches.
pub trait FactStore {
    /// Insert or overwrite a fact.
    fn set_value(&mut self, key: &str, value: Value);

    /// Look up a fact of any type.
    fn value(&self, key: &str) -> Option<&Value>;

    /// All facts in ascending key order.
    fn iter(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_>;

    fn len(&self) -> usize;

    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in ascending order.
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.iter().map(|(k, _)| k))
    }

    /// The key at `index` in ascending order.
    fn key_at(&self, index: usize) -> Option<&str> {
        self.keys().nth(index)
    }
}

/// Typed lookups for any [`FactStore`], trait objects included.
pub trait FactStoreExt {
    /// Typed lookup. A present key of another type is an error rather than
    /// a miss.
    fn try_get_value<T: FromValue>(&self, key: &str) -> Result<Option<T>, FactError>;
}

impl<S: FactStore + ?Sized> FactStoreExt for S {
    fn try_get_value<T: FromValue>(&self, key: &str) -> Result<Option<T>, FactError> {
        match self.value(key) {
            None => Ok(None),
            Some(value) => T::from_value(value).map(Some).ok_or_else(|| {
                FactError::TypeMismatch {
                    key: key.to_string(),
                    expected: T::KIND,
                    found: value.kind(),
                }
            }),
        }
    }
}

/// An in-memory [`FactStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFactStore {
    facts: BTreeMap<String, Value>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for assembling queries.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.facts.insert(key.to_string(), value.into());
        self
    }

    /// Borrow the underlying sorted map.
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.facts
    }
}

impl FactStore for MemoryFactStore {
    fn set_value(&mut self, key: &str, value: Value) {
        self.facts.insert(key.to_string(), value);
    }

    fn value(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        Box::new(self.facts.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn len(&self) -> usize {
        self.facts.len()
    }

    fn clear(&mut self) {
        self.facts.clear();
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MemoryFactStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            facts: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
