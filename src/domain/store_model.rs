use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::dataset::FieldValue;

/// Hidden field carrying a record's sequence position in the store.
pub const ROW_INDEX_FIELD: &str = "_rowIndex";

pub type EntryFields = BTreeMap<String, FieldValue>;

/// One document in a dataset namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key: String,
    pub fields: EntryFields,
}

impl StoredEntry {
    /// Stored sequence position; entries written without one sort as 0.
    pub fn row_index(&self) -> f64 {
        match self.fields.get(ROW_INDEX_FIELD) {
            Some(FieldValue::Number(n)) if n.is_finite() => *n,
            _ => 0.0,
        }
    }
}

/// An all-or-nothing set of writes against one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBatch {
    pub namespace: String,
    /// Clear the namespace before applying `puts`, inside the same commit.
    pub replace: bool,
    pub puts: Vec<StoredEntry>,
}

impl WriteBatch {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            replace: false,
            puts: Vec::new(),
        }
    }

    pub fn replacing(namespace: impl Into<String>) -> Self {
        Self {
            replace: true,
            ..Self::new(namespace)
        }
    }

    /// Later puts to the same key overwrite earlier ones.
    pub fn put(&mut self, key: impl Into<String>, fields: EntryFields) {
        self.puts.push(StoredEntry {
            key: key.into(),
            fields,
        });
    }

    pub fn len(&self) -> usize {
        self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
    }

    /// Number of entries the batch leaves in the namespace's key space.
    pub fn distinct_keys(&self) -> usize {
        self.puts
            .iter()
            .map(|entry| entry.key.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// The metadata registry: known dataset names and their header lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub names: BTreeSet<String>,
    pub headers: BTreeMap<String, Vec<String>>,
}

impl RegistrySnapshot {
    /// Stored headers for `name`, ignoring empty lists.
    pub fn headers_for(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(name)
            .map(Vec::as_slice)
            .filter(|headers| !headers.is_empty())
    }

    pub fn apply(&mut self, patch: &RegistryPatch) {
        self.names.extend(patch.add_names.iter().cloned());
        for (name, headers) in &patch.headers {
            self.headers.insert(name.clone(), headers.clone());
        }
    }
}

/// A merge-write against the registry. Names are set-unioned; header lists
/// replace whatever was stored for the same dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryPatch {
    pub add_names: Vec<String>,
    pub headers: BTreeMap<String, Vec<String>>,
}

impl RegistryPatch {
    pub fn register(name: &str, headers: &[String]) -> Self {
        Self {
            add_names: vec![name.to_string()],
            headers: BTreeMap::from([(name.to_string(), headers.to_vec())]),
        }
    }

    pub fn headers_only(name: &str, headers: &[String]) -> Self {
        Self {
            add_names: Vec::new(),
            headers: BTreeMap::from([(name.to_string(), headers.to_vec())]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add_names.is_empty() && self.headers.is_empty()
    }
}
