use std::io::{BufReader, BufWriter, Read, Write};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Value;

/// An error raised while saving or restoring a [`VariableStorage`] snapshot.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The snapshot could not be encoded or decoded.
    #[error("storage snapshot codec failed: {0}")]
    Codec(#[from] bincode::Error),

    /// The snapshot could not be flushed to its writer.
    #[error("storage snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The variables of a running dialogue.
///
/// A flat map from variable name to value. Script variables and internal bookkeeping (visit
/// counters, view counts, tracking counters) share the same namespace. Reads and writes are
/// immediate; there is no transactional layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableStorage {
    values: HashMap<String, Value>,
}

impl VariableStorage {
    /// Create an empty [`VariableStorage`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Look up a variable that must be a number.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_number)
    }

    /// Write a variable, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    /// Remove a variable, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Whether a variable is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Remove every variable.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// The number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over every variable, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Write a snapshot of every variable.
    pub fn save(&self, writer: impl Write) -> Result<(), StorageError> {
        let mut writer = BufWriter::new(writer);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a snapshot written by [`VariableStorage::save`].
    pub fn restore(reader: impl Read) -> Result<Self, StorageError> {
        Ok(bincode::deserialize_from(BufReader::new(reader))?)
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for VariableStorage {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        self.values.extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}
