//! Typed attribute map attached to input and output records.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

/// Attribute values keyed by name, each stored as its bincode encoding so that any
/// serde type round-trips between generations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Vec<u8>>);

impl Attributes {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Decode the value stored under `key` as `V`.
    pub fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, bincode::Error> {
        match self.0.get(key) {
            Some(bytes) => bincode::deserialize(bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Encode and store `value`, replacing any previous value.
    pub fn set<V: Serialize + ?Sized>(&mut self, key: &str, value: &V) -> Result<(), bincode::Error> {
        let bytes = bincode::serialize(value)?;
        self.0.insert(key.to_string(), bytes);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(key).is_some()
    }
}

impl Deref for Attributes {
    type Target = BTreeMap<String, Vec<u8>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Vec<u8>);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
