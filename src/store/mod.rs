//! Storage port for the token ledger.
//!
//! The ledger schema only ever stores integer amounts, so the port trades
//! in `Amount` values directly and the host adapter decides how they are
//! encoded at rest. Absent keys read as zero; writers delete entries that
//! return to zero instead of storing explicit zeros, and readers must not
//! be able to tell the two apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::Amount;

/// Ordered key-value storage scoped to the current call.
///
/// `get` returns zero for an absent key, so ledger logic always sees a
/// concrete integer and never handles an "entry missing" case itself.
pub trait StateStore {
    fn get(&self, key: &[u8]) -> Amount;
    fn put(&mut self, key: &[u8], value: Amount);
    fn delete(&mut self, key: &[u8]);
}

/// In-memory store backing tests and the CLI host.
///
/// Serializes as a hex-keyed JSON map so state files stay readable.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryStore {
    #[serde(with = "hex_keys")]
    entries: BTreeMap<Vec<u8>, Amount>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], Amount)> + '_ {
        self.entries.iter().map(|(key, value)| (key.as_slice(), *value))
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Amount {
        self.entries.get(key).copied().unwrap_or(0)
    }

    fn put(&mut self, key: &[u8], value: Amount) {
        self.entries.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }
}

mod hex_keys {
    use std::collections::BTreeMap;

    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    use crate::ledger::Amount;

    pub fn serialize<S>(
        entries: &BTreeMap<Vec<u8>, Amount>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: BTreeMap<String, Amount> = entries
            .iter()
            .map(|(key, value)| (hex::encode(key), *value))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<Vec<u8>, Amount>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, Amount>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(key, value)| {
                hex::decode(&key)
                    .map(|raw| (raw, value))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_reads_as_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"missing"), 0);
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let mut store = MemoryStore::new();
        store.put(b"key", 42);
        assert_eq!(store.get(b"key"), 42);
        assert!(store.contains(b"key"));
        store.delete(b"key");
        assert_eq!(store.get(b"key"), 0);
        assert!(!store.contains(b"key"));
    }

    #[test]
    fn explicit_zero_reads_like_absent() {
        let mut store = MemoryStore::new();
        store.put(b"key", 0);
        assert_eq!(store.get(b"key"), 0);
        assert_eq!(store.get(b"key"), store.get(b"other"));
    }

    #[test]
    fn state_file_roundtrips_with_hex_keys() {
        let mut store = MemoryStore::new();
        store.put(&[0x01, 0xab], 7);
        store.put(b"TotalSupply", 10_000);
        let encoded = serde_json::to_string(&store).unwrap();
        assert!(encoded.contains("01ab"));
        let decoded: MemoryStore = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, store);
    }
}
