//! Latest-value store
//!
//! Holds the most recent raw payload per key and the last completed error
//! frame. Readers get an owned [`DataSnapshot`] so no lock is held while
//! handlers run.

use std::collections::BTreeMap;

use hrv_codec::{DataKey, SystemProperty};
use parking_lot::RwLock;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error_frame::ErrorFrame;

#[derive(Debug, Default)]
struct StoreInner {
    values: BTreeMap<DataKey, String>,
    errors: Option<ErrorFrame>,
}

/// Concurrency-safe latest-value map
#[derive(Debug, Default)]
pub struct DataStore {
    inner: RwLock<StoreInner>,
}

impl DataStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest payload for `key`
    pub fn set(&self, key: DataKey, payload: impl Into<String>) {
        self.inner.write().values.insert(key, payload.into());
    }

    /// Replace the last completed error frame
    pub fn set_errors(&self, frame: ErrorFrame) {
        self.inner.write().errors = Some(frame);
    }

    /// Latest payload for `key`
    pub fn get(&self, key: DataKey) -> Option<String> {
        self.inner.read().values.get(&key).cloned()
    }

    /// Point-in-time copy of everything stored
    pub fn snapshot(&self) -> DataSnapshot {
        let inner = self.inner.read();
        DataSnapshot {
            values: inner.values.clone(),
            errors: inner.errors.clone(),
        }
    }

    /// Number of keys with a value
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    /// Nothing has been received yet
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.values.is_empty() && inner.errors.is_none()
    }
}

/// Immutable view of the store handed to callers and data handlers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSnapshot {
    values: BTreeMap<DataKey, String>,
    errors: Option<ErrorFrame>,
}

impl DataSnapshot {
    /// Raw payload for `key`
    pub fn get(&self, key: DataKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    /// Payload for `key` decoded into positional values
    pub fn property(&self, key: DataKey) -> Option<SystemProperty> {
        self.get(key)
            .map(|payload| SystemProperty::from_payload(key, payload))
    }

    /// Last completed error frame
    pub fn errors(&self) -> Option<&ErrorFrame> {
        self.errors.as_ref()
    }

    /// All stored payloads in key order
    pub fn iter(&self) -> impl Iterator<Item = (DataKey, &str)> {
        self.values.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Number of keys with a value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Empty snapshot
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.errors.is_none()
    }
}

// Wire key -> payload, with the error frame under the error line key
impl Serialize for DataSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let shadowed = self.errors.is_some();
        let entries: Vec<_> = self
            .values
            .iter()
            .filter(|(key, _)| !(shadowed && **key == DataKey::ErrorMessage))
            .collect();

        let mut map = serializer.serialize_map(Some(entries.len() + usize::from(shadowed)))?;
        for (key, value) in entries {
            map.serialize_entry(key.as_str(), value)?;
        }
        if let Some(errors) = &self.errors {
            map.serialize_entry(DataKey::ErrorMessage.as_str(), errors)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrv_codec::PropertyValue;

    #[test]
    fn test_last_write_wins() {
        let store = DataStore::new();
        store.set(DataKey::ModeFan, "1+ 0+ 2");
        store.set(DataKey::ModeFan, "2+ 0+ 2");
        assert_eq!(store.get(DataKey::ModeFan).as_deref(), Some("2+ 0+ 2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = DataStore::new();
        store.set(DataKey::ModelName, "LOKE1");
        let snapshot = store.snapshot();

        store.set(DataKey::ModelName, "LOKE2");
        assert_eq!(snapshot.get(DataKey::ModelName), Some("LOKE1"));
        assert_eq!(store.snapshot().get(DataKey::ModelName), Some("LOKE2"));
    }

    #[test]
    fn test_property_view() {
        let store = DataStore::new();
        store.set(DataKey::TargetTemperatureNormal, "21+ 10+ 30");
        let property = store
            .snapshot()
            .property(DataKey::TargetTemperatureNormal)
            .unwrap();
        assert_eq!(property.value, Some(PropertyValue::Integer(21)));
        assert_eq!(property.max, Some(PropertyValue::Integer(30)));
        assert_eq!(property.extra, None);
    }

    #[test]
    fn test_errors_replace_previous_frame() {
        let store = DataStore::new();
        assert!(store.is_empty());
        store.set_errors(ErrorFrame::new(vec!["Filter".into()]));
        store.set_errors(ErrorFrame::default());

        let snapshot = store.snapshot();
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.errors(), Some(&ErrorFrame::default()));
    }

    #[test]
    fn test_json_shape() {
        let store = DataStore::new();
        store.set(DataKey::ModeFan, "1+ 0+ 2");
        store.set(DataKey::FanSpeedSupply, "45");
        store.set_errors(ErrorFrame::new(vec!["Fire alarm".into()]));

        let json = serde_json::to_value(store.snapshot()).unwrap();
        assert_eq!(json["MF"], "1+ 0+ 2");
        assert_eq!(json["*DA"], "45");
        assert_eq!(json["*EB"], serde_json::json!(["Fire alarm"]));
    }
}
