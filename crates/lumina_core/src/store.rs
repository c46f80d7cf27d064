//! crates/lumina_core/src/store.rs
//!
//! The persistent store: named, whole-value-replaced JSON collections on top of a
//! `KeyValueStore` port. Malformed stored JSON is treated as absent.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::ports::{KeyValueStore, PortError, PortResult};

/// Logical collection and slot names.
pub mod keys {
    pub const USERS: &str = "users";
    pub const LOGS: &str = "logs";
    pub const CURRENT_USER: &str = "current_user";
    pub const ASSIGNMENTS: &str = "assignments";

    /// Each teacher keeps their own class list.
    pub fn roster(teacher_id: &str) -> String {
        format!("roster_{}", teacher_id)
    }
}

//=========================================================================================
// CollectionStore
//=========================================================================================

/// Typed access to JSON collections and single-value slots.
#[derive(Clone)]
pub struct CollectionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CollectionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Loads every record in `name`. A missing or unparseable value is an empty
    /// collection. Records that do not fit `T` are skipped with a warning.
    pub async fn load_collection<T: DeserializeOwned>(&self, name: &str) -> PortResult<Vec<T>> {
        let Some(raw) = self.backend.get(name).await? else {
            return Ok(Vec::new());
        };
        let Some(entries) = parse_entries(name, &raw) else {
            return Ok(Vec::new());
        };
        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<T>(entry) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record {} in '{}': {}", index, name, e),
            }
        }
        Ok(records)
    }

    /// Replaces the whole of `name` with `records`.
    ///
    /// Stored entries that do not read as `T` were never handed to the caller, so
    /// they are carried over after `records` instead of being dropped.
    pub async fn save_collection<T>(&self, name: &str, records: &[T]) -> PortResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut entries = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if let Some(raw) = self.backend.get(name).await? {
            let unreadable: Vec<Value> = parse_entries(name, &raw)
                .unwrap_or_default()
                .into_iter()
                .filter(|entry| T::deserialize(entry).is_err())
                .collect();
            if !unreadable.is_empty() {
                warn!("Keeping {} unreadable records in '{}'.", unreadable.len(), name);
                entries.extend(unreadable);
            }
        }

        let json = serde_json::to_string(&entries).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.backend.set(name, &json).await
    }

    pub async fn load_slot<T: DeserializeOwned>(&self, key: &str) -> PortResult<Option<T>> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Slot '{}' holds malformed JSON, treating it as empty: {}", key, e);
                Ok(None)
            }
        }
    }

    pub async fn save_slot<T: Serialize>(&self, key: &str, value: &T) -> PortResult<()> {
        let json = serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.backend.set(key, &json).await
    }

    pub async fn clear_slot(&self, key: &str) -> PortResult<()> {
        self.backend.remove(key).await
    }
}

/// Splits a stored collection into its raw entries, or `None` if it is not a JSON array.
fn parse_entries(name: &str, raw: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!("Collection '{}' holds malformed JSON, treating it as empty: {}", name, e);
            None
        }
    }
}

//=========================================================================================
// MemoryStore
//=========================================================================================

/// A `KeyValueStore` held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the raw stored value, for inspection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().ok()?.get(key).cloned()
    }

    fn lock(&self) -> PortResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| PortError::Unexpected("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: u32,
        text: String,
    }

    fn store() -> (MemoryStore, CollectionStore) {
        let backend = MemoryStore::new();
        let store = CollectionStore::new(Arc::new(backend.clone()));
        (backend, store)
    }

    #[tokio::test]
    async fn missing_collection_is_empty() {
        let (_, store) = store();
        let notes: Vec<Note> = store.load_collection("notes").await.unwrap();
        assert!(notes.is_empty());
    }

    #[tokio::test]
    async fn corrupt_collection_is_empty() {
        let (backend, store) = store();
        backend.set("notes", "[{\"id\": 1, \"text\": ").await.unwrap();
        let notes: Vec<Note> = store.load_collection("notes").await.unwrap();
        assert!(notes.is_empty());

        backend.set("current", "not json").await.unwrap();
        let slot: Option<Note> = store.load_slot("current").await.unwrap();
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn save_replaces_whole_collection() {
        let (backend, store) = store();
        let first = vec![
            Note { id: 1, text: "a".into() },
            Note { id: 2, text: "b".into() },
        ];
        store.save_collection("notes", &first).await.unwrap();
        store
            .save_collection("notes", &[Note { id: 3, text: "c".into() }])
            .await
            .unwrap();

        let loaded: Vec<Note> = store.load_collection("notes").await.unwrap();
        assert_eq!(loaded, vec![Note { id: 3, text: "c".into() }]);
        assert!(backend.raw("notes").unwrap().contains("\"c\""));
    }

    #[tokio::test]
    async fn unreadable_records_are_skipped_and_kept_on_save() {
        let (backend, store) = store();
        backend
            .set("notes", r#"[{"id": 1, "text": "a"}, {"id": 2}, {"id": 3, "text": "c"}]"#)
            .await
            .unwrap();

        let mut notes: Vec<Note> = store.load_collection("notes").await.unwrap();
        assert_eq!(notes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 3]);

        notes.push(Note { id: 4, text: "d".into() });
        store.save_collection("notes", &notes).await.unwrap();

        let raw: Vec<Value> = serde_json::from_str(&backend.raw("notes").unwrap()).unwrap();
        assert_eq!(raw.len(), 4);
        assert!(raw.contains(&serde_json::json!({"id": 2})));
        let reloaded: Vec<Note> = store.load_collection("notes").await.unwrap();
        assert_eq!(reloaded.len(), 3);
    }

    #[tokio::test]
    async fn slot_round_trips_and_clears() {
        let (_, store) = store();
        store.save_slot("current", &Note { id: 7, text: "x".into() }).await.unwrap();
        let loaded: Option<Note> = store.load_slot("current").await.unwrap();
        assert_eq!(loaded.map(|n| n.id), Some(7));

        store.clear_slot("current").await.unwrap();
        let cleared: Option<Note> = store.load_slot("current").await.unwrap();
        assert!(cleared.is_none());
    }

    #[test]
    fn roster_key_is_per_teacher() {
        assert_eq!(keys::roster("t1"), "roster_t1");
    }
}
