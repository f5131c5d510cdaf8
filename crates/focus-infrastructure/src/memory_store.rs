//! In-memory document store.
//!
//! Implements the core `DocumentStore` contract in process: per-call atomic
//! merges, array unions and increments against the stored value, timestamps
//! from an injectable clock, and live snapshots fanned out to subscribers.
//! Used by tests, the simulator, and as the reference for remote adapters.

use async_trait::async_trait;
use chrono::SecondsFormat;
use focus_core::clock::{Clock, SystemClock};
use focus_core::error::{FocusError, Result};
use focus_core::store::{
    Document, DocumentEvent, DocumentStore, DocumentSubscription, FieldValue, Fields, Filter,
};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

type Collection = BTreeMap<String, Map<String, Value>>;
type SubscriberKey = (String, String);

/// Document store held in memory.
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    subscribers: Mutex<HashMap<SubscriberKey, Vec<mpsc::UnboundedSender<DocumentEvent>>>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    writes: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose server timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            clock,
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        }
    }

    /// Simulates losing (or regaining) the connection. While unavailable every
    /// call fails with `FocusError::StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        tracing::debug!("[MemoryStore] available={}", available);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FocusError::store_unavailable("memory store is offline"))
        }
    }

    fn server_time(&self) -> Value {
        Value::String(
            self.clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }

    fn apply_fields(&self, target: &mut Map<String, Value>, fields: Fields) {
        let now = self.server_time();
        for (name, update) in fields {
            let existing = target.remove(&name);
            let resolved = match update {
                FieldValue::Value(value) => value,
                FieldValue::ServerTimestamp => now.clone(),
                FieldValue::ArrayUnion(items) => array_union(existing, items),
                FieldValue::Increment(by) => increment(existing, &by),
            };
            target.insert(name, resolved);
        }
    }

    /// Pushes an event to live subscribers of one document, dropping those
    /// whose receiver is gone.
    fn notify(&self, collection: &str, id: &str, event: DocumentEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (collection.to_string(), id.to_string());
        if let Some(senders) = subscribers.get_mut(&key) {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
            if senders.is_empty() {
                subscribers.remove(&key);
            }
        }
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create_document(&self, collection: &str, fields: Fields) -> Result<String> {
        self.ensure_available()?;
        let id = Uuid::new_v4().to_string();

        let mut stored = Map::new();
        self.apply_fields(&mut stored, fields);

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), stored.clone());
        self.record_write();
        self.notify(
            collection,
            &id,
            DocumentEvent::Snapshot(Document::new(id.clone(), stored)),
        );

        tracing::debug!("[MemoryStore] Created {}/{}", collection, id);
        Ok(id)
    }

    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.ensure_available()?;

        let mut stored = Map::new();
        self.apply_fields(&mut stored, fields);

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), stored.clone());
        self.record_write();
        self.notify(collection, id, DocumentEvent::Snapshot(Document::new(id, stored)));
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.ensure_available()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.ensure_available()?;

        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| FocusError::not_found("Document", format!("{}/{}", collection, id)))?;

        self.apply_fields(stored, fields);
        let snapshot = Document::new(id, stored.clone());
        self.record_write();
        self.notify(collection, id, DocumentEvent::Snapshot(snapshot));
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        self.ensure_available()?;

        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            self.record_write();
            self.notify(collection, id, DocumentEvent::Removed);
            tracing::debug!("[MemoryStore] Deleted {}/{}", collection, id);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        self.ensure_available()?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, fields)| filters.iter().all(|filter| filter.matches(fields)))
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect())
    }

    async fn subscribe(&self, collection: &str, id: &str) -> Result<DocumentSubscription> {
        self.ensure_available()?;
        let (sender, receiver) = mpsc::unbounded_channel();

        // Holding the read lock keeps writers out until the subscriber is
        // registered, so no change slips between snapshot and registration.
        let collections = self.collections.read().await;
        let initial = match collections.get(collection).and_then(|docs| docs.get(id)) {
            Some(fields) => DocumentEvent::Snapshot(Document::new(id, fields.clone())),
            None => DocumentEvent::Removed,
        };
        // Receiver is held locally, the send cannot fail.
        let _ = sender.send(initial);

        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry((collection.to_string(), id.to_string()))
            .or_default()
            .push(sender);
        drop(collections);

        Ok(DocumentSubscription::new(receiver))
    }
}

fn array_union(existing: Option<Value>, items: Vec<Value>) -> Value {
    let mut array = match existing {
        Some(Value::Array(array)) => array,
        _ => Vec::new(),
    };
    for item in items {
        if !array.contains(&item) {
            array.push(item);
        }
    }
    Value::Array(array)
}

/// Integer + integer stays an integer; anything else is summed as f64.
fn increment(existing: Option<Value>, by: &Number) -> Value {
    let current = match existing {
        Some(Value::Number(n)) => n,
        _ => Number::from(0),
    };

    if let (Some(a), Some(b)) = (current.as_u64(), by.as_u64()) {
        if let Some(sum) = a.checked_add(b) {
            return Value::Number(Number::from(sum));
        }
    }
    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Value::Number(Number::from(sum));
        }
    }

    let sum = current.as_f64().unwrap_or(0.0) + by.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .map(Value::Number)
        .unwrap_or(Value::Number(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use focus_core::clock::ManualClock;
    use serde_json::json;

    fn fields(pairs: Vec<(&str, FieldValue)>) -> Fields {
        pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let store = MemoryDocumentStore::new();
        let id = store
            .create_document("things", fields(vec![("name", json!("a").into())]))
            .await
            .unwrap();

        store
            .update_document("things", &id, fields(vec![("size", json!(3).into())]))
            .await
            .unwrap();
        let doc = store.get_document("things", &id).await.unwrap().unwrap();
        assert_eq!(doc.get("name"), Some(&json!("a")));
        assert_eq!(doc.get("size"), Some(&json!(3)));

        store.delete_document("things", &id).await.unwrap();
        assert!(store.get_document("things", &id).await.unwrap().is_none());
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update_document("things", "nope", fields(vec![("a", json!(1).into())]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_timestamp_uses_store_clock() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
        let store = MemoryDocumentStore::with_clock(clock);
        let id = store
            .create_document("things", fields(vec![("at", FieldValue::ServerTimestamp)]))
            .await
            .unwrap();

        let doc = store.get_document("things", &id).await.unwrap().unwrap();
        assert_eq!(doc.get("at"), Some(&json!("2024-05-01T09:00:00.000Z")));
    }

    #[tokio::test]
    async fn test_array_union_keeps_existing_and_skips_duplicates() {
        let store = MemoryDocumentStore::new();
        let id = store
            .create_document("things", fields(vec![("tags", json!(["a"]).into())]))
            .await
            .unwrap();

        store
            .append_to_array_field("things", &id, "tags", json!("b"))
            .await
            .unwrap();
        store
            .append_to_array_field("things", &id, "tags", json!("a"))
            .await
            .unwrap();

        let doc = store.get_document("things", &id).await.unwrap().unwrap();
        assert_eq!(doc.get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_increment_preserves_integers() {
        assert_eq!(increment(Some(json!(5)), &Number::from(3)), json!(8));
        assert_eq!(increment(None, &Number::from(3)), json!(3));
        assert_eq!(increment(Some(json!(-2)), &Number::from(1)), json!(-1));

        let hours = increment(Some(json!(0.0)), &Number::from_f64(0.5).unwrap());
        assert_eq!(hours.as_f64(), Some(0.5));
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = MemoryDocumentStore::new();
        store
            .create_document(
                "things",
                fields(vec![("kind", json!("x").into()), ("tags", json!(["red"]).into())]),
            )
            .await
            .unwrap();
        store
            .create_document("things", fields(vec![("kind", json!("y").into())]))
            .await
            .unwrap();

        let xs = store
            .query("things", &[Filter::eq("kind", "x")])
            .await
            .unwrap();
        assert_eq!(xs.len(), 1);

        let red = store
            .query("things", &[Filter::array_contains("tags", "red")])
            .await
            .unwrap();
        assert_eq!(red.len(), 1);

        let none = store.query("missing", &[]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_subscription_receives_snapshots_then_removal() {
        let store = MemoryDocumentStore::new();
        let id = store
            .create_document("things", fields(vec![("n", json!(1).into())]))
            .await
            .unwrap();

        let mut sub = store.subscribe("things", &id).await.unwrap();
        match sub.next().await.unwrap() {
            DocumentEvent::Snapshot(doc) => assert_eq!(doc.get("n"), Some(&json!(1))),
            other => panic!("unexpected {other:?}"),
        }

        store
            .update_document("things", &id, fields(vec![("n", json!(2).into())]))
            .await
            .unwrap();
        match sub.next().await.unwrap() {
            DocumentEvent::Snapshot(doc) => assert_eq!(doc.get("n"), Some(&json!(2))),
            other => panic!("unexpected {other:?}"),
        }

        store.delete_document("things", &id).await.unwrap();
        assert_eq!(sub.next().await.unwrap(), DocumentEvent::Removed);
    }

    #[tokio::test]
    async fn test_subscribe_to_missing_document_reports_removed() {
        let store = MemoryDocumentStore::new();
        let mut sub = store.subscribe("things", "ghost").await.unwrap();
        assert_eq!(sub.next().await.unwrap(), DocumentEvent::Removed);
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let store = MemoryDocumentStore::new();
        store.set_available(false);

        let err = store.get_document("things", "a").await.unwrap_err();
        assert!(err.is_store_unavailable());
        let err = store.create_document("things", Fields::new()).await.unwrap_err();
        assert!(err.is_store_unavailable());

        store.set_available(true);
        assert!(store.get_document("things", "a").await.unwrap().is_none());
    }
}
