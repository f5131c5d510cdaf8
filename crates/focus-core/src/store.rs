//! Document store abstraction.
//!
//! The engine never talks to a concrete database. It issues requests through
//! [`DocumentStore`], which models a real-time document database offering
//! atomic per-document field merges, additive array unions, store-assigned
//! timestamps and live subscriptions.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// A document as returned by the store: its id plus the stored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Deserializes the stored fields into a model type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// A single field write. Values other than [`FieldValue::Value`] are resolved
/// by the store at write time.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain overwrite of the field.
    Value(Value),
    /// Store-assigned write time, not the caller's clock.
    ServerTimestamp,
    /// Append elements not already present; concurrent unions all survive.
    ArrayUnion(Vec<Value>),
    /// Numeric increment; an absent field counts as zero.
    Increment(Number),
}

impl FieldValue {
    /// Serializes any value into a plain overwrite.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }

    pub fn increment_u64(by: u64) -> Self {
        Self::Increment(Number::from(by))
    }

    pub fn increment_f64(by: f64) -> Self {
        Self::Increment(Number::from_f64(by).unwrap_or_else(|| Number::from(0)))
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Field writes keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Query predicate over a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value.
    Eq(String, Value),
    /// Field equals any of the values.
    In(String, Vec<Value>),
    /// Array field contains the value.
    ArrayContains(String, Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In(field.into(), values)
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains(field.into(), value.into())
    }

    /// Evaluates the predicate against stored fields.
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        match self {
            Filter::Eq(field, value) => fields.get(field) == Some(value),
            Filter::In(field, values) => fields
                .get(field)
                .is_some_and(|current| values.contains(current)),
            Filter::ArrayContains(field, value) => fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// Change pushed to a live subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    /// Full current document, sent on subscribe and after every change.
    Snapshot(Document),
    /// The document was deleted (or never existed).
    Removed,
}

/// Receiving end of a live document subscription.
///
/// Dropping it unsubscribes; the store prunes closed subscribers on its next
/// write to the document.
#[derive(Debug)]
pub struct DocumentSubscription {
    receiver: mpsc::UnboundedReceiver<DocumentEvent>,
}

impl DocumentSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<DocumentEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next change. Returns `None` once the store drops the
    /// subscription.
    pub async fn next(&mut self) -> Option<DocumentEvent> {
        self.receiver.recv().await
    }

    /// Returns a pending change without waiting.
    pub fn try_next(&mut self) -> Option<DocumentEvent> {
        self.receiver.try_recv().ok()
    }
}

/// An abstract document store backing sessions and user profiles.
///
/// # Implementation Notes
///
/// Implementations must guarantee:
/// - every `update_document` call lands atomically (all fields or none)
/// - `ArrayUnion` and `Increment` are applied against the current stored value,
///   so concurrent writers do not clobber each other
/// - `ServerTimestamp` is resolved from the store's clock
///
/// Transport failures surface as `FocusError::StoreUnavailable`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document with a store-allocated id.
    async fn create_document(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Creates or replaces the document with the given id.
    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Reads a document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Document))`: Document found
    /// - `Ok(None)`: Document does not exist
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Merges fields into an existing document.
    ///
    /// # Errors
    ///
    /// `FocusError::NotFound` if the document does not exist.
    async fn update_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<()>;

    /// Appends an element to an array field with union semantics.
    async fn append_to_array_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        element: Value,
    ) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert(field.to_string(), FieldValue::ArrayUnion(vec![element]));
        self.update_document(collection, id, fields).await
    }

    /// Lists documents matching every filter.
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>>;

    /// Subscribes to live changes of one document.
    async fn subscribe(&self, collection: &str, id: &str) -> Result<DocumentSubscription>;
}
