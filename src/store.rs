use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// How a single write applies to the target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the document's fields wholesale, creating it if absent.
    Set,
    /// Overlay the given top-level fields, creating the document if absent.
    Merge,
    /// Overlay the given top-level fields; fails if the document is absent.
    Update,
}

#[derive(Debug, Clone)]
pub struct WriteOp {
    pub collection: String,
    pub id: String,
    pub fields: Value,
    pub mode: WriteMode,
}

impl WriteOp {
    pub fn set(collection: &str, id: impl Into<String>, fields: Value) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.into(),
            fields,
            mode: WriteMode::Set,
        }
    }

    pub fn merge(collection: &str, id: impl Into<String>, fields: Value) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.into(),
            fields,
            mode: WriteMode::Merge,
        }
    }

    pub fn update(collection: &str, id: impl Into<String>, fields: Value) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.into(),
            fields,
            mode: WriteMode::Update,
        }
    }
}

/// One document returned from an indexed query.
#[derive(Debug, Clone)]
pub struct DocMatch {
    pub id: String,
    pub fields: Value,
}

/// Abstract document store: keyed get, single-field indexed query, and an
/// atomic multi-document batch commit. Callers choose document ids, so
/// deterministic and generated ids both go through the same path.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: i64,
    ) -> Result<Vec<DocMatch>>;

    /// Applies all operations in order as one all-or-nothing commit.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()>;
}

#[cfg(test)]
pub mod memory {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use serde_json::Value;

    use super::{DocMatch, DocumentStore, WriteMode, WriteOp};

    type Collections = HashMap<String, BTreeMap<String, Value>>;

    /// In-memory stand-in for the production store, with the same merge and
    /// atomicity semantics.
    #[derive(Default)]
    pub struct MemoryStore {
        collections: Mutex<Collections>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
            let collections = self.collections.lock().unwrap();
            collections
                .get(collection)
                .and_then(|docs| docs.get(id))
                .cloned()
        }

        pub fn collection_len(&self, collection: &str) -> usize {
            let collections = self.collections.lock().unwrap();
            collections.get(collection).map_or(0, |docs| docs.len())
        }

        pub fn collection_ids(&self, collection: &str) -> Vec<String> {
            let collections = self.collections.lock().unwrap();
            collections
                .get(collection)
                .map(|docs| docs.keys().cloned().collect())
                .unwrap_or_default()
        }

        fn overlay(target: &mut Value, fields: &Value) {
            if let (Some(doc), Some(incoming)) = (target.as_object_mut(), fields.as_object()) {
                for (key, value) in incoming {
                    doc.insert(key.clone(), value.clone());
                }
            } else {
                *target = fields.clone();
            }
        }
    }

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
            Ok(self.document(collection, id))
        }

        async fn query_by_field(
            &self,
            collection: &str,
            field: &str,
            value: &str,
            limit: i64,
        ) -> Result<Vec<DocMatch>> {
            let collections = self.collections.lock().unwrap();
            let Some(docs) = collections.get(collection) else {
                return Ok(Vec::new());
            };
            let matches = docs
                .iter()
                .filter(|(_, fields)| fields.get(field).and_then(Value::as_str) == Some(value))
                .take(limit.max(0) as usize)
                .map(|(id, fields)| DocMatch {
                    id: id.clone(),
                    fields: fields.clone(),
                })
                .collect();
            Ok(matches)
        }

        async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
            let mut collections = self.collections.lock().unwrap();
            // Stage on a copy so a failing op leaves nothing applied.
            let mut staged = collections.clone();
            for op in &ops {
                let docs = staged.entry(op.collection.clone()).or_default();
                match op.mode {
                    WriteMode::Set => {
                        docs.insert(op.id.clone(), op.fields.clone());
                    }
                    WriteMode::Merge => {
                        let target = docs
                            .entry(op.id.clone())
                            .or_insert_with(|| Value::Object(Default::default()));
                        Self::overlay(target, &op.fields);
                    }
                    WriteMode::Update => {
                        let Some(target) = docs.get_mut(&op.id) else {
                            bail!("document {}/{} does not exist", op.collection, op.id);
                        };
                        Self::overlay(target, &op.fields);
                    }
                }
            }
            *collections = staged;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::memory::MemoryStore;
    use super::*;

    #[tokio::test]
    async fn set_replaces_and_merge_overlays() {
        let store = MemoryStore::new();
        store
            .batch_write(vec![WriteOp::set(
                "drivers",
                "A1",
                json!({"transporterId": "A1", "driverName": "Alice"}),
            )])
            .await
            .unwrap();

        store
            .batch_write(vec![WriteOp::merge(
                "drivers",
                "A1",
                json!({"currentScore": 91.0}),
            )])
            .await
            .unwrap();

        let doc = store.get("drivers", "A1").await.unwrap().unwrap();
        assert_eq!(doc["driverName"], json!("Alice"));
        assert_eq!(doc["currentScore"], json!(91.0));

        store
            .batch_write(vec![WriteOp::set("drivers", "A1", json!({"transporterId": "A1"}))])
            .await
            .unwrap();
        let doc = store.get("drivers", "A1").await.unwrap().unwrap();
        assert!(doc.get("driverName").is_none());
    }

    #[tokio::test]
    async fn merge_creates_missing_documents() {
        let store = MemoryStore::new();
        store
            .batch_write(vec![WriteOp::merge("reports", "DXY1_2024-W12", json!({"status": "processing"}))])
            .await
            .unwrap();
        assert!(store.get("reports", "DXY1_2024-W12").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let store = MemoryStore::new();
        let result = store
            .batch_write(vec![WriteOp::update("scores", "missing", json!({"driverName": "Bob"}))])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failed_batch_applies_nothing() {
        let store = MemoryStore::new();
        let result = store
            .batch_write(vec![
                WriteOp::set("drivers", "A1", json!({"transporterId": "A1"})),
                WriteOp::update("scores", "missing", json!({"driverName": "Bob"})),
            ])
            .await;
        assert!(result.is_err());
        assert!(store.get("drivers", "A1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_by_field_honors_limit() {
        let store = MemoryStore::new();
        store
            .batch_write(vec![
                WriteOp::set("scores", "r_A1", json!({"transporterId": "A1"})),
                WriteOp::set("scores", "s_A1", json!({"transporterId": "A1"})),
                WriteOp::set("scores", "r_B2", json!({"transporterId": "B2"})),
            ])
            .await
            .unwrap();

        let all = store.query_by_field("scores", "transporterId", "A1", 10).await.unwrap();
        assert_eq!(all.len(), 2);
        let one = store.query_by_field("scores", "transporterId", "A1", 1).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn caller_generated_ids_round_trip() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4().to_string();
        store
            .batch_write(vec![WriteOp::set("drivers", id.clone(), json!({"transporterId": "A1"}))])
            .await
            .unwrap();
        assert!(store.get("drivers", &id).await.unwrap().is_some());
    }
}
