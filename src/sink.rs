use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Local, NaiveDate};

use crate::model::ProductRecord;
use crate::storage::BlobStore;

const JSON_CONTENT_TYPE: &str = "application/json";

pub fn collection_key(date: NaiveDate) -> String {
    format!("vinted_products_{}.json", date.format("%Y%m%d"))
}

pub fn product_dump_key(at: DateTime<Local>) -> String {
    format!("products/product_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Persists records as pretty-printed JSON.
///
/// Appending is read-modify-write of the whole collection with no locking:
/// two writers on the same key lose updates (last write wins).
#[derive(Clone)]
pub struct ResultSink {
    store: Arc<dyn BlobStore>,
}

impl ResultSink {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub async fn append(&self, collection_key: &str, record: &ProductRecord) -> anyhow::Result<()> {
        let mut entries = self.read_collection(collection_key).await;
        entries.push(serde_json::to_value(record).context("serialize product record")?);

        let json = serde_json::to_vec_pretty(&entries).context("serialize collection")?;
        self.store
            .put(collection_key, json, JSON_CONTENT_TYPE)
            .await
            .with_context(|| format!("write collection {}", self.store.uri(collection_key)))?;

        tracing::info!(
            uri = %self.store.uri(collection_key),
            records = entries.len(),
            "appended record"
        );
        Ok(())
    }

    /// Existing entries, or empty when the collection is absent, unreadable or malformed.
    pub async fn read_collection(&self, collection_key: &str) -> Vec<serde_json::Value> {
        let bytes = match self.store.get(collection_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(key = collection_key, ?err, "read collection failed; starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice::<Vec<serde_json::Value>>(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(key = collection_key, %err, "collection is not a json array; starting empty");
                Vec::new()
            }
        }
    }

    /// Writes `record` alone under a timestamped key. Failures are returned.
    pub async fn save_product(&self, record: &ProductRecord) -> anyhow::Result<String> {
        let key = product_dump_key(Local::now());
        let json = serde_json::to_vec_pretty(record).context("serialize product record")?;
        self.store
            .put(&key, json, JSON_CONTENT_TYPE)
            .await
            .with_context(|| format!("save product {}", record.id))?;
        tracing::info!(uri = %self.store.uri(&key), "saved product");
        Ok(key)
    }
}
