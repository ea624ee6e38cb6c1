//! The read interface the exporter needs from a document store.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::StoreClient;
use crate::types::{Entity, Record, SingletonView};

/// Source of entity, record and singleton documents.
///
/// Implementations never fail: an unavailable document is an empty result.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_entity_ids(&self) -> Vec<String>;

    async fn list_entities(&self) -> Vec<Entity>;

    async fn last_records_for_entity(&self, entity_id: &str, limit: usize) -> Vec<Record>;

    async fn singleton_document(&self, which: SingletonView) -> Option<Value>;
}

#[async_trait]
impl DocumentSource for StoreClient {
    async fn list_entity_ids(&self) -> Vec<String> {
        StoreClient::list_entity_ids(self).await
    }

    async fn list_entities(&self) -> Vec<Entity> {
        StoreClient::list_entities(self).await
    }

    async fn last_records_for_entity(&self, entity_id: &str, limit: usize) -> Vec<Record> {
        StoreClient::last_records_for_entity(self, entity_id, limit).await
    }

    async fn singleton_document(&self, which: SingletonView) -> Option<Value> {
        StoreClient::singleton_document(self, which).await
    }
}
