//! Document-store client for the view API.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.
//! Every query first yields a [`ViewOutcome`]; the public methods turn a
//! failure into an empty result only after recording it in the journal.

use std::time::Duration;

use botdiag_core::Journal;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::auth::Credentials;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    Entity, Record, SingletonView, StoreConfig, ViewPath, ViewResponse, ViewRow,
};

mod helpers;
mod http;

use helpers::{include_docs, last_records_query};
use http::HttpBackend;

const USER_AGENT_VALUE: &str = concat!("botdiag/", env!("CARGO_PKG_VERSION"));

/// Records fetched per entity when the caller has no preference.
pub const DEFAULT_RECORDS_PER_ENTITY: usize = 2;

/// Result of one view query.
#[derive(Debug)]
pub enum ViewOutcome {
    Rows(Vec<ViewRow>),
    Empty,
    Failed(StoreError),
}

impl ViewOutcome {
    fn from_result(result: StoreResult<ViewResponse>) -> Self {
        match result {
            Ok(response) if response.rows.is_empty() => Self::Empty,
            Ok(response) => Self::Rows(response.rows),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Authenticated client for the document store.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: HttpBackend,
    config: StoreConfig,
    journal: Journal,
}

impl StoreClient {
    /// Build a client; basic auth is used when the config carries a password.
    pub fn new(config: StoreConfig, journal: Journal) -> StoreResult<Self> {
        let credentials = match &config.password {
            Some(password) => Credentials::basic(config.username.clone(), password.clone()),
            None => Credentials::None,
        };
        Self::with_credentials(config, credentials, journal)
    }

    pub fn with_credentials(
        config: StoreConfig,
        credentials: Credentials,
        journal: Journal,
    ) -> StoreResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| StoreError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        debug!(
            url = %config.url,
            authenticated = credentials.is_authenticated(),
            "store client ready"
        );

        Ok(Self {
            http: HttpBackend {
                client,
                base_url: config.url.trim_end_matches('/').to_string(),
                database: config.database.clone(),
                credentials,
            },
            config,
            journal,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }

    /// Run a view query without interpreting failures.
    pub async fn query(&self, view: &ViewPath, params: &[(&'static str, String)]) -> ViewOutcome {
        ViewOutcome::from_result(self.http.get_view(view, params).await)
    }

    /// Ids of all entities.
    pub async fn list_entity_ids(&self) -> Vec<String> {
        let view = &self.config.views.entities;
        let rows = self.rows_or_empty("list entity ids", self.query(view, &[]).await);
        rows.into_iter().filter_map(|row| row.id).collect()
    }

    /// All entities with their full documents.
    pub async fn list_entities(&self) -> Vec<Entity> {
        let view = &self.config.views.entities;
        let rows = self.rows_or_empty("list entities", self.query(view, &include_docs()).await);
        rows.into_iter()
            .filter_map(|row| match (row.id, row.doc) {
                (Some(id), Some(document)) => Some(Entity { id, document }),
                (id, _) => {
                    debug!(id = ?id, "entity row without document");
                    None
                }
            })
            .collect()
    }

    /// The newest `limit` records of one entity, newest first.
    pub async fn last_records_for_entity(&self, entity_id: &str, limit: usize) -> Vec<Record> {
        let view = &self.config.views.records_by_entity;
        let outcome = self
            .query(view, &last_records_query(entity_id, limit))
            .await;
        let rows = self.rows_or_empty(&format!("last records of {}", entity_id), outcome);
        rows.into_iter()
            .filter_map(|row| row.doc)
            .map(|document| Record { document })
            .collect()
    }

    /// First document of a single-document view.
    pub async fn singleton_document(&self, which: SingletonView) -> Option<Value> {
        let view = match which {
            SingletonView::Settings => &self.config.views.settings,
            SingletonView::Versions => &self.config.views.versions,
        };
        let rows = self.rows_or_empty(which.file_name(), self.query(view, &include_docs()).await);
        rows.into_iter().next().and_then(|row| row.doc)
    }

    fn rows_or_empty(&self, what: &str, outcome: ViewOutcome) -> Vec<ViewRow> {
        match outcome {
            ViewOutcome::Rows(rows) => rows,
            ViewOutcome::Empty => {
                debug!(query = what, "view returned no rows");
                Vec::new()
            }
            ViewOutcome::Failed(err @ StoreError::Status { .. }) => {
                self.journal.warn(format!("store query '{}' failed: {}", what, err));
                Vec::new()
            }
            ViewOutcome::Failed(err) => {
                self.journal.error(&format!("store query '{}'", what), &err);
                Vec::new()
            }
        }
    }
}
