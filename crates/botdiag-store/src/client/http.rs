//! HTTP layer: the single place that sends requests and maps status codes.
//!
//! Every call is attempted exactly once.

use reqwest::StatusCode;
use tracing::debug;

use crate::auth::Credentials;
use crate::error::{StoreError, StoreResult};
use crate::types::{ViewPath, ViewResponse};

use super::helpers::{view_path, view_url};

/// Holds the reqwest client, credentials and addressing.
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) database: String,
    pub(crate) credentials: Credentials,
}

impl HttpBackend {
    /// GET a view and decode its rows.
    pub(crate) async fn get_view(
        &self,
        view: &ViewPath,
        query: &[(&'static str, String)],
    ) -> StoreResult<ViewResponse> {
        let url = view_url(&self.base_url, &self.database, view);
        debug!(url = %url, params = query.len(), "querying view");

        let request = self.credentials.apply(self.client.get(&url).query(query));
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(self.status_error(view, status, response).await);
        }

        let body = response.text().await.map_err(|source| StoreError::Network {
            context: "failed to read response body".to_string(),
            source,
        })?;

        serde_json::from_str(&body).map_err(|e| StoreError::InvalidResponse {
            message: format!("{} is not a view response: {}", view_path(&self.database, view), e),
        })
    }

    async fn status_error(
        &self,
        view: &ViewPath,
        status: StatusCode,
        response: reqwest::Response,
    ) -> StoreError {
        let body = response.text().await.unwrap_or_default();
        StoreError::Status {
            method: "GET".to_string(),
            path: view_path(&self.database, view),
            status: status.as_u16(),
            body: body.trim().to_string(),
        }
    }
}
