//! Configuration and wire types for the document-store view API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A `_design/<design>/_view/<view>` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPath {
    pub design: String,
    pub view: String,
}

impl ViewPath {
    pub fn new(design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            design: design.into(),
            view: view.into(),
        }
    }

    /// Path relative to the database, e.g. `_design/bot/_view/all-bots`.
    pub fn relative(&self) -> String {
        format!("_design/{}/_view/{}", self.design, self.view)
    }
}

/// The views the exporter reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreViews {
    /// All bots, keyed by id.
    #[serde(default = "default_entities_view")]
    pub entities: ViewPath,

    /// Integrations keyed by `[bot_id, number]`.
    #[serde(default = "default_records_view")]
    pub records_by_entity: ViewPath,

    #[serde(default = "default_settings_view")]
    pub settings: ViewPath,

    #[serde(default = "default_versions_view")]
    pub versions: ViewPath,
}

fn default_entities_view() -> ViewPath {
    ViewPath::new("bot", "all-bots")
}

fn default_records_view() -> ViewPath {
    ViewPath::new("integration", "integrations-by-bot")
}

fn default_settings_view() -> ViewPath {
    ViewPath::new("settings", "all-settings")
}

fn default_versions_view() -> ViewPath {
    ViewPath::new("version", "all-versions")
}

impl Default for StoreViews {
    fn default() -> Self {
        Self {
            entities: default_entities_view(),
            records_by_entity: default_records_view(),
            settings: default_settings_view(),
            versions: default_versions_view(),
        }
    }
}

/// Document-store configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the database server.
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,

    /// Basic-auth user.
    #[serde(default = "default_username")]
    pub username: String,

    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub views: StoreViews,
}

fn default_store_url() -> String {
    "http://127.0.0.1:10375".to_string()
}

fn default_database() -> String {
    "xcs".to_string()
}

fn default_username() -> String {
    "xcscouch".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            database: default_database(),
            username: default_username(),
            password: None,
            timeout_secs: default_timeout(),
            views: StoreViews::default(),
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("views", &self.views)
            .finish()
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `BOTDIAG_STORE_URL` | Server base URL |
    /// | `BOTDIAG_STORE_DATABASE` | Database name |
    /// | `BOTDIAG_STORE_USERNAME` | Basic-auth user |
    /// | `BOTDIAG_STORE_PASSWORD` | Basic-auth password |
    /// | `BOTDIAG_STORE_TIMEOUT` | Request timeout in seconds |
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Overlay any `BOTDIAG_STORE_*` variables onto `self`.
    pub fn merge_env(mut self) -> Self {
        if let Ok(url) = std::env::var("BOTDIAG_STORE_URL") {
            self.url = url;
        }
        if let Ok(database) = std::env::var("BOTDIAG_STORE_DATABASE") {
            self.database = database;
        }
        if let Ok(username) = std::env::var("BOTDIAG_STORE_USERNAME") {
            self.username = username;
        }
        if let Ok(password) = std::env::var("BOTDIAG_STORE_PASSWORD") {
            if !password.is_empty() {
                self.password = Some(password);
            }
        }
        if let Some(timeout) = std::env::var("BOTDIAG_STORE_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.timeout_secs = timeout;
        }
        self
    }

    /// Set the base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Response of a view query.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewResponse {
    #[serde(default)]
    pub total_rows: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    pub rows: Vec<ViewRow>,
}

/// One row of a view response.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    /// Present when queried with `include_docs=true`.
    #[serde(default)]
    pub doc: Option<Value>,
}

/// A bot document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub document: Value,
}

impl Entity {
    /// The bot's display name (`document.name`).
    pub fn name(&self) -> Option<&str> {
        self.document.get("name").and_then(Value::as_str)
    }
}

/// An integration document.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub document: Value,
}

impl Record {
    /// Name of the owning bot as embedded in the record (`document.bot.name`).
    pub fn owner_entity_name(&self) -> Option<&str> {
        self.document
            .get("bot")
            .and_then(|bot| bot.get("name"))
            .and_then(Value::as_str)
    }

    /// Integration number (`document.number`).
    pub fn number(&self) -> Option<i64> {
        self.document.get("number").and_then(Value::as_i64)
    }
}

/// Views that hold a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingletonView {
    Settings,
    Versions,
}

impl SingletonView {
    /// Output file name for the exported document.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Settings => "settings.json",
            Self::Versions => "versions.json",
        }
    }
}
