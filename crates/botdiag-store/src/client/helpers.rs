//! Pure helpers: view URLs and query parameters (no HTTP, no status logic).

use serde_json::json;

use crate::types::ViewPath;

/// Query parameter list as sent on the wire.
pub(crate) type Query = Vec<(&'static str, String)>;

/// Full URL of a view: `{base}/{database}/_design/{design}/_view/{view}`.
pub(crate) fn view_url(base_url: &str, database: &str, view: &ViewPath) -> String {
    format!("{}{}", base_url, view_path(database, view))
}

/// Server-relative path of a view, used in error reports.
pub(crate) fn view_path(database: &str, view: &ViewPath) -> String {
    format!("/{}/{}", database.trim_matches('/'), view.relative())
}

pub(crate) fn include_docs() -> Query {
    vec![("include_docs", "true".to_string())]
}

/// Newest-first records keyed `[entity_id, number]`.
///
/// `startkey` sorts after every key of the entity (`{}` collates last) and
/// `endkey` before all of them, so a descending scan walks one entity only.
pub(crate) fn last_records_query(entity_id: &str, limit: usize) -> Query {
    vec![
        ("startkey", json!([entity_id, {}]).to_string()),
        ("endkey", json!([entity_id]).to_string()),
        ("descending", "true".to_string()),
        ("limit", limit.to_string()),
        ("include_docs", "true".to_string()),
        ("reduce", "false".to_string()),
    ]
}
