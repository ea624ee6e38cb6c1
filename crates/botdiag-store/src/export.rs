//! Export of store documents into a directory tree.
//!
//! ```text
//! <dest>/<sanitized bot name>/bot.json
//! <dest>/<sanitized bot name>/<integration number>.json
//! <dest>/settings.json
//! <dest>/versions.json
//! ```

use std::path::{Path, PathBuf};

use botdiag_core::Journal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::DEFAULT_RECORDS_PER_ENTITY;
use crate::error::{StoreError, StoreResult};
use crate::sanitize::sanitize_name;
use crate::source::DocumentSource;
use crate::types::SingletonView;

/// File holding an entity's own document.
pub const ENTITY_FILE: &str = "bot.json";

/// Counts of exported documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub entities: usize,
    pub records: usize,
    pub singletons: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Export every document `source` yields into `dest_root`.
///
/// Only failing to create `dest_root` is an error; individual documents
/// that cannot be placed or written are journaled and skipped.
pub async fn export_all<S: DocumentSource + ?Sized>(
    source: &S,
    dest_root: &Path,
    journal: &Journal,
) -> StoreResult<ExportReport> {
    tokio::fs::create_dir_all(dest_root)
        .await
        .map_err(|source| StoreError::Write {
            path: dest_root.to_path_buf(),
            source,
        })?;

    let mut report = ExportReport::default();

    for entity in source.list_entities().await {
        let Some(name) = entity.name() else {
            journal.warn(format!("bot {} has no name, not exported", entity.id));
            report.skipped += 1;
            continue;
        };
        let path = dest_root.join(sanitize_name(name)).join(ENTITY_FILE);
        if record_write(journal, &path, &entity.document).await {
            report.entities += 1;
        } else {
            report.failed += 1;
        }
    }

    for id in source.list_entity_ids().await {
        let records = source
            .last_records_for_entity(&id, DEFAULT_RECORDS_PER_ENTITY)
            .await;
        debug!(entity = %id, records = records.len(), "exporting records");

        for record in records {
            let (Some(owner), Some(number)) = (record.owner_entity_name(), record.number()) else {
                journal.warn(format!(
                    "integration of bot {} lacks bot.name or number, not exported",
                    id
                ));
                report.skipped += 1;
                continue;
            };
            let path = dest_root
                .join(sanitize_name(owner))
                .join(format!("{}.json", number));
            if record_write(journal, &path, &record.document).await {
                report.records += 1;
            } else {
                report.failed += 1;
            }
        }
    }

    for which in [SingletonView::Settings, SingletonView::Versions] {
        let Some(document) = source.singleton_document(which).await else {
            debug!(file = which.file_name(), "singleton absent");
            continue;
        };
        if record_write(journal, &dest_root.join(which.file_name()), &document).await {
            report.singletons += 1;
        } else {
            report.failed += 1;
        }
    }

    info!(
        entities = report.entities,
        records = report.records,
        singletons = report.singletons,
        failed = report.failed,
        "database export finished"
    );
    journal.info(format!(
        "exported {} bots, {} integrations, {} singletons ({} skipped, {} failed)",
        report.entities, report.records, report.singletons, report.skipped, report.failed
    ));
    Ok(report)
}

async fn record_write(journal: &Journal, path: &Path, document: &Value) -> bool {
    match write_json(path, document).await {
        Ok(()) => true,
        Err(err) => {
            journal.warn(err.to_string());
            false
        }
    }
}

/// Overwrite `path` with the compact serialization of `document`.
pub async fn write_json(path: &Path, document: &Value) -> StoreResult<()> {
    let write_err = |source: std::io::Error| StoreError::Write {
        path: PathBuf::from(path),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let bytes = serde_json::to_vec(document).map_err(|e| write_err(e.into()))?;
    tokio::fs::write(path, bytes).await.map_err(write_err)
}
