//! `botdiag collect`: run every collection phase into a fresh staging
//! directory and package it.
//!
//! A failing phase is journaled and the run moves on; only a configuration
//! error stops the run before anything is collected, and the archive is
//! attempted whatever the phases did.

use std::path::Path;

use anyhow::Context;
use botdiag_core::{
    archive_name, archive_staging_root, copy_recent, select_and_extract, CollectError,
    CommandRunner, Journal, JournalLevel, RetentionPolicy,
};
use botdiag_store::{export_all, StoreClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::super::args::CollectArgs;
use crate::config::CollectConfig;
use crate::exit_codes::{EXIT_ARCHIVE_FAILED, EXIT_SUCCESS};
use crate::probes::run_probes;

pub const ARCHIVE_PREFIX: &str = "botdiag";

pub const COMMANDS_DIR: &str = "commands";
pub const LOGS_DIR: &str = "logs";
pub const ASSETS_DIR: &str = "assets";
pub const DATABASE_DIR: &str = "database";
pub const COLLECTOR_LOG: &str = "collector.log";
pub const ERRORS_LOG: &str = "errors.log";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum PhaseStatus {
    Ok,
    Skipped,
    Failed,
}

#[derive(Debug, Serialize)]
struct PhaseRecord {
    name: &'static str,
    status: PhaseStatus,
    #[serde(skip_serializing_if = "Value::is_null")]
    detail: Value,
}

enum PhaseOutcome {
    Done(Value),
    Skipped(String),
}

#[derive(Serialize)]
struct RunSummary<'a> {
    tool_version: &'static str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    archive: &'a str,
    retention: RetentionPolicy,
    phases: &'a [PhaseRecord],
    warnings: usize,
    errors: usize,
}

pub async fn run(args: CollectArgs) -> anyhow::Result<i32> {
    let config = CollectConfig::resolve(&args).context("configuration error")?;

    let started_at = Utc::now();
    let name = archive_name(ARCHIVE_PREFIX, started_at);
    let staging = tempfile::Builder::new()
        .prefix("botdiag-staging-")
        .tempdir()
        .context("failed to create staging directory")?;
    let root = staging.path();
    let journal = Journal::with_error_log(root.join(ERRORS_LOG));
    journal.info(format!(
        "botdiag {} collecting {} into {}",
        env!("CARGO_PKG_VERSION"),
        name,
        root.display()
    ));

    let mut phases = Vec::new();

    let outcome = if args.skip_commands {
        Ok(PhaseOutcome::Skipped("--skip-commands".to_string()))
    } else {
        collect_commands(&config, root, &journal).await
    };
    phases.push(record("commands", outcome, &journal));

    phases.push(record("logs", collect_logs(&config, root, &journal), &journal));
    phases.push(record("assets", collect_assets(&config, root, &journal), &journal));

    let outcome = if args.skip_database {
        Ok(PhaseOutcome::Skipped("--skip-database".to_string()))
    } else {
        collect_database(&config, root, &journal).await
    };
    phases.push(record("database", outcome, &journal));

    let summary = RunSummary {
        tool_version: env!("CARGO_PKG_VERSION"),
        started_at,
        finished_at: Utc::now(),
        archive: &name,
        retention: config.retention_policy(),
        phases: &phases,
        warnings: journal.count(JournalLevel::Warn),
        errors: journal.count(JournalLevel::Error),
    };
    write_run_files(root, &summary, &journal);

    let code = match archive_staging_root(root, &args.output, &name) {
        Ok(path) => {
            info!(archive = %path.display(), "archive written");
            println!("{}", path.display());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to write archive: {e}");
            EXIT_ARCHIVE_FAILED
        }
    };

    if args.keep_staging {
        #[allow(deprecated)]
        let kept = staging.into_path();
        eprintln!("staging directory kept at {}", kept.display());
    }
    Ok(code)
}

fn record(
    name: &'static str,
    outcome: anyhow::Result<PhaseOutcome>,
    journal: &Journal,
) -> PhaseRecord {
    match outcome {
        Ok(PhaseOutcome::Done(detail)) => PhaseRecord {
            name,
            status: PhaseStatus::Ok,
            detail,
        },
        Ok(PhaseOutcome::Skipped(reason)) => {
            journal.info(format!("{name}: skipped ({reason})"));
            PhaseRecord {
                name,
                status: PhaseStatus::Skipped,
                detail: json!({ "reason": reason }),
            }
        }
        Err(err) => {
            let source: &(dyn std::error::Error + 'static) = err.as_ref();
            journal.error(&format!("{name} phase failed"), source);
            PhaseRecord {
                name,
                status: PhaseStatus::Failed,
                detail: json!({ "error": format!("{err:#}") }),
            }
        }
    }
}

async fn collect_commands(
    config: &CollectConfig,
    root: &Path,
    journal: &Journal,
) -> anyhow::Result<PhaseOutcome> {
    let runner = CommandRunner::new(config.command_timeout());
    let report = run_probes(&config.commands, &runner, &root.join(COMMANDS_DIR), journal).await?;
    Ok(PhaseOutcome::Done(serde_json::to_value(report)?))
}

fn collect_logs(
    config: &CollectConfig,
    root: &Path,
    journal: &Journal,
) -> anyhow::Result<PhaseOutcome> {
    let mut detail = serde_json::Map::new();
    for log_root in &config.log_roots {
        if !log_root.path.is_dir() {
            journal.warn(format!(
                "log root {} ({}) not found, skipped",
                log_root.label,
                log_root.path.display()
            ));
            detail.insert(log_root.label.clone(), json!({ "missing": true }));
            continue;
        }

        let dest = root.join(LOGS_DIR).join(&log_root.label);
        std::fs::create_dir_all(&dest)
            .with_context(|| format!("failed to create {}", dest.display()))?;
        let max_age = config.max_age_for(log_root);
        match copy_recent(&log_root.path, &dest, max_age, journal) {
            Ok(report) => {
                detail.insert(log_root.label.clone(), serde_json::to_value(report)?);
            }
            Err(e) => {
                journal.warn(format!("log root {}: {}", log_root.label, e));
                detail.insert(log_root.label.clone(), json!({ "error": e.to_string() }));
            }
        }
    }
    Ok(PhaseOutcome::Done(Value::Object(detail)))
}

fn collect_assets(
    config: &CollectConfig,
    root: &Path,
    journal: &Journal,
) -> anyhow::Result<PhaseOutcome> {
    let dest = root.join(ASSETS_DIR);
    std::fs::create_dir_all(&dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;

    match select_and_extract(&config.asset_root, &dest, config.retention_policy(), journal) {
        Ok(report) => Ok(PhaseOutcome::Done(serde_json::to_value(report)?)),
        Err(CollectError::MissingRoot { path }) => {
            journal.warn(format!("asset root {} not found", path.display()));
            Ok(PhaseOutcome::Skipped(format!(
                "asset root {} not found",
                path.display()
            )))
        }
        Err(e) => Err(e.into()),
    }
}

async fn collect_database(
    config: &CollectConfig,
    root: &Path,
    journal: &Journal,
) -> anyhow::Result<PhaseOutcome> {
    let client = StoreClient::new(config.store.clone(), journal.clone())?;
    info!(url = client.base_url(), "exporting database");
    let report = export_all(&client, &root.join(DATABASE_DIR), journal).await?;
    Ok(PhaseOutcome::Done(serde_json::to_value(report)?))
}

/// Write `summary.json`, `collector.log` and make sure `errors.log` exists.
fn write_run_files(root: &Path, summary: &RunSummary<'_>, journal: &Journal) {
    match serde_json::to_vec_pretty(summary) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(root.join(SUMMARY_FILE), bytes) {
                journal.warn(format!("failed to write {SUMMARY_FILE}: {e}"));
            }
        }
        Err(e) => journal.warn(format!("failed to encode {SUMMARY_FILE}: {e}")),
    }

    let errors_log = root.join(ERRORS_LOG);
    if !errors_log.exists() {
        if let Err(e) = std::fs::write(&errors_log, b"") {
            journal.warn(format!("failed to create {ERRORS_LOG}: {e}"));
        }
    }

    // Last, so the log holds every entry of the run.
    if let Err(e) = journal.write_to(&root.join(COLLECTOR_LOG)) {
        tracing::warn!(error = %e, "failed to write {}", COLLECTOR_LOG);
    }
}
