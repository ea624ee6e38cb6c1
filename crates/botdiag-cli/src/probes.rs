//! Diagnostic command probes: run each configured command and keep its output.

use std::path::Path;

use anyhow::Context;
use botdiag_core::{CommandRunner, CommandStatus, Journal};
use serde::Serialize;

use crate::config::CommandSpec;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeReport {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

/// Run `commands` in order, writing `<name>.txt` and, when stderr is not
/// empty, `<name>.stderr.txt` into `dest`.
pub async fn run_probes(
    commands: &[CommandSpec],
    runner: &CommandRunner,
    dest: &Path,
    journal: &Journal,
) -> anyhow::Result<ProbeReport> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create {}", dest.display()))?;

    let mut report = ProbeReport::default();
    for spec in commands {
        let output = runner.run(&spec.program, &spec.args).await;

        match &output.status {
            _ if output.success() => report.succeeded += 1,
            CommandStatus::TimedOut => {
                report.timed_out += 1;
                journal.warn(format!(
                    "command {} timed out after {}s",
                    spec.name,
                    runner.timeout().as_secs()
                ));
            }
            CommandStatus::Exited { code } => {
                report.failed += 1;
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                journal.warn(format!("command {} exited with {}", spec.name, code));
            }
            CommandStatus::SpawnFailed { message } => {
                report.failed += 1;
                journal.warn(format!(
                    "command {} could not start ({}): {}",
                    spec.name, spec.program, message
                ));
            }
        }

        let stdout_path = dest.join(format!("{}.txt", spec.name));
        if let Err(e) = std::fs::write(&stdout_path, &output.stdout) {
            journal.warn(format!("failed to write {}: {}", stdout_path.display(), e));
        }
        if !output.stderr.is_empty() {
            let stderr_path = dest.join(format!("{}.stderr.txt", spec.name));
            if let Err(e) = std::fs::write(&stderr_path, &output.stderr) {
                journal.warn(format!("failed to write {}: {}", stderr_path.display(), e));
            }
        }
    }

    journal.info(format!(
        "ran {} commands ({} ok, {} failed, {} timed out)",
        commands.len(),
        report.succeeded,
        report.failed,
        report.timed_out
    ));
    Ok(report)
}
