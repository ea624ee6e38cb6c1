//! Run configuration: defaults, then the YAML file, then `BOTDIAG_STORE_*`
//! environment variables, then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use botdiag_core::{RetentionPolicy, DEFAULT_RETAINED_RUNS};
use botdiag_store::{read_password_file, StoreConfig};
use serde::{Deserialize, Serialize};

use crate::cli::args::CollectArgs;

/// A directory of logs copied into `logs/<label>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRoot {
    pub label: String,
    pub path: PathBuf,
    /// Overrides `default_max_age_days` for this root.
    #[serde(default)]
    pub max_age_days: Option<u64>,
}

/// A diagnostic command whose output lands in `commands/<name>.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    pub log_roots: Vec<LogRoot>,
    pub default_max_age_days: u64,
    pub asset_root: PathBuf,
    /// Integrations kept per bot.
    pub retention: usize,
    pub all_integrations: bool,
    pub command_timeout_secs: u64,
    pub commands: Vec<CommandSpec>,
    pub store: StoreConfig,
}

const SERVER_ROOT: &str = "/Library/Developer/XcodeServer";

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            log_roots: vec![
                LogRoot {
                    label: "server".to_string(),
                    path: PathBuf::from(SERVER_ROOT).join("Logs"),
                    max_age_days: None,
                },
                LogRoot {
                    label: "system".to_string(),
                    path: PathBuf::from("/var/log"),
                    max_age_days: None,
                },
            ],
            default_max_age_days: 7,
            asset_root: PathBuf::from(SERVER_ROOT).join("IntegrationAssets"),
            retention: DEFAULT_RETAINED_RUNS,
            all_integrations: false,
            command_timeout_secs: 120,
            commands: vec![
                CommandSpec::new("sw_vers", "sw_vers", &[]),
                CommandSpec::new("xcode-version", "xcodebuild", &["-version"]),
                CommandSpec::new("xcode-select", "xcode-select", &["--print-path"]),
                CommandSpec::new("processes", "ps", &["auxww"]),
                CommandSpec::new("server-permissions", "ls", &["-la", SERVER_ROOT]),
                CommandSpec::new("disk-usage", "df", &["-h"]),
            ],
            store: StoreConfig::default(),
        }
    }
}

impl CollectConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("invalid config: {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Build the effective configuration for one `collect` invocation.
    pub fn resolve(args: &CollectArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.store = config.store.merge_env();
        config.apply_args(args)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &CollectArgs) -> anyhow::Result<()> {
        if let Some(n) = args.number_of_integrations {
            self.retention = usize::try_from(n).context("--number-of-integrations is too large")?;
            self.all_integrations = false;
        }
        if args.all_integrations {
            self.all_integrations = true;
        }
        if let Some(days) = args.max_log_age_days {
            self.default_max_age_days = days;
        }
        if let Some(root) = &args.asset_root {
            self.asset_root = root.clone();
        }
        if let Some(url) = &args.store_url {
            self.store.url = url.clone();
        }
        if let Some(path) = &args.store_password_file {
            self.store.password = Some(read_password_file(path)?);
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !self.all_integrations && self.retention == 0 {
            bail!("retention must keep at least one integration");
        }
        if self.command_timeout_secs == 0 {
            bail!("command_timeout_secs must be positive");
        }
        for root in &self.log_roots {
            if root.label.is_empty() || root.label.contains(['/', '\\']) || root.label == ".." {
                bail!("invalid log root label: {:?}", root.label);
            }
        }
        for command in &self.commands {
            if command.name.is_empty() || command.name.contains(['/', '\\']) {
                bail!("invalid command name: {:?}", command.name);
            }
        }
        Ok(())
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        if self.all_integrations {
            return RetentionPolicy::All;
        }
        RetentionPolicy::last(self.retention).unwrap_or_default()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn max_age_for(&self, root: &LogRoot) -> u64 {
        root.max_age_days.unwrap_or(self.default_max_age_days)
    }
}
