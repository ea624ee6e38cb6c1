//! Arguments of `botdiag collect`.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct CollectArgs {
    /// Keep assets of the last N integrations per bot
    #[arg(
        short = 'n',
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u64).range(1..),
        conflicts_with = "all_integrations"
    )]
    pub number_of_integrations: Option<u64>,

    /// Keep assets of every integration
    #[arg(short = 'a', long)]
    pub all_integrations: bool,

    /// Directory the archive is written to
    #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// YAML configuration file
    #[arg(short = 'c', long, value_name = "FILE", env = "BOTDIAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Age limit in days for log roots without their own limit
    #[arg(long, value_name = "DAYS")]
    pub max_log_age_days: Option<u64>,

    /// Directory holding per-bot integration assets
    #[arg(long, value_name = "DIR")]
    pub asset_root: Option<PathBuf>,

    /// Document-store base URL
    #[arg(long, value_name = "URL")]
    pub store_url: Option<String>,

    /// File whose first line is the document-store password
    #[arg(long, value_name = "FILE")]
    pub store_password_file: Option<PathBuf>,

    /// Do not export database documents
    #[arg(long)]
    pub skip_database: bool,

    /// Do not run diagnostic commands
    #[arg(long)]
    pub skip_commands: bool,

    /// Leave the staging directory in place and print its path
    #[arg(long)]
    pub keep_staging: bool,
}
