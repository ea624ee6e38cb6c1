//! Collection phases for botdiag.
//!
//! This crate holds everything that touches the local machine:
//!
//! - [`age_copy`]: age-filtered recursive copy of log trees
//! - [`retention`]: per-bot bounded selection of integration assets
//! - [`command`]: external diagnostic commands with a hard timeout
//! - [`bundle`]: packaging of the staging root into a .tar.gz
//! - [`journal`]: the explicit, append-only run log every phase writes to
//!
//! All phases degrade to "collect less" on failure; only a missing root
//! aborts a phase, and the caller decides whether to continue.
//!
//! # Example
//!
//! ```no_run
//! use botdiag_core::{copy_recent, select_and_extract, Journal, RetentionPolicy};
//! use std::path::Path;
//!
//! # fn example() -> botdiag_core::CollectResult<()> {
//! let journal = Journal::new();
//! let staging = Path::new("/tmp/botdiag-staging");
//!
//! copy_recent(Path::new("/var/log/xcs"), &staging.join("logs"), 7, &journal)?;
//! select_and_extract(
//!     Path::new("/srv/assets"),
//!     &staging.join("assets"),
//!     RetentionPolicy::default(),
//!     &journal,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod age_copy;
pub mod bundle;
pub mod command;
pub mod error;
pub mod fs;
pub mod journal;
pub mod retention;

pub use age_copy::{age_in_days, copy_recent, copy_recent_at, CopyReport};
pub use bundle::{archive_name, archive_staging_root, write_archive};
pub use command::{CommandOutput, CommandRunner, CommandStatus, DEFAULT_COMMAND_TIMEOUT};
pub use error::{CollectError, CollectResult};
pub use journal::{Journal, JournalEntry, JournalLevel};
pub use retention::{
    select_and_extract, select_runs, AssetClass, ExtractReport, RetentionPolicy, RunFolder,
    DEFAULT_RETAINED_RUNS,
};
