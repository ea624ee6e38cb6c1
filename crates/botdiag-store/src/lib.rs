//! Document-store access for botdiag.
//!
//! [`StoreClient`] reads a CouchDB-compatible view API with basic auth and
//! [`export_all`] writes the documents it returns into the staging tree.
//! Store failures never propagate out of the client: they are recorded in
//! the run [`Journal`](botdiag_core::Journal) and the query yields nothing.
//!
//! # Example
//!
//! ```no_run
//! use botdiag_core::Journal;
//! use botdiag_store::{export_all, StoreClient, StoreConfig};
//! use std::path::Path;
//!
//! # async fn example() -> botdiag_store::StoreResult<()> {
//! let journal = Journal::new();
//! let client = StoreClient::new(StoreConfig::from_env(), journal.clone())?;
//! export_all(&client, Path::new("/tmp/staging/database"), &journal).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BOTDIAG_STORE_URL` | Server base URL | `http://127.0.0.1:10375` |
//! | `BOTDIAG_STORE_DATABASE` | Database name | `xcs` |
//! | `BOTDIAG_STORE_USERNAME` | Basic-auth user | `xcscouch` |
//! | `BOTDIAG_STORE_PASSWORD` | Basic-auth password | - |
//! | `BOTDIAG_STORE_TIMEOUT` | Request timeout (seconds) | `120` |

pub mod auth;
pub mod client;
pub mod error;
pub mod export;
pub mod sanitize;
pub mod source;
pub mod types;

pub use auth::{read_password_file, Credentials};
pub use client::{StoreClient, ViewOutcome, DEFAULT_RECORDS_PER_ENTITY};
pub use error::{StoreError, StoreResult};
pub use export::{export_all, ExportReport};
pub use sanitize::sanitize_name;
pub use source::DocumentSource;
pub use types::{Entity, Record, SingletonView, StoreConfig, StoreViews, ViewPath};
