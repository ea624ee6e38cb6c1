use clap::{Parser, Subcommand};

pub mod collect;
pub use collect::*;

#[derive(Parser)]
#[command(
    name = "botdiag",
    version,
    about = "Collect a diagnostic bundle from a build-automation server"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Gather logs, assets, command output and database records into a .tar.gz
    Collect(CollectArgs),
    /// Print the version
    Version,
}
