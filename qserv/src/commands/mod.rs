//! The `qserv admin` subcommand tree: `register`, `unregister`, `show`,
//! `export`, matching spec §6's administrative CLI surface.

pub mod export;
pub mod register;
pub mod show;
pub mod unregister;

use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[snafu(display("error in register subcommand: {source}"))]
    Register { source: register::Error },

    #[snafu(display("error in unregister subcommand: {source}"))]
    Unregister { source: unregister::Error },

    #[snafu(display("error in show subcommand: {source}"))]
    Show { source: show::Error },

    #[snafu(display("error in export subcommand: {source}"))]
    Export { source: export::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options shared by every `admin` subcommand: the auth file and the
/// caller-supplied unique request id, per spec §6's `<authFile> <uniqueId>`
/// prefix. `authFile` is read but never logged.
#[derive(Debug, clap::Parser)]
pub struct AuthArgs {
    /// Path to a file containing the CSS connection credentials.
    pub auth_file: std::path::PathBuf,

    /// Caller-supplied id correlating this invocation's log lines.
    pub unique_id: String,
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Register a database (and optionally specific tables) with the CSS.
    Register(register::Config),

    /// Remove a database's registration from the CSS.
    Unregister(unregister::Config),

    /// Print the catalog tree under a database, or the whole catalog.
    Show(show::Config),

    /// Write the worker-side export directory marker files for one or more
    /// databases.
    Export(export::Config),
}

pub fn command(command: Command) -> Result<()> {
    match command {
        Command::Register(config) => register::command(config).context(RegisterSnafu),
        Command::Unregister(config) => unregister::command(config).context(UnregisterSnafu),
        Command::Show(config) => show::command(config).context(ShowSnafu),
        Command::Export(config) => export::command(config).context(ExportSnafu),
    }
}
