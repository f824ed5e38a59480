//! `qserv admin unregister <authFile> <uniqueId> <db>`

use std::fs;

use qserv_css::{CssError, Facade, MemKv};
use snafu::{ResultExt, Snafu};

use super::AuthArgs;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("could not read auth/snapshot file {path}: {source}"))]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("could not write auth/snapshot file {path}: {source}"))]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("css error: {source}"))]
    Css { source: CssError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, clap::Parser)]
pub struct Config {
    #[clap(flatten)]
    auth: AuthArgs,

    /// Database to remove.
    db: String,
}

pub fn command(config: Config) -> Result<()> {
    let path = config.auth.auth_file.display().to_string();
    let snapshot = match fs::read_to_string(&config.auth.auth_file) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => return ReadFileSnafu { path, source }.fail(),
    };
    let kv = MemKv::from_snapshot(&snapshot);
    let facade = Facade::new(&kv, "");

    observability_deps::tracing::info!(
        unique_id = %config.auth.unique_id,
        db = %config.db,
        "unregistering database"
    );

    facade.unregister_db(&config.db).context(CssSnafu)?;

    fs::write(&config.auth.auth_file, kv.to_snapshot()).context(WriteFileSnafu { path })?;
    Ok(())
}
