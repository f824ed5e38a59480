//! `qserv admin register <authFile> <uniqueId> <db> [<table>...]`
//!
//! The real CSS is an out-of-scope networked store (spec §1); this CLI
//! models a deployment where `authFile` names a local TSV snapshot of that
//! store (the format in spec §6), loaded, mutated and written back in
//! place. The `<table>` arguments register unpartitioned placeholders —
//! partitioning metadata is set separately via the CSS API, matching the
//! original `register` tool which only establishes a table's existence.

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

    /// Database to register.
    db: String,

    /// Tables to register under `db`; if empty, only the database itself is
    /// registered.
    tables: Vec<String>,
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
        "registering database"
    );

    if !facade.contains_db(&config.db).context(CssSnafu)? {
        facade.register_db(&config.db).context(CssSnafu)?;
    }
    for table in &config.tables {
        if !facade.contains_table(&config.db, table).context(CssSnafu)? {
            facade
                .register_table(&config.db, table)
                .context(CssSnafu)?;
        }
    }

    fs::write(&config.auth.auth_file, kv.to_snapshot()).context(WriteFileSnafu { path })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn registers_db_and_tables() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = Config::try_parse_from([
            "register",
            "authfile",
            "req-1",
            "LSST",
            "Object",
            "Source",
        ])
        .unwrap();
        let mut config = config;
        config.auth.auth_file = file.path().to_path_buf();

        command(config).unwrap();

        let snapshot = std::fs::read_to_string(file.path()).unwrap();
        let kv = MemKv::from_snapshot(&snapshot);
        let facade = Facade::new(&kv, "");
        assert!(facade.contains_db("LSST").unwrap());
        assert!(facade.contains_table("LSST", "Object").unwrap());
        assert!(facade.contains_table("LSST", "Source").unwrap());
    }
}
