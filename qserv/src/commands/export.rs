//! `qserv admin export <authFile> <uniqueId> <baseDir> [<db>…]`
//!
//! Writes the worker-side export directory marker files for one or more
//! databases: `<baseDir>/<db>/<chunkId>` (empty files), one per chunk id
//! covering the whole sky at that database's striping. Per spec §6, this
//! refuses to overwrite an existing `<baseDir>/<db>` directory rather than
//! silently merging into it.

use std::fs;
use std::path::{Path, PathBuf};

use qserv_css::{CssError, Facade, MemKv};
use snafu::{ResultExt, Snafu};
use sphgeom::{Chunker, ConfigError, SphericalBox};

use super::AuthArgs;

const DEFAULT_OVERLAP_DEG: f64 = 0.01667;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("could not read auth/snapshot file {path}: {source}"))]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("css error: {source}"))]
    Css { source: CssError },

    #[snafu(display("invalid chunker parameters for {db}: {source}"))]
    Chunker { db: String, source: ConfigError },

    #[snafu(display("export directory {path} already exists; refusing to overwrite"))]
    AlreadyExported { path: String },

    #[snafu(display("could not create directory {path}: {source}"))]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("could not write marker file {path}: {source}"))]
    WriteMarker {
        path: String,
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, clap::Parser)]
pub struct Config {
    #[clap(flatten)]
    auth: AuthArgs,

    /// Root directory the per-database export trees are written under.
    base_dir: PathBuf,

    /// Databases to export; if empty, every registered database is
    /// exported.
    dbs: Vec<String>,
}

fn whole_sky() -> SphericalBox {
    SphericalBox {
        ra_min: 0.0,
        ra_max: 360.0,
        dec_min: -90.0,
        dec_max: 90.0,
    }
}

fn export_db(facade: &Facade<'_>, base_dir: &Path, db: &str) -> Result<()> {
    let striping = facade.db_striping(db).context(CssSnafu)?;
    let chunker = Chunker::new(DEFAULT_OVERLAP_DEG, striping.stripes, striping.sub_stripes)
        .context(ChunkerSnafu { db })?;

    let chunk_ids = chunker
        .chunks_for(&whole_sky(), 0, 1, false)
        .map_err(|source| CssError::Internal {
            db: db.to_string(),
            table: String::new(),
            detail: source.to_string(),
        })
        .context(CssSnafu)?;

    let db_dir = base_dir.join(db);
    if db_dir.exists() {
        return AlreadyExportedSnafu {
            path: db_dir.display().to_string(),
        }
        .fail();
    }
    fs::create_dir_all(&db_dir).context(CreateDirSnafu {
        path: db_dir.display().to_string(),
    })?;

    for chunk_id in chunk_ids {
        let marker = db_dir.join(chunk_id.to_string());
        fs::write(&marker, []).context(WriteMarkerSnafu {
            path: marker.display().to_string(),
        })?;
    }
    Ok(())
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

    let dbs = if config.dbs.is_empty() {
        facade.allowed_dbs().context(CssSnafu)?
    } else {
        config.dbs.clone()
    };

    observability_deps::tracing::info!(
        unique_id = %config.auth.unique_id,
        base_dir = %config.base_dir.display(),
        db_count = dbs.len(),
        "exporting databases"
    );

    for db in &dbs {
        export_db(&facade, &config.base_dir, db)?;
    }
    Ok(())
}
