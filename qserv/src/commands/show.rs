//! `qserv admin show <authFile> <uniqueId> [<db>]`
//!
//! Prints the catalog tree: every registered database, or (when `db` is
//! given) that database's striping and its tables' chunk levels.

use std::fs;

use qserv_css::{ChunkLevel, CssError, Facade, MemKv};
use snafu::{ResultExt, Snafu};

use super::AuthArgs;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("could not read auth/snapshot file {path}: {source}"))]
    ReadFile {
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

    /// Database to describe; if omitted, every registered database is
    /// listed.
    db: Option<String>,
}

fn chunk_level_label(level: ChunkLevel) -> &'static str {
    match level {
        ChunkLevel::NotPartitioned => "not partitioned",
        ChunkLevel::Chunked => "chunked",
        ChunkLevel::SubChunked => "sub-chunked",
    }
}

pub fn describe(facade: &Facade<'_>, db: &str) -> Result<String> {
    let striping = facade.db_striping(db).context(CssSnafu)?;
    let mut out = format!(
        "{db} (stripes={}, subStripes={})\n",
        striping.stripes, striping.sub_stripes
    );
    let mut tables = facade.chunked_tables(db).context(CssSnafu)?;
    tables.sort();
    for table in tables {
        let level = facade.chunk_level(db, &table).context(CssSnafu)?;
        out.push_str(&format!("  {table}: {}\n", chunk_level_label(level)));
    }
    Ok(out)
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

    match &config.db {
        Some(db) => print!("{}", describe(&facade, db)?),
        None => {
            let mut dbs = facade.allowed_dbs().context(CssSnafu)?;
            dbs.sort();
            for db in dbs {
                println!("{db}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemKv {
        MemKv::from_snapshot(concat!(
            "/DBS\t\\N\n",
            "/DBS/LSST\t\\N\n",
            "/DBS/LSST/partitioningId\t1\n",
            "/PARTITIONING\t\\N\n",
            "/PARTITIONING/_1\t\\N\n",
            "/PARTITIONING/_1/nStripes\t18\n",
            "/PARTITIONING/_1/nSubStripes\t3\n",
            "/DBS/LSST/TABLES\t\\N\n",
            "/DBS/LSST/TABLES/Object\t\\N\n",
            "/DBS/LSST/TABLES/Object/partitioning\t\\N\n",
            "/DBS/LSST/TABLES/Object/partitioning/subChunks\t1\n",
        ))
    }

    #[test]
    fn describes_db_striping_and_tables() {
        let kv = sample();
        let facade = Facade::new(&kv, "");
        let out = describe(&facade, "LSST").unwrap();
        assert!(out.contains("stripes=18"));
        assert!(out.contains("Object: sub-chunked"));
    }

    #[test]
    fn describe_unknown_db_is_an_error() {
        let kv = sample();
        let facade = Facade::new(&kv, "");
        assert!(describe(&facade, "Nope").is_err());
    }
}
