//! A higher-level, typed view over a [`KvInterface`], matching the original
//! `Facade`: existence checks that throw/return a typed error rather than a
//! bare bool, and accessors for the partitioning metadata the query
//! analyzer and rewriter need.
//!
//! `get`s are served through a thin read-through cache, invalidated
//! wholesale by any of the façade's own mutating calls. This mirrors the
//! original `Facade`, which keeps a snapshot map it refreshes under a
//! write lock whenever it changes the backing store itself; it does not
//! protect against changes made directly against the `KvInterface` by
//! another façade instance or client.

use std::collections::HashMap;

use parking_lot::RwLock;
use snafu::prelude::*;

use crate::kvinterface::{KvError, KvInterface};

/// The `/css_meta/version` value every façade requires before it will serve
/// any other operation. Bumped whenever the on-disk tree shape changes.
pub const CSS_VERSION: &str = "1";

/// Errors raised by [`Facade`] operations.
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
pub enum CssError {
    /// The named database is not registered.
    #[snafu(display("database does not exist: {db}"))]
    DbDoesNotExist { db: String },

    /// The named table is not registered in the named database.
    #[snafu(display("table does not exist: {db}.{table}"))]
    TableDoesNotExist { db: String, table: String },

    /// An empty database name was passed where one was required.
    #[snafu(display("database name must not be empty"))]
    EmptyDbName,

    /// `/css_meta/version` is absent; the store has never been initialized.
    #[snafu(display("css_meta/version is missing"))]
    VersionMissing,

    /// `/css_meta/version` disagrees with [`CSS_VERSION`].
    #[snafu(display("css_meta/version mismatch: found {found}, expected {expected}"))]
    VersionMismatch { found: String, expected: String },

    /// A table marked as a match table is missing one of its required
    /// sub-keys.
    #[snafu(display("match table {db}.{table} is missing required metadata: {detail}"))]
    Internal { db: String, table: String, detail: String },

    /// The underlying key/value store rejected the operation.
    #[snafu(display("key/value store error: {source}"))]
    Kv { source: KvError },
}

/// The partitioning metadata for a chunked, spatially-partitioned table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionCols {
    pub lon_col: String,
    pub lat_col: String,
    pub sec_index_col: String,
}

/// How finely a table is spatially partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLevel {
    /// Not partitioned at all; replicated to every worker.
    NotPartitioned = 0,
    /// Partitioned into chunks only.
    Chunked = 1,
    /// Partitioned into chunks and sub-chunks.
    SubChunked = 2,
}

/// The `(stripes, subStripes)` striping parameters for a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbStriping {
    pub stripes: i32,
    pub sub_stripes: i32,
}

/// The two director tables, director columns, and flag column a match table
/// relates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTableParams {
    pub director_table_1: String,
    pub director_table_2: String,
    pub director_col_1: String,
    pub director_col_2: String,
    pub flag_col: String,
}

/// A typed view over the catalog's hierarchical key/value tree.
#[derive(Debug)]
pub struct Facade<'a> {
    kv: &'a dyn KvInterface,
    prefix: String,
    cache: RwLock<HashMap<String, String>>,
}

impl<'a> Facade<'a> {
    /// Build a facade over `kv`, with an optional path `prefix` so tests can
    /// run several catalogs against the same backend without colliding.
    pub fn new(kv: &'a dyn KvInterface, prefix: impl Into<String>) -> Facade<'a> {
        Facade {
            kv,
            prefix: prefix.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// `get(key, default)`, served from the read-through cache when
    /// possible.
    fn cached_get(&self, key: &str, default: &str) -> Result<String, CssError> {
        if let Some(v) = self.cache.read().get(key) {
            return Ok(v.clone());
        }
        let v = self.kv.get(key, default).context(KvSnafu)?;
        self.cache.write().insert(key.to_string(), v.clone());
        Ok(v)
    }

    /// Drop every cached value. Called by every façade operation that
    /// writes to the backing store, since a single stale entry could hide
    /// behind any key.
    fn invalidate_cache(&self) {
        self.cache.write().clear();
    }

    /// Build a facade over `kv` and immediately verify `/css_meta/version`,
    /// per the startup contract every façade construction must honor.
    pub fn open(kv: &'a dyn KvInterface, prefix: impl Into<String>) -> Result<Facade<'a>, CssError> {
        let facade = Facade::new(kv, prefix);
        facade.check_version()?;
        Ok(facade)
    }

    fn db_path(&self, db: &str) -> String {
        format!("{}/DBS/{}", self.prefix, db)
    }

    fn table_path(&self, db: &str, table: &str) -> String {
        format!("{}/DBS/{}/TABLES/{}", self.prefix, db, table)
    }

    fn require_db(&self, db: &str) -> Result<(), CssError> {
        ensure!(!db.is_empty(), EmptyDbNameSnafu);
        ensure!(
            self.kv.exists(&self.db_path(db)),
            DbDoesNotExistSnafu { db }
        );
        Ok(())
    }

    fn require_table(&self, db: &str, table: &str) -> Result<(), CssError> {
        self.require_db(db)?;
        ensure!(
            self.kv.exists(&self.table_path(db, table)),
            TableDoesNotExistSnafu { db, table }
        );
        Ok(())
    }

    /// Whether `db` is registered.
    pub fn contains_db(&self, db: &str) -> Result<bool, CssError> {
        ensure!(!db.is_empty(), EmptyDbNameSnafu);
        Ok(self.kv.exists(&self.db_path(db)))
    }

    /// Whether `table` is registered under `db`.
    pub fn contains_table(&self, db: &str, table: &str) -> Result<bool, CssError> {
        self.require_db(db)?;
        Ok(self.kv.exists(&self.table_path(db, table)))
    }

    /// Whether `table` is spatially chunked.
    pub fn table_is_chunked(&self, db: &str, table: &str) -> Result<bool, CssError> {
        self.require_table(db, table)?;
        let p = format!("{}/partitioning", self.table_path(db, table));
        Ok(self.kv.exists(&p))
    }

    /// Whether `table` is further divided into sub-chunks.
    pub fn table_is_sub_chunked(&self, db: &str, table: &str) -> Result<bool, CssError> {
        self.require_table(db, table)?;
        if !self.table_is_chunked(db, table)? {
            return Ok(false);
        }
        let p = format!("{}/partitioning/subChunks", self.table_path(db, table));
        let v = self.cached_get(&p, "0")?;
        Ok(v == "1")
    }

    /// Whether `table` relates two director tables (a "match" table).
    pub fn is_match_table(&self, db: &str, table: &str) -> Result<bool, CssError> {
        self.require_table(db, table)?;
        let p = format!("{}/match", self.table_path(db, table));
        let v = self.cached_get(&p, "0")?;
        Ok(v == "1")
    }

    /// All registered database names.
    pub fn allowed_dbs(&self) -> Result<Vec<String>, CssError> {
        let p = format!("{}/DBS", self.prefix);
        if !self.kv.exists(&p) {
            return Ok(Vec::new());
        }
        self.kv.get_children(&p).context(KvSnafu)
    }

    /// Names of the chunked tables in `db`.
    pub fn chunked_tables(&self, db: &str) -> Result<Vec<String>, CssError> {
        self.require_db(db)?;
        let p = format!("{}/TABLES", self.db_path(db));
        let all = self.kv.get_children(&p).context(KvSnafu)?;
        all.into_iter()
            .filter_map(|t| match self.table_is_chunked(db, &t) {
                Ok(true) => Some(Ok(t)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .collect()
    }

    /// The lon/lat/sec-index partitioning column names for `table`.
    pub fn partition_cols(&self, db: &str, table: &str) -> Result<PartitionCols, CssError> {
        self.require_table(db, table)?;
        let p = format!("{}/partitioning", self.table_path(db, table));
        Ok(PartitionCols {
            lon_col: self.cached_get(&format!("{p}/lonColName"), "")?,
            lat_col: self.cached_get(&format!("{p}/latColName"), "")?,
            sec_index_col: self
                .kv
                .get(&format!("{p}/secIndexColName"), "")
                .context(KvSnafu)?,
        })
    }

    /// Register a new (unchunked) database.
    pub fn register_db(&self, db: &str) -> Result<(), CssError> {
        ensure!(!db.is_empty(), EmptyDbNameSnafu);
        self.kv.create(&self.db_path(db), "", false).context(KvSnafu)?;
        self.invalidate_cache();
        Ok(())
    }

    /// Remove a database and every table registered under it.
    pub fn unregister_db(&self, db: &str) -> Result<(), CssError> {
        self.require_db(db)?;
        self.kv.delete(&self.db_path(db)).context(KvSnafu)?;
        self.invalidate_cache();
        Ok(())
    }

    /// Register a new, unpartitioned table under `db`. Partitioning
    /// metadata, if any, is added separately once the table exists.
    pub fn register_table(&self, db: &str, table: &str) -> Result<(), CssError> {
        self.require_db(db)?;
        self.kv.create(&self.table_path(db, table), "", false).context(KvSnafu)?;
        self.invalidate_cache();
        Ok(())
    }

    /// Remove a table from `db`.
    pub fn unregister_table(&self, db: &str, table: &str) -> Result<(), CssError> {
        self.require_table(db, table)?;
        self.kv.delete(&self.table_path(db, table)).context(KvSnafu)?;
        self.invalidate_cache();
        Ok(())
    }

    /// Verify `/css_meta/version` exists and matches [`CSS_VERSION`] before
    /// allowing any other operation. Every façade construction must call
    /// this first.
    pub fn check_version(&self) -> Result<(), CssError> {
        let path = format!("{}/css_meta/version", self.prefix);
        ensure!(self.kv.exists(&path), VersionMissingSnafu);
        let found = self.cached_get(&path, "")?;
        ensure!(
            found == CSS_VERSION,
            VersionMismatchSnafu {
                found,
                expected: CSS_VERSION.to_string(),
            }
        );
        Ok(())
    }

    /// The chunk level of `table`: 0 (not partitioned), 1 (chunked), or 2
    /// (sub-chunked).
    pub fn chunk_level(&self, db: &str, table: &str) -> Result<ChunkLevel, CssError> {
        if self.table_is_sub_chunked(db, table)? {
            Ok(ChunkLevel::SubChunked)
        } else if self.table_is_chunked(db, table)? {
            Ok(ChunkLevel::Chunked)
        } else {
            Ok(ChunkLevel::NotPartitioned)
        }
    }

    /// Names of the sub-chunked tables in `db`.
    pub fn sub_chunked_tables(&self, db: &str) -> Result<Vec<String>, CssError> {
        self.require_db(db)?;
        let p = format!("{}/TABLES", self.db_path(db));
        let all = self.kv.get_children(&p).context(KvSnafu)?;
        all.into_iter()
            .filter_map(|t| match self.table_is_sub_chunked(db, &t) {
                Ok(true) => Some(Ok(t)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .collect()
    }

    /// The secondary-index ("key") column name for `table`, empty if none.
    pub fn key_column(&self, db: &str, table: &str) -> Result<String, CssError> {
        self.require_table(db, table)?;
        let p = format!("{}/partitioning/secIndexColName", self.table_path(db, table));
        self.cached_get(&p, "")
    }

    /// The `(stripes, subStripes)` striping parameters declared for `db`.
    pub fn db_striping(&self, db: &str) -> Result<DbStriping, CssError> {
        self.require_db(db)?;
        let p = format!("{}/partitioningId", self.db_path(db));
        let id = self.cached_get(&p, "0")?;
        let base = format!("{}/PARTITIONING/_{}", self.prefix, id);
        let stripes = self
            .kv
            .get(&format!("{base}/nStripes"), "0")
            .context(KvSnafu)?
            .parse()
            .unwrap_or(0);
        let sub_stripes = self
            .kv
            .get(&format!("{base}/nSubStripes"), "0")
            .context(KvSnafu)?
            .parse()
            .unwrap_or(0);
        Ok(DbStriping { stripes, sub_stripes })
    }

    /// The two director tables, director columns, and flag column `table`
    /// (a match table) relates. Errors with [`CssError::Internal`] if any
    /// required sub-key is missing.
    pub fn match_table_params(&self, db: &str, table: &str) -> Result<MatchTableParams, CssError> {
        self.require_table(db, table)?;
        let p = format!("{}/match", self.table_path(db, table));
        let required = |key: &str| -> Result<String, CssError> {
            let full = format!("{p}/{key}");
            if !self.kv.exists(&full) {
                return InternalSnafu {
                    db: db.to_string(),
                    table: table.to_string(),
                    detail: format!("missing {key}"),
                }
                .fail();
            }
            self.cached_get(&full, "")
        };
        Ok(MatchTableParams {
            director_table_1: required("dirTable1")?,
            director_table_2: required("dirTable2")?,
            director_col_1: required("dirColName1")?,
            director_col_2: required("dirColName2")?,
            flag_col: required("flagColName")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvinterface::MemKv;

    fn sample() -> MemKv {
        MemKv::from_snapshot(concat!(
            "/DBS\t\\N\n",
            "/DBS/LSST\t\\N\n",
            "/DBS/LSST/TABLES\t\\N\n",
            "/DBS/LSST/TABLES/Object\t\\N\n",
            "/DBS/LSST/TABLES/Object/partitioning\t\\N\n",
            "/DBS/LSST/TABLES/Object/partitioning/subChunks\t1\n",
            "/DBS/LSST/TABLES/Object/partitioning/lonColName\tra\n",
            "/DBS/LSST/TABLES/Object/partitioning/latColName\tdecl\n",
            "/DBS/LSST/TABLES/Object/partitioning/secIndexColName\tobjectId\n",
            "/DBS/LSST/TABLES/Source\t\\N\n",
        ))
    }

    #[test]
    fn contains_db_and_table() {
        let kv = sample();
        let f = Facade::new(&kv, "");
        assert!(f.contains_db("LSST").unwrap());
        assert!(!f.contains_db("SDSS").unwrap());
        assert!(f.contains_table("LSST", "Object").unwrap());
        assert!(!f.contains_table("LSST", "Nope").unwrap());
    }

    #[test]
    fn missing_db_is_an_error_for_table_checks() {
        let kv = sample();
        let f = Facade::new(&kv, "");
        assert_eq!(
            f.contains_table("SDSS", "Object"),
            Err(CssError::DbDoesNotExist {
                db: "SDSS".to_string()
            })
        );
    }

    #[test]
    fn chunked_and_subchunked_detection() {
        let kv = sample();
        let f = Facade::new(&kv, "");
        assert!(f.table_is_chunked("LSST", "Object").unwrap());
        assert!(f.table_is_sub_chunked("LSST", "Object").unwrap());
        assert!(!f.table_is_chunked("LSST", "Source").unwrap());
        assert!(!f.table_is_sub_chunked("LSST", "Source").unwrap());
    }

    #[test]
    fn partition_cols_reads_through() {
        let kv = sample();
        let f = Facade::new(&kv, "");
        let cols = f.partition_cols("LSST", "Object").unwrap();
        assert_eq!(cols.lon_col, "ra");
        assert_eq!(cols.lat_col, "decl");
        assert_eq!(cols.sec_index_col, "objectId");
    }

    #[test]
    fn chunked_tables_filters_by_partitioning() {
        let kv = sample();
        let f = Facade::new(&kv, "");
        assert_eq!(f.chunked_tables("LSST").unwrap(), vec!["Object".to_string()]);
    }

    #[test]
    fn cached_value_survives_a_direct_kv_write_until_invalidated() {
        let kv = sample();
        let f = Facade::new(&kv, "");
        assert_eq!(f.partition_cols("LSST", "Object").unwrap().lon_col, "ra");

        kv.set("/DBS/LSST/TABLES/Object/partitioning/lonColName", "newRa")
            .unwrap();
        assert_eq!(
            f.partition_cols("LSST", "Object").unwrap().lon_col,
            "ra",
            "a stale cache entry should still be served"
        );

        f.invalidate_cache();
        assert_eq!(f.partition_cols("LSST", "Object").unwrap().lon_col, "newRa");
    }

    #[test]
    fn any_mutating_call_invalidates_the_whole_cache() {
        let kv = sample();
        let f = Facade::new(&kv, "");
        assert_eq!(f.partition_cols("LSST", "Object").unwrap().lon_col, "ra");

        kv.set("/DBS/LSST/TABLES/Object/partitioning/lonColName", "newRa")
            .unwrap();
        // register_db writes a key unrelated to Object's partitioning
        // metadata, but it still invalidates wholesale.
        f.register_db("OtherSurvey").unwrap();
        assert_eq!(f.partition_cols("LSST", "Object").unwrap().lon_col, "newRa");
    }

    #[test]
    fn register_and_unregister_db() {
        let kv = MemKv::new();
        let f = Facade::new(&kv, "");
        f.register_db("NewSurvey").unwrap();
        assert!(f.contains_db("NewSurvey").unwrap());
        f.unregister_db("NewSurvey").unwrap();
        assert!(!f.contains_db("NewSurvey").unwrap());
    }

    #[test]
    fn register_and_unregister_table() {
        let kv = MemKv::new();
        let f = Facade::new(&kv, "");
        f.register_db("NewSurvey").unwrap();
        f.register_table("NewSurvey", "Object").unwrap();
        assert!(f.contains_table("NewSurvey", "Object").unwrap());
        f.unregister_table("NewSurvey", "Object").unwrap();
        assert!(!f.contains_table("NewSurvey", "Object").unwrap());
    }

    #[test]
    fn register_table_requires_existing_db() {
        let kv = MemKv::new();
        let f = Facade::new(&kv, "");
        assert_eq!(
            f.register_table("NoSuchDb", "Object"),
            Err(CssError::DbDoesNotExist {
                db: "NoSuchDb".to_string()
            })
        );
    }

    fn sample_with_version(version: &str) -> MemKv {
        MemKv::from_snapshot(&format!("/css_meta\t\\N\n/css_meta/version\t{version}\n"))
    }

    #[test]
    fn version_missing_is_rejected() {
        let kv = MemKv::new();
        let f = Facade::new(&kv, "");
        assert_eq!(f.check_version(), Err(CssError::VersionMissing));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let kv = sample_with_version("99");
        let f = Facade::new(&kv, "");
        assert_eq!(
            f.check_version(),
            Err(CssError::VersionMismatch {
                found: "99".to_string(),
                expected: CSS_VERSION.to_string(),
            })
        );
    }

    #[test]
    fn matching_version_succeeds() {
        let kv = sample_with_version(CSS_VERSION);
        let f = Facade::new(&kv, "");
        assert!(f.check_version().is_ok());
    }

    #[test]
    fn open_rejects_missing_version() {
        let kv = MemKv::new();
        assert_eq!(Facade::open(&kv, "").err(), Some(CssError::VersionMissing));
    }

    #[test]
    fn open_succeeds_with_matching_version() {
        let kv = sample_with_version(CSS_VERSION);
        assert!(Facade::open(&kv, "").is_ok());
    }

    #[test]
    fn chunk_level_distinguishes_three_levels() {
        let kv = sample();
        let f = Facade::new(&kv, "");
        assert_eq!(f.chunk_level("LSST", "Object").unwrap(), ChunkLevel::SubChunked);
        assert_eq!(f.chunk_level("LSST", "Source").unwrap(), ChunkLevel::NotPartitioned);
    }

    #[test]
    fn db_striping_reads_through_partitioning_id() {
        let kv = MemKv::from_snapshot(concat!(
            "/DBS\t\\N\n",
            "/DBS/LSST\t\\N\n",
            "/DBS/LSST/partitioningId\t1\n",
            "/PARTITIONING\t\\N\n",
            "/PARTITIONING/_1\t\\N\n",
            "/PARTITIONING/_1/nStripes\t18\n",
            "/PARTITIONING/_1/nSubStripes\t3\n",
        ));
        let f = Facade::new(&kv, "");
        assert_eq!(
            f.db_striping("LSST").unwrap(),
            DbStriping {
                stripes: 18,
                sub_stripes: 3
            }
        );
    }

    #[test]
    fn match_table_params_requires_all_subkeys() {
        let kv = MemKv::from_snapshot(concat!(
            "/DBS\t\\N\n",
            "/DBS/LSST\t\\N\n",
            "/DBS/LSST/TABLES\t\\N\n",
            "/DBS/LSST/TABLES/ObjMatch\t\\N\n",
            "/DBS/LSST/TABLES/ObjMatch/match\t\\N\n",
            "/DBS/LSST/TABLES/ObjMatch/match/dirTable1\tObject\n",
        ));
        let f = Facade::new(&kv, "");
        assert_eq!(
            f.match_table_params("LSST", "ObjMatch"),
            Err(CssError::Internal {
                db: "LSST".to_string(),
                table: "ObjMatch".to_string(),
                detail: "missing dirTable2".to_string(),
            })
        );
    }

    #[test]
    fn match_table_params_succeeds_when_complete() {
        let kv = MemKv::from_snapshot(concat!(
            "/DBS\t\\N\n",
            "/DBS/LSST\t\\N\n",
            "/DBS/LSST/TABLES\t\\N\n",
            "/DBS/LSST/TABLES/ObjMatch\t\\N\n",
            "/DBS/LSST/TABLES/ObjMatch/match\t\\N\n",
            "/DBS/LSST/TABLES/ObjMatch/match/dirTable1\tObject\n",
            "/DBS/LSST/TABLES/ObjMatch/match/dirTable2\tSource\n",
            "/DBS/LSST/TABLES/ObjMatch/match/dirColName1\tobjectId\n",
            "/DBS/LSST/TABLES/ObjMatch/match/dirColName2\tsourceId\n",
            "/DBS/LSST/TABLES/ObjMatch/match/flagColName\tflag\n",
        ));
        let f = Facade::new(&kv, "");
        let params = f.match_table_params("LSST", "ObjMatch").unwrap();
        assert_eq!(params.director_table_1, "Object");
        assert_eq!(params.flag_col, "flag");
    }
}
