//! The low-level key/value interface the catalog is built on, and an
//! in-memory implementation loaded from a TSV snapshot.
//!
//! Grounded on `KvInterfaceImplMem`: keys are `/`-separated paths forming a
//! tree (much like a ZooKeeper znode namespace), a node may have both a
//! value and children, and the snapshot format is one `key<TAB>value` pair
//! per line with `\N` standing in for an empty value.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use snafu::prelude::*;

/// Errors returned by a [`KvInterface`] implementation.
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
pub enum KvError {
    /// No node exists at the given key.
    #[snafu(display("key does not exist: {key}"))]
    NoSuchKey { key: String },

    /// A node already exists at the given key (on a non-overwriting
    /// create).
    #[snafu(display("key already exists: {key}"))]
    KeyExists { key: String },

    /// The backend could not be reached (only reachable by a networked
    /// backend; the in-memory backend never returns this).
    #[snafu(display("connection to key/value backend failed: {detail}"))]
    Connection { detail: String },

    /// The backend rejected the operation's credentials.
    #[snafu(display("authentication to key/value backend failed: {detail}"))]
    Auth { detail: String },
}

/// A hierarchical key/value store: every key is a `/`-separated path, and
/// a key's "children" are the direct descendants of its path.
pub trait KvInterface: std::fmt::Debug + Send + Sync {
    /// Whether `key` exists.
    fn exists(&self, key: &str) -> bool;

    /// The value stored at `key`, or `default` if the value is empty and
    /// the key exists, erroring if it doesn't exist at all.
    fn get(&self, key: &str, default: &str) -> Result<String, KvError>;

    /// Direct child names of `key` (not full paths), in sorted order.
    fn get_children(&self, key: &str) -> Result<Vec<String>, KvError>;

    /// Create `key` with `value`. Errors if `key` already exists unless
    /// `overwrite` is set.
    fn create(&self, key: &str, value: &str, overwrite: bool) -> Result<(), KvError>;

    /// Overwrite the value at an existing `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Delete `key` and everything beneath it.
    fn delete(&self, key: &str) -> Result<(), KvError>;
}

/// An in-memory, `RwLock`-guarded key/value tree, either empty or loaded
/// from a snapshot.
#[derive(Debug, Default)]
pub struct MemKv {
    // A flat map from full path to value is sufficient here because
    // children are derived by prefix-matching rather than stored as an
    // explicit tree, matching the simplicity of the original in-memory
    // backend.
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemKv {
    /// An empty store, with just the root registered.
    pub fn new() -> MemKv {
        let mut entries = BTreeMap::new();
        entries.insert(String::new(), String::new());
        MemKv {
            entries: RwLock::new(entries),
        }
    }

    /// Load a snapshot in the `key<TAB>value` format produced by the
    /// catalog export tool, where `\N` denotes an empty value.
    pub fn from_snapshot(data: &str) -> MemKv {
        let kv = MemKv::new();
        {
            let mut entries = kv.entries.write();
            for line in data.lines() {
                if line.is_empty() {
                    continue;
                }
                let mut parts = line.splitn(2, '\t');
                let key = parts.next().unwrap_or_default();
                let value = parts.next().unwrap_or_default();
                let value = if value == "\\N" { "" } else { value };
                entries.insert(key.to_string(), value.to_string());
                insert_ancestors(&mut entries, key);
            }
        }
        kv
    }

    /// Serialize the whole tree back into the snapshot format, `\N`
    /// standing in for empty values.
    pub fn to_snapshot(&self) -> String {
        let entries = self.entries.read();
        let mut out = String::new();
        for (key, value) in entries.iter() {
            if key.is_empty() {
                continue;
            }
            let value = if value.is_empty() { "\\N" } else { value.as_str() };
            out.push_str(key);
            out.push('\t');
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}

fn insert_ancestors(entries: &mut BTreeMap<String, String>, key: &str) {
    let mut path = key;
    while let Some(idx) = path.rfind('/') {
        path = &path[..idx];
        entries.entry(path.to_string()).or_insert_with(String::new);
    }
    entries.entry(String::new()).or_insert_with(String::new);
}

impl KvInterface for MemKv {
    fn exists(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn get(&self, key: &str, default: &str) -> Result<String, KvError> {
        let entries = self.entries.read();
        let value = entries.get(key).context(NoSuchKeySnafu { key })?;
        if value.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(value.clone())
        }
    }

    fn get_children(&self, key: &str) -> Result<Vec<String>, KvError> {
        let entries = self.entries.read();
        ensure!(entries.contains_key(key), NoSuchKeySnafu { key });
        let prefix = if key.is_empty() {
            "/".to_string()
        } else {
            format!("{key}/")
        };
        let mut children = Vec::new();
        for path in entries.keys() {
            if let Some(rest) = path.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    children.push(rest.to_string());
                }
            }
        }
        children.sort();
        children.dedup();
        Ok(children)
    }

    fn create(&self, key: &str, value: &str, overwrite: bool) -> Result<(), KvError> {
        let mut entries = self.entries.write();
        ensure!(
            overwrite || !entries.contains_key(key),
            KeyExistsSnafu { key }
        );
        entries.insert(key.to_string(), value.to_string());
        insert_ancestors(&mut entries, key);
        Ok(())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut entries = self.entries.write();
        ensure!(entries.contains_key(key), NoSuchKeySnafu { key });
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut entries = self.entries.write();
        ensure!(entries.contains_key(key), NoSuchKeySnafu { key });
        let prefix = format!("{key}/");
        entries.retain(|k, _| k != key && !k.starts_with(&prefix));
        Ok(())
    }
}

/// A modeled stand-in for `KvInterfaceImplZoo`: a durable, sequentially
/// consistent backend with a connection that can drop out from under the
/// caller. This does not drive a real ZooKeeper ensemble (there's no
/// network I/O here); it exercises the same `KvInterface` contract as
/// [`MemKv`] but with the two behaviors a networked backend adds over a
/// plain in-memory map: every write bumps a monotonically increasing
/// transaction id (ZooKeeper calls this a zxid), and the session can be
/// severed, after which every operation fails with
/// [`KvError::Connection`] until it is reconnected.
#[derive(Debug, Default)]
pub struct ZkKv {
    entries: RwLock<BTreeMap<String, String>>,
    connected: std::sync::atomic::AtomicBool,
    zxid: std::sync::atomic::AtomicU64,
}

impl ZkKv {
    /// A connected store, with just the root registered.
    pub fn new() -> ZkKv {
        let mut entries = BTreeMap::new();
        entries.insert(String::new(), String::new());
        ZkKv {
            entries: RwLock::new(entries),
            connected: std::sync::atomic::AtomicBool::new(true),
            zxid: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// The transaction id of the most recent successful write, or 0 if
    /// none has happened yet.
    pub fn zxid(&self) -> u64 {
        self.zxid.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Sever the session. Every subsequent call returns
    /// [`KvError::Connection`] until [`reconnect`](Self::reconnect) is
    /// called.
    pub fn disconnect(&self) {
        self.connected.store(false, std::sync::atomic::Ordering::SeqCst);
    }

    /// Restore a severed session.
    pub fn reconnect(&self) {
        self.connected.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_connected(&self) -> Result<(), KvError> {
        ensure!(
            self.connected.load(std::sync::atomic::Ordering::SeqCst),
            ConnectionSnafu {
                detail: "session expired",
            }
        );
        Ok(())
    }

    fn bump_zxid(&self) {
        self.zxid.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

impl KvInterface for ZkKv {
    fn exists(&self, key: &str) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst) && self.entries.read().contains_key(key)
    }

    fn get(&self, key: &str, default: &str) -> Result<String, KvError> {
        self.check_connected()?;
        let entries = self.entries.read();
        let value = entries.get(key).context(NoSuchKeySnafu { key })?;
        if value.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(value.clone())
        }
    }

    fn get_children(&self, key: &str) -> Result<Vec<String>, KvError> {
        self.check_connected()?;
        let entries = self.entries.read();
        ensure!(entries.contains_key(key), NoSuchKeySnafu { key });
        let prefix = if key.is_empty() {
            "/".to_string()
        } else {
            format!("{key}/")
        };
        let mut children = Vec::new();
        for path in entries.keys() {
            if let Some(rest) = path.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    children.push(rest.to_string());
                }
            }
        }
        children.sort();
        children.dedup();
        Ok(children)
    }

    fn create(&self, key: &str, value: &str, overwrite: bool) -> Result<(), KvError> {
        self.check_connected()?;
        let mut entries = self.entries.write();
        ensure!(
            overwrite || !entries.contains_key(key),
            KeyExistsSnafu { key }
        );
        entries.insert(key.to_string(), value.to_string());
        insert_ancestors(&mut entries, key);
        drop(entries);
        self.bump_zxid();
        Ok(())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.check_connected()?;
        let mut entries = self.entries.write();
        ensure!(entries.contains_key(key), NoSuchKeySnafu { key });
        entries.insert(key.to_string(), value.to_string());
        drop(entries);
        self.bump_zxid();
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KvError> {
        self.check_connected()?;
        let mut entries = self.entries.write();
        ensure!(entries.contains_key(key), NoSuchKeySnafu { key });
        let prefix = format!("{key}/");
        entries.retain(|k, _| k != key && !k.starts_with(&prefix));
        drop(entries);
        self.bump_zxid();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips() {
        let data = "/DBS/LSST\t\\N\n/DBS/LSST/TABLES/Object\tsomevalue\n";
        let kv = MemKv::from_snapshot(data);
        assert!(kv.exists("/DBS/LSST"));
        assert_eq!(kv.get("/DBS/LSST/TABLES/Object", "").unwrap(), "somevalue");
        assert_eq!(kv.get("/DBS/LSST", "default").unwrap(), "default");
    }

    #[test]
    fn get_children_lists_direct_descendants_only() {
        let data = "/DBS\t\\N\n/DBS/LSST\t\\N\n/DBS/LSST/TABLES\t\\N\n/DBS/LSST/TABLES/Object\t\\N\n";
        let kv = MemKv::from_snapshot(data);
        let children = kv.get_children("/DBS").unwrap();
        assert_eq!(children, vec!["LSST".to_string()]);
    }

    #[test]
    fn create_rejects_duplicate_without_overwrite() {
        let kv = MemKv::new();
        kv.create("/DBS", "", false).unwrap();
        assert_eq!(
            kv.create("/DBS", "", false),
            Err(KvError::KeyExists {
                key: "/DBS".to_string()
            })
        );
        assert!(kv.create("/DBS", "v2", true).is_ok());
    }

    #[test]
    fn delete_removes_subtree() {
        let kv = MemKv::new();
        kv.create("/DBS", "", false).unwrap();
        kv.create("/DBS/LSST", "", false).unwrap();
        kv.create("/DBS/LSST/TABLES", "", false).unwrap();
        kv.delete("/DBS/LSST").unwrap();
        assert!(!kv.exists("/DBS/LSST"));
        assert!(!kv.exists("/DBS/LSST/TABLES"));
        assert!(kv.exists("/DBS"));
    }

    #[test]
    fn missing_key_is_an_error() {
        let kv = MemKv::new();
        assert_eq!(
            kv.get("/nope", ""),
            Err(KvError::NoSuchKey {
                key: "/nope".to_string()
            })
        );
    }

    #[test]
    fn zk_kv_exercises_the_same_contract_as_mem_kv() {
        let kv = ZkKv::new();
        kv.create("/DBS", "", false).unwrap();
        kv.create("/DBS/LSST", "v", false).unwrap();
        assert_eq!(kv.get("/DBS/LSST", "").unwrap(), "v");
        assert_eq!(kv.get_children("/DBS").unwrap(), vec!["LSST".to_string()]);
        kv.delete("/DBS/LSST").unwrap();
        assert!(!kv.exists("/DBS/LSST"));
    }

    #[test]
    fn zk_kv_bumps_zxid_on_every_write() {
        let kv = ZkKv::new();
        assert_eq!(kv.zxid(), 0);
        kv.create("/DBS", "", false).unwrap();
        assert_eq!(kv.zxid(), 1);
        kv.set("/DBS", "v").unwrap();
        assert_eq!(kv.zxid(), 2);
    }

    #[test]
    fn zk_kv_fails_every_operation_while_disconnected() {
        let kv = ZkKv::new();
        kv.create("/DBS", "", false).unwrap();
        kv.disconnect();
        assert!(!kv.exists("/DBS"));
        assert_eq!(
            kv.get("/DBS", ""),
            Err(KvError::Connection {
                detail: "session expired".to_string()
            })
        );
        kv.reconnect();
        assert_eq!(kv.get("/DBS", "").unwrap(), "");
    }
}
