//! Parses and formats the `/`-separated resource paths used to name chunk
//! queries, chunk databases and results as they travel through the dispatch
//! layer.
//!
//! Grounded on the original `ResourceUnit`: a leading `/chk`, `/q` or
//! `/result` selects the unit type, and any malformed path is normalized to
//! a single `GARBAGE` unit rather than propagating a parse error.

use std::collections::BTreeMap;
use std::fmt;

/// The kind of thing a [`ResourceUnit`] path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitType {
    /// A worker-local chunk database, `/chk/<db>/<chunk>`.
    DbChunk,
    /// A dispatched chunk query, `/q/<db>/<chunk>`.
    CQuery,
    /// A merge result set, `/result/<hash>`.
    Result,
    /// Recognized prefix but otherwise unparseable.
    Unknown,
    /// Anything else; also the catch-all for malformed input.
    Garbage,
}

impl UnitType {
    fn prefix(self) -> &'static str {
        match self {
            UnitType::DbChunk => "chk",
            UnitType::CQuery => "q",
            UnitType::Unknown => "UNKNOWN",
            UnitType::Result => "result",
            UnitType::Garbage => "GARBAGE",
        }
    }
}

/// A parsed (or synthesized) resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUnit {
    unit_type: UnitType,
    db: String,
    chunk: Option<i32>,
    hash_name: String,
    vars: BTreeMap<String, String>,
}

impl ResourceUnit {
    /// Parse `path`. Any input that doesn't match a recognized shape
    /// produces a `Garbage` unit rather than an error; resource paths come
    /// from untrusted network peers and must never crash the dispatcher.
    pub fn parse(path: &str) -> ResourceUnit {
        let mut tokens = path.split('/');
        // A well-formed path starts with the separator, so the first token
        // (before the first '/') must be empty.
        if tokens.next() != Some("") {
            return ResourceUnit::unknown();
        }
        let rtype = tokens.next().unwrap_or("");

        if rtype == UnitType::DbChunk.prefix() || rtype == UnitType::CQuery.prefix() {
            let db = tokens.next().unwrap_or("").to_string();
            if db.is_empty() {
                return ResourceUnit::garbage();
            }
            let chunk = tokens.next().and_then(|s| s.parse::<i32>().ok());
            let unit_type = if rtype == UnitType::DbChunk.prefix() {
                UnitType::DbChunk
            } else {
                UnitType::CQuery
            };
            ResourceUnit {
                unit_type,
                db,
                chunk,
                hash_name: String::new(),
                vars: BTreeMap::new(),
            }
        } else if rtype == UnitType::Result.prefix() {
            let hash_name = tokens.next().unwrap_or("").to_string();
            if hash_name.is_empty() {
                return ResourceUnit::garbage();
            }
            ResourceUnit {
                unit_type: UnitType::Result,
                db: String::new(),
                chunk: None,
                hash_name,
                vars: BTreeMap::new(),
            }
        } else {
            ResourceUnit::garbage()
        }
    }

    fn unknown() -> ResourceUnit {
        ResourceUnit {
            unit_type: UnitType::Unknown,
            db: String::new(),
            chunk: None,
            hash_name: String::new(),
            vars: BTreeMap::new(),
        }
    }

    fn garbage() -> ResourceUnit {
        ResourceUnit {
            unit_type: UnitType::Garbage,
            db: String::new(),
            chunk: None,
            hash_name: String::new(),
            vars: BTreeMap::new(),
        }
    }

    /// Build a chunk-query resource unit directly, bypassing string
    /// parsing.
    pub fn as_cquery(db: impl Into<String>, chunk: i32) -> ResourceUnit {
        ResourceUnit {
            unit_type: UnitType::CQuery,
            db: db.into(),
            chunk: Some(chunk),
            hash_name: String::new(),
            vars: BTreeMap::new(),
        }
    }

    /// This unit's type.
    pub fn unit_type(&self) -> UnitType {
        self.unit_type
    }

    /// The database name, if this unit carries one.
    pub fn db(&self) -> &str {
        &self.db
    }

    /// The chunk id, if this unit carries one.
    pub fn chunk(&self) -> Option<i32> {
        self.chunk
    }

    /// The value bound to `key` in this unit's query-string-like variable
    /// set, if any.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl fmt::Display for ResourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit_type {
            UnitType::Garbage => write!(f, "/GARBAGE"),
            UnitType::Unknown => write!(f, "/{}", UnitType::Unknown.prefix()),
            UnitType::DbChunk | UnitType::CQuery => {
                write!(f, "/{}/{}", self.unit_type.prefix(), self.db)?;
                if let Some(chunk) = self.chunk {
                    write!(f, "/{chunk}")?;
                }
                Ok(())
            }
            UnitType::Result => write!(f, "/{}/{}", UnitType::Result.prefix(), self.hash_name),
        }
    }
}
