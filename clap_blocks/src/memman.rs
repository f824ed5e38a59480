//! The worker's memory-manager option block (`QSW_MEMMAN*` keys).

use std::path::PathBuf;
use std::str::FromStr;

/// Which memory manager the worker's executor should use to bound
/// in-flight fragment memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemManKind {
    /// No locking/reservation; the engine manages its own buffer cache.
    None,
    /// Lock a fixed budget of table data into memory ahead of scans.
    Lockable,
}

impl FromStr for MemManKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "lockable" => Ok(Self::Lockable),
            other => Err(format!("unrecognized QSW_MEMMAN kind: {other}")),
        }
    }
}

/// `QSW_MEMMAN` / `QSW_MEMMAN_MB` / `QSW_MEMMAN_LOCATION`.
#[derive(Debug, Clone, clap::Parser)]
pub struct MemManConfig {
    /// Memory manager kind (`QSW_MEMMAN`).
    #[clap(
        long = "memman-kind",
        env = "QSW_MEMMAN",
        default_value = "none",
        parse(try_from_str)
    )]
    pub kind: MemManKind,

    /// Locking budget in megabytes (`QSW_MEMMAN_MB`).
    #[clap(long = "memman-mb", env = "QSW_MEMMAN_MB", default_value = "0")]
    pub budget_mb: u64,

    /// Tablespace path the budget applies to (`QSW_MEMMAN_LOCATION`).
    #[clap(long = "memman-location", env = "QSW_MEMMAN_LOCATION")]
    pub location: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds() {
        assert_eq!("none".parse(), Ok(MemManKind::None));
        assert_eq!("lockable".parse(), Ok(MemManKind::Lockable));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!("wat".parse::<MemManKind>().is_err());
    }
}
