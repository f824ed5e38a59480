//! The central state store (CSS): a versioned, hierarchical catalog of
//! registered databases, tables and their partitioning metadata.
//!
//! [`kvinterface::KvInterface`] is the low-level key/value contract, with
//! two implementations behind it: [`kvinterface::MemKv`], a plain in-memory
//! map, and [`kvinterface::ZkKv`], a modeled stand-in for a durable,
//! ZooKeeper-style backend (sessions that can drop, a monotonic
//! transaction id per write) without driving a real ensemble.
//! [`facade::Facade`] is the typed, query-engine-facing API built on top of
//! either.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod facade;
mod kvinterface;

pub use facade::{
    ChunkLevel, CssError, DbStriping, Facade, MatchTableParams, PartitionCols, CSS_VERSION,
};
pub use kvinterface::{KvError, KvInterface, MemKv, ZkKv};
