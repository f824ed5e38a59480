//! Spherical sky partitioning: stripes, chunks, sub-chunks, overlaps, and
//! HTM-based spatial indexing.
//!
//! [`Chunker`] is the entry point for dividing the sky into chunks and
//! sub-chunks and for locating positions and regions within that
//! partitioning; [`htm_id`] provides an independent, finer-grained spatial
//! index used for approximate containment and neighbor tests.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

mod chunker;
mod htm;
mod vector;

pub use chunker::{
    max_alpha, segment_width, segments, ChunkLocation, Chunker, ConfigError, OverlapKind,
    SphericalBox,
};
pub use htm::{htm_id, htm_id_for_ra_dec, MAX_LEVEL};
pub use vector::{Matrix3d, MatrixError, Vector3d};
