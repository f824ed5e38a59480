//! Deterministic mapping from a chunk id to the worker node that owns it.
//!
//! Two placement strategies are supported, matching the original
//! partitioner's `getChunksFor(..., hashChunks)` flag: a simple round-robin
//! by chunk ordinal, and a hashed placement using a bit-mixing integer hash
//! so that placement is stable across runs but not correlated with chunk
//! adjacency on the sky.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use snafu::prelude::*;

/// Errors produced by [`node_for_chunk`] and [`node_for_ordinal`].
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ShardError {
    /// `num_nodes` was zero; there is nowhere to place a chunk.
    #[snafu(display("there must be at least one node to assign chunks to"))]
    NoNodes,
}

/// A bit-mixing 32-bit integer hash, invertible for testability (the mix and
/// its inverse are exact bijections on `u32`). Mirrors the original
/// partitioner's `mulveyHash`.
///
/// Based on Thomas Wang's 32-bit integer hash: a sequence of xor-shifts and
/// multiplies by odd constants, each step individually invertible.
pub fn mulvey_hash(mut key: u32) -> u32 {
    key = (!key).wrapping_add(key << 15);
    key ^= key >> 12;
    key = key.wrapping_add(key << 2);
    key ^= key >> 4;
    key = key.wrapping_mul(2057);
    key ^= key >> 16;
    key
}

/// The exact inverse of [`mulvey_hash`], used only by tests to establish
/// that the mix is a bijection on `u32` (testable property: chunk→node
/// hashing is invertible).
pub fn mulvey_hash_inverse(mut hash: u32) -> u32 {
    // Invert "key ^= key >> 16" (self-inverse for a 32-bit shift of 16).
    hash ^= hash >> 16;
    // Invert "key = key.wrapping_mul(2057)" by multiplying by the modular
    // inverse of 2057 mod 2^32.
    hash = hash.wrapping_mul(MUL_2057_INV);
    // Invert "key ^= key >> 4": repeated xor-shift-right by b is inverted by
    // re-applying itself log2(32/b) times.
    hash ^= hash >> 4;
    hash ^= hash >> 8;
    hash ^= hash >> 16;
    // Invert "key = key.wrapping_add(key << 2)".
    hash = invert_add_shl(hash, 2);
    // Invert "key ^= key >> 12".
    hash ^= hash >> 12;
    hash ^= hash >> 24;
    // Invert "key = (!key).wrapping_add(key << 15)".
    hash = invert_not_add_shl15(hash);
    hash
}

const MUL_2057_INV: u32 = {
    // Modular inverse of 2057 mod 2^32, computed via extended Euclid offline:
    // 2057u32.wrapping_mul(3369993785) == 1.
    3369993785
};

fn invert_add_shl(y: u32, shift: u32) -> u32 {
    // Solve x + (x << shift) == y (mod 2^32) for x, bit by bit from the LSB.
    let mut x = 0u32;
    for bit in 0..32 {
        let mask = 1u32 << bit;
        let sum = x.wrapping_add(x << shift);
        let y_bit = (y >> bit) & 1;
        let sum_bit = (sum >> bit) & 1;
        if y_bit != sum_bit {
            x |= mask;
        }
    }
    x
}

fn invert_not_add_shl15(y: u32) -> u32 {
    // Solve (!x) + (x << 15) == y (mod 2^32) for x, bit by bit from the LSB.
    let mut x = 0u32;
    for bit in 0..32 {
        let mask = 1u32 << bit;
        let candidate = (!x).wrapping_add(x << 15);
        let y_bit = (y >> bit) & 1;
        let candidate_bit = (candidate >> bit) & 1;
        if y_bit != candidate_bit {
            x |= mask;
        }
    }
    x
}

/// Return the node index (in `[0, num_nodes)`) that owns `chunk_id` under
/// hashed placement.
pub fn node_for_chunk(chunk_id: i32, num_nodes: u32) -> Result<u32, ShardError> {
    ensure!(num_nodes > 0, NoNodesSnafu);
    Ok(mulvey_hash(chunk_id as u32) % num_nodes)
}

/// Return the node index for the `ordinal`-th chunk (0-based position in
/// stripe-major, chunk-minor enumeration order) under unhashed, round-robin
/// placement.
pub fn node_for_ordinal(ordinal: u32, num_nodes: u32) -> Result<u32, ShardError> {
    ensure!(num_nodes > 0, NoNodesSnafu);
    Ok(ordinal % num_nodes)
}
