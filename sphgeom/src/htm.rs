//! Hierarchical Triangular Mesh (HTM) leaf identifiers.
//!
//! The sphere is first split into 8 root triangles, one per octant, then
//! each triangle is recursively quartered: the midpoint of each edge becomes
//! a new vertex, and the resulting 4 sub-triangles are visited in a fixed
//! order (the three corner triangles, then the central one) to build up the
//! id as a base-4 number appended to the root octant id. This mirrors the
//! standard HTM construction used for fast spherical indexing.

use crate::vector::Vector3d;

/// The deepest subdivision level this indexer supports (`4 + 2*20 = 44`
/// bits, comfortably inside a `u64`).
pub const MAX_LEVEL: u32 = 20;

fn root_triangle(p: &Vector3d) -> (u64, [Vector3d; 3]) {
    let sx = if p.x() >= 0.0 { 1.0 } else { -1.0 };
    let sy = if p.y() >= 0.0 { 1.0 } else { -1.0 };
    let sz = if p.z() >= 0.0 { 1.0 } else { -1.0 };
    let mut v0 = Vector3d::new(sx, 0.0, 0.0);
    let mut v1 = Vector3d::new(0.0, sy, 0.0);
    let mut v2 = Vector3d::new(0.0, 0.0, sz);
    if sx * sy * sz < 0.0 {
        std::mem::swap(&mut v1, &mut v2);
    }
    let id: u64 = 8
        | if sz > 0.0 { 4 } else { 0 }
        | if sy > 0.0 { 2 } else { 0 }
        | if sx > 0.0 { 1 } else { 0 };
    (id, [v0, v1, v2])
}

fn inside(p: &Vector3d, a: &Vector3d, b: &Vector3d, c: &Vector3d) -> bool {
    p.dot(&a.cross(b)) >= 0.0 && p.dot(&b.cross(c)) >= 0.0 && p.dot(&c.cross(a)) >= 0.0
}

/// The HTM id of the leaf trixel at `level` containing unit vector `p`.
///
/// `level` 0 returns just the root octant id (a value in `8..=15`); each
/// additional level appends 2 bits identifying which of the 4 children of
/// the current triangle the point falls in.
pub fn htm_id(p: &Vector3d, level: u32) -> u64 {
    let (mut id, mut tri) = root_triangle(p);
    for _ in 0..level {
        let w0 = (tri[1] + tri[2]).normalized();
        let w1 = (tri[2] + tri[0]).normalized();
        let w2 = (tri[0] + tri[1]).normalized();
        if inside(p, &tri[0], &w2, &w1) {
            id = id * 4;
            tri = [tri[0], w2, w1];
        } else if inside(p, &tri[1], &w0, &w2) {
            id = id * 4 + 1;
            tri = [tri[1], w0, w2];
        } else if inside(p, &tri[2], &w1, &w0) {
            id = id * 4 + 2;
            tri = [tri[2], w1, w0];
        } else {
            id = id * 4 + 3;
            tri = [w0, w1, w2];
        }
    }
    id
}

/// The HTM id of the leaf trixel at `level` containing the position
/// `(ra_deg, dec_deg)`.
pub fn htm_id_for_ra_dec(ra_deg: f64, dec_deg: f64, level: u32) -> u64 {
    htm_id(&Vector3d::from_ra_dec_deg(ra_deg, dec_deg), level)
}
