//! A small tagged-variant AST for the subset of `SELECT` statements the
//! analyzer and rewriter operate on.
//!
//! The original parser built an ANTLR parse tree and dispatched over it
//! with a visitor hierarchy; here the parsed statement is a sum type and
//! every pass that walks it is ordinary pattern matching, per the tagged
//! union/pattern matching design favored throughout this workspace.

/// A fully parsed (but not yet rewritten) `SELECT` statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStmt {
    pub select_list: Vec<ValueExpr>,
    pub from: Vec<TableRef>,
    pub spatial: Option<SpatialRestrictor>,
    pub where_clause: Option<BoolTerm>,
    pub group_by: Vec<ValueExpr>,
    pub having: Option<BoolTerm>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
}

/// A column value, function call, or aggregate in the select list or an
/// expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Column(ColumnRef),
    Literal(String),
    Aggregate { func: AggFunc, arg: Box<ValueExpr> },
    Star,
}

/// A possibly table-qualified column name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

/// The aggregate functions the rewriter knows how to split into a
/// per-chunk partial and a coordinator-side combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// How a table ref joins to the ones preceding it in the `FROM` list. The
/// first table ref in a list carries this too, but it is meaningless there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// A reference to a table in the `FROM` clause, with its alias if any and
/// how it joins to the refs before it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRef {
    pub db: String,
    pub table: String,
    pub alias: Option<String>,
    pub join_kind: JoinKind,
    /// `NATURAL JOIN` was used; the analyzer computes the common column set.
    pub natural: bool,
    /// `USING(cols)` was given explicitly.
    pub using: Vec<String>,
}

impl TableRef {
    /// The name queries should use to refer to this table: its alias if
    /// one was given, otherwise its own name.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    /// Whether this ref joins via `NATURAL JOIN` or an explicit `USING`
    /// clause, either of which splices column ownership instead of leaving
    /// shared names ambiguous.
    pub fn is_natural_or_using(&self) -> bool {
        self.natural || !self.using.is_empty()
    }
}

/// A node in a boolean expression tree (the `WHERE` clause).
#[derive(Debug, Clone, PartialEq)]
pub enum BoolTerm {
    And(Vec<BoolTerm>),
    Or(Vec<BoolTerm>),
    Not(Box<BoolTerm>),
    Compare {
        lhs: ValueExpr,
        op: CompareOp,
        rhs: ValueExpr,
    },
    /// An opaque predicate carried through verbatim (anything the analyzer
    /// doesn't need to reason about structurally).
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A single `ORDER BY` key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: ValueExpr,
    pub descending: bool,
}

/// A spatial restrictor clause (`qserv_areaspec_box`-style predicates):
/// restricts the query to rows whose partitioning position falls within a
/// region, letting the rewriter prune to the intersecting chunk set.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialRestrictor {
    Box {
        ra_min: f64,
        dec_min: f64,
        ra_max: f64,
        dec_max: f64,
    },
    Circle {
        ra: f64,
        dec: f64,
        radius_deg: f64,
    },
    /// `qserv_areaspec_poly`: an arbitrary (possibly non-convex) polygon.
    Poly { vertices: Vec<(f64, f64)> },
    /// `qserv_areaspec_hull`: the convex hull of the given points.
    Hull { vertices: Vec<(f64, f64)> },
}

impl SpatialRestrictor {
    /// The axis-aligned ra/dec bounding box that contains this restrictor,
    /// used to intersect against chunk bounds.
    pub fn bounding_box(&self) -> sphgeom::SphericalBox {
        match self {
            SpatialRestrictor::Box {
                ra_min,
                dec_min,
                ra_max,
                dec_max,
            } => sphgeom::SphericalBox {
                ra_min: *ra_min,
                ra_max: *ra_max,
                dec_min: *dec_min,
                dec_max: *dec_max,
            },
            SpatialRestrictor::Circle { ra, dec, radius_deg } => sphgeom::SphericalBox {
                ra_min: ra - radius_deg,
                ra_max: ra + radius_deg,
                dec_min: (dec - radius_deg).max(-90.0),
                dec_max: (dec + radius_deg).min(90.0),
            },
            SpatialRestrictor::Poly { vertices } | SpatialRestrictor::Hull { vertices } => {
                let ra_min = vertices.iter().map(|(ra, _)| *ra).fold(f64::INFINITY, f64::min);
                let ra_max = vertices.iter().map(|(ra, _)| *ra).fold(f64::NEG_INFINITY, f64::max);
                let dec_min = vertices.iter().map(|(_, dec)| *dec).fold(f64::INFINITY, f64::min);
                let dec_max = vertices.iter().map(|(_, dec)| *dec).fold(f64::NEG_INFINITY, f64::max);
                sphgeom::SphericalBox {
                    ra_min,
                    ra_max,
                    dec_min,
                    dec_max,
                }
            }
        }
    }
}
