//! Validates a parsed [`SelectStmt`] against the catalog and resolves its
//! column references, extracting spatial restrictors out of the `WHERE`
//! tree along the way.
//!
//! Grounded on the original analyzer's column-binding pass: every table
//! in `FROM` is checked against C3, each unqualified column is resolved to
//! exactly one table via a [`ColumnVertexMap`] built from the caller's
//! schema, and `qserv_areaspec_*` predicates are plucked out of `WHERE`
//! into [`SelectStmt::spatial`] rather than being sent to the workers as
//! opaque SQL.

use std::collections::{BTreeMap, BTreeSet};

use qserv_css::Facade;

use crate::ast::{BoolTerm, ColumnRef, SelectStmt, SpatialRestrictor, ValueExpr};
use crate::column_vertex_map::ColumnVertexMap;
use crate::error::{AmbiguousColumnSnafu, QueryError};
use crate::table_ref_checker::check_table_refs;
use snafu::prelude::*;

/// Maps `"db.table"` to the column names that table exposes. The analyzer
/// has no schema store of its own; callers supply this the way the
/// original analyzer consulted the local SQL engine's catalog.
pub type TableSchema = BTreeMap<String, Vec<String>>;

/// The result of analyzing a [`SelectStmt`]: the (possibly rewritten)
/// statement plus the column-ownership map the rewriter and any later
/// pass can consult.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedQuery {
    pub stmt: SelectStmt,
    pub column_vertex_map: ColumnVertexMap,
}

/// Validate `stmt`'s table references against `css`, resolve its column
/// references against `schema`, and extract any spatial restrictor out of
/// `WHERE`.
pub fn analyze(mut stmt: SelectStmt, css: &Facade<'_>, schema: &TableSchema) -> Result<AnalyzedQuery, QueryError> {
    check_table_refs(css, &stmt.from)?;

    let (map, joined_columns) = build_column_vertex_map(&stmt.from, schema);

    for expr in &stmt.select_list {
        check_value_expr(expr, &map, &joined_columns)?;
    }
    for expr in &stmt.group_by {
        check_value_expr(expr, &map, &joined_columns)?;
    }
    for order in &stmt.order_by {
        check_value_expr(&order.expr, &map, &joined_columns)?;
    }
    if let Some(where_clause) = &stmt.where_clause {
        check_bool_term(where_clause, &map, &joined_columns)?;
    }
    if let Some(having) = &stmt.having {
        check_bool_term(having, &map, &joined_columns)?;
    }

    if let Some(where_clause) = stmt.where_clause.take() {
        let (remaining, mut restrictors) = extract_spatial(where_clause);
        stmt.where_clause = remaining;
        if stmt.spatial.is_none() && !restrictors.is_empty() {
            stmt.spatial = Some(restrictors.remove(0));
        }
    }

    Ok(AnalyzedQuery {
        stmt,
        column_vertex_map: map,
    })
}

/// Build the column→table map for `from`, plus the set of column names
/// that a `NATURAL JOIN` or explicit `USING(...)` between adjacent table
/// refs has declared shared — those names are allowed more than one
/// owner without being ambiguous.
fn build_column_vertex_map(from: &[crate::ast::TableRef], schema: &TableSchema) -> (ColumnVertexMap, BTreeSet<String>) {
    let mut map = ColumnVertexMap::new();
    let mut joined_columns = BTreeSet::new();
    let mut prev_cols: Option<Vec<String>> = None;

    for t in from {
        let cols = schema.get(&format!("{}.{}", t.db, t.table)).cloned().unwrap_or_default();
        for c in &cols {
            map.insert(c.clone(), t.clone());
        }
        if let Some(prev) = &prev_cols {
            if t.natural {
                for c in prev.iter().filter(|c| cols.contains(c)) {
                    joined_columns.insert(c.clone());
                }
            }
            for c in &t.using {
                joined_columns.insert(c.clone());
            }
        }
        prev_cols = Some(cols);
    }

    (map, joined_columns)
}

fn check_column(col: &ColumnRef, map: &ColumnVertexMap, joined_columns: &BTreeSet<String>) -> Result<(), QueryError> {
    if col.table.is_some() {
        // Table-qualified references never need map resolution.
        return Ok(());
    }
    let owners = map.find(&col.column);
    ensure!(
        owners.len() <= 1 || joined_columns.contains(&col.column),
        AmbiguousColumnSnafu { column: col.column.clone() }
    );
    Ok(())
}

fn check_value_expr(expr: &ValueExpr, map: &ColumnVertexMap, joined_columns: &BTreeSet<String>) -> Result<(), QueryError> {
    match expr {
        ValueExpr::Column(c) => check_column(c, map, joined_columns),
        ValueExpr::Aggregate { arg, .. } => check_value_expr(arg, map, joined_columns),
        ValueExpr::Literal(_) | ValueExpr::Star => Ok(()),
    }
}

fn check_bool_term(term: &BoolTerm, map: &ColumnVertexMap, joined_columns: &BTreeSet<String>) -> Result<(), QueryError> {
    match term {
        BoolTerm::And(terms) | BoolTerm::Or(terms) => {
            terms.iter().try_for_each(|t| check_bool_term(t, map, joined_columns))
        }
        BoolTerm::Not(inner) => check_bool_term(inner, map, joined_columns),
        BoolTerm::Compare { lhs, rhs, .. } => {
            check_value_expr(lhs, map, joined_columns)?;
            check_value_expr(rhs, map, joined_columns)
        }
        BoolTerm::Raw(_) => Ok(()),
    }
}

/// Parse a `qserv_areaspec_{box,circle,poly,hull}(...)` call out of a raw
/// predicate's text, if it is one.
fn parse_spatial_call(raw: &str) -> Option<SpatialRestrictor> {
    let raw = raw.trim();
    let args_for = |prefix: &str| -> Option<Vec<f64>> {
        let body = raw.strip_prefix(prefix)?.strip_suffix(')')?;
        if body.trim().is_empty() {
            return Some(Vec::new());
        }
        body.split(',').map(|s| s.trim().parse::<f64>().ok()).collect()
    };

    if let Some(args) = args_for("qserv_areaspec_box(") {
        if args.len() == 4 {
            return Some(SpatialRestrictor::Box {
                ra_min: args[0],
                dec_min: args[1],
                ra_max: args[2],
                dec_max: args[3],
            });
        }
    }
    if let Some(args) = args_for("qserv_areaspec_circle(") {
        if args.len() == 3 {
            return Some(SpatialRestrictor::Circle {
                ra: args[0],
                dec: args[1],
                radius_deg: args[2],
            });
        }
    }
    if let Some(args) = args_for("qserv_areaspec_poly(") {
        if args.len() >= 6 && args.len() % 2 == 0 {
            return Some(SpatialRestrictor::Poly {
                vertices: args.chunks(2).map(|c| (c[0], c[1])).collect(),
            });
        }
    }
    if let Some(args) = args_for("qserv_areaspec_hull(") {
        if args.len() >= 6 && args.len() % 2 == 0 {
            return Some(SpatialRestrictor::Hull {
                vertices: args.chunks(2).map(|c| (c[0], c[1])).collect(),
            });
        }
    }
    None
}

/// Walk `term`'s conjunctions pulling out `qserv_areaspec_*` predicates,
/// returning the tree with them removed (collapsing the `AND` if only one
/// conjunct remains) along with whatever restrictors were found.
fn extract_spatial(term: BoolTerm) -> (Option<BoolTerm>, Vec<SpatialRestrictor>) {
    match term {
        BoolTerm::And(children) => {
            let mut kept = Vec::new();
            let mut found = Vec::new();
            for child in children {
                let (remaining, mut restrictors) = extract_spatial(child);
                found.append(&mut restrictors);
                if let Some(r) = remaining {
                    kept.push(r);
                }
            }
            let rebuilt = match kept.len() {
                0 => None,
                1 => kept.into_iter().next(),
                _ => Some(BoolTerm::And(kept)),
            };
            (rebuilt, found)
        }
        BoolTerm::Raw(text) => match parse_spatial_call(&text) {
            Some(restrictor) => (None, vec![restrictor]),
            None => (Some(BoolTerm::Raw(text)), Vec::new()),
        },
        other => (Some(other), Vec::new()),
    }
}
