//! Rewrites a validated [`SelectStmt`] into a set of per-chunk SQL
//! fragments plus the coordinator-side merge query that combines their
//! results.
//!
//! Aggregates are split map/reduce style: `COUNT(x)` becomes a per-chunk
//! `COUNT(x) AS x_partial_count` combined at merge time with `SUM`, and
//! `AVG(x)` becomes per-chunk `SUM(x)`/`COUNT(x)` combined as
//! `SUM(..)/SUM(..)`. A spatial restrictor narrows the per-chunk fragment
//! set to the chunks [`sphgeom::Chunker::chunks_for`] reports as
//! intersecting. Table references are rewritten per chunk level: a
//! chunked table `T` becomes `T_<chunk>`; a sub-chunked table becomes
//! `T_<chunk>_<subChunk>`, with `T_<chunk>_<subChunk>Overlap` standing in
//! for its overlap rows. Joining two sub-chunked tables on the shared
//! spatial key produces the non-overlap x (non-overlap U overlap)
//! cross-product per sub-chunk needed for at-most-once-counting.

use qserv_css::{ChunkLevel, CssError, Facade};
use snafu::prelude::*;
use sphgeom::Chunker;

use crate::ast::{AggFunc, SelectStmt, TableRef, ValueExpr};

/// Errors raised while rewriting a query.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum RewriteError {
    #[snafu(display("failed to look up partitioning metadata: {source}"))]
    Css { source: CssError },
}

/// One piece of the per-chunk partial aggregation/merge plan for a single
/// select-list entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeStep {
    /// Carried through unchanged; no merge-time combination needed.
    PassThrough { column: String },
    /// `SUM` of the per-chunk partial counts/sums.
    Sum { partial_column: String, output_column: String },
    /// `SUM(sum_col) / SUM(count_col)`.
    WeightedAverage {
        sum_column: String,
        count_column: String,
        output_column: String,
    },
    /// `MIN`/`MAX` of the per-chunk partials.
    Extreme {
        func: AggFunc,
        partial_column: String,
        output_column: String,
    },
}

/// The per-chunk SQL fragment text and the merge-time combination plan for
/// a rewritten query.
#[derive(Debug, Clone, PartialEq)]
pub struct RewritePlan {
    /// Chunk ids the fragment set must be dispatched to.
    pub chunk_ids: Vec<i32>,
    /// The per-chunk SQL fragment templates, with `{chunk}` left as a
    /// placeholder for the dispatcher to substitute into table names. When
    /// [`Self::uses_sub_chunks`] is set, each template also carries a
    /// `{subChunk}` placeholder and the dispatcher must emit one fragment
    /// per id returned by [`sphgeom::Chunker::sub_chunks_for`] for that
    /// chunk, for every template in this list (the non-overlap template,
    /// and — for a sub-chunked self-join — the overlap template).
    pub fragment_sql_templates: Vec<String>,
    /// Whether the templates above are parameterized by sub-chunk, not
    /// just chunk.
    pub uses_sub_chunks: bool,
    /// The merge/reduce steps combining per-chunk partials, in select-list
    /// order.
    pub merge_steps: Vec<MergeStep>,
    /// The coordinator-side SQL run against the merge table once every
    /// fragment's rows have been ingested.
    pub merge_sql: String,
}

fn column_alias(expr: &ValueExpr, idx: usize) -> String {
    match expr {
        ValueExpr::Column(c) => c.column.clone(),
        _ => format!("expr_{idx}"),
    }
}

fn rewrite_select_list(select_list: &[ValueExpr]) -> (Vec<String>, Vec<MergeStep>) {
    let mut fragment_cols = Vec::new();
    let mut steps = Vec::new();

    for (idx, expr) in select_list.iter().enumerate() {
        match expr {
            ValueExpr::Aggregate { func, arg } => {
                let base = column_alias(arg, idx);
                match func {
                    AggFunc::Count => {
                        let partial = format!("{base}_partial_count");
                        fragment_cols.push(format!("COUNT({base}) AS {partial}"));
                        steps.push(MergeStep::Sum {
                            partial_column: partial,
                            output_column: base.clone(),
                        });
                    }
                    AggFunc::Sum => {
                        let partial = format!("{base}_partial_sum");
                        fragment_cols.push(format!("SUM({base}) AS {partial}"));
                        steps.push(MergeStep::Sum {
                            partial_column: partial,
                            output_column: base.clone(),
                        });
                    }
                    AggFunc::Avg => {
                        let sum_col = format!("{base}_partial_sum");
                        let count_col = format!("{base}_partial_count");
                        fragment_cols.push(format!("SUM({base}) AS {sum_col}"));
                        fragment_cols.push(format!("COUNT({base}) AS {count_col}"));
                        steps.push(MergeStep::WeightedAverage {
                            sum_column: sum_col,
                            count_column: count_col,
                            output_column: base.clone(),
                        });
                    }
                    AggFunc::Min | AggFunc::Max => {
                        let name = if matches!(func, AggFunc::Min) { "MIN" } else { "MAX" };
                        let partial = format!("{base}_partial_{}", name.to_lowercase());
                        fragment_cols.push(format!("{name}({base}) AS {partial}"));
                        steps.push(MergeStep::Extreme {
                            func: *func,
                            partial_column: partial,
                            output_column: base.clone(),
                        });
                    }
                }
            }
            ValueExpr::Column(c) => {
                fragment_cols.push(c.column.clone());
                steps.push(MergeStep::PassThrough {
                    column: c.column.clone(),
                });
            }
            ValueExpr::Star => {
                fragment_cols.push("*".to_string());
            }
            ValueExpr::Literal(lit) => {
                fragment_cols.push(lit.clone());
            }
        }
    }
    (fragment_cols, steps)
}

fn merge_select_list(steps: &[MergeStep]) -> String {
    steps
        .iter()
        .map(|s| match s {
            MergeStep::PassThrough { column } => column.clone(),
            MergeStep::Sum {
                partial_column,
                output_column,
            } => format!("SUM({partial_column}) AS {output_column}"),
            MergeStep::WeightedAverage {
                sum_column,
                count_column,
                output_column,
            } => format!("SUM({sum_column}) / SUM({count_column}) AS {output_column}"),
            MergeStep::Extreme {
                func,
                partial_column,
                output_column,
            } => {
                let name = if matches!(func, AggFunc::Min) { "MIN" } else { "MAX" };
                format!("{name}({partial_column}) AS {output_column}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// The rewritten name for `t` at chunk level `level`, with `{chunk}` (and
/// `{subChunk}` for sub-chunked tables) left as templating placeholders;
/// `overlap` selects the `...Overlap` variant of a sub-chunked table.
fn physical_table_name(t: &TableRef, level: ChunkLevel, overlap: bool) -> String {
    match level {
        ChunkLevel::NotPartitioned => t.table.clone(),
        ChunkLevel::Chunked => format!("{}_{{chunk}}", t.table),
        ChunkLevel::SubChunked => {
            if overlap {
                format!("{}_{{chunk}}_{{subChunk}}Overlap", t.table)
            } else {
                format!("{}_{{chunk}}_{{subChunk}}", t.table)
            }
        }
    }
}

fn with_alias(physical: String, t: &TableRef) -> String {
    match &t.alias {
        Some(alias) => format!("{physical} AS {alias}"),
        None => physical,
    }
}

/// Build the `FROM` clause for every table in `from` at `levels[i]`,
/// treating the table at `overlap_side` (if any) as its `...Overlap`
/// sub-chunk variant — used to emit the second half of a sub-chunked
/// self-join's non-overlap x (non-overlap U overlap) cross product.
fn build_from_clause(from: &[TableRef], levels: &[ChunkLevel], overlap_side: Option<usize>) -> String {
    from.iter()
        .enumerate()
        .map(|(i, t)| {
            let overlap = overlap_side == Some(i);
            with_alias(physical_table_name(t, levels[i], overlap), t)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn group_by_clause(stmt: &SelectStmt) -> Option<String> {
    if stmt.group_by.is_empty() {
        return None;
    }
    let cols: Vec<String> = stmt
        .group_by
        .iter()
        .enumerate()
        .map(|(i, e)| column_alias(e, i))
        .collect();
    Some(format!("GROUP BY {}", cols.join(", ")))
}

fn order_by_clause(stmt: &SelectStmt) -> Option<String> {
    if stmt.order_by.is_empty() {
        return None;
    }
    let keys: Vec<String> = stmt
        .order_by
        .iter()
        .enumerate()
        .map(|(i, o)| {
            let col = column_alias(&o.expr, i);
            if o.descending {
                format!("{col} DESC")
            } else {
                col
            }
        })
        .collect();
    Some(format!("ORDER BY {}", keys.join(", ")))
}

/// Rewrite `stmt` into a [`RewritePlan`], pruning the chunk set by
/// `stmt.spatial` (if present) against `chunker` and consulting `css` for
/// each `FROM` table's chunk level.
pub fn rewrite(stmt: &SelectStmt, chunker: &Chunker, css: &Facade<'_>) -> Result<RewritePlan, RewriteError> {
    let whole_sky = sphgeom::SphericalBox {
        ra_min: 0.0,
        ra_max: 360.0,
        dec_min: -90.0,
        dec_max: 90.0,
    };
    let region = stmt.spatial.as_ref().map(|s| s.bounding_box()).unwrap_or(whole_sky);

    // A single "node" standing for the whole cluster: the coordinator
    // wants every chunk intersecting the region regardless of which
    // worker ultimately owns it, so placement doesn't matter here.
    let chunk_ids = chunker.chunks_for(&region, 0, 1, false).unwrap_or_default();

    let levels: Vec<ChunkLevel> = stmt
        .from
        .iter()
        .map(|t| css.chunk_level(&t.db, &t.table).context(CssSnafu))
        .collect::<Result<_, _>>()?;

    let sub_chunked: Vec<usize> = levels
        .iter()
        .enumerate()
        .filter(|(_, l)| **l == ChunkLevel::SubChunked)
        .map(|(i, _)| i)
        .collect();

    let (fragment_cols, merge_steps) = rewrite_select_list(&stmt.select_list);
    let select_clause = fragment_cols.join(", ");

    let (fragment_sql_templates, uses_sub_chunks) = if sub_chunked.len() >= 2 {
        // Two (or more) sub-chunked tables sharing the spatial key: emit
        // the non-overlap x non-overlap fragment and, separately, the
        // non-overlap x overlap fragment for the second table, so that
        // together they cover non-overlap x (non-overlap U overlap).
        let non_overlap_from = build_from_clause(&stmt.from, &levels, None);
        let mixed_from = build_from_clause(&stmt.from, &levels, Some(sub_chunked[1]));
        (
            vec![
                format!("SELECT {select_clause} FROM {non_overlap_from}"),
                format!("SELECT {select_clause} FROM {mixed_from}"),
            ],
            true,
        )
    } else if sub_chunked.len() == 1 {
        let from_clause = build_from_clause(&stmt.from, &levels, None);
        (vec![format!("SELECT {select_clause} FROM {from_clause}")], true)
    } else {
        let from_clause = build_from_clause(&stmt.from, &levels, None);
        (vec![format!("SELECT {select_clause} FROM {from_clause}")], false)
    };

    let mut merge_sql = format!("SELECT {} FROM merge_table", merge_select_list(&merge_steps));
    if let Some(group_by) = group_by_clause(stmt) {
        merge_sql.push(' ');
        merge_sql.push_str(&group_by);
    }
    if let Some(having) = &stmt.having {
        merge_sql.push_str(&format!(" HAVING {having:?}"));
    }
    if let Some(order_by) = order_by_clause(stmt) {
        merge_sql.push(' ');
        merge_sql.push_str(&order_by);
    }
    if let Some(limit) = stmt.limit {
        merge_sql.push_str(&format!(" LIMIT {limit}"));
    }

    Ok(RewritePlan {
        chunk_ids,
        fragment_sql_templates,
        uses_sub_chunks,
        merge_steps,
        merge_sql,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ColumnRef, OrderBy, TableRef};
    use qserv_css::MemKv;

    fn chunker() -> Chunker {
        Chunker::new(0.01667, 6, 2).unwrap()
    }

    fn css_snapshot() -> MemKv {
        MemKv::from_snapshot(concat!(
            "/DBS\t\\N\n",
            "/DBS/LSST\t\\N\n",
            "/DBS/LSST/TABLES\t\\N\n",
            "/DBS/LSST/TABLES/Object\t\\N\n",
            "/DBS/LSST/TABLES/Object/partitioning\t\\N\n",
            "/DBS/LSST/TABLES/Object/partitioning/subChunks\t1\n",
            "/DBS/LSST/TABLES/Source\t\\N\n",
            "/DBS/LSST/TABLES/Source/partitioning\t\\N\n",
            "/DBS/LSST/TABLES/Source/partitioning/subChunks\t1\n",
            "/DBS/LSST/TABLES/Visit\t\\N\n",
            "/DBS/LSST/TABLES/Visit/partitioning\t\\N\n",
            "/DBS/LSST/TABLES/Visit/partitioning/subChunks\t0\n",
            "/DBS/LSST/TABLES/Config\t\\N\n",
        ))
    }

    fn simple_stmt() -> SelectStmt {
        SelectStmt {
            select_list: vec![ValueExpr::Column(ColumnRef {
                table: None,
                column: "ra".into(),
            })],
            from: vec![TableRef {
                db: "LSST".into(),
                table: "Object".into(),
                alias: None,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn passthrough_column_is_carried_unchanged() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let plan = rewrite(&simple_stmt(), &chunker(), &css).unwrap();
        assert!(plan.fragment_sql_templates[0].contains("ra"));
        assert_eq!(plan.merge_steps, vec![MergeStep::PassThrough { column: "ra".into() }]);
    }

    #[test]
    fn sub_chunked_table_is_rewritten_with_chunk_and_sub_chunk_placeholders() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let plan = rewrite(&simple_stmt(), &chunker(), &css).unwrap();
        assert!(plan.uses_sub_chunks);
        assert!(plan.fragment_sql_templates[0].contains("Object_{chunk}_{subChunk}"));
    }

    #[test]
    fn chunked_only_table_uses_chunk_placeholder_without_sub_chunk() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let mut stmt = simple_stmt();
        stmt.from[0].table = "Visit".into();
        let plan = rewrite(&stmt, &chunker(), &css).unwrap();
        assert!(!plan.uses_sub_chunks);
        assert!(plan.fragment_sql_templates[0].contains("Visit_{chunk}"));
        assert!(!plan.fragment_sql_templates[0].contains("subChunk"));
    }

    #[test]
    fn unpartitioned_table_name_is_left_alone() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let mut stmt = simple_stmt();
        stmt.from[0].table = "Config".into();
        let plan = rewrite(&stmt, &chunker(), &css).unwrap();
        assert!(plan.fragment_sql_templates[0].contains("FROM Config"));
    }

    #[test]
    fn two_sub_chunked_tables_emit_non_overlap_and_overlap_fragments() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let mut stmt = simple_stmt();
        stmt.from.push(TableRef {
            db: "LSST".into(),
            table: "Source".into(),
            alias: None,
            ..Default::default()
        });
        let plan = rewrite(&stmt, &chunker(), &css).unwrap();
        assert!(plan.uses_sub_chunks);
        assert_eq!(plan.fragment_sql_templates.len(), 2);
        assert!(plan.fragment_sql_templates[0].contains("Object_{chunk}_{subChunk}"));
        assert!(plan.fragment_sql_templates[0].contains("Source_{chunk}_{subChunk}"));
        assert!(!plan.fragment_sql_templates[0].contains("Overlap"));
        assert!(plan.fragment_sql_templates[1].contains("Source_{chunk}_{subChunk}Overlap"));
    }

    #[test]
    fn aliases_are_preserved_in_the_from_clause() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let mut stmt = simple_stmt();
        stmt.from[0].alias = Some("o".into());
        let plan = rewrite(&stmt, &chunker(), &css).unwrap();
        assert!(plan.fragment_sql_templates[0].contains("AS o"));
    }

    #[test]
    fn count_becomes_sum_of_partial_counts() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let mut stmt = simple_stmt();
        stmt.select_list = vec![ValueExpr::Aggregate {
            func: AggFunc::Count,
            arg: Box::new(ValueExpr::Column(ColumnRef {
                table: None,
                column: "objectId".into(),
            })),
        }];
        let plan = rewrite(&stmt, &chunker(), &css).unwrap();
        assert!(plan.fragment_sql_templates[0].contains("COUNT(objectId)"));
        assert!(plan.merge_sql.contains("SUM(objectId_partial_count)"));
    }

    #[test]
    fn avg_splits_into_sum_and_count() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let mut stmt = simple_stmt();
        stmt.select_list = vec![ValueExpr::Aggregate {
            func: AggFunc::Avg,
            arg: Box::new(ValueExpr::Column(ColumnRef {
                table: None,
                column: "mag".into(),
            })),
        }];
        let plan = rewrite(&stmt, &chunker(), &css).unwrap();
        assert!(plan.fragment_sql_templates[0].contains("SUM(mag)"));
        assert!(plan.fragment_sql_templates[0].contains("COUNT(mag)"));
        assert!(plan.merge_sql.contains("SUM(mag_partial_sum) / SUM(mag_partial_count)"));
    }

    #[test]
    fn unrestricted_query_covers_every_chunk() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let c = chunker();
        let plan = rewrite(&simple_stmt(), &c, &css).unwrap();
        let expected: i32 = (0..c.num_stripes()).map(|s| c.num_chunks(s)).sum();
        assert_eq!(plan.chunk_ids.len() as i32, expected);
    }

    #[test]
    fn spatial_restrictor_prunes_chunk_set() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let c = chunker();
        let mut stmt = simple_stmt();
        stmt.spatial = Some(crate::ast::SpatialRestrictor::Box {
            ra_min: 0.0,
            dec_min: -5.0,
            ra_max: 10.0,
            dec_max: 5.0,
        });
        let plan = rewrite(&stmt, &c, &css).unwrap();
        let expected: i32 = (0..c.num_stripes()).map(|s| c.num_chunks(s)).sum();
        assert!((plan.chunk_ids.len() as i32) < expected);
        assert!(!plan.chunk_ids.is_empty());
    }

    #[test]
    fn group_by_order_by_and_limit_pass_through_to_merge_sql() {
        let kv = css_snapshot();
        let css = Facade::new(&kv, "");
        let mut stmt = simple_stmt();
        stmt.group_by = vec![ValueExpr::Column(ColumnRef {
            table: None,
            column: "ra".into(),
        })];
        stmt.order_by = vec![OrderBy {
            expr: ValueExpr::Column(ColumnRef {
                table: None,
                column: "ra".into(),
            }),
            descending: true,
        }];
        stmt.limit = Some(10);
        let plan = rewrite(&stmt, &chunker(), &css).unwrap();
        assert!(plan.merge_sql.contains("GROUP BY ra"));
        assert!(plan.merge_sql.contains("ORDER BY ra DESC"));
        assert!(plan.merge_sql.contains("LIMIT 10"));
    }
}
