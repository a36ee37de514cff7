use std::fmt;

use futures::future::join_all;

use super::lookup::{LookupChainResolver, LookupResolution};
use super::relation::RelationResolver;
use super::rollup::RollupCompiler;
use super::value::formula_value;
use super::{AliasArena, CompileContext, CompileScope};
use crate::error::Result;
use crate::models::{Column, ColumnType, RelationType, SortDirection, SortSpec};
use crate::sql_ast::{NullsOrder, OrderItem, SelectQuery, SqlExpr};

/// Fixed null placement: descending puts NULLs last, ascending puts them first.
pub fn null_placement(direction: SortDirection) -> NullsOrder {
    match direction {
        SortDirection::Desc => NullsOrder::Last,
        SortDirection::Asc => NullsOrder::First,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// A lookup chain crosses a to-many link.
    NotOrderable { relation_type: RelationType },
    /// Direct sort on a link that does not reach a single row.
    ToManyLink { relation_type: RelationType },
    /// The column belongs to another model than the query.
    ForeignColumn { model_id: String },
    /// Metadata lookup or compilation failed for this spec only.
    Failed(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NotOrderable { relation_type } => {
                write!(f, "lookup chain crosses a {relation_type} link")
            }
            DropReason::ToManyLink { relation_type } => {
                write!(f, "{relation_type} link has no single related row")
            }
            DropReason::ForeignColumn { model_id } => {
                write!(f, "column belongs to model {model_id}")
            }
            DropReason::Failed(msg) => f.write_str(msg),
        }
    }
}

/// A sort spec that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedSort {
    pub index: usize,
    pub column: String,
    pub reason: DropReason,
}

enum SortTarget {
    Expr(SqlExpr),
    Drop(DropReason),
}

pub struct SortCompiler<'a> {
    ctx: CompileContext<'a>,
}

impl<'a> SortCompiler<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self { ctx }
    }

    /// Append one ORDER BY term per spec, in spec order. Specs that cannot be
    /// honored are skipped; the rest still apply.
    pub async fn apply(&self, query: &mut SelectQuery, scope: CompileScope<'_>, specs: &[SortSpec]) {
        self.apply_with_report(query, scope, specs).await;
    }

    /// Like [`SortCompiler::apply`], returning the specs that were skipped.
    pub async fn apply_with_report(
        &self,
        query: &mut SelectQuery,
        scope: CompileScope<'_>,
        specs: &[SortSpec],
    ) -> Vec<DroppedSort> {
        let outcomes: Vec<std::result::Result<OrderItem, DropReason>> =
            if self.ctx.config.sort.concurrent {
                join_all(
                    specs
                        .iter()
                        .enumerate()
                        .map(|(index, spec)| self.resolve_spec(index, spec, scope)),
                )
                .await
            } else {
                let mut outcomes = Vec::with_capacity(specs.len());
                for (index, spec) in specs.iter().enumerate() {
                    outcomes.push(self.resolve_spec(index, spec, scope).await);
                }
                outcomes
            };

        let mut dropped = Vec::new();
        for (index, (spec, outcome)) in specs.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(item) => query.order_by.push(item),
                Err(reason) => {
                    match &reason {
                        DropReason::Failed(_) => tracing::warn!(
                            column = %spec.column,
                            reason = %reason,
                            "dropping sort"
                        ),
                        _ => tracing::debug!(
                            column = %spec.column,
                            reason = %reason,
                            "dropping sort"
                        ),
                    }
                    dropped.push(DroppedSort {
                        index,
                        column: spec.column.clone(),
                        reason,
                    });
                }
            }
        }
        dropped
    }

    async fn resolve_spec(
        &self,
        index: usize,
        spec: &SortSpec,
        scope: CompileScope<'_>,
    ) -> std::result::Result<OrderItem, DropReason> {
        let failed = |err: crate::error::CellqlError| DropReason::Failed(err.to_string());
        let column = self.ctx.provider.column(&spec.column).await.map_err(failed)?;
        if column.model_id != scope.model.id {
            return Err(DropReason::ForeignColumn {
                model_id: column.model_id,
            });
        }

        let mut arena = AliasArena::for_sort(index);
        match self.sort_target(&column, scope, &mut arena).await.map_err(failed)? {
            SortTarget::Expr(expr) => Ok(OrderItem {
                expr,
                direction: spec.direction,
                nulls: Some(null_placement(spec.direction)),
            }),
            SortTarget::Drop(reason) => Err(reason),
        }
    }

    async fn sort_target(
        &self,
        column: &Column,
        scope: CompileScope<'_>,
        arena: &mut AliasArena,
    ) -> Result<SortTarget> {
        let expr = match column.column_type {
            ColumnType::Rollup => {
                RollupCompiler::new(self.ctx)
                    .build_for(column, scope.alias, arena)
                    .await?
                    .expr
            }
            ColumnType::Links => {
                RollupCompiler::new(self.ctx)
                    .link_count(column, scope.alias, arena)
                    .await?
                    .expr
            }
            ColumnType::Formula => formula_value(self.ctx, column, scope).await?.expr,
            ColumnType::Lookup => return self.chain_target(column, scope, arena).await,
            ColumnType::LinkToAnotherRecord => {
                let relation = RelationResolver::new(self.ctx).resolve(column).await?;
                if relation.to_one_hop(&scope.model.id).is_none() {
                    return Ok(SortTarget::Drop(DropReason::ToManyLink {
                        relation_type: relation.relation_type,
                    }));
                }
                return self.chain_target(column, scope, arena).await;
            }
            column_type => {
                let plain = SqlExpr::column(scope.alias, column.physical_name()?);
                if sorts_as_text(column_type) {
                    SqlExpr::cast_text(plain)
                } else {
                    plain
                }
            }
        };
        tracing::trace!(column = %column.id, kind = ?column.column_type, "compiled sort term");
        Ok(SortTarget::Expr(expr))
    }

    /// Order by the value a lookup chain or to-one link reaches.
    async fn chain_target(
        &self,
        column: &Column,
        scope: CompileScope<'_>,
        arena: &mut AliasArena,
    ) -> Result<SortTarget> {
        match LookupChainResolver::new(self.ctx)
            .resolve(column, scope, arena)
            .await?
        {
            LookupResolution::Resolved(chain) => {
                let needs_text = sorts_as_text(chain.value_type);
                let expr = chain
                    .map_projection(|p| if needs_text { SqlExpr::cast_text(p) } else { p })
                    .into_subquery();
                Ok(SortTarget::Expr(expr))
            }
            LookupResolution::NotOrderable { relation_type, .. } => {
                Ok(SortTarget::Drop(DropReason::NotOrderable { relation_type }))
            }
        }
    }
}

/// Types whose stored form is not reliably orderable across engines.
fn sorts_as_text(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::SingleSelect | ColumnType::MultiSelect | ColumnType::Json | ColumnType::Attachment
    )
}
