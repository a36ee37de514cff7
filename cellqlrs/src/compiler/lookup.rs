//! Lookup chain walking.
//!
//! A lookup re-projects a column of a related row. Its target may itself be a
//! lookup, so resolution follows targets hop by hop, allocating one alias per
//! hop from the caller's [`AliasArena`], until it reaches a terminal column.
//! The walk is a loop over an explicit hop list; depth is bounded by
//! `lookup.max_depth`.

use std::collections::HashSet;

use super::relation::RelationResolver;
use super::rollup::RollupCompiler;
use super::value::{formula_value, ResolvedValue};
use super::{AliasArena, CompileContext, CompileScope};
use crate::error::{CellqlError, Result};
use crate::models::{Column, ColumnType, Model, RelationType};
use crate::sql_ast::{Join, SelectItem, SelectQuery, SqlExpr, TableRef};

/// One joined step of a chain. `on` correlates this alias to the previous one
/// (the outer scope for the first hop).
#[derive(Debug, Clone)]
pub struct LookupHop {
    pub alias: String,
    pub model: Model,
    pub on: SqlExpr,
}

#[derive(Debug, Clone)]
pub struct LookupChain {
    pub hops: Vec<LookupHop>,
    /// The non-lookup column the chain ends on.
    pub terminal: Column,
    /// Expression over the last hop's alias.
    pub projection: SqlExpr,
    pub value_type: ColumnType,
}

#[derive(Debug, Clone)]
pub enum LookupResolution {
    Resolved(LookupChain),
    /// The chain crosses a to-many link, so there is no single value per row.
    NotOrderable {
        column: String,
        relation_type: RelationType,
    },
}

impl LookupChain {
    /// Replace the projection, e.g. to cast it before ordering.
    pub fn map_projection(mut self, f: impl FnOnce(SqlExpr) -> SqlExpr) -> Self {
        self.projection = f(self.projection);
        self
    }

    /// Correlated scalar subquery yielding the chain's value, or the bare
    /// projection when the chain has no hops.
    pub fn into_subquery(self) -> SqlExpr {
        let mut hops = self.hops.into_iter();
        let Some(first) = hops.next() else {
            return self.projection;
        };
        let mut query = SelectQuery::from_table(TableRef::aliased(first.model.table_name, first.alias));
        query.select.push(SelectItem {
            expr: self.projection,
            alias: None,
        });
        query.filters.push(first.on);
        for hop in hops {
            query.joins.push(Join {
                table: TableRef::aliased(hop.model.table_name, hop.alias),
                on: vec![hop.on],
            });
        }
        SqlExpr::Subquery(Box::new(query))
    }

    pub fn into_value(self) -> ResolvedValue {
        let value_type = self.value_type;
        ResolvedValue {
            expr: self.into_subquery(),
            value_type,
        }
    }
}

pub struct LookupChainResolver<'a> {
    ctx: CompileContext<'a>,
}

impl<'a> LookupChainResolver<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self { ctx }
    }

    /// Walk `column` (a lookup or a to-one link) from `scope` to its terminal.
    pub async fn resolve(
        &self,
        column: &Column,
        scope: CompileScope<'_>,
        arena: &mut AliasArena,
    ) -> Result<LookupResolution> {
        let provider = self.ctx.provider;
        let relations = RelationResolver::new(self.ctx);
        let max_depth = self.ctx.config.lookup.max_depth;

        let mut current_alias = scope.alias.to_string();
        let mut current_model = scope.model.clone();
        let mut current = column.clone();
        let mut hops: Vec<LookupHop> = Vec::new();
        let mut seen = HashSet::new();

        loop {
            if !seen.insert(current.id.clone()) {
                return Err(CellqlError::Metadata(format!(
                    "lookup chain of {} revisits column {}",
                    column.id, current.id
                )));
            }

            let (link_column, next_target) = match current.column_type {
                ColumnType::Lookup => {
                    let options = current.lookup_options().ok_or_else(|| {
                        CellqlError::Metadata(format!(
                            "lookup column {} carries no lookup options",
                            current.id
                        ))
                    })?;
                    let link = provider.column(&options.relation_column).await?;
                    (link, Some(options.target_column.clone()))
                }
                ColumnType::LinkToAnotherRecord => (current.clone(), None),
                _ => break,
            };

            if link_column.model_id != current_model.id {
                return Err(CellqlError::Metadata(format!(
                    "link {} used by {} is not on model {}",
                    link_column.id, current.id, current_model.id
                )));
            }

            let relation = relations.resolve(&link_column).await?;
            let Some(hop) = relation.to_one_hop(&current_model.id) else {
                tracing::debug!(
                    column = %column.id,
                    link = %link_column.id,
                    relation = %relation.relation_type,
                    "lookup chain crosses a to-many link"
                );
                return Ok(LookupResolution::NotOrderable {
                    column: column.id.clone(),
                    relation_type: relation.relation_type,
                });
            };

            if hops.len() >= max_depth {
                return Err(CellqlError::Metadata(format!(
                    "lookup chain of {} exceeds max depth {max_depth}",
                    column.id
                )));
            }

            let alias = arena.fresh();
            let on = SqlExpr::eq(
                SqlExpr::column(&alias, hop.related_key.physical_name()?),
                SqlExpr::column(&current_alias, hop.current_key.physical_name()?),
            );
            let next_model = hop.model.clone();
            hops.push(LookupHop {
                alias: alias.clone(),
                model: next_model.clone(),
                on,
            });

            current = match next_target {
                Some(target) => provider.column(&target).await?,
                None => next_model.display_column().cloned().ok_or_else(|| {
                    CellqlError::Metadata(format!(
                        "model {} has no display column",
                        next_model.id
                    ))
                })?,
            };
            if current.model_id != next_model.id {
                return Err(CellqlError::Metadata(format!(
                    "lookup target {} is not on model {}",
                    current.id, next_model.id
                )));
            }
            current_alias = alias;
            current_model = next_model;
        }

        let terminal_scope = CompileScope {
            alias: &current_alias,
            model: &current_model,
        };
        let value = match current.column_type {
            ColumnType::Rollup => {
                RollupCompiler::new(self.ctx)
                    .build_for(&current, &current_alias, arena)
                    .await?
            }
            ColumnType::Links => {
                RollupCompiler::new(self.ctx)
                    .link_count(&current, &current_alias, arena)
                    .await?
            }
            ColumnType::Formula => formula_value(self.ctx, &current, terminal_scope).await?,
            column_type => ResolvedValue {
                expr: SqlExpr::column(&current_alias, current.physical_name()?),
                value_type: column_type,
            },
        };

        tracing::trace!(
            column = %column.id,
            terminal = %current.id,
            hops = hops.len(),
            "resolved lookup chain"
        );

        Ok(LookupResolution::Resolved(LookupChain {
            hops,
            terminal: current,
            projection: value.expr,
            value_type: value.value_type,
        }))
    }
}
