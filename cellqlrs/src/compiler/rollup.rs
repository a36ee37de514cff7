//! Rollup subqueries: an aggregate over the rows a to-many link reaches.

use super::relation::{RelationResolver, ResolvedRelation};
use super::value::{rollup_value_type, ResolvedValue};
use super::{AliasArena, CompileContext};
use crate::error::{CellqlError, Result};
use crate::models::{AggregateFunction, Column, ColumnType, RelationType};
use crate::sql_ast::{Join, SelectItem, SelectQuery, SqlExpr, TableRef};

pub struct RollupCompiler<'a> {
    ctx: CompileContext<'a>,
}

/// Related-row frame correlated to an outer alias, before projection.
struct CollectionFrame {
    query: SelectQuery,
    related_alias: String,
}

impl<'a> RollupCompiler<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self { ctx }
    }

    /// `(SELECT fn(target) FROM related ... WHERE <correlation to outer_alias>)`.
    ///
    /// `function` is a closed enum, so only allow-listed names reach the SQL.
    pub async fn build(
        &self,
        relation_column: &Column,
        target_column: &Column,
        function: AggregateFunction,
        outer_alias: &str,
        arena: &mut AliasArena,
    ) -> Result<SqlExpr> {
        let relation = RelationResolver::new(self.ctx).resolve(relation_column).await?;
        let related = relation.related_model(&relation_column.model_id);
        if target_column.model_id != related.id {
            return Err(CellqlError::Metadata(format!(
                "rollup target {} is not on related model {}",
                target_column.id, related.id
            )));
        }
        let target = target_column.physical_name()?.to_string();

        let mut frame = collection_frame(&relation, outer_alias, arena)?;
        frame.query.select.push(SelectItem {
            expr: SqlExpr::Aggregate {
                agg: function,
                expr: Box::new(SqlExpr::column(&frame.related_alias, &target)),
            },
            alias: None,
        });
        Ok(SqlExpr::Subquery(Box::new(frame.query)))
    }

    /// Subquery for a rollup column, with the type of value it yields.
    pub async fn build_for(
        &self,
        rollup_column: &Column,
        outer_alias: &str,
        arena: &mut AliasArena,
    ) -> Result<ResolvedValue> {
        let options = rollup_column.rollup_options().ok_or_else(|| {
            CellqlError::Metadata(format!(
                "rollup column {} carries no rollup options",
                rollup_column.id
            ))
        })?;
        let provider = self.ctx.provider;
        let relation_column = provider.column(&options.relation_column).await?;
        let target_column = provider.column(&options.target_column).await?;
        let expr = self
            .build(
                &relation_column,
                &target_column,
                options.function,
                outer_alias,
                arena,
            )
            .await?;
        tracing::trace!(column = %rollup_column.id, function = ?options.function, "compiled rollup");
        Ok(ResolvedValue {
            expr,
            value_type: rollup_value_type(options.function, target_column.column_type),
        })
    }

    /// `(SELECT COUNT(*) ...)` over the rows a to-many link reaches.
    pub async fn link_count(
        &self,
        link_column: &Column,
        outer_alias: &str,
        arena: &mut AliasArena,
    ) -> Result<ResolvedValue> {
        let relation = RelationResolver::new(self.ctx).resolve(link_column).await?;
        let mut frame = collection_frame(&relation, outer_alias, arena)?;
        frame.query.select.push(SelectItem {
            expr: SqlExpr::Aggregate {
                agg: AggregateFunction::Count,
                expr: Box::new(SqlExpr::Wildcard { table: None }),
            },
            alias: None,
        });
        Ok(ResolvedValue {
            expr: SqlExpr::Subquery(Box::new(frame.query)),
            value_type: ColumnType::Number,
        })
    }
}

fn collection_frame(
    relation: &ResolvedRelation,
    outer_alias: &str,
    arena: &mut AliasArena,
) -> Result<CollectionFrame> {
    match relation.relation_type {
        RelationType::HasMany => {
            let alias = arena.fresh();
            let mut query = SelectQuery::from_table(TableRef::aliased(
                relation.child_model.table_name.clone(),
                alias.clone(),
            ));
            query.filters.push(SqlExpr::eq(
                SqlExpr::column(&alias, relation.child_column.physical_name()?),
                SqlExpr::column(outer_alias, relation.parent_column.physical_name()?),
            ));
            Ok(CollectionFrame {
                query,
                related_alias: alias,
            })
        }
        RelationType::ManyToMany => {
            let junction = relation.junction.as_ref().ok_or_else(|| {
                CellqlError::Metadata(format!(
                    "many-to-many link {} has no junction",
                    relation.column_id
                ))
            })?;
            let alias = arena.fresh();
            let junction_alias = arena.fresh();
            let mut query = SelectQuery::from_table(TableRef::aliased(
                relation.parent_model.table_name.clone(),
                alias.clone(),
            ));
            query.joins.push(Join {
                table: TableRef::aliased(junction.model.table_name.clone(), junction_alias.clone()),
                on: vec![SqlExpr::eq(
                    SqlExpr::column(&junction_alias, junction.parent_column.physical_name()?),
                    SqlExpr::column(&alias, relation.parent_column.physical_name()?),
                )],
            });
            query.filters.push(SqlExpr::eq(
                SqlExpr::column(&junction_alias, junction.child_column.physical_name()?),
                SqlExpr::column(outer_alias, relation.child_column.physical_name()?),
            ));
            Ok(CollectionFrame {
                query,
                related_alias: alias,
            })
        }
        other @ (RelationType::BelongsTo | RelationType::OneToOne) => {
            Err(CellqlError::UnsupportedRelation {
                column: relation.column_id.clone(),
                relation: format!("{other} (rollups need has_many or many_to_many)"),
            })
        }
    }
}
