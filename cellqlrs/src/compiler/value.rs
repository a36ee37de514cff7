//! Value expressions with the effective type they carry.
//!
//! Virtual columns aggregate and empty-check as the type of what they produce,
//! not as their own tag: a SUM rollup is a number, a lookup is whatever its
//! terminal column is.

use super::lookup::{LookupChainResolver, LookupResolution};
use super::relation::RelationResolver;
use super::rollup::RollupCompiler;
use super::{AliasArena, CompileContext, CompileScope};
use crate::error::{CellqlError, Result};
use crate::formula::FormulaScope;
use crate::models::{AggregateFunction, Column, ColumnType, FormulaResultType};
use crate::sql_ast::SqlExpr;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    pub expr: SqlExpr,
    pub value_type: ColumnType,
}

pub fn rollup_value_type(function: AggregateFunction, target_type: ColumnType) -> ColumnType {
    if function.preserves_type() {
        target_type
    } else {
        ColumnType::Decimal
    }
}

pub fn formula_value_type(result_type: FormulaResultType) -> ColumnType {
    match result_type {
        FormulaResultType::Text => ColumnType::SingleLineText,
        FormulaResultType::Number => ColumnType::Decimal,
        FormulaResultType::Date => ColumnType::DateTime,
        FormulaResultType::Boolean => ColumnType::Checkbox,
    }
}

/// Compiles a formula column against a scope.
pub(crate) async fn formula_value(
    ctx: CompileContext<'_>,
    column: &Column,
    scope: CompileScope<'_>,
) -> Result<ResolvedValue> {
    let options = column.formula_options().ok_or_else(|| {
        CellqlError::Metadata(format!(
            "formula column {} carries no formula options",
            column.id
        ))
    })?;
    let sql = ctx
        .formulas
        .compile(
            options,
            FormulaScope {
                alias: scope.alias,
                model: scope.model,
            },
            ctx.dialect,
        )
        .await?;
    Ok(ResolvedValue {
        expr: SqlExpr::Raw(format!("({sql})")),
        value_type: formula_value_type(options.result_type),
    })
}

pub struct ValueResolver<'a> {
    ctx: CompileContext<'a>,
}

impl<'a> ValueResolver<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self { ctx }
    }

    /// Expression for one value of `column` per row of `scope`.
    ///
    /// `None` when the column has no single value per row (a lookup through a
    /// to-many link).
    pub async fn resolve(
        &self,
        column: &Column,
        scope: CompileScope<'_>,
        arena: &mut AliasArena,
    ) -> Result<Option<ResolvedValue>> {
        let rollups = RollupCompiler::new(self.ctx);
        let value = match column.column_type {
            ColumnType::Rollup => rollups.build_for(column, scope.alias, arena).await?,
            ColumnType::Links => rollups.link_count(column, scope.alias, arena).await?,
            ColumnType::Formula => formula_value(self.ctx, column, scope).await?,
            ColumnType::LinkToAnotherRecord => {
                let relation = RelationResolver::new(self.ctx).resolve(column).await?;
                if relation.to_one_hop(&scope.model.id).is_none() {
                    rollups.link_count(column, scope.alias, arena).await?
                } else {
                    match LookupChainResolver::new(self.ctx)
                        .resolve(column, scope, arena)
                        .await?
                    {
                        LookupResolution::Resolved(chain) => chain.into_value(),
                        LookupResolution::NotOrderable { .. } => return Ok(None),
                    }
                }
            }
            ColumnType::Lookup => {
                match LookupChainResolver::new(self.ctx)
                    .resolve(column, scope, arena)
                    .await?
                {
                    LookupResolution::Resolved(chain) => chain.into_value(),
                    LookupResolution::NotOrderable { .. } => return Ok(None),
                }
            }
            column_type => ResolvedValue {
                expr: SqlExpr::column(scope.alias, column.physical_name()?),
                value_type: column_type,
            },
        };
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_rollups_keep_target_type() {
        assert_eq!(
            rollup_value_type(AggregateFunction::Max, ColumnType::Date),
            ColumnType::Date
        );
        assert_eq!(
            rollup_value_type(AggregateFunction::CountDistinct, ColumnType::SingleLineText),
            ColumnType::Decimal
        );
    }

    #[test]
    fn formula_results_map_to_column_types() {
        assert_eq!(
            formula_value_type(FormulaResultType::Boolean),
            ColumnType::Checkbox
        );
        assert!(formula_value_type(FormulaResultType::Number).is_numeric());
    }
}
