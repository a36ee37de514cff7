//! Column-aware compilation of ORDER BY terms and aggregate SELECT items.
//!
//! Sub-compilers borrow a [`CompileContext`] and emit AST fragments; only the
//! [`QueryCompiler`] facade renders whole statements.

pub mod aggregation;
mod alias;
pub mod emptiness;
pub mod lookup;
pub mod relation;
pub mod rollup;
pub mod sort;
pub mod value;

pub use aggregation::{AggregateExpr, AggregationCompiler, AggregationSource};
pub use alias::AliasArena;
pub use emptiness::Emptiness;
pub use lookup::{LookupChain, LookupChainResolver, LookupHop, LookupResolution};
pub use relation::{RelationResolver, ResolvedJunction, ResolvedRelation, ToOneHop};
pub use rollup::RollupCompiler;
pub use sort::{null_placement, DropReason, DroppedSort, SortCompiler};
pub use value::{ResolvedValue, ValueResolver};

use crate::config::CompilerConfig;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::formula::FormulaCompiler;
use crate::metadata::MetadataProvider;
use crate::models::{AggregateRequest, ListRequest, Model, SortSpec};
use crate::sql_ast::{SelectItem, SelectQuery, SqlExpr, SqlRenderer, TableRef};

/// Collaborators shared by every sub-compiler for one compilation.
#[derive(Clone, Copy)]
pub struct CompileContext<'a> {
    pub provider: &'a dyn MetadataProvider,
    pub formulas: &'a dyn FormulaCompiler,
    pub dialect: &'a dyn Dialect,
    pub config: &'a CompilerConfig,
}

/// The alias rows are read through, and the model they belong to.
#[derive(Debug, Clone, Copy)]
pub struct CompileScope<'a> {
    pub alias: &'a str,
    pub model: &'a Model,
}

pub struct QueryCompiler<'a> {
    ctx: CompileContext<'a>,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> CompileContext<'a> {
        self.ctx
    }

    /// `SELECT "table".* FROM "table"`.
    pub fn base_query(&self, model: &Model) -> SelectQuery {
        let table = TableRef {
            name: model.table_name.clone(),
            alias: None,
        };
        SelectQuery {
            select: vec![SelectItem {
                expr: SqlExpr::Wildcard {
                    table: Some(table.qualifier().to_string()),
                },
                alias: None,
            }],
            from: Some(table),
            ..Default::default()
        }
    }

    pub async fn apply_sorts(
        &self,
        query: &mut SelectQuery,
        model: &Model,
        specs: &[SortSpec],
    ) -> Vec<DroppedSort> {
        let alias = query
            .from
            .as_ref()
            .map(|t| t.qualifier().to_string())
            .unwrap_or_else(|| model.table_name.clone());
        SortCompiler::new(self.ctx)
            .apply_with_report(
                query,
                CompileScope {
                    alias: &alias,
                    model,
                },
                specs,
            )
            .await
    }

    pub async fn compile_aggregations(
        &self,
        model: &Model,
        source: &AggregationSource,
        request: &AggregateRequest,
    ) -> Vec<AggregateExpr> {
        let scope = CompileScope {
            alias: source.table.qualifier(),
            model,
        };
        AggregationCompiler::new(self.ctx)
            .compile_all(scope, source, &request.aggregations)
            .await
    }

    pub async fn build_list_sql(&self, request: &ListRequest) -> Result<String> {
        let model = self.ctx.provider.model(&request.model).await?;
        let mut query = self.base_query(&model);
        self.apply_sorts(&mut query, &model, &request.sort).await;
        query.limit = request.limit.map(u64::from);
        query.offset = request.offset.map(u64::from);
        let sql = SqlRenderer::new(self.ctx.dialect).render_select(&query);
        tracing::debug!(model = %model.id, dialect = ?self.ctx.dialect.kind(), "compiled list query");
        Ok(sql)
    }

    /// `None` when every requested aggregation was omitted.
    pub async fn build_aggregate_sql(&self, request: &AggregateRequest) -> Result<Option<String>> {
        let model = self.ctx.provider.model(&request.model).await?;
        let source = AggregationSource::from_query(&self.base_query(&model))?;
        let items = self.compile_aggregations(&model, &source, request).await;
        if items.is_empty() {
            return Ok(None);
        }

        let self_contained = items.iter().all(|item| item.self_contained);
        let query = SelectQuery {
            select: items
                .into_iter()
                .map(|item| SelectItem {
                    expr: SqlExpr::Raw(item.sql),
                    alias: Some(item.alias),
                })
                .collect(),
            from: (!self_contained).then(|| source.table.clone()),
            filters: if self_contained {
                Vec::new()
            } else {
                source.filters.clone()
            },
            ..Default::default()
        };
        let sql = SqlRenderer::new(self.ctx.dialect).render_select(&query);
        tracing::debug!(
            model = %model.id,
            dialect = ?self.ctx.dialect.kind(),
            items = query.select.len(),
            "compiled aggregate query"
        );
        Ok(Some(sql))
    }
}
