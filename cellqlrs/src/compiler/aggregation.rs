//! Aggregate SELECT items, dispatched by aggregation kind, the value's
//! effective type and the active dialect.
//!
//! Any combination without a template is omitted from the output rather than
//! reported as an error.

use futures::future::join_all;

use super::emptiness::Emptiness;
use super::value::ValueResolver;
use super::{AliasArena, CompileContext, CompileScope};
use crate::error::{CellqlError, Result};
use crate::models::{
    Aggregation, AggregationRequest, AttachmentAggregation, BooleanAggregation, Column,
    ColumnType, CommonAggregation, DateAggregation, NumericalAggregation,
};
use crate::sql_ast::{SelectQuery, SqlExpr, SqlRenderer, TableRef};

/// JSON field attachment sizes are read from.
const ATTACHMENT_SIZE_FIELD: &str = "size";

/// Rows being aggregated: the outer table and its filters.
///
/// Self-contained items replay this frame inside their own subquery.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSource {
    pub table: TableRef,
    pub filters: Vec<SqlExpr>,
}

impl AggregationSource {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            filters: Vec::new(),
        }
    }

    pub fn from_query(query: &SelectQuery) -> Result<Self> {
        let table = query
            .from
            .clone()
            .ok_or_else(|| CellqlError::Sql("aggregation source query has no FROM".to_string()))?;
        Ok(Self {
            table,
            filters: query.filters.clone(),
        })
    }
}

/// One aliased aggregate SELECT item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateExpr {
    pub alias: String,
    pub sql: String,
    /// Selects from its own copy of the source frame and needs no outer FROM.
    pub self_contained: bool,
}

struct Rendered {
    sql: String,
    self_contained: bool,
}

impl Rendered {
    fn inline(sql: String) -> Option<Self> {
        Some(Self {
            sql,
            self_contained: false,
        })
    }
}

/// Rendered FROM target plus filters of the rows being aggregated.
struct Frame {
    from: String,
    filters: Vec<String>,
}

impl Frame {
    fn where_clause(&self, extra: Option<String>) -> String {
        let conditions: Vec<String> = self.filters.iter().cloned().chain(extra).collect();
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}

pub struct AggregationCompiler<'a> {
    ctx: CompileContext<'a>,
}

impl<'a> AggregationCompiler<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self { ctx }
    }

    /// Compile every request; failed or unsupported items are left out.
    pub async fn compile_all(
        &self,
        scope: CompileScope<'_>,
        source: &AggregationSource,
        requests: &[AggregationRequest],
    ) -> Vec<AggregateExpr> {
        join_all(
            requests
                .iter()
                .enumerate()
                .map(|(index, request)| self.compile_request(index, request, scope, source)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    async fn compile_request(
        &self,
        index: usize,
        request: &AggregationRequest,
        scope: CompileScope<'_>,
        source: &AggregationSource,
    ) -> Option<AggregateExpr> {
        let column = match self.ctx.provider.column(&request.column).await {
            Ok(column) => column,
            Err(err) => {
                tracing::warn!(column = %request.column, error = %err, "omitting aggregation");
                return None;
            }
        };
        if column.model_id != scope.model.id {
            tracing::warn!(
                column = %column.id,
                model = %column.model_id,
                "omitting aggregation on a column of another model"
            );
            return None;
        }
        let alias = request.alias.clone().unwrap_or_else(|| column.id.clone());
        let mut arena = AliasArena::for_aggregation(index);
        match self
            .compile(&column, request.aggregation, scope, source, &alias, &mut arena)
            .await
        {
            Ok(expr) => expr,
            Err(err) => {
                tracing::warn!(column = %column.id, error = %err, "omitting aggregation");
                None
            }
        }
    }

    /// Aliased expression for one aggregation, or `None` when it is omitted.
    pub async fn compile(
        &self,
        column: &Column,
        aggregation: Aggregation,
        scope: CompileScope<'_>,
        source: &AggregationSource,
        alias: &str,
        arena: &mut AliasArena,
    ) -> Result<Option<AggregateExpr>> {
        if aggregation == Aggregation::Common(CommonAggregation::None) {
            return Ok(None);
        }
        let Some(value) = ValueResolver::new(self.ctx)
            .resolve(column, scope, arena)
            .await?
        else {
            tracing::debug!(column = %column.id, "column has no single value per row");
            return Ok(None);
        };
        if !value.value_type.supports_aggregation(aggregation.category()) {
            tracing::debug!(
                column = %column.id,
                value_type = ?value.value_type,
                aggregation = %aggregation,
                "no template for aggregation"
            );
            return Ok(None);
        }

        let dialect = self.ctx.dialect;
        let renderer = SqlRenderer::new(dialect);
        let emptiness = Emptiness::for_type(value.value_type);
        let source_frame = Frame {
            from: renderer.render_table_ref(&source.table),
            filters: source.filters.iter().map(|f| renderer.render_expr(f)).collect(),
        };
        let value_sql = renderer.render_expr(&value.expr);

        let rendered = if value.expr.contains_subquery() && !dialect.supports_aggregate_over_subquery()
        {
            tracing::debug!(
                column = %column.id,
                dialect = ?dialect.kind(),
                "aggregating over a derived table"
            );
            let derived = dialect.quote_ident("__agg");
            let derived_value = format!("{derived}.{}", dialect.quote_ident("__value"));
            let inner = format!(
                "SELECT {value_sql} AS {} FROM {}{}",
                dialect.quote_ident("__value"),
                source_frame.from,
                source_frame.where_clause(None)
            );
            let frame = Frame {
                from: format!("({inner}) {derived}"),
                filters: Vec::new(),
            };
            match self.template(aggregation, &derived_value, value.value_type, emptiness, &frame, arena) {
                Some(r) if !r.self_contained => Some(Rendered {
                    sql: format!("(SELECT {} FROM {})", r.sql, frame.from),
                    self_contained: true,
                }),
                other => other,
            }
        } else {
            self.template(aggregation, &value_sql, value.value_type, emptiness, &source_frame, arena)
        };

        let Some(rendered) = rendered else {
            tracing::debug!(
                column = %column.id,
                aggregation = %aggregation,
                dialect = ?dialect.kind(),
                "aggregation unavailable on dialect"
            );
            return Ok(None);
        };
        tracing::trace!(column = %column.id, aggregation = %aggregation, "compiled aggregation");
        Ok(Some(AggregateExpr {
            alias: alias.to_string(),
            sql: rendered.sql,
            self_contained: rendered.self_contained,
        }))
    }

    fn template(
        &self,
        aggregation: Aggregation,
        value: &str,
        value_type: ColumnType,
        emptiness: Emptiness,
        frame: &Frame,
        arena: &mut AliasArena,
    ) -> Option<Rendered> {
        let d = self.ctx.dialect;
        let percent = |n: String| format!("({n} * 100.0 / NULLIF(COUNT(*), 0))");

        match aggregation {
            Aggregation::Common(kind) => {
                let empty = emptiness.empty_condition(value, d);
                let filled = emptiness.filled_condition(value, d);
                let distinct_filled = || {
                    let compared = if emptiness == Emptiness::NullOrEmptyArray {
                        d.cast_to_text(value)
                    } else {
                        value.to_string()
                    };
                    format!("COUNT(DISTINCT CASE WHEN {filled} THEN {compared} END)")
                };
                let sql = match kind {
                    CommonAggregation::Count => "COUNT(*)".to_string(),
                    CommonAggregation::CountEmpty => d.count_where(&empty),
                    CommonAggregation::CountFilled => d.count_where(&filled),
                    CommonAggregation::CountUnique => distinct_filled(),
                    CommonAggregation::PercentEmpty => percent(d.count_where(&empty)),
                    CommonAggregation::PercentFilled => percent(d.count_where(&filled)),
                    CommonAggregation::PercentUnique => percent(distinct_filled()),
                    CommonAggregation::None => return None,
                };
                Rendered::inline(sql)
            }
            Aggregation::Numerical(kind) => {
                // empty ratings (0) must not pull statistics down
                let v = if emptiness == Emptiness::NullOrZero {
                    format!("NULLIF({value}, 0)")
                } else {
                    value.to_string()
                };
                let sql = match kind {
                    NumericalAggregation::Avg => format!("AVG({v})"),
                    NumericalAggregation::Min => format!("MIN({v})"),
                    NumericalAggregation::Max => format!("MAX({v})"),
                    NumericalAggregation::Sum => format!("SUM({v})"),
                    NumericalAggregation::StandardDeviation => d.stddev_pop(&v),
                    NumericalAggregation::Range => format!("(MAX({v}) - MIN({v}))"),
                    NumericalAggregation::Median => return Some(self.median(&v, frame)),
                };
                Rendered::inline(sql)
            }
            Aggregation::Boolean(kind) => {
                let checked = format!("{value} = {}", d.bool_literal(true));
                let unchecked = format!("({value} IS NULL OR {value} = {})", d.bool_literal(false));
                let sql = match kind {
                    BooleanAggregation::Checked => d.count_where(&checked),
                    BooleanAggregation::Unchecked => d.count_where(&unchecked),
                    BooleanAggregation::PercentChecked => percent(d.count_where(&checked)),
                    BooleanAggregation::PercentUnchecked => percent(d.count_where(&unchecked)),
                };
                Rendered::inline(sql)
            }
            Aggregation::Date(kind) => {
                let earliest = format!("MIN({value})");
                let latest = format!("MAX({value})");
                let sql = match kind {
                    DateAggregation::EarliestDate => earliest,
                    DateAggregation::LatestDate => latest,
                    DateAggregation::DateRange => d.date_diff_days(&earliest, &latest),
                    DateAggregation::MonthRange => d.month_diff(&earliest, &latest),
                };
                Rendered::inline(sql)
            }
            Aggregation::Attachment(AttachmentAggregation::AttachmentSize) => {
                if value_type != ColumnType::Attachment {
                    return None;
                }
                let alias = arena.fresh();
                let unnest = d.json_array_unnest(value, &alias, ATTACHMENT_SIZE_FIELD)?;
                Some(Rendered {
                    sql: format!(
                        "(SELECT COALESCE(SUM({}), 0) FROM {} {}{})",
                        unnest.value_expr,
                        frame.from,
                        unnest.from_fragment,
                        frame.where_clause(None)
                    ),
                    self_contained: true,
                })
            }
        }
    }

    fn median(&self, v: &str, frame: &Frame) -> Rendered {
        let d = self.ctx.dialect;
        let config = &self.ctx.config.aggregation;
        if config.prefer_native_median {
            if let Some(sql) = d.native_median(v) {
                return Rendered {
                    sql,
                    self_contained: false,
                };
            }
            tracing::debug!(dialect = ?d.kind(), "no native median, using windowed fallback");
        }

        let m = d.quote_ident("__m");
        let val = d.quote_ident("__v");
        let rn = d.quote_ident("__rn");
        let cnt = d.quote_ident("__cnt");
        let skip_nulls = config.median_skip_nulls.then(|| format!("{v} IS NOT NULL"));
        Rendered {
            sql: format!(
                "(SELECT AVG({m}.{val} * 1.0) FROM (SELECT {v} AS {val}, \
                 ROW_NUMBER() OVER (ORDER BY {v}) AS {rn}, COUNT(*) OVER () AS {cnt} \
                 FROM {}{}) {m} \
                 WHERE {m}.{rn} IN (FLOOR(({m}.{cnt} + 1) / 2.0), FLOOR(({m}.{cnt} + 2) / 2.0)))",
                frame.from,
                frame.where_clause(skip_nulls)
            ),
            self_contained: true,
        }
    }
}
