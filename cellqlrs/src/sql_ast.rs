use serde_json::Value;

use crate::dialect::Dialect;
use crate::models::{AggregateFunction, SortDirection};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    Column {
        table: Option<String>,
        name: String,
    },
    /// `alias.*` or `*`.
    Wildcard {
        table: Option<String>,
    },
    Literal(Value),
    /// Pre-rendered fragment spliced verbatim (formula output, dialect templates).
    Raw(String),
    /// Cast to the dialect's lexicographically sorting text type.
    CastText(Box<SqlExpr>),
    Eq {
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    Aggregate {
        agg: AggregateFunction,
        expr: Box<SqlExpr>,
    },
    /// Scalar subquery, always rendered parenthesised.
    Subquery(Box<SelectQuery>),
}

impl SqlExpr {
    pub fn column(table: &str, name: &str) -> Self {
        SqlExpr::Column {
            table: Some(table.to_string()),
            name: name.to_string(),
        }
    }

    pub fn eq(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::Eq {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn cast_text(expr: SqlExpr) -> Self {
        SqlExpr::CastText(Box::new(expr))
    }

    /// True when a scalar subquery appears anywhere inside the expression.
    pub fn contains_subquery(&self) -> bool {
        match self {
            SqlExpr::Subquery(_) => true,
            SqlExpr::Column { .. }
            | SqlExpr::Wildcard { .. }
            | SqlExpr::Literal(_)
            | SqlExpr::Raw(_) => false,
            SqlExpr::CastText(expr) | SqlExpr::Aggregate { expr, .. } => expr.contains_subquery(),
            SqlExpr::Eq { left, right } => left.contains_subquery() || right.contains_subquery(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: SqlExpr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        TableRef {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// Name columns are qualified with: the alias when present.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub on: Vec<SqlExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: SqlExpr,
    pub direction: SortDirection,
    pub nulls: Option<NullsOrder>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub select: Vec<SelectItem>,
    /// `None` renders a FROM-less select.
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub filters: Vec<SqlExpr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectQuery {
    pub fn from_table(table: TableRef) -> Self {
        SelectQuery {
            from: Some(table),
            ..Default::default()
        }
    }
}

pub struct SqlRenderer<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SqlRenderer<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    pub fn render_select(&self, query: &SelectQuery) -> String {
        let select_items: Vec<String> = query
            .select
            .iter()
            .map(|item| {
                let expr_sql = self.render_expr(&item.expr);
                match &item.alias {
                    Some(alias) => format!("{expr_sql} AS {}", self.dialect.quote_ident(alias)),
                    None => expr_sql,
                }
            })
            .collect();

        let mut sql = format!("SELECT {}", select_items.join(", "));
        if let Some(from) = &query.from {
            sql.push_str(&format!(" FROM {}", self.render_table_ref(from)));
        }

        for join in &query.joins {
            let on_clause: Vec<String> = join.on.iter().map(|e| self.render_expr(e)).collect();
            sql.push_str(&format!(
                " JOIN {} ON {}",
                self.render_table_ref(&join.table),
                on_clause.join(" AND ")
            ));
        }

        if !query.filters.is_empty() {
            let filters: Vec<String> = query.filters.iter().map(|f| self.render_expr(f)).collect();
            sql.push_str(&format!(" WHERE {}", filters.join(" AND ")));
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    self.dialect
                        .render_ordering(&self.render_expr(&o.expr), o.direction, o.nulls)
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        sql.push_str(&self.dialect.render_limit_offset(
            query.limit,
            query.offset,
            !query.order_by.is_empty(),
        ));

        sql
    }

    pub fn render_table_ref(&self, table: &TableRef) -> String {
        match &table.alias {
            Some(alias) => format!(
                "{} {}",
                self.dialect.quote_ident(&table.name),
                self.dialect.quote_ident(alias)
            ),
            None => self.dialect.quote_ident(&table.name),
        }
    }

    pub fn render_expr(&self, expr: &SqlExpr) -> String {
        match expr {
            SqlExpr::Column { table, name } => match table {
                Some(t) => format!(
                    "{}.{}",
                    self.dialect.quote_ident(t),
                    self.dialect.quote_ident(name)
                ),
                None => self.dialect.quote_ident(name),
            },
            SqlExpr::Wildcard { table } => match table {
                Some(t) => format!("{}.*", self.dialect.quote_ident(t)),
                None => "*".to_string(),
            },
            SqlExpr::Literal(v) => self.dialect.render_literal(v),
            SqlExpr::Raw(sql) => sql.clone(),
            SqlExpr::CastText(expr) => self.dialect.cast_to_text(&self.render_expr(expr)),
            SqlExpr::Eq { left, right } => {
                format!("({} = {})", self.render_expr(left), self.render_expr(right))
            }
            SqlExpr::Aggregate { agg, expr } => self
                .dialect
                .render_aggregation(*agg, &self.render_expr(expr)),
            SqlExpr::Subquery(query) => format!("({})", self.render_select(query)),
        }
    }
}
