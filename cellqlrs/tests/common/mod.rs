//! Shared metadata fixture for integration tests.
//!
//! ```text
//! countries <-bt- regions <-bt- customers <-bt- orders -hm-> line_items
//!                                   |              \-mm-> tags (via order_tags)
//!                                   \-hm-> orders
//! ```
#![allow(dead_code)]

use async_trait::async_trait;
use cellql::compiler::{CompileContext, QueryCompiler};
use cellql::config::CompilerConfig;
use cellql::dialect::{Dialect, DuckDbDialect, MsSqlDialect, MySqlDialect, PostgresDialect};
use cellql::error::Result;
use cellql::formula::{FormulaCompiler, FormulaScope, TemplateFormulaCompiler};
use cellql::models::{
    AggregateFunction, Column, ColumnOptions, ColumnType, FormulaOptions, FormulaResultType,
    JunctionOptions, LookupOptions, Model, RelationOptions, RelationType, RollupOptions,
};
use cellql::registry::MetadataRegistry;

pub fn relation(
    relation_type: RelationType,
    child: &str,
    parent: &str,
    junction: Option<JunctionOptions>,
) -> ColumnOptions {
    ColumnOptions::Relation(RelationOptions {
        relation_type,
        child_column: child.to_string(),
        parent_column: parent.to_string(),
        junction,
    })
}

pub fn link(id: &str, model: &str, options: ColumnOptions) -> Column {
    Column::virtual_column(id, ColumnType::LinkToAnotherRecord, model, options)
}

pub fn links(id: &str, model: &str, options: ColumnOptions) -> Column {
    Column::virtual_column(id, ColumnType::Links, model, options)
}

pub fn rollup(id: &str, model: &str, via: &str, target: &str, function: AggregateFunction) -> Column {
    Column::virtual_column(
        id,
        ColumnType::Rollup,
        model,
        ColumnOptions::Rollup(RollupOptions {
            relation_column: via.to_string(),
            target_column: target.to_string(),
            function,
        }),
    )
}

pub fn lookup(id: &str, model: &str, via: &str, target: &str) -> Column {
    Column::virtual_column(
        id,
        ColumnType::Lookup,
        model,
        ColumnOptions::Lookup(LookupOptions {
            relation_column: via.to_string(),
            target_column: target.to_string(),
        }),
    )
}

pub fn formula(id: &str, model: &str, expression: &str, result_type: FormulaResultType) -> Column {
    Column::virtual_column(
        id,
        ColumnType::Formula,
        model,
        ColumnOptions::Formula(FormulaOptions {
            expression: expression.to_string(),
            result_type,
        }),
    )
}

fn model(id: &str, display: Option<&str>, columns: Vec<Column>) -> Model {
    let mut model = Model::new(id, id);
    model.display_column = display.map(str::to_string);
    model.columns = columns;
    model
}

pub fn models() -> Vec<Model> {
    use ColumnType::*;

    let countries = model(
        "countries",
        Some("countries_name"),
        vec![
            Column::physical("countries_id", "id", Id, "countries"),
            Column::physical("countries_name", "name", SingleLineText, "countries"),
        ],
    );

    let regions = model(
        "regions",
        Some("regions_name"),
        vec![
            Column::physical("regions_id", "id", Id, "regions"),
            Column::physical("regions_name", "name", SingleLineText, "regions"),
            Column::physical("regions_country_id", "country_id", ForeignKey, "regions"),
            link(
                "regions_country",
                "regions",
                relation(RelationType::BelongsTo, "regions_country_id", "countries_id", None),
            ),
            lookup("regions_country_name", "regions", "regions_country", "countries_name"),
        ],
    );

    let customers = model(
        "customers",
        Some("customers_name"),
        vec![
            Column::physical("customers_id", "id", Id, "customers"),
            Column::physical("customers_name", "name", SingleLineText, "customers"),
            Column::physical("customers_region_id", "region_id", ForeignKey, "customers"),
            link(
                "customers_region",
                "customers",
                relation(RelationType::BelongsTo, "customers_region_id", "regions_id", None),
            ),
            lookup("customers_region_name", "customers", "customers_region", "regions_name"),
            lookup(
                "customers_country_name",
                "customers",
                "customers_region",
                "regions_country_name",
            ),
            links(
                "customers_orders",
                "customers",
                relation(RelationType::HasMany, "orders_customer_id", "customers_id", None),
            ),
            rollup(
                "customers_lifetime",
                "customers",
                "customers_orders",
                "orders_amount",
                AggregateFunction::Sum,
            ),
            formula(
                "customers_label",
                "customers",
                "{customers_name}",
                FormulaResultType::Text,
            ),
        ],
    );

    let tags = model(
        "tags",
        Some("tags_name"),
        vec![
            Column::physical("tags_id", "id", Id, "tags"),
            Column::physical("tags_name", "name", SingleLineText, "tags"),
        ],
    );

    let order_tags = model(
        "order_tags",
        None,
        vec![
            Column::physical("order_tags_order_id", "order_id", ForeignKey, "order_tags"),
            Column::physical("order_tags_tag_id", "tag_id", ForeignKey, "order_tags"),
        ],
    );

    let line_items = model(
        "line_items",
        Some("line_items_sku"),
        vec![
            Column::physical("line_items_id", "id", Id, "line_items"),
            Column::physical("line_items_order_id", "order_id", ForeignKey, "line_items"),
            Column::physical("line_items_amount", "amount", Currency, "line_items"),
            Column::physical("line_items_sku", "sku", SingleLineText, "line_items"),
        ],
    );

    let order_items = || relation(RelationType::HasMany, "line_items_order_id", "orders_id", None);
    let orders = model(
        "orders",
        Some("orders_note"),
        vec![
            Column::physical("orders_id", "id", Id, "orders"),
            Column::physical("orders_customer_id", "customer_id", ForeignKey, "orders"),
            Column::physical("orders_note", "note", SingleLineText, "orders"),
            Column::physical("orders_status", "status", SingleSelect, "orders"),
            Column::physical("orders_tags", "tags", MultiSelect, "orders"),
            Column::physical("orders_rating", "rating", Rating, "orders"),
            Column::physical("orders_amount", "amount", Currency, "orders").with_title("Amount"),
            Column::physical("orders_discount", "discount", Decimal, "orders"),
            Column::physical("orders_created", "created_on", Date, "orders"),
            Column::physical("orders_paid", "paid", Checkbox, "orders"),
            Column::physical("orders_files", "files", Attachment, "orders"),
            Column::physical("orders_meta", "meta", Json, "orders"),
            link(
                "orders_customer",
                "orders",
                relation(RelationType::BelongsTo, "orders_customer_id", "customers_id", None),
            ),
            links("orders_line_items", "orders", order_items()),
            link("orders_line_item_rows", "orders", order_items()),
            links(
                "orders_tag_links",
                "orders",
                relation(
                    RelationType::ManyToMany,
                    "orders_id",
                    "tags_id",
                    Some(JunctionOptions {
                        model: "order_tags".to_string(),
                        child_column: "order_tags_order_id".to_string(),
                        parent_column: "order_tags_tag_id".to_string(),
                    }),
                ),
            ),
            rollup(
                "orders_total_amount",
                "orders",
                "orders_line_items",
                "line_items_amount",
                AggregateFunction::Sum,
            ),
            rollup(
                "orders_tag_count",
                "orders",
                "orders_tag_links",
                "tags_name",
                AggregateFunction::Count,
            ),
            lookup("orders_customer_name", "orders", "orders_customer", "customers_name"),
            lookup(
                "orders_customer_region",
                "orders",
                "orders_customer",
                "customers_region_name",
            ),
            lookup(
                "orders_customer_country",
                "orders",
                "orders_customer",
                "customers_country_name",
            ),
            lookup(
                "orders_customer_lifetime",
                "orders",
                "orders_customer",
                "customers_lifetime",
            ),
            lookup("orders_customer_label", "orders", "orders_customer", "customers_label"),
            lookup("orders_item_skus", "orders", "orders_line_items", "line_items_sku"),
            formula(
                "orders_margin",
                "orders",
                "{Amount} - {orders_discount}",
                FormulaResultType::Number,
            ),
        ],
    );

    vec![countries, regions, customers, tags, order_tags, line_items, orders]
}

pub fn registry() -> MetadataRegistry {
    MetadataRegistry::from_models(models()).expect("fixture registry")
}

/// Formula compiler that echoes the scope it was called with.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScopeEchoFormulas;

#[async_trait]
impl FormulaCompiler for ScopeEchoFormulas {
    async fn compile(
        &self,
        formula: &FormulaOptions,
        scope: FormulaScope<'_>,
        dialect: &dyn Dialect,
    ) -> Result<String> {
        Ok(format!(
            "formula({}, {}, {})",
            formula.expression,
            dialect.quote_ident(scope.alias),
            scope.model.id
        ))
    }
}

pub struct Fixture<F = TemplateFormulaCompiler> {
    pub registry: MetadataRegistry,
    pub formulas: F,
    pub config: CompilerConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Fixture {
            registry: registry(),
            formulas: TemplateFormulaCompiler,
            config,
        }
    }
}

impl<F: FormulaCompiler> Fixture<F> {
    pub fn with_formulas(formulas: F) -> Self {
        Fixture {
            registry: registry(),
            formulas,
            config: CompilerConfig::default(),
        }
    }

    pub fn ctx<'a>(&'a self, dialect: &'a dyn Dialect) -> CompileContext<'a> {
        CompileContext {
            provider: &self.registry,
            formulas: &self.formulas,
            dialect,
            config: &self.config,
        }
    }

    pub fn compiler<'a>(&'a self, dialect: &'a dyn Dialect) -> QueryCompiler<'a> {
        QueryCompiler::new(self.ctx(dialect))
    }

    pub fn model(&self, id: &str) -> &Model {
        self.registry.get_model(id).expect("fixture model")
    }

    pub fn column(&self, id: &str) -> &Column {
        self.registry.get_column(id).expect("fixture column")
    }
}

pub fn all_dialects() -> Vec<Box<dyn Dialect>> {
    vec![
        Box::new(PostgresDialect),
        Box::new(DuckDbDialect),
        Box::new(MySqlDialect),
        Box::new(MsSqlDialect),
    ]
}
