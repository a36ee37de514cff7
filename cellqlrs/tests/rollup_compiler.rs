//! Rollup subqueries and link geometry.

mod common;

use cellql::compiler::{AliasArena, RelationResolver, RollupCompiler};
use cellql::dialect::{MsSqlDialect, PostgresDialect};
use cellql::error::CellqlError;
use cellql::models::{AggregateFunction, ColumnType, RelationType};
use cellql::sql_ast::{SqlExpr, SqlRenderer};
use common::Fixture;

fn render(expr: &SqlExpr) -> String {
    SqlRenderer::new(&PostgresDialect).render_expr(expr)
}

#[tokio::test]
async fn has_many_rollup_correlates_child_to_outer_row() {
    let fixture = Fixture::new();
    let rollups = RollupCompiler::new(fixture.ctx(&PostgresDialect));
    let mut arena = AliasArena::new("r");
    let expr = rollups
        .build(
            fixture.column("orders_line_items"),
            fixture.column("line_items_amount"),
            AggregateFunction::Avg,
            "o",
            &mut arena,
        )
        .await
        .unwrap();
    assert_eq!(
        render(&expr),
        "(SELECT AVG(\"r_0\".\"amount\") FROM \"line_items\" \"r_0\" \
         WHERE (\"r_0\".\"order_id\" = \"o\".\"id\"))"
    );
    assert_eq!(arena.allocated(), 1);
}

#[tokio::test]
async fn many_to_many_rollup_has_exactly_one_junction_join() {
    let fixture = Fixture::new();
    let rollups = RollupCompiler::new(fixture.ctx(&PostgresDialect));
    let mut arena = AliasArena::new("r");
    let value = rollups
        .build_for(fixture.column("orders_tag_count"), "orders", &mut arena)
        .await
        .unwrap();
    let SqlExpr::Subquery(query) = &value.expr else {
        panic!("expected a scalar subquery, got {:?}", value.expr);
    };
    assert_eq!(query.joins.len(), 1);
    assert_eq!(query.from.as_ref().map(|t| t.name.as_str()), Some("tags"));
    assert_eq!(query.joins[0].table.name, "order_tags");
    assert_eq!(query.filters.len(), 1);
    assert_eq!(value.value_type, ColumnType::Decimal);
}

#[tokio::test]
async fn distinct_functions_render_inside_the_aggregate() {
    let fixture = Fixture::new();
    let rollups = RollupCompiler::new(fixture.ctx(&MsSqlDialect));
    let mut arena = AliasArena::new("r");
    let expr = rollups
        .build(
            fixture.column("orders_line_items"),
            fixture.column("line_items_sku"),
            AggregateFunction::CountDistinct,
            "orders",
            &mut arena,
        )
        .await
        .unwrap();
    let sql = SqlRenderer::new(&MsSqlDialect).render_expr(&expr);
    assert!(sql.starts_with("(SELECT COUNT(DISTINCT [r_0].[sku]) FROM [line_items] [r_0]"));
}

#[tokio::test]
async fn min_and_max_keep_the_target_type() {
    let fixture = Fixture::new();
    let rollups = RollupCompiler::new(fixture.ctx(&PostgresDialect));
    let value = rollups
        .build_for(
            fixture.column("customers_lifetime"),
            "customers",
            &mut AliasArena::new("r"),
        )
        .await
        .unwrap();
    // SUM widens to decimal
    assert_eq!(value.value_type, ColumnType::Decimal);
    assert!(render(&value.expr).contains("SUM(\"r_0\".\"amount\")"));

    let mut fixture = Fixture::new();
    if let Some(cellql::models::ColumnOptions::Rollup(opts)) = fixture
        .registry
        .columns
        .get_mut("customers_lifetime")
        .and_then(|c| c.options.as_mut())
    {
        opts.function = AggregateFunction::Max;
    }
    let rollups = RollupCompiler::new(fixture.ctx(&PostgresDialect));
    let value = rollups
        .build_for(
            fixture.column("customers_lifetime"),
            "customers",
            &mut AliasArena::new("r"),
        )
        .await
        .unwrap();
    assert_eq!(value.value_type, ColumnType::Currency);
}

#[tokio::test]
async fn belongs_to_rollup_is_rejected() {
    let fixture = Fixture::new();
    let rollups = RollupCompiler::new(fixture.ctx(&PostgresDialect));
    let err = rollups
        .build(
            fixture.column("orders_customer"),
            fixture.column("customers_name"),
            AggregateFunction::Count,
            "orders",
            &mut AliasArena::new("r"),
        )
        .await
        .unwrap_err();
    match err {
        CellqlError::UnsupportedRelation { column, relation } => {
            assert_eq!(column, "orders_customer");
            assert!(relation.starts_with("belongs_to"), "{relation}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn target_must_live_on_the_related_model() {
    let fixture = Fixture::new();
    let rollups = RollupCompiler::new(fixture.ctx(&PostgresDialect));
    let err = rollups
        .build(
            fixture.column("orders_line_items"),
            fixture.column("tags_name"),
            AggregateFunction::Count,
            "orders",
            &mut AliasArena::new("r"),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not on related model line_items"));
}

#[tokio::test]
async fn link_count_counts_rows_and_is_numeric() {
    let fixture = Fixture::new();
    let rollups = RollupCompiler::new(fixture.ctx(&PostgresDialect));
    let value = rollups
        .link_count(fixture.column("orders_tag_links"), "orders", &mut AliasArena::new("r"))
        .await
        .unwrap();
    assert_eq!(value.value_type, ColumnType::Number);
    assert_eq!(
        render(&value.expr),
        "(SELECT COUNT(*) FROM \"tags\" \"r_0\" \
         JOIN \"order_tags\" \"r_1\" ON (\"r_1\".\"tag_id\" = \"r_0\".\"id\") \
         WHERE (\"r_1\".\"order_id\" = \"orders\".\"id\"))"
    );
}

#[tokio::test]
async fn relation_resolver_orients_each_link_type() {
    let fixture = Fixture::new();
    let relations = RelationResolver::new(fixture.ctx(&PostgresDialect));

    let belongs_to = relations.resolve(fixture.column("orders_customer")).await.unwrap();
    assert_eq!(belongs_to.relation_type, RelationType::BelongsTo);
    let hop = belongs_to.to_one_hop("orders").expect("to-one from child");
    assert_eq!(hop.model.id, "customers");
    assert_eq!(hop.related_key.id, "customers_id");
    assert_eq!(hop.current_key.id, "orders_customer_id");
    assert!(belongs_to.to_one_hop("customers").is_none());

    let has_many = relations.resolve(fixture.column("orders_line_items")).await.unwrap();
    assert!(has_many.to_one_hop("orders").is_none());
    assert_eq!(has_many.related_model("orders").id, "line_items");

    let many = relations.resolve(fixture.column("orders_tag_links")).await.unwrap();
    let junction = many.junction.as_ref().expect("junction");
    assert_eq!(junction.model.id, "order_tags");
    assert_eq!(many.related_model("orders").id, "tags");
}

#[tokio::test]
async fn many_to_many_without_junction_fails_to_resolve() {
    let mut fixture = Fixture::new();
    if let Some(cellql::models::ColumnOptions::Relation(opts)) = fixture
        .registry
        .columns
        .get_mut("orders_tag_links")
        .and_then(|c| c.options.as_mut())
    {
        opts.junction = None;
    }
    let err = RelationResolver::new(fixture.ctx(&PostgresDialect))
        .resolve(fixture.column("orders_tag_links"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("has no junction"));
}

#[tokio::test]
async fn non_link_column_has_no_relation() {
    let fixture = Fixture::new();
    let err = RelationResolver::new(fixture.ctx(&PostgresDialect))
        .resolve(fixture.column("orders_note"))
        .await
        .unwrap_err();
    assert!(matches!(err, CellqlError::Metadata(_)));
}
