use std::collections::HashSet;

use crate::config::ResolvedDatasourceConfig;
use crate::error::{CellqlError, Result};
use crate::models::{Column, ColumnType, Model, RelationOptions, RelationType};
use crate::registry::MetadataRegistry;

/// Structural checks over a metadata registry.
///
/// Findings are errors unless `warn_only` is set, in which case they are
/// logged. A rollup hosted on a to-one link is always fatal.
pub struct Validator {
    warn_only: bool,
    max_lookup_depth: usize,
}

impl Validator {
    pub fn new(warn_only: bool) -> Self {
        Self {
            warn_only,
            max_lookup_depth: 16,
        }
    }

    pub fn from_config(config: &ResolvedDatasourceConfig) -> Self {
        Self {
            warn_only: config.validation.warn_only,
            max_lookup_depth: config.compiler.lookup.max_depth,
        }
    }

    pub fn with_max_lookup_depth(mut self, depth: usize) -> Self {
        self.max_lookup_depth = depth;
        self
    }

    pub fn validate_registry(&self, registry: &MetadataRegistry) -> Result<()> {
        let mut model_ids: Vec<&String> = registry.models.keys().collect();
        model_ids.sort();
        for id in model_ids {
            if let Some(model) = registry.get_model(id) {
                self.validate_model(model, registry)?;
            }
        }
        Ok(())
    }

    fn validate_model(&self, model: &Model, registry: &MetadataRegistry) -> Result<()> {
        if let Some(pk) = &model.primary_key {
            self.check(
                model.column(pk).is_some(),
                format!("model {} primary key {pk} is not one of its columns", model.id),
            )?;
        }
        if let Some(display) = &model.display_column {
            self.check(
                model.column(display).is_some(),
                format!(
                    "model {} display column {display} is not one of its columns",
                    model.id
                ),
            )?;
        }

        for column in &model.columns {
            self.check(
                column.model_id == model.id,
                format!(
                    "column {} is listed under {} but declares model {}",
                    column.id, model.id, column.model_id
                ),
            )?;
            match column.column_type {
                ColumnType::LinkToAnotherRecord | ColumnType::Links => {
                    self.validate_link(model, column, registry)?;
                }
                ColumnType::Rollup => self.validate_rollup(model, column, registry)?,
                ColumnType::Lookup => self.validate_lookup(model, column, registry)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn validate_link(&self, model: &Model, column: &Column, registry: &MetadataRegistry) -> Result<()> {
        let Some(options) = column.relation_options() else {
            return self.check(false, format!("link {} has no relation options", column.id));
        };
        let child = registry.get_column(&options.child_column);
        let parent = registry.get_column(&options.parent_column);
        self.check(
            child.is_some(),
            format!("link {} child column {} not found", column.id, options.child_column),
        )?;
        self.check(
            parent.is_some(),
            format!("link {} parent column {} not found", column.id, options.parent_column),
        )?;
        let (Some(child), Some(parent)) = (child, parent) else {
            return Ok(());
        };
        for key in [child, parent] {
            self.check(
                !key.column_type.is_virtual() && key.column_name.is_some(),
                format!("link {} keys on non-physical column {}", column.id, key.id),
            )?;
        }

        let host_side = match options.relation_type {
            RelationType::HasMany => parent.model_id == model.id,
            RelationType::BelongsTo | RelationType::ManyToMany => child.model_id == model.id,
            RelationType::OneToOne => child.model_id == model.id || parent.model_id == model.id,
        };
        self.check(
            host_side,
            format!(
                "{} link {} does not key on its own model {}",
                options.relation_type, column.id, model.id
            ),
        )?;

        match (&options.junction, options.relation_type) {
            (Some(junction), RelationType::ManyToMany) => {
                let Some(junction_model) = registry.get_model(&junction.model) else {
                    return self.check(
                        false,
                        format!("link {} junction model {} not found", column.id, junction.model),
                    );
                };
                for key in [&junction.child_column, &junction.parent_column] {
                    self.check(
                        junction_model.column(key).is_some(),
                        format!(
                            "link {} junction column {key} is not on {}",
                            column.id, junction_model.id
                        ),
                    )?;
                }
                Ok(())
            }
            (None, RelationType::ManyToMany) => self.check(
                false,
                format!("many-to-many link {} has no junction", column.id),
            ),
            (Some(_), other) => self.check(
                false,
                format!("{other} link {} declares a junction", column.id),
            ),
            (None, _) => Ok(()),
        }
    }

    fn validate_rollup(&self, model: &Model, column: &Column, registry: &MetadataRegistry) -> Result<()> {
        let Some(options) = column.rollup_options() else {
            return self.check(false, format!("rollup {} has no rollup options", column.id));
        };
        let Some((link, relation)) =
            self.host_link(model, column, &options.relation_column, registry)?
        else {
            return Ok(());
        };
        if relation.relation_type.is_to_one() {
            return Err(CellqlError::UnsupportedRelation {
                column: column.id.clone(),
                relation: format!(
                    "{} (rollups need has_many or many_to_many)",
                    relation.relation_type
                ),
            });
        }
        let related = related_model_id(model, relation, registry);
        let target = registry.get_column(&options.target_column);
        self.check(
            target.is_some_and(|t| Some(t.model_id.as_str()) == related.as_deref()),
            format!(
                "rollup {} target {} is not on the model reached by {}",
                column.id, options.target_column, link.id
            ),
        )
    }

    fn validate_lookup(&self, model: &Model, column: &Column, registry: &MetadataRegistry) -> Result<()> {
        let Some(options) = column.lookup_options() else {
            return self.check(false, format!("lookup {} has no lookup options", column.id));
        };
        if let Some((link, relation)) =
            self.host_link(model, column, &options.relation_column, registry)?
        {
            let related = related_model_id(model, relation, registry);
            let target = registry.get_column(&options.target_column);
            self.check(
                target.is_some_and(|t| Some(t.model_id.as_str()) == related.as_deref()),
                format!(
                    "lookup {} target {} is not on the model reached by {}",
                    column.id, options.target_column, link.id
                ),
            )?;
        }

        let mut seen = HashSet::new();
        let mut current = column;
        let mut depth = 0usize;
        while let Some(options) = current.lookup_options() {
            if !seen.insert(current.id.as_str()) {
                return self.check(false, format!("lookup chain of {} is cyclic", column.id));
            }
            depth += 1;
            if depth > self.max_lookup_depth {
                return self.check(
                    false,
                    format!(
                        "lookup chain of {} exceeds depth {}",
                        column.id, self.max_lookup_depth
                    ),
                );
            }
            let Some(next) = registry.get_column(&options.target_column) else {
                return Ok(());
            };
            current = next;
        }
        Ok(())
    }

    /// The link column a rollup or lookup is hosted on, with its options.
    fn host_link<'r>(
        &self,
        model: &Model,
        column: &Column,
        link_id: &str,
        registry: &'r MetadataRegistry,
    ) -> Result<Option<(&'r Column, &'r RelationOptions)>> {
        let link = registry
            .get_column(link_id)
            .filter(|link| link.column_type.is_link());
        self.check(
            link.is_some_and(|link| link.model_id == model.id),
            format!(
                "{} relation column {link_id} is not a link on model {}",
                column.id, model.id
            ),
        )?;
        Ok(link.and_then(|link| link.relation_options().map(|opts| (link, opts))))
    }

    fn check(&self, condition: bool, message: String) -> Result<()> {
        if condition {
            return Ok(());
        }
        if self.warn_only {
            tracing::warn!(finding = %message, "metadata validation");
            Ok(())
        } else {
            Err(CellqlError::Validation(message))
        }
    }
}

/// Model on the far side of a link hosted on `model`.
fn related_model_id(
    model: &Model,
    options: &RelationOptions,
    registry: &MetadataRegistry,
) -> Option<String> {
    let model_of = |id: &str| registry.get_column(id).map(|c| c.model_id.clone());
    let child = model_of(&options.child_column)?;
    let parent = model_of(&options.parent_column)?;
    Some(match options.relation_type {
        RelationType::HasMany => child,
        RelationType::OneToOne if parent == model.id => child,
        _ => parent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnOptions, JunctionOptions, RollupOptions, AggregateFunction};

    fn registry_with(link_type: RelationType) -> MetadataRegistry {
        let mut customers = Model::new("customers", "customers");
        customers
            .columns
            .push(Column::physical("customers_id", "id", ColumnType::Id, "customers"));
        let mut orders = Model::new("orders", "orders");
        orders
            .columns
            .push(Column::physical("orders_id", "id", ColumnType::Id, "orders"));
        orders.columns.push(Column::physical(
            "orders_customer_id",
            "customer_id",
            ColumnType::ForeignKey,
            "orders",
        ));
        orders.columns.push(Column::virtual_column(
            "orders_customer",
            ColumnType::LinkToAnotherRecord,
            "orders",
            ColumnOptions::Relation(RelationOptions {
                relation_type: link_type,
                child_column: "orders_customer_id".to_string(),
                parent_column: "customers_id".to_string(),
                junction: None,
            }),
        ));
        orders.columns.push(Column::virtual_column(
            "orders_customer_count",
            ColumnType::Rollup,
            "orders",
            ColumnOptions::Rollup(RollupOptions {
                relation_column: "orders_customer".to_string(),
                target_column: "customers_id".to_string(),
                function: AggregateFunction::Count,
            }),
        ));
        MetadataRegistry::from_models(vec![customers, orders]).unwrap()
    }

    #[test]
    fn rollup_on_belongs_to_is_fatal_even_when_warn_only() {
        let registry = registry_with(RelationType::BelongsTo);
        let err = Validator::new(true).validate_registry(&registry).unwrap_err();
        match err {
            CellqlError::UnsupportedRelation { column, relation } => {
                assert_eq!(column, "orders_customer_count");
                assert!(relation.contains("belongs_to"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn many_to_many_without_junction_is_reported() {
        let mut registry = registry_with(RelationType::ManyToMany);
        // drop the rollup so only the junction finding remains
        if let Some(orders) = registry.models.get_mut("orders") {
            orders.columns.retain(|c| c.id != "orders_customer_count");
        }
        let err = Validator::new(false).validate_registry(&registry).unwrap_err();
        assert!(err.to_string().contains("has no junction"));
        assert!(Validator::new(true).validate_registry(&registry).is_ok());

        if let Some(orders) = registry.models.get_mut("orders") {
            if let Some(ColumnOptions::Relation(opts)) = orders
                .columns
                .iter_mut()
                .find(|c| c.id == "orders_customer")
                .and_then(|c| c.options.as_mut())
            {
                opts.junction = Some(JunctionOptions {
                    model: "missing".to_string(),
                    child_column: "a".to_string(),
                    parent_column: "b".to_string(),
                });
            }
        }
        let err = Validator::new(false).validate_registry(&registry).unwrap_err();
        assert!(err.to_string().contains("junction model missing not found"));
    }
}
