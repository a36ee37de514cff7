//! Link column resolution into join geometry.
//!
//! Orientation follows the link's host model:
//! - has-many: the host is the parent, related rows satisfy
//!   `child.child_column = host.parent_column`;
//! - many-to-many: the host is the child, related (parent) rows satisfy
//!   `junction.parent_column = parent.parent_column` and
//!   `junction.child_column = host.child_column`;
//! - belongs-to / one-to-one: the host is the child, the related row satisfies
//!   `parent.parent_column = host.child_column`. One-to-one links may also be
//!   read from the parent side.

use super::CompileContext;
use crate::error::{CellqlError, Result};
use crate::models::{Column, Model, RelationType};

#[derive(Debug, Clone)]
pub struct ResolvedJunction {
    pub model: Model,
    pub child_column: Column,
    pub parent_column: Column,
}

#[derive(Debug, Clone)]
pub struct ResolvedRelation {
    /// Id of the link column this geometry was resolved from.
    pub column_id: String,
    pub relation_type: RelationType,
    pub child_model: Model,
    pub child_column: Column,
    pub parent_model: Model,
    pub parent_column: Column,
    pub junction: Option<ResolvedJunction>,
}

/// One to-one step: join `model` on `related_key = current.current_key`.
#[derive(Debug, Clone)]
pub struct ToOneHop<'r> {
    pub model: &'r Model,
    pub related_key: &'r Column,
    pub current_key: &'r Column,
}

impl ResolvedRelation {
    /// The to-one hop from `current_model_id`, or `None` for to-many links.
    pub fn to_one_hop(&self, current_model_id: &str) -> Option<ToOneHop<'_>> {
        let from_child = ToOneHop {
            model: &self.parent_model,
            related_key: &self.parent_column,
            current_key: &self.child_column,
        };
        match self.relation_type {
            RelationType::BelongsTo if self.child_model.id == current_model_id => Some(from_child),
            RelationType::OneToOne if self.child_model.id == current_model_id => Some(from_child),
            RelationType::OneToOne if self.parent_model.id == current_model_id => Some(ToOneHop {
                model: &self.child_model,
                related_key: &self.child_column,
                current_key: &self.parent_column,
            }),
            _ => None,
        }
    }

    /// The model on the far side of the link.
    pub fn related_model(&self, host_model_id: &str) -> &Model {
        match self.relation_type {
            RelationType::HasMany => &self.child_model,
            RelationType::OneToOne if self.parent_model.id == host_model_id => &self.child_model,
            _ => &self.parent_model,
        }
    }
}

pub struct RelationResolver<'a> {
    ctx: CompileContext<'a>,
}

impl<'a> RelationResolver<'a> {
    pub fn new(ctx: CompileContext<'a>) -> Self {
        Self { ctx }
    }

    pub async fn resolve(&self, link_column: &Column) -> Result<ResolvedRelation> {
        let provider = self.ctx.provider;
        let options = provider.relation_options(link_column).await?;

        let child_column = provider.column(&options.child_column).await?;
        let parent_column = provider.column(&options.parent_column).await?;
        let child_model = provider.model(&child_column.model_id).await?;
        let parent_model = provider.model(&parent_column.model_id).await?;
        require_key(link_column, &child_column)?;
        require_key(link_column, &parent_column)?;

        let junction = match (options.relation_type, options.junction) {
            (RelationType::ManyToMany, Some(junction)) => {
                let model = provider.model(&junction.model).await?;
                let jc = provider.column(&junction.child_column).await?;
                let jp = provider.column(&junction.parent_column).await?;
                for col in [&jc, &jp] {
                    require_key(link_column, col)?;
                    if col.model_id != model.id {
                        return Err(CellqlError::Metadata(format!(
                            "junction column {} of link {} is not on junction model {}",
                            col.id, link_column.id, model.id
                        )));
                    }
                }
                Some(ResolvedJunction {
                    model,
                    child_column: jc,
                    parent_column: jp,
                })
            }
            (RelationType::ManyToMany, None) => {
                return Err(CellqlError::Metadata(format!(
                    "many-to-many link {} has no junction",
                    link_column.id
                )))
            }
            (_, _) => None,
        };

        tracing::trace!(
            column = %link_column.id,
            relation = %options.relation_type,
            child = %child_model.id,
            parent = %parent_model.id,
            "resolved relation"
        );

        Ok(ResolvedRelation {
            column_id: link_column.id.clone(),
            relation_type: options.relation_type,
            child_model,
            child_column,
            parent_model,
            parent_column,
            junction,
        })
    }
}

fn require_key(link_column: &Column, key: &Column) -> Result<()> {
    if key.column_type.is_virtual() || key.column_name.is_none() {
        return Err(CellqlError::Metadata(format!(
            "link {} keys on {}, which is not a physical column",
            link_column.id, key.id
        )));
    }
    Ok(())
}
