//! Metadata collaborator contracts.
//!
//! Column and model metadata is owned by the schema designer. The compiler only
//! reads it through these async lookups and never mutates it.

use async_trait::async_trait;

use crate::error::{CellqlError, Result};
use crate::models::{Column, Model, RelationOptions};

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Column by id. Missing ids are `Metadata` errors.
    async fn column(&self, id: &str) -> Result<Column>;

    /// Model by id. Missing ids are `Metadata` errors.
    async fn model(&self, id: &str) -> Result<Model>;

    /// Relation geometry of a link column.
    async fn relation_options(&self, column: &Column) -> Result<RelationOptions> {
        column.relation_options().cloned().ok_or_else(|| {
            CellqlError::Metadata(format!(
                "column {} ({:?}) carries no relation options",
                column.id, column.column_type
            ))
        })
    }
}
