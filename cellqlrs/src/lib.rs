pub mod compiler;
pub mod config;
pub mod dialect;
pub mod error;
pub mod formula;
pub mod metadata;
pub mod models;
pub mod registry;
pub mod sql_ast;
pub mod validation;

use std::path::Path;

use crate::error::Result;

/// Load metadata from disk and validate it with the provided validator.
pub fn load_and_validate<P: AsRef<Path>>(
    metadata_dir: P,
    validator: &crate::validation::Validator,
) -> Result<MetadataRegistry> {
    let registry = MetadataRegistry::load_from_dir(metadata_dir)?;
    validator.validate_registry(&registry)?;
    Ok(registry)
}

pub use crate::validation::Validator;
pub use compiler::{
    AggregateExpr, AggregationSource, CompileContext, CompileScope, DroppedSort, QueryCompiler,
};
pub use config::{CellqlConfig, CompilerConfig};
pub use dialect::{dialect_for, Dialect, DialectKind};
pub use error::CellqlError;
pub use formula::{FormulaCompiler, TemplateFormulaCompiler};
pub use metadata::MetadataProvider;
pub use models::{AggregateRequest, Column, ListRequest, Model, SortSpec};
pub use registry::MetadataRegistry;
