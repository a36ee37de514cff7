//! Formula SQL emission collaborator.
//!
//! Parsing formula expressions is out of scope; the compiler hands a formula
//! handle plus the alias it lives under to a [`FormulaCompiler`] and splices the
//! returned SQL verbatim.

use async_trait::async_trait;

use crate::dialect::Dialect;
use crate::error::{CellqlError, Result};
use crate::models::{FormulaOptions, Model};

/// Table alias and model a formula is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct FormulaScope<'a> {
    pub alias: &'a str,
    pub model: &'a Model,
}

#[async_trait]
pub trait FormulaCompiler: Send + Sync {
    async fn compile(
        &self,
        formula: &FormulaOptions,
        scope: FormulaScope<'_>,
        dialect: &dyn Dialect,
    ) -> Result<String>;
}

/// Replaces `{Column Title}` or `{column_id}` placeholders with qualified
/// physical references and copies everything else through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateFormulaCompiler;

#[async_trait]
impl FormulaCompiler for TemplateFormulaCompiler {
    async fn compile(
        &self,
        formula: &FormulaOptions,
        scope: FormulaScope<'_>,
        dialect: &dyn Dialect,
    ) -> Result<String> {
        let source = formula.expression.as_str();
        let mut out = String::with_capacity(source.len());
        let mut rest = source;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                CellqlError::Formula(format!("unclosed placeholder in formula '{source}'"))
            })?;
            let name = after[..end].trim();
            let column = scope
                .model
                .column_by_title(name)
                .or_else(|| scope.model.column(name))
                .ok_or_else(|| {
                    CellqlError::Formula(format!(
                        "formula references unknown column '{name}' on model {}",
                        scope.model.id
                    ))
                })?;
            if column.column_type.is_virtual() {
                return Err(CellqlError::Formula(format!(
                    "formula references virtual column '{name}'"
                )));
            }
            let physical = column.physical_name()?;
            out.push_str(&format!(
                "{}.{}",
                dialect.quote_ident(scope.alias),
                dialect.quote_ident(physical)
            ));
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
