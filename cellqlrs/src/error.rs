use thiserror::Error;

pub type Result<T> = std::result::Result<T, CellqlError>;

#[derive(Debug, Error)]
pub enum CellqlError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    /// Metadata is missing or structurally inconsistent.
    #[error("metadata error: {0}")]
    Metadata(String),
    #[error("unsupported relation type '{relation}' for column {column}")]
    UnsupportedRelation { column: String, relation: String },
    #[error("formula error: {0}")]
    Formula(String),
    #[error("sql generation error: {0}")]
    Sql(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CellqlError {
    pub(crate) fn unknown_column(id: &str) -> Self {
        CellqlError::Metadata(format!("unknown column {id}"))
    }

    pub(crate) fn unknown_model(id: &str) -> Self {
        CellqlError::Metadata(format!("unknown model {id}"))
    }
}
