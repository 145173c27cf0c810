use thiserror::Error;

#[derive(Error, Debug)]
pub enum KioskDbError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Record not found in array: {collection}/{id}")]
    RecordNotFound { collection: String, id: String },

    #[error("Version conflict on {collection}/{id}: expected {expected}, found {actual}")]
    Conflict {
        collection: String,
        id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KioskDbError>;
