use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphImportError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("transaction error: {0}")]
    TransactionError(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("io error: {0}")]
    IoError(String),
}

impl GraphImportError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        GraphImportError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        GraphImportError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        GraphImportError::QueryError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        GraphImportError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        GraphImportError::InvalidInput(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        GraphImportError::TransactionError(msg.into())
    }

    pub fn constraint<T: Into<String>>(msg: T) -> Self {
        GraphImportError::ConstraintViolation(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        GraphImportError::ConfigError(msg.into())
    }

    pub fn io<T: Into<String>>(msg: T) -> Self {
        GraphImportError::IoError(msg.into())
    }
}
