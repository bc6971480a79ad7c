//! Error types for pgschema

use thiserror::Error;

/// Result type alias for pgschema operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for schema declaration, query building and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A filter or clause names a column the selectable does not have
    #[error("Unknown column {column} in selectable {selectable}")]
    UnknownColumn { column: String, selectable: String },

    /// Reserved, malformed or duplicate field/filter name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// No SQL type is registered for a native type
    #[error("Could not find SQL type for {0}")]
    UnknownType(String),

    /// Malformed type declaration (nested lists and similar)
    #[error("Type error: {0}")]
    Type(String),

    /// A foreign-key reference whose type differs from the referenced column
    #[error("Column {column} type {found} does not match referenced type {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    /// Conflicting or empty arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not available on this object
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// I/O error while exporting schema text
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an unknown column error
    pub fn unknown_column(column: impl Into<String>, selectable: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
            selectable: selectable.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName(message.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a not supported error
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is an unknown column error
    pub fn is_unknown_column(&self) -> bool {
        matches!(self, Self::UnknownColumn { .. })
    }

    /// Check if the database reported `duplicate_object` (SQLSTATE 42710)
    pub fn is_duplicate_object(&self) -> bool {
        self.sql_state() == Some("42710")
    }

    /// Check if the database reported `undefined_table` (SQLSTATE 42P01)
    pub fn is_undefined_table(&self) -> bool {
        self.sql_state() == Some("42P01")
    }

    fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Query(e) => e.as_db_error().map(|db| db.code().code()),
            _ => None,
        }
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
