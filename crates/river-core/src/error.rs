//! Error taxonomy shared by every operator.

/// Error types specific to pipeline operations
///
/// Each variant carries a human readable message. Callers that only care about
/// success can keep using the boolean contract of
/// [`Pipeline::run_reporting`](crate::Pipeline::run_reporting); callers that
/// schedule reruns can ask [`PipelineError::is_retryable`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// The source file is missing, unreadable, or not in the expected format.
    #[error("file read error: {0}")]
    FileRead(String),

    /// A required column is absent from the input.
    #[error("schema validation error: {0}")]
    SchemaValidation(String),

    /// A value could not be converted to the type the pipeline needs.
    #[error("type coercion error: {0}")]
    TypeCoercion(String),

    /// The document store could not be reached or the connection string is invalid.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// The document store rejected a write.
    #[error("database write error: {0}")]
    DatabaseWrite(String),
}

impl PipelineError {
    /// Short tag used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::FileRead(_) => "file_read",
            PipelineError::SchemaValidation(_) => "schema_validation",
            PipelineError::TypeCoercion(_) => "type_coercion",
            PipelineError::DatabaseConnection(_) => "database_connection",
            PipelineError::DatabaseWrite(_) => "database_write",
        }
    }

    /// Whether running the same input again could succeed.
    ///
    /// Input problems are fatal until the file changes; database failures may be transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::DatabaseConnection(_) | PipelineError::DatabaseWrite(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
