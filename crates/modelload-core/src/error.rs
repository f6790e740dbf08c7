use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid caller input detected before any handle is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// The run needs exactly one dataset argument.
    #[error("load requires 1 argument, got {count}")]
    MissingArgument { count: usize },
    /// A required option is empty.
    #[error("load requires a {0}")]
    MissingRequiredOption(&'static str),
}

/// Errors raised while opening or reading a dataset directory.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("data directory not found: {0}")]
    NotFound(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("metadata csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
}

/// Failure reported by a database handle.
///
/// Handles wrap their native errors so the orchestrator stays independent of
/// any particular driver.
#[derive(Debug, Error)]
#[error("{message}{}", render_cause(.source.as_deref()))]
pub struct DatabaseError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `": cause"` for the driver error, or nothing when there is none.
fn render_cause(source: Option<&(dyn std::error::Error + Send + Sync + 'static)>) -> String {
    source.map(|err| format!(": {err}")).unwrap_or_default()
}

/// The step of the load or undo sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateTables,
    Load,
    CreateIndexes,
    CreateConstraints,
    DropConstraints,
    DropIndexes,
    DropTables,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::CreateTables => "create_tables",
            Step::Load => "load",
            Step::CreateIndexes => "create_indexes",
            Step::CreateConstraints => "create_constraints",
            Step::DropConstraints => "drop_constraints",
            Step::DropIndexes => "drop_indexes",
            Step::DropTables => "drop_tables",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal errors of a load or undo run. Every variant aborts the run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("argument error: {0}")]
    Argument(#[from] ArgumentError),
    #[error("error reading data directory: {0}")]
    DataDirectory(#[source] DatasetError),
    #[error("error reading metadata file: {0}")]
    MetadataRead(#[source] DatasetError),
    #[error("database open failed: {0}")]
    DatabaseOpen(#[source] DatabaseError),
    #[error("{step} failed: {source}")]
    SchemaOperation {
        step: Step,
        #[source]
        source: DatabaseError,
    },
    #[error("load failed: {0}")]
    LoadOperation(#[source] DatabaseError),
    #[error("unexpected error during {step}: {source}")]
    UndoOperation {
        step: Step,
        #[source]
        source: DatabaseError,
    },
}

impl LoadError {
    /// Stable identifier used as the `kind` field of the failure log record.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Argument(_) => "argument_error",
            LoadError::DataDirectory(_) => "data_directory_error",
            LoadError::MetadataRead(_) => "metadata_read_error",
            LoadError::DatabaseOpen(_) => "database_open_error",
            LoadError::SchemaOperation { .. } => "schema_operation_error",
            LoadError::LoadOperation(_) => "load_operation_error",
            LoadError::UndoOperation { .. } => "undo_operation_error",
        }
    }

    /// The sequence step that failed, when the failure happened after open.
    pub fn step(&self) -> Option<Step> {
        match self {
            LoadError::SchemaOperation { step, .. } | LoadError::UndoOperation { step, .. } => {
                Some(*step)
            }
            LoadError::LoadOperation(_) => Some(Step::Load),
            _ => None,
        }
    }
}

/// Convenience alias for results returned by modelload crates.
pub type Result<T> = std::result::Result<T, LoadError>;
