use std::fmt;

use async_trait::async_trait;

use crate::config::RunConfiguration;
use crate::dataset::DataDirectory;
use crate::error::DatabaseError;

/// How a schema operation treats statement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Any failure, including a conflicting pre-existing object, is an error.
    Strict,
    /// "Object does not exist" failures are skipped; anything else is an error.
    Normal,
}

impl FailureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureMode::Strict => "strict",
            FailureMode::Normal => "normal",
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rows loaded per table by a [`Database::load`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub tables: Vec<(String, u64)>,
}

impl LoadSummary {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }
}

/// Everything a handle needs to connect and locate model DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub data_model: String,
    pub model_version: String,
    pub connection_uri: String,
    pub search_path: Vec<String>,
    pub service_hint: String,
    pub dmsa_service_hint: String,
    pub exclude_tables: Vec<String>,
}

impl From<&RunConfiguration> for OpenRequest {
    fn from(config: &RunConfiguration) -> Self {
        Self {
            data_model: config.data_model().to_string(),
            model_version: config.model_version().to_string(),
            connection_uri: config.connection_uri().to_string(),
            search_path: config.search_path().to_vec(),
            service_hint: config.service_hint().to_string(),
            dmsa_service_hint: config.dmsa_service_hint().to_string(),
            exclude_tables: config.exclude_tables().to_vec(),
        }
    }
}

/// Schema and data operations against one target database.
///
/// Each call is a single blocking phase that either completes or fails.
#[async_trait]
pub trait Database: Send {
    async fn create_tables(&mut self, mode: FailureMode) -> Result<(), DatabaseError>;

    async fn load(&mut self, dataset: &DataDirectory) -> Result<LoadSummary, DatabaseError>;

    async fn create_indexes(&mut self, mode: FailureMode) -> Result<(), DatabaseError>;

    async fn create_constraints(&mut self, mode: FailureMode) -> Result<(), DatabaseError>;

    async fn drop_constraints(&mut self, mode: FailureMode) -> Result<(), DatabaseError>;

    async fn drop_indexes(&mut self, mode: FailureMode) -> Result<(), DatabaseError>;

    async fn drop_tables(&mut self, mode: FailureMode) -> Result<(), DatabaseError>;
}

/// Opens database handles. Implemented per engine.
#[async_trait]
pub trait DatabaseOpener: Send + Sync {
    /// Engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    async fn open(&self, request: OpenRequest) -> Result<Box<dyn Database>, DatabaseError>;
}
