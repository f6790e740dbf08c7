//! Core contracts and orchestration for modelload.
//!
//! This crate defines the dataset handle, the database handle contract, run
//! configuration resolution, and the orchestrator that drives a load or undo
//! run. Engine adapters live in their own crates.

pub mod config;
pub mod database;
pub mod dataset;
pub mod error;
pub mod exclusion;
pub mod orchestrator;
pub mod redaction;
pub mod timing;

pub use config::{RawRunArgs, RunConfiguration, parse_search_path, resolve};
pub use database::{Database, DatabaseOpener, FailureMode, LoadSummary, OpenRequest};
pub use dataset::{DataDirectory, DataFile, METADATA_FILE};
pub use error::{ArgumentError, DatabaseError, DatasetError, LoadError, Result, Step};
pub use exclusion::ExclusionPolicy;
pub use orchestrator::{Orchestrator, RunState};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use timing::{PhaseTiming, RunMode, RunReport, minutes};
