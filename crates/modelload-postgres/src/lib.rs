//! PostgreSQL database handle for modelload.
//!
//! Model DDL is fetched from a data-models service or a local directory,
//! data files are streamed with `COPY ... FROM STDIN`, and undo statements
//! are derived from the create statements.

pub mod ddl;
pub mod options;
pub mod postgres;
pub mod source;

pub use ddl::{DdlKind, DdlStatement, ModelDdl, StatementKind, split_statements};
pub use options::PostgresOptions;
pub use postgres::{PostgresDatabase, PostgresOpener};
pub use source::{
    DEFAULT_SERVICE_URL, DdlSource, DirectoryDdlSource, HttpDdlSource, SourceError,
    fetch_model_ddl, resolve_source,
};
