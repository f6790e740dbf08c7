use std::time::Duration;

use crate::source::DEFAULT_SERVICE_URL;

/// Options that control how the Postgres handle connects and loads.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// How long to wait for the connection when opening.
    pub acquire_timeout: Duration,
    /// Size of the chunks streamed to `COPY ... FROM STDIN`.
    pub copy_chunk_bytes: usize,
    /// Run `VACUUM ANALYZE` on each table after it is loaded.
    pub vacuum_after_load: bool,
    /// DDL service used when the request carries no DDL source hint.
    pub default_service_url: String,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(10),
            copy_chunk_bytes: 1024 * 1024,
            vacuum_after_load: true,
            default_service_url: DEFAULT_SERVICE_URL.to_string(),
        }
    }
}
