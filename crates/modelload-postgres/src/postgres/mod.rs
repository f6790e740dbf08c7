use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolCopyExt, PgPoolOptions};
use tracing::{debug, info, warn};

use modelload_core::{
    DataDirectory, DataFile, Database, DatabaseError, DatabaseOpener, FailureMode, LoadSummary,
    OpenRequest, Step, minutes,
};

use crate::ddl::{DdlKind, ModelDdl, normalize_identifier};
use crate::options::PostgresOptions;
use crate::source::{fetch_model_ddl, resolve_source};

pub mod errors;
mod queries;

/// Opens [`PostgresDatabase`] handles.
#[derive(Debug, Clone, Default)]
pub struct PostgresOpener {
    options: PostgresOptions,
}

impl PostgresOpener {
    pub fn new(options: PostgresOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl DatabaseOpener for PostgresOpener {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn open(&self, request: OpenRequest) -> Result<Box<dyn Database>, DatabaseError> {
        let db = PostgresDatabase::open(request, self.options.clone()).await?;
        Ok(Box::new(db))
    }
}

/// Database handle for one PostgreSQL target and one model version.
#[derive(Debug)]
pub struct PostgresDatabase {
    pool: PgPool,
    ddl: ModelDdl,
    primary_schema: String,
    excluded: BTreeSet<String>,
    options: PostgresOptions,
}

impl PostgresDatabase {
    /// Fetch the model DDL, connect, and check the primary schema exists.
    pub async fn open(request: OpenRequest, options: PostgresOptions) -> Result<Self, DatabaseError> {
        let primary_schema = request
            .search_path
            .first()
            .cloned()
            .ok_or_else(|| DatabaseError::new("search path is empty"))?;

        let source = resolve_source(&request.dmsa_service_hint, &options.default_service_url);
        let ddl = fetch_model_ddl(source.as_ref(), &request.data_model, &request.model_version)
            .await
            .map_err(|err| {
                DatabaseError::with_source(
                    format!(
                        "fetching DDL for {} {} from {}",
                        request.data_model,
                        request.model_version,
                        source.location()
                    ),
                    err,
                )
            })?
            .excluding(&request.exclude_tables);
        debug!(
            event = "ddl_fetched",
            source = %source.location(),
            statements = ddl.len(),
        );

        let mut connect = PgConnectOptions::from_str(&request.connection_uri)
            .map_err(|err| DatabaseError::with_source("invalid connection URI", err))?
            .options([("search_path", request.search_path.join(","))]);
        if !request.service_hint.is_empty() {
            connect = connect.application_name(&request.service_hint);
        }

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect)
            .await
            .map_err(|err| DatabaseError::with_source("connecting to database", err))?;

        let exists = queries::schema_exists(&pool, &primary_schema)
            .await
            .map_err(|err| DatabaseError::with_source("checking primary schema", err))?;
        if !exists {
            return Err(DatabaseError::new(format!(
                "schema {primary_schema} does not exist"
            )));
        }

        Ok(Self {
            pool,
            ddl,
            primary_schema,
            excluded: request
                .exclude_tables
                .iter()
                .map(|table| normalize_identifier(table))
                .collect(),
            options,
        })
    }

    /// Execute statements one by one, skipping failures `mode` tolerates.
    async fn apply(
        &self,
        step: Step,
        statements: Vec<String>,
        mode: FailureMode,
    ) -> Result<(), DatabaseError> {
        let total = statements.len();
        let mut skipped = 0usize;

        for sql in statements {
            let Err(err) = queries::execute(&self.pool, &sql).await else {
                continue;
            };
            let code = errors::sqlstate(&err);
            if errors::tolerated(mode, code.as_deref()) {
                skipped += 1;
                warn!(event = "statement_skipped", step = %step, sql = %sql, error = %err);
                continue;
            }
            return Err(DatabaseError::with_source(sql, err));
        }

        debug!(event = "statements_applied", step = %step, mode = %mode, total, skipped);
        Ok(())
    }

    fn creates(&self, kind: DdlKind) -> Vec<String> {
        self.ddl
            .statements(kind)
            .iter()
            .map(|statement| statement.sql.clone())
            .collect()
    }

    async fn load_file(&self, file: &DataFile) -> Result<u64, DatabaseError> {
        let columns = queries::csv_columns(&file.path)?;
        let statement = queries::copy_statement(&self.primary_schema, &file.table, &columns);

        let mut copy = self
            .pool
            .copy_in_raw(&statement)
            .await
            .map_err(|err| DatabaseError::with_source(format!("starting COPY into {}", file.table), err))?;

        if let Err(err) =
            queries::stream_file(&mut copy, &file.path, self.options.copy_chunk_bytes).await
        {
            if let Err(abort) = copy.abort(err.message().to_string()).await {
                debug!(event = "copy_abort_failed", table = %file.table, error = %abort);
            }
            return Err(err);
        }

        copy.finish()
            .await
            .map_err(|err| DatabaseError::with_source(format!("finishing COPY into {}", file.table), err))
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn create_tables(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.apply(Step::CreateTables, self.creates(DdlKind::Tables), mode)
            .await
    }

    async fn load(&mut self, dataset: &DataDirectory) -> Result<LoadSummary, DatabaseError> {
        let mut summary = LoadSummary::default();

        for file in dataset.files() {
            if self.excluded.contains(&normalize_identifier(&file.table)) {
                info!(event = "table_excluded", table = %file.table, file = %file.filename);
                continue;
            }

            let started = Instant::now();
            let rows = self.load_file(file).await?;
            match file.row_count {
                Some(expected) if expected != rows => warn!(
                    event = "row_count_mismatch",
                    table = %file.table,
                    expected,
                    rows,
                ),
                _ => {}
            }

            if self.options.vacuum_after_load {
                queries::vacuum_analyze(&self.pool, &self.primary_schema, &file.table)
                    .await
                    .map_err(|err| {
                        DatabaseError::with_source(format!("vacuuming {}", file.table), err)
                    })?;
            }

            info!(
                event = "table_loaded",
                table = %file.table,
                rows,
                duration_minutes = minutes(started.elapsed()),
            );
            summary.tables.push((file.table.clone(), rows));
        }

        Ok(summary)
    }

    async fn create_indexes(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.apply(Step::CreateIndexes, self.creates(DdlKind::Indexes), mode)
            .await
    }

    async fn create_constraints(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.apply(Step::CreateConstraints, self.creates(DdlKind::Constraints), mode)
            .await
    }

    async fn drop_constraints(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.apply(Step::DropConstraints, self.ddl.drops(DdlKind::Constraints), mode)
            .await
    }

    async fn drop_indexes(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.apply(Step::DropIndexes, self.ddl.drops(DdlKind::Indexes), mode)
            .await
    }

    async fn drop_tables(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.apply(Step::DropTables, self.ddl.drops(DdlKind::Tables), mode)
            .await
    }
}
