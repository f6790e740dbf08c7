use std::path::Path;

use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgCopyIn;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use modelload_core::DatabaseError;

use crate::ddl::quote_identifier;

pub async fn schema_exists(pool: &PgPool, schema: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "select exists(select 1 from pg_namespace where nspname = $1)",
    )
    .bind(schema)
    .fetch_one(pool)
    .await
}

/// Run one statement outside any explicit transaction.
pub async fn execute(pool: &PgPool, sql: &str) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(sql).execute(pool).await.map(|_| ())
}

/// Must run outside a transaction block.
pub async fn vacuum_analyze(pool: &PgPool, schema: &str, table: &str) -> Result<(), sqlx::Error> {
    execute(pool, &vacuum_analyze_statement(schema, table)).await
}

pub fn vacuum_analyze_statement(schema: &str, table: &str) -> String {
    format!(
        "VACUUM ANALYZE {}.{}",
        quote_identifier(schema),
        quote_identifier(table)
    )
}

/// Column names from the header row of a CSV data file.
pub fn csv_columns(path: &Path) -> Result<Vec<String>, DatabaseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| DatabaseError::with_source(format!("opening {}", path.display()), err))?;
    let headers = reader
        .headers()
        .map_err(|err| DatabaseError::with_source(format!("reading header of {}", path.display()), err))?;
    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    if columns.iter().all(String::is_empty) {
        return Err(DatabaseError::new(format!(
            "{} has no header row",
            path.display()
        )));
    }
    Ok(columns)
}

pub fn copy_statement(schema: &str, table: &str, columns: &[String]) -> String {
    let columns: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    format!(
        "COPY {}.{} ({}) FROM STDIN WITH (FORMAT csv, HEADER true)",
        quote_identifier(schema),
        quote_identifier(table),
        columns.join(", ")
    )
}

/// Stream `path` into an open COPY in chunks of `chunk_bytes`.
pub async fn stream_file(
    copy: &mut PgCopyIn<PoolConnection<Postgres>>,
    path: &Path,
    chunk_bytes: usize,
) -> Result<(), DatabaseError> {
    let io_error = |err: std::io::Error| DatabaseError::with_source(format!("reading {}", path.display()), err);
    let mut file = File::open(path).await.map_err(io_error)?;
    let mut buf = vec![0u8; chunk_bytes.max(1)];

    loop {
        let read = file.read(&mut buf).await.map_err(io_error)?;
        if read == 0 {
            break;
        }
        copy.send(&buf[..read]).await.map_err(|err| {
            DatabaseError::with_source(format!("sending {} to COPY", path.display()), err)
        })?;
    }

    Ok(())
}
