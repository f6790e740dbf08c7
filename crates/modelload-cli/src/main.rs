mod logging;
mod settings;

use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use modelload_core::{
    DatabaseOpener, LoadError, Orchestrator, RawRunArgs, RunConfiguration, RunReport,
    redact_connection_string,
};
use modelload_postgres::{PostgresOpener, PostgresOptions};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use logging::{LoggingError, init_logging};
use settings::{LogFormat, Settings, SettingsError, load_settings, merge};

#[derive(Debug, Error)]
enum CliError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("report error: {0}")]
    Report(String),
}

#[derive(Parser, Debug)]
#[command(name = "modelload", version, about = "Load data model datasets into PostgreSQL")]
struct Cli {
    /// TOML settings file with defaults for connection and logging options.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log record format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
    /// Append log records to this file instead of stderr.
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a dataset into a database (and add indexes and constraints).
    ///
    /// The metadata in DATADIR decides which file goes into which table. The
    /// model tables are created, data loaded, indexes created, and finally
    /// constraints added. The first schema of the search path receives the
    /// data; further schemas are visible when adding constraints.
    Load(LoadArgs),
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Dataset directory containing metadata.csv.
    #[arg(value_name = "DATADIR")]
    datadir: Vec<String>,
    /// Database URI to load the dataset into.
    #[arg(long, short = 'd', value_name = "URI")]
    dburi: Option<String>,
    /// Comma-separated schema list; the first schema receives the data.
    #[arg(long, short = 's', value_name = "SCHEMAS")]
    search_path: Option<String>,
    /// Data model override, e.g. pedsnet-core.
    #[arg(long)]
    model: Option<String>,
    /// Data model version override.
    #[arg(long)]
    modelv: Option<String>,
    /// Service name, reported as the session application_name.
    #[arg(long)]
    service: Option<String>,
    /// Data models service URL or directory holding model DDL.
    #[arg(long)]
    dmsaservice: Option<String>,
    /// Undo the load: drop constraints, indexes and tables.
    #[arg(long, default_value_t = false)]
    undo: bool,
    /// Do not create indexes.
    #[arg(long, default_value_t = false)]
    noidx: bool,
    /// Do not create constraints.
    #[arg(long, default_value_t = false)]
    nofk: bool,
    /// Write the run report as JSON to this path.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

impl LoadArgs {
    /// Merge flags with settings-file defaults into raw run input.
    fn into_raw(self, settings: &Settings) -> (RawRunArgs, Option<PathBuf>) {
        let raw = RawRunArgs {
            data_args: self.datadir,
            connection_uri: merge(self.dburi, settings.dburi.as_ref()).unwrap_or_default(),
            search_path: merge(self.search_path, settings.search_path.as_ref()).unwrap_or_default(),
            model: self.model,
            model_version: self.modelv,
            service: merge(self.service, settings.service.as_ref()),
            dmsa_service: merge(self.dmsaservice, settings.dmsaservice.as_ref()),
            undo: self.undo,
            skip_indexes: self.noidx,
            skip_constraints: self.nofk,
        };
        (raw, self.report)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = run(cli).await;
    match &result {
        Ok(()) | Err(CliError::Load(_)) => {}
        // logging may not be installed yet
        Err(err) => eprintln!("modelload: {err}"),
    }
    ExitCode::from(exit_status(&result))
}

/// Process exit status for a finished run. Usage errors never get here;
/// clap exits with 2 on its own.
fn exit_status(result: &Result<(), CliError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };

    let log_format = cli.log_format.or(settings.log_format).unwrap_or_default();
    let log_file = cli.log_file.or_else(|| settings.log_file.clone());
    init_logging(log_format, log_file.as_deref())?;

    execute(
        cli.command,
        &settings,
        PostgresOpener::new(PostgresOptions::default()),
    )
    .await
}

async fn execute<O: DatabaseOpener>(
    command: Command,
    settings: &Settings,
    opener: O,
) -> Result<(), CliError> {
    match command {
        Command::Load(args) => {
            let (raw, report_path) = args.into_raw(settings);
            let report = run_load(&raw, opener).await?;
            if let Some(path) = report_path {
                write_report(&path, &report)?;
                tracing::info!(event = "report_written", path = %path.display());
            }
            Ok(())
        }
    }
}

async fn run_load<O: DatabaseOpener>(raw: &RawRunArgs, opener: O) -> Result<RunReport, CliError> {
    let run_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("run", run_id = %run_id);

    let mut orchestrator = Orchestrator::new(opener);
    let result = orchestrator.run(raw).instrument(span.clone()).await;
    result.map_err(|err| {
        span.in_scope(|| log_failure(raw, orchestrator.config(), &err));
        err.into()
    })
}

/// The single failure record of a run, with the active configuration.
fn log_failure(
    raw: &RawRunArgs,
    config: Option<&RunConfiguration>,
    err: &LoadError,
) {
    let directory = raw.data_args.join(" ");
    let (model, version, search_path) = match config {
        Some(config) => (
            config.data_model().to_string(),
            config.model_version().to_string(),
            config.search_path().join(","),
        ),
        None => (
            raw.model.clone().unwrap_or_default(),
            raw.model_version.clone().unwrap_or_default(),
            raw.search_path.clone(),
        ),
    };
    let dburi = redact_connection_string(&raw.connection_uri).redacted;
    let step = err.step().map(|step| step.as_str()).unwrap_or("");

    tracing::error!(
        event = "run_failed",
        kind = err.kind(),
        step,
        directory = %directory,
        data_model = %model,
        model_version = %version,
        dburi = %dburi,
        search_path = %search_path,
        service = %raw.service.as_deref().unwrap_or(""),
        error = %err,
    );
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent).map_err(|err| CliError::Report(err.to_string()))?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .map_err(|err| CliError::Report(err.to_string()))?;
    serde_json::to_writer_pretty(file, report).map_err(|err| CliError::Report(err.to_string()))
}
