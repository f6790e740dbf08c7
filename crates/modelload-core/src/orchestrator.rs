//! Load orchestrator: drives a dataset and a database handle through the
//! load or undo sequence.
//!
//! Every step is fatal on failure. Nothing is retried or rolled back; a
//! failed load leaves the database as the failed step left it, and the
//! error is returned to the caller for logging and exit-code selection.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{self, RawRunArgs, RunConfiguration};
use crate::database::{Database, DatabaseOpener, FailureMode, OpenRequest};
use crate::dataset::DataDirectory;
use crate::error::{LoadError, Result, Step};
use crate::exclusion::ExclusionPolicy;
use crate::redaction::redact_connection_string;
use crate::timing::{RunMode, RunReport, Stopwatch};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initialized,
    MetadataLoaded,
    DatabaseOpened,
    Loading,
    Undoing,
    Complete,
    Failed,
}

/// Drives a single load or undo run.
pub struct Orchestrator<O> {
    opener: O,
    policy: ExclusionPolicy,
    state: RunState,
    config: Option<RunConfiguration>,
}

impl<O: DatabaseOpener> Orchestrator<O> {
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            policy: ExclusionPolicy::default(),
            state: RunState::Initialized,
            config: None,
        }
    }

    /// Replace the built-in table exclusion policy.
    pub fn with_policy(mut self, policy: ExclusionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// The resolved configuration, once metadata has been read.
    pub fn config(&self) -> Option<&RunConfiguration> {
        self.config.as_ref()
    }

    /// Execute the run described by `raw`.
    ///
    /// On error the state becomes [`RunState::Failed`] and no further step
    /// is attempted.
    pub async fn run(&mut self, raw: &RawRunArgs) -> Result<RunReport> {
        self.state = RunState::Initialized;
        self.config = None;
        let result = self.execute(raw).await;
        let next = if result.is_ok() {
            RunState::Complete
        } else {
            RunState::Failed
        };
        self.transition(next);
        result
    }

    async fn execute(&mut self, raw: &RawRunArgs) -> Result<RunReport> {
        let (data_arg, _) = raw.validate()?;
        info!(event = "load_started", directory = %data_arg, undo = raw.undo);

        let mut dataset = DataDirectory::open(data_arg).map_err(LoadError::DataDirectory)?;
        dataset.read_metadata().map_err(LoadError::MetadataRead)?;
        self.transition(RunState::MetadataLoaded);

        let config = config::resolve(raw, dataset.model(), dataset.model_version(), &self.policy)?;
        info!(
            event = "metadata_read",
            files = dataset.files().len(),
            declared_model = %dataset.model(),
            declared_version = %dataset.model_version(),
            data_model = %config.data_model(),
            model_version = %config.model_version(),
            exclude_tables = ?config.exclude_tables(),
        );
        let config = self.config.insert(config).clone();

        let target = redact_connection_string(config.connection_uri());
        let mut db = self
            .opener
            .open(OpenRequest::from(&config))
            .await
            .map_err(LoadError::DatabaseOpen)?;
        self.transition(RunState::DatabaseOpened);
        info!(
            event = "database_opened",
            engine = self.opener.engine(),
            dburi = %target.redacted,
            search_path = %config.search_path().join(","),
        );

        if config.undo() {
            self.transition(RunState::Undoing);
            undo(db.as_mut(), &config).await
        } else {
            self.transition(RunState::Loading);
            load(db.as_mut(), &dataset, &config).await
        }
    }

    fn transition(&mut self, next: RunState) {
        debug!(event = "state_changed", from = ?self.state, to = ?next);
        self.state = next;
    }
}

async fn load(
    db: &mut dyn Database,
    dataset: &DataDirectory,
    config: &RunConfiguration,
) -> Result<RunReport> {
    let started_at = Utc::now();
    let mut watch = Stopwatch::new();

    let step_start = Instant::now();
    db.create_tables(FailureMode::Strict)
        .await
        .map_err(|source| LoadError::SchemaOperation {
            step: Step::CreateTables,
            source,
        })?;
    watch.record(Step::CreateTables, step_start);
    info!(event = "tables_created", data_model = %config.data_model());

    watch.mark_origin();
    let step_start = Instant::now();
    let summary = db.load(dataset).await.map_err(LoadError::LoadOperation)?;
    let minutes = watch.record(Step::Load, step_start);
    info!(
        event = "data_loaded",
        tables = summary.tables.len(),
        rows = summary.total_rows(),
        duration_minutes = minutes,
        "Loaded. Beginning to add indexes."
    );

    if config.skip_indexes() {
        info!(event = "indexes_skipped");
    } else {
        let step_start = Instant::now();
        db.create_indexes(FailureMode::Strict)
            .await
            .map_err(|source| LoadError::SchemaOperation {
                step: Step::CreateIndexes,
                source,
            })?;
        let minutes = watch.record(Step::CreateIndexes, step_start);
        info!(event = "indexes_added", duration_minutes = minutes);
    }

    if config.skip_constraints() {
        info!(event = "constraints_skipped");
    } else {
        info!(event = "constraints_started", search_path = %config.search_path().join(","));
        let step_start = Instant::now();
        db.create_constraints(FailureMode::Strict)
            .await
            .map_err(|source| LoadError::SchemaOperation {
                step: Step::CreateConstraints,
                source,
            })?;
        let minutes = watch.record(Step::CreateConstraints, step_start);
        info!(event = "constraints_added", duration_minutes = minutes);
    }

    let duration_minutes = watch.total_minutes();
    info!(
        event = "load_complete",
        data_model = %config.data_model(),
        model_version = %config.model_version(),
        rows = summary.total_rows(),
        duration_minutes = duration_minutes,
    );

    Ok(RunReport {
        mode: RunMode::Load,
        started_at,
        data_model: config.data_model().to_string(),
        model_version: config.model_version().to_string(),
        phases: watch.into_phases(),
        rows_loaded: summary.total_rows(),
        duration_minutes,
    })
}

async fn undo(db: &mut dyn Database, config: &RunConfiguration) -> Result<RunReport> {
    if config.skip_indexes() || config.skip_constraints() {
        warn!(event = "skip_switches_ignored", "undo always drops constraints, indexes and tables");
    }

    let started_at = Utc::now();
    let mut watch = Stopwatch::new();
    watch.mark_origin();

    let step_start = Instant::now();
    db.drop_constraints(FailureMode::Normal)
        .await
        .map_err(|source| LoadError::UndoOperation {
            step: Step::DropConstraints,
            source,
        })?;
    undo_step_finished(&mut watch, Step::DropConstraints, step_start);

    let step_start = Instant::now();
    db.drop_indexes(FailureMode::Normal)
        .await
        .map_err(|source| LoadError::UndoOperation {
            step: Step::DropIndexes,
            source,
        })?;
    undo_step_finished(&mut watch, Step::DropIndexes, step_start);

    let step_start = Instant::now();
    db.drop_tables(FailureMode::Normal)
        .await
        .map_err(|source| LoadError::UndoOperation {
            step: Step::DropTables,
            source,
        })?;
    undo_step_finished(&mut watch, Step::DropTables, step_start);

    let duration_minutes = watch.total_minutes();
    info!(
        event = "undo_complete",
        data_model = %config.data_model(),
        model_version = %config.model_version(),
        duration_minutes = duration_minutes,
    );

    Ok(RunReport {
        mode: RunMode::Undo,
        started_at,
        data_model: config.data_model().to_string(),
        model_version: config.model_version().to_string(),
        phases: watch.into_phases(),
        rows_loaded: 0,
        duration_minutes,
    })
}

fn undo_step_finished(watch: &mut Stopwatch, step: Step, started: Instant) {
    let minutes = watch.record(step, started);
    info!(event = "undo_step_finished", step = %step, duration_minutes = minutes);
}
