#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use modelload_core::{
    DataDirectory, Database, DatabaseError, DatabaseOpener, FailureMode, LoadSummary, OpenRequest,
    RawRunArgs,
};
use tempfile::TempDir;

/// Write a dataset directory with one data file per `(filename, table)`.
pub fn write_dataset(model: &str, version: &str, files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut metadata = String::from("filename,table,model,model_version\n");
    for (filename, table) in files {
        metadata.push_str(&format!("{filename},{table},{model},{version}\n"));
        std::fs::write(dir.path().join(filename), "id,name\n1,a\n2,b\n").expect("write data file");
    }
    std::fs::write(dir.path().join("metadata.csv"), metadata).expect("write metadata");
    dir
}

pub fn raw_args(dir: &Path) -> RawRunArgs {
    RawRunArgs {
        data_args: vec![dir.display().to_string()],
        connection_uri: "postgres://u:p@h/db".to_string(),
        search_path: "public".to_string(),
        ..RawRunArgs::default()
    }
}

/// Shared log of calls made against fake handles.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
    requests: Arc<Mutex<Vec<OpenRequest>>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log").clone()
    }

    pub fn requests(&self) -> Vec<OpenRequest> {
        self.requests.lock().expect("request log").clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().expect("call log").push(call);
    }
}

/// Opener returning a recording database.
#[derive(Debug, Clone, Default)]
pub struct FakeOpener {
    pub log: CallLog,
    pub fail_open: bool,
    /// Name of the operation that should fail, e.g. `"create_indexes"`.
    pub fail_on: Option<&'static str>,
}

impl FakeOpener {
    pub fn failing_on(op: &'static str) -> Self {
        Self {
            fail_on: Some(op),
            ..Self::default()
        }
    }
}

#[async_trait]
impl DatabaseOpener for FakeOpener {
    fn engine(&self) -> &'static str {
        "fake"
    }

    async fn open(&self, request: OpenRequest) -> Result<Box<dyn Database>, DatabaseError> {
        self.log.push("open".to_string());
        self.log.requests.lock().expect("request log").push(request);
        if self.fail_open {
            return Err(DatabaseError::new("password authentication failed"));
        }
        Ok(Box::new(FakeDatabase {
            log: self.log.clone(),
            fail_on: self.fail_on,
        }))
    }
}

struct FakeDatabase {
    log: CallLog,
    fail_on: Option<&'static str>,
}

impl FakeDatabase {
    fn call(&self, op: &'static str, mode: FailureMode) -> Result<(), DatabaseError> {
        self.log.push(format!("{op}({mode})"));
        if self.fail_on == Some(op) {
            return Err(DatabaseError::new(format!("{op} exploded")));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn create_tables(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.call("create_tables", mode)
    }

    async fn load(&mut self, dataset: &DataDirectory) -> Result<LoadSummary, DatabaseError> {
        self.log.push("load".to_string());
        if self.fail_on == Some("load") {
            return Err(DatabaseError::new("copy failed"));
        }
        Ok(LoadSummary {
            tables: dataset
                .files()
                .iter()
                .map(|file| (file.table.clone(), 2))
                .collect(),
        })
    }

    async fn create_indexes(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.call("create_indexes", mode)
    }

    async fn create_constraints(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.call("create_constraints", mode)
    }

    async fn drop_constraints(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.call("drop_constraints", mode)
    }

    async fn drop_indexes(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.call("drop_indexes", mode)
    }

    async fn drop_tables(&mut self, mode: FailureMode) -> Result<(), DatabaseError> {
        self.call("drop_tables", mode)
    }
}
