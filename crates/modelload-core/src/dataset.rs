//! Dataset handle: a directory of data files plus `metadata.csv`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::DatasetError;

/// Name of the metadata file inside a dataset directory.
pub const METADATA_FILE: &str = "metadata.csv";

/// One data file and the table it loads into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    /// File name as written in the metadata.
    pub filename: String,
    /// Resolved path of the file.
    pub path: PathBuf,
    /// Destination table.
    pub table: String,
    pub row_count: Option<u64>,
    pub checksum: Option<String>,
}

/// A dataset directory and its parsed metadata.
#[derive(Debug, Clone)]
pub struct DataDirectory {
    root: PathBuf,
    model: String,
    model_version: String,
    files: Vec<DataFile>,
}

impl DataDirectory {
    /// Bind a handle to `path`. The metadata is not read until
    /// [`DataDirectory::read_metadata`] is called.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let root = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&root).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => DatasetError::NotFound(root.clone()),
            _ => DatasetError::Io {
                path: root.clone(),
                source,
            },
        })?;
        if !meta.is_dir() {
            return Err(DatasetError::NotADirectory(root));
        }

        Ok(Self {
            root,
            model: String::new(),
            model_version: String::new(),
            files: Vec::new(),
        })
    }

    /// Read `metadata.csv` and populate the model, version and file list.
    pub fn read_metadata(&mut self) -> Result<(), DatasetError> {
        let path = self.metadata_path();
        let file = std::fs::File::open(&path).map_err(|source| DatasetError::Io {
            path: path.clone(),
            source,
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(file);
        let columns = MetadataColumns::from_headers(reader.headers()?)?;

        let mut model: Option<(String, String)> = None;
        let mut tables = BTreeSet::new();
        let mut files = Vec::new();

        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            // header is line 1
            let line = idx + 2;
            let entry = columns.entry(&record, line)?;

            let (name, version) = model
                .get_or_insert_with(|| (entry.model.clone(), entry.model_version.clone()));
            if *name != entry.model || *version != entry.model_version {
                return Err(DatasetError::InvalidMetadata(format!(
                    "line {line}: model {} {} differs from {name} {version}",
                    entry.model, entry.model_version
                )));
            }

            if !tables.insert(entry.table.clone()) {
                return Err(DatasetError::InvalidMetadata(format!(
                    "line {line}: table {} is listed more than once",
                    entry.table
                )));
            }

            let file_path = self.root.join(&entry.filename);
            if !file_path.is_file() {
                return Err(DatasetError::InvalidMetadata(format!(
                    "line {line}: data file not found: {}",
                    file_path.display()
                )));
            }

            files.push(DataFile {
                filename: entry.filename,
                path: file_path,
                table: entry.table,
                row_count: entry.row_count,
                checksum: entry.checksum,
            });
        }

        let Some((model, model_version)) = model else {
            return Err(DatasetError::InvalidMetadata(format!(
                "{} lists no data files",
                path.display()
            )));
        };

        self.model = model;
        self.model_version = model_version;
        self.files = files;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    /// Data model declared by the metadata. Empty before `read_metadata`.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Model version declared by the metadata. Empty before `read_metadata`.
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Data files in metadata order.
    pub fn files(&self) -> &[DataFile] {
        &self.files
    }
}

struct MetadataEntry {
    filename: String,
    table: String,
    model: String,
    model_version: String,
    row_count: Option<u64>,
    checksum: Option<String>,
}

/// Column positions resolved from the header row.
struct MetadataColumns {
    filename: usize,
    table: usize,
    model: usize,
    model_version: usize,
    row_count: Option<usize>,
    checksum: Option<usize>,
}

impl MetadataColumns {
    fn from_headers(headers: &StringRecord) -> Result<Self, DatasetError> {
        let names: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |aliases: &[&str]| names.iter().position(|name| aliases.contains(&name.as_str()));
        let require = |aliases: &[&str]| {
            find(aliases).ok_or_else(|| {
                DatasetError::InvalidMetadata(format!("missing column: {}", aliases[0]))
            })
        };

        Ok(Self {
            filename: require(&["filename"])?,
            table: require(&["table"])?,
            model: require(&["model", "cdm"])?,
            model_version: require(&["model_version", "cdm_version"])?,
            row_count: find(&["row_count"]),
            checksum: find(&["checksum"]),
        })
    }

    fn entry(&self, record: &StringRecord, line: usize) -> Result<MetadataEntry, DatasetError> {
        let required = |idx: usize, column: &str| {
            record
                .get(idx)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    DatasetError::InvalidMetadata(format!("line {line}: empty {column}"))
                })
        };
        let optional = |idx: Option<usize>| {
            idx.and_then(|idx| record.get(idx))
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let row_count = match optional(self.row_count) {
            Some(value) => Some(value.parse::<u64>().map_err(|_| {
                DatasetError::InvalidMetadata(format!("line {line}: invalid row_count {value}"))
            })?),
            None => None,
        };

        Ok(MetadataEntry {
            filename: required(self.filename, "filename")?,
            table: required(self.table, "table")?,
            model: required(self.model, "model")?,
            model_version: required(self.model_version, "model_version")?,
            row_count,
            checksum: optional(self.checksum),
        })
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().to_ascii_lowercase().replace('-', "_")
}
