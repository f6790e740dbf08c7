use std::fs;

use modelload_core::{DataDirectory, DatasetError};

fn dataset_with(metadata: &str, files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("metadata.csv"), metadata).expect("write metadata");
    for file in files {
        fs::write(dir.path().join(file), "person_id\n1\n").expect("write data file");
    }
    dir
}

fn read(dir: &tempfile::TempDir) -> Result<DataDirectory, DatasetError> {
    let mut dataset = DataDirectory::open(dir.path())?;
    dataset.read_metadata()?;
    Ok(dataset)
}

#[test]
fn reads_files_in_metadata_order() {
    let dir = dataset_with(
        "filename,table,model,model_version,row_count,checksum\n\
         person.csv,person,pedsnet,2.3,1,abc\n\
         visit.csv,visit_occurrence,pedsnet,2.3,,\n",
        &["person.csv", "visit.csv"],
    );

    let dataset = read(&dir).expect("metadata parses");

    assert_eq!(dataset.model(), "pedsnet");
    assert_eq!(dataset.model_version(), "2.3");
    let tables: Vec<&str> = dataset.files().iter().map(|f| f.table.as_str()).collect();
    assert_eq!(tables, vec!["person", "visit_occurrence"]);
    assert_eq!(dataset.files()[0].row_count, Some(1));
    assert_eq!(dataset.files()[0].checksum.as_deref(), Some("abc"));
    assert_eq!(dataset.files()[1].row_count, None);
    assert_eq!(dataset.files()[1].path, dir.path().join("visit.csv"));
}

#[test]
fn accepts_cdm_header_aliases() {
    let dir = dataset_with(
        "Filename,Table,CDM,CDM-Version\ndemographic.csv,demographic,pcornet,3.1\n",
        &["demographic.csv"],
    );

    let dataset = read(&dir).expect("metadata parses");

    assert_eq!(dataset.model(), "pcornet");
    assert_eq!(dataset.model_version(), "3.1");
}

#[test]
fn rejects_mixed_models() {
    let dir = dataset_with(
        "filename,table,model,model_version\n\
         person.csv,person,pedsnet,2.3\n\
         visit.csv,visit,pedsnet,2.4\n",
        &["person.csv", "visit.csv"],
    );

    let err = read(&dir).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidMetadata(msg) if msg.contains("line 3")));
}

#[test]
fn rejects_duplicate_tables() {
    let dir = dataset_with(
        "filename,table,model,model_version\n\
         a.csv,person,pedsnet,2.3\n\
         b.csv,person,pedsnet,2.3\n",
        &["a.csv", "b.csv"],
    );

    assert!(matches!(read(&dir).unwrap_err(), DatasetError::InvalidMetadata(_)));
}

#[test]
fn rejects_missing_data_file() {
    let dir = dataset_with(
        "filename,table,model,model_version\nperson.csv,person,pedsnet,2.3\n",
        &[],
    );

    let err = read(&dir).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidMetadata(msg) if msg.contains("not found")));
}

#[test]
fn rejects_empty_metadata_and_missing_columns() {
    let dir = dataset_with("filename,table,model,model_version\n", &[]);
    assert!(matches!(read(&dir).unwrap_err(), DatasetError::InvalidMetadata(_)));

    let dir = dataset_with("filename,table\nperson.csv,person\n", &["person.csv"]);
    let err = read(&dir).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidMetadata(msg) if msg.contains("model")));
}

#[test]
fn rejects_file_as_directory() {
    let dir = dataset_with("filename\n", &["person.csv"]);
    let err = DataDirectory::open(dir.path().join("person.csv")).unwrap_err();
    assert!(matches!(err, DatasetError::NotADirectory(_)));
}
