mod support;

use modelload_core::{
    ArgumentError, ExclusionPolicy, LoadError, Orchestrator, RawRunArgs, RunMode, RunState, Step,
};
use support::{FakeOpener, raw_args, write_dataset};

fn pedsnet_dataset() -> tempfile::TempDir {
    write_dataset("pedsnet", "2.3", &[("person.csv", "person"), ("visit.csv", "visit_occurrence")])
}

#[tokio::test]
async fn load_runs_full_sequence_in_order() {
    let dir = pedsnet_dataset();
    let opener = FakeOpener::default();
    let log = opener.log.clone();
    let mut orchestrator = Orchestrator::new(opener);

    let report = orchestrator.run(&raw_args(dir.path())).await.expect("load succeeds");

    assert_eq!(
        log.calls(),
        vec![
            "open",
            "create_tables(strict)",
            "load",
            "create_indexes(strict)",
            "create_constraints(strict)",
        ]
    );
    assert_eq!(orchestrator.state(), RunState::Complete);
    assert_eq!(report.mode, RunMode::Load);
    assert_eq!(report.rows_loaded, 4);
    assert_eq!(
        report.steps(),
        vec![
            Step::CreateTables,
            Step::Load,
            Step::CreateIndexes,
            Step::CreateConstraints,
        ]
    );

    let requests = log.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].data_model, "pedsnet");
    assert_eq!(requests[0].model_version, "2.3");
    assert_eq!(requests[0].connection_uri, "postgres://u:p@h/db");
    assert_eq!(requests[0].search_path, vec!["public".to_string()]);
    assert!(requests[0].exclude_tables.is_empty());
}

#[tokio::test]
async fn skip_switches_remove_steps_without_reordering() {
    let dir = pedsnet_dataset();

    let opener = FakeOpener::default();
    let log = opener.log.clone();
    let mut args = raw_args(dir.path());
    args.skip_indexes = true;
    Orchestrator::new(opener).run(&args).await.expect("load succeeds");
    assert_eq!(
        log.calls(),
        vec!["open", "create_tables(strict)", "load", "create_constraints(strict)"]
    );

    let opener = FakeOpener::default();
    let log = opener.log.clone();
    let mut args = raw_args(dir.path());
    args.skip_constraints = true;
    Orchestrator::new(opener).run(&args).await.expect("load succeeds");
    assert_eq!(
        log.calls(),
        vec!["open", "create_tables(strict)", "load", "create_indexes(strict)"]
    );

    let opener = FakeOpener::default();
    let log = opener.log.clone();
    let mut args = raw_args(dir.path());
    args.skip_indexes = true;
    args.skip_constraints = true;
    Orchestrator::new(opener).run(&args).await.expect("load succeeds");
    assert_eq!(log.calls(), vec!["open", "create_tables(strict)", "load"]);
}

#[tokio::test]
async fn undo_drops_everything_in_reverse_order() {
    let dir = pedsnet_dataset();
    let opener = FakeOpener::default();
    let log = opener.log.clone();
    let mut args = raw_args(dir.path());
    args.undo = true;
    args.skip_indexes = true;
    args.skip_constraints = true;

    let report = Orchestrator::new(opener).run(&args).await.expect("undo succeeds");

    assert_eq!(
        log.calls(),
        vec![
            "open",
            "drop_constraints(normal)",
            "drop_indexes(normal)",
            "drop_tables(normal)",
        ]
    );
    assert_eq!(report.mode, RunMode::Undo);
    assert_eq!(report.rows_loaded, 0);
}

#[tokio::test]
async fn failing_step_stops_the_load() {
    let dir = pedsnet_dataset();
    let opener = FakeOpener::failing_on("create_indexes");
    let log = opener.log.clone();
    let mut orchestrator = Orchestrator::new(opener);

    let err = orchestrator.run(&raw_args(dir.path())).await.unwrap_err();

    assert!(matches!(
        err,
        LoadError::SchemaOperation {
            step: Step::CreateIndexes,
            ..
        }
    ));
    assert_eq!(err.kind(), "schema_operation_error");
    assert_eq!(
        log.calls(),
        vec!["open", "create_tables(strict)", "load", "create_indexes(strict)"]
    );
    assert_eq!(orchestrator.state(), RunState::Failed);
}

#[tokio::test]
async fn failing_load_skips_post_processing() {
    let dir = pedsnet_dataset();
    let opener = FakeOpener::failing_on("load");
    let log = opener.log.clone();

    let err = Orchestrator::new(opener)
        .run(&raw_args(dir.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, LoadError::LoadOperation(_)));
    assert_eq!(err.step(), Some(Step::Load));
    assert_eq!(log.calls(), vec!["open", "create_tables(strict)", "load"]);
}

#[tokio::test]
async fn failing_drop_stops_the_undo() {
    let dir = pedsnet_dataset();
    let opener = FakeOpener::failing_on("drop_indexes");
    let log = opener.log.clone();
    let mut args = raw_args(dir.path());
    args.undo = true;

    let err = Orchestrator::new(opener).run(&args).await.unwrap_err();

    assert!(matches!(
        err,
        LoadError::UndoOperation {
            step: Step::DropIndexes,
            ..
        }
    ));
    assert_eq!(
        log.calls(),
        vec!["open", "drop_constraints(normal)", "drop_indexes(normal)"]
    );
}

#[tokio::test]
async fn each_drop_reports_its_own_step() {
    for (op, step, calls) in [
        ("drop_constraints", Step::DropConstraints, 1),
        ("drop_indexes", Step::DropIndexes, 2),
        ("drop_tables", Step::DropTables, 3),
    ] {
        let dir = pedsnet_dataset();
        let opener = FakeOpener::failing_on(op);
        let log = opener.log.clone();
        let mut args = raw_args(dir.path());
        args.undo = true;

        let err = Orchestrator::new(opener).run(&args).await.unwrap_err();

        assert_eq!(err.step(), Some(step), "failing {op}");
        assert_eq!(err.kind(), "undo_operation_error");
        assert_eq!(log.calls().len(), calls + 1, "failing {op}");
        assert_eq!(log.calls().last().map(String::as_str), Some(format!("{op}(normal)").as_str()));
    }
}

#[tokio::test]
async fn argument_errors_happen_before_any_handle() {
    let opener = FakeOpener::default();
    let log = opener.log.clone();
    let mut orchestrator = Orchestrator::new(opener);

    let args = RawRunArgs {
        data_args: vec!["a".to_string(), "b".to_string()],
        connection_uri: "postgres://h/db".to_string(),
        search_path: "public".to_string(),
        ..RawRunArgs::default()
    };
    let err = orchestrator.run(&args).await.unwrap_err();
    assert!(matches!(
        err,
        LoadError::Argument(ArgumentError::MissingArgument { count: 2 })
    ));
    assert!(orchestrator.config().is_none());

    let dir = pedsnet_dataset();
    let mut args = raw_args(dir.path());
    args.connection_uri.clear();
    let err = orchestrator.run(&args).await.unwrap_err();
    assert!(matches!(
        err,
        LoadError::Argument(ArgumentError::MissingRequiredOption(_))
    ));

    let mut args = raw_args(dir.path());
    args.search_path.clear();
    let err = orchestrator.run(&args).await.unwrap_err();
    assert!(matches!(
        err,
        LoadError::Argument(ArgumentError::MissingRequiredOption(_))
    ));

    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn bad_directory_fails_before_open() {
    let opener = FakeOpener::default();
    let log = opener.log.clone();
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("missing");

    let err = Orchestrator::new(opener.clone())
        .run(&raw_args(&missing))
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::DataDirectory(_)));

    let err = Orchestrator::new(opener)
        .run(&raw_args(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::MetadataRead(_)));

    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn open_failure_runs_no_operations() {
    let dir = pedsnet_dataset();
    let opener = FakeOpener {
        fail_open: true,
        ..FakeOpener::default()
    };
    let log = opener.log.clone();
    let mut orchestrator = Orchestrator::new(opener);

    let err = orchestrator.run(&raw_args(dir.path())).await.unwrap_err();

    assert!(matches!(err, LoadError::DatabaseOpen(_)));
    assert_eq!(log.calls(), vec!["open"]);
    let config = orchestrator.config().expect("config resolved before open");
    assert_eq!(config.data_model(), "pedsnet");
}

#[tokio::test]
async fn overrides_and_exclusions_reach_the_handle() {
    let dir = write_dataset("pcornet", "3.1", &[("demographic.csv", "demographic")]);
    let opener = FakeOpener::default();
    let log = opener.log.clone();
    Orchestrator::new(opener)
        .run(&raw_args(dir.path()))
        .await
        .expect("load succeeds");
    assert_eq!(log.requests()[0].exclude_tables, vec!["dummy".to_string()]);

    let dir = write_dataset("pedsnet", "2.3", &[("person.csv", "person")]);
    let opener = FakeOpener::default();
    let log = opener.log.clone();
    let mut args = raw_args(dir.path());
    args.model = Some("pedsnet-core".to_string());
    args.model_version = Some("2.4.0".to_string());
    args.search_path = "pedsnet_dcc, vocabulary".to_string();
    args.dmsa_service = Some("https://dmsa.example.org".to_string());
    Orchestrator::new(opener)
        .with_policy(ExclusionPolicy::empty().with_model("pedsnet-core", ["fact_relationship"]))
        .run(&args)
        .await
        .expect("load succeeds");

    let requests = log.requests();
    let request = &requests[0];
    assert_eq!(request.data_model, "pedsnet-core");
    assert_eq!(request.model_version, "2.4.0");
    assert_eq!(request.search_path, vec!["pedsnet_dcc", "vocabulary"]);
    assert_eq!(request.dmsa_service_hint, "https://dmsa.example.org");
    assert_eq!(request.exclude_tables, vec!["fact_relationship".to_string()]);
}
