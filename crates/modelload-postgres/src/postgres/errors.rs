use modelload_core::FailureMode;

/// SQLSTATE codes meaning the object a statement refers to does not exist:
/// undefined_table, undefined_object, invalid_schema_name.
pub const MISSING_OBJECT_CODES: [&str; 3] = ["42P01", "42704", "3F000"];

pub fn is_missing_object_code(code: &str) -> bool {
    MISSING_OBJECT_CODES.contains(&code)
}

/// SQLSTATE of a database error, if the failure came from the server.
pub fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

/// Whether a failed statement may be skipped under `mode`.
pub fn tolerated(mode: FailureMode, sqlstate: Option<&str>) -> bool {
    match mode {
        FailureMode::Strict => false,
        FailureMode::Normal => sqlstate.is_some_and(is_missing_object_code),
    }
}
