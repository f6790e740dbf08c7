//! Run configuration: caller input merged with dataset-declared values.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ArgumentError;
use crate::exclusion::ExclusionPolicy;

/// Raw caller input for one invocation, as collected by the CLI.
#[derive(Debug, Clone, Default)]
pub struct RawRunArgs {
    /// Positional dataset arguments; exactly one is accepted.
    pub data_args: Vec<String>,
    pub connection_uri: String,
    /// Comma-separated schema list; the first schema is the load target.
    pub search_path: String,
    pub model: Option<String>,
    pub model_version: Option<String>,
    pub service: Option<String>,
    pub dmsa_service: Option<String>,
    pub undo: bool,
    pub skip_indexes: bool,
    pub skip_constraints: bool,
}

impl RawRunArgs {
    /// Check the parts of the input that do not depend on the dataset.
    ///
    /// Returns the single dataset argument and the parsed search path.
    pub fn validate(&self) -> Result<(&str, Vec<String>), ArgumentError> {
        let [data_arg] = self.data_args.as_slice() else {
            return Err(ArgumentError::MissingArgument {
                count: self.data_args.len(),
            });
        };

        if self.connection_uri.trim().is_empty() {
            return Err(ArgumentError::MissingRequiredOption("connection URI"));
        }

        let search_path = parse_search_path(&self.search_path);
        if search_path.is_empty() {
            return Err(ArgumentError::MissingRequiredOption("search path"));
        }

        Ok((data_arg.as_str(), search_path))
    }
}

/// Fully resolved, immutable configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfiguration {
    data_argument: PathBuf,
    connection_uri: String,
    search_path: Vec<String>,
    data_model: String,
    model_version: String,
    exclude_tables: Vec<String>,
    service_hint: String,
    dmsa_service_hint: String,
    undo: bool,
    skip_indexes: bool,
    skip_constraints: bool,
}

/// Merge caller input with the dataset's declared model and version.
///
/// Overrides win when non-empty. Excluded tables are derived from the
/// resolved model through `policy`.
pub fn resolve(
    raw: &RawRunArgs,
    declared_model: &str,
    declared_version: &str,
    policy: &ExclusionPolicy,
) -> Result<RunConfiguration, ArgumentError> {
    let (data_arg, search_path) = raw.validate()?;

    let data_model = pick_override(raw.model.as_deref(), declared_model);
    let model_version = pick_override(raw.model_version.as_deref(), declared_version);
    let exclude_tables = policy.excluded_for(&data_model);

    Ok(RunConfiguration {
        data_argument: PathBuf::from(data_arg),
        connection_uri: raw.connection_uri.trim().to_string(),
        search_path,
        data_model,
        model_version,
        exclude_tables,
        service_hint: raw.service.clone().unwrap_or_default(),
        dmsa_service_hint: raw.dmsa_service.clone().unwrap_or_default(),
        undo: raw.undo,
        skip_indexes: raw.skip_indexes,
        skip_constraints: raw.skip_constraints,
    })
}

fn pick_override(value: Option<&str>, declared: &str) -> String {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => declared.to_string(),
    }
}

/// Split a comma-separated search path, dropping blank segments.
pub fn parse_search_path(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|schema| !schema.is_empty())
        .map(str::to_string)
        .collect()
}

impl RunConfiguration {
    pub fn data_argument(&self) -> &Path {
        &self.data_argument
    }

    pub fn connection_uri(&self) -> &str {
        &self.connection_uri
    }

    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    /// The schema data is loaded into.
    pub fn primary_schema(&self) -> &str {
        // validate() guarantees a non-empty search path
        self.search_path.first().map(String::as_str).unwrap_or_default()
    }

    pub fn data_model(&self) -> &str {
        &self.data_model
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn exclude_tables(&self) -> &[String] {
        &self.exclude_tables
    }

    pub fn service_hint(&self) -> &str {
        &self.service_hint
    }

    pub fn dmsa_service_hint(&self) -> &str {
        &self.dmsa_service_hint
    }

    pub fn undo(&self) -> bool {
        self.undo
    }

    pub fn skip_indexes(&self) -> bool {
        self.skip_indexes
    }

    pub fn skip_constraints(&self) -> bool {
        self.skip_constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawRunArgs {
        RawRunArgs {
            data_args: vec!["./sample".to_string()],
            connection_uri: "postgres://u:p@h/db".to_string(),
            search_path: "public".to_string(),
            ..RawRunArgs::default()
        }
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let mut args = raw();
        args.data_args.clear();
        assert_eq!(
            args.validate().unwrap_err(),
            ArgumentError::MissingArgument { count: 0 }
        );

        args.data_args = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            args.validate().unwrap_err(),
            ArgumentError::MissingArgument { count: 2 }
        );
    }

    #[test]
    fn rejects_missing_uri_and_search_path() {
        let mut args = raw();
        args.connection_uri = "  ".to_string();
        assert_eq!(
            args.validate().unwrap_err(),
            ArgumentError::MissingRequiredOption("connection URI")
        );

        let mut args = raw();
        args.search_path = " , ".to_string();
        assert_eq!(
            args.validate().unwrap_err(),
            ArgumentError::MissingRequiredOption("search path")
        );
    }

    #[test]
    fn override_wins_when_non_empty() {
        let mut args = raw();
        args.model = Some("pedsnet-core".to_string());
        let config = resolve(&args, "pedsnet", "2.3", &ExclusionPolicy::default()).unwrap();
        assert_eq!(config.data_model(), "pedsnet-core");
        assert_eq!(config.model_version(), "2.3");

        args.model = Some(String::new());
        args.model_version = Some("2.4".to_string());
        let config = resolve(&args, "pedsnet", "2.3", &ExclusionPolicy::default()).unwrap();
        assert_eq!(config.data_model(), "pedsnet");
        assert_eq!(config.model_version(), "2.4");
    }

    #[test]
    fn exclusion_follows_resolved_model() {
        let mut args = raw();
        let config = resolve(&args, "pcornet", "3.0", &ExclusionPolicy::default()).unwrap();
        assert!(!config.exclude_tables().is_empty());

        args.model = Some("pedsnet".to_string());
        let config = resolve(&args, "pcornet", "3.0", &ExclusionPolicy::default()).unwrap();
        assert!(config.exclude_tables().is_empty());
    }

    #[test]
    fn search_path_keeps_order() {
        let mut args = raw();
        args.search_path = "pedsnet, vocabulary ,,public".to_string();
        let config = resolve(&args, "pedsnet", "2.3", &ExclusionPolicy::default()).unwrap();
        assert_eq!(config.search_path(), ["pedsnet", "vocabulary", "public"]);
        assert_eq!(config.primary_schema(), "pedsnet");
    }
}
