use std::collections::BTreeMap;

/// Tables suppressed during load for a given data model.
///
/// Built-in entries cover models whose tables are not all supported
/// downstream yet. `pcornet` maps to the `dummy` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPolicy {
    by_model: BTreeMap<String, Vec<String>>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::empty().with_model("pcornet", ["dummy"])
    }
}

impl ExclusionPolicy {
    /// A policy that excludes nothing for any model.
    pub fn empty() -> Self {
        Self {
            by_model: BTreeMap::new(),
        }
    }

    /// Add or replace the excluded tables for `model`.
    pub fn with_model<I, S>(mut self, model: impl Into<String>, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by_model
            .insert(model.into(), tables.into_iter().map(Into::into).collect());
        self
    }

    /// Excluded tables for `model`; empty when the model has no entry.
    pub fn excluded_for(&self, model: &str) -> Vec<String> {
        self.by_model.get(model).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcornet_excludes_sentinel() {
        let policy = ExclusionPolicy::default();
        assert_eq!(policy.excluded_for("pcornet"), vec!["dummy".to_string()]);
        assert!(policy.excluded_for("pedsnet").is_empty());
        assert!(policy.excluded_for("PCORNET").is_empty());
    }

    #[test]
    fn entries_can_be_added() {
        let policy = ExclusionPolicy::empty().with_model("omop", ["note", "note_nlp"]);
        assert_eq!(policy.excluded_for("omop").len(), 2);
        assert!(policy.excluded_for("pcornet").is_empty());
    }
}
