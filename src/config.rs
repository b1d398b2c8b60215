//! Configuration for the query backends.
//!
//! Loaded from a TOML file (every key optional) and then adjusted by
//! environment variables:
//!
//! - `PUBQUERY_ACCESSOR_FAILURE` - `skip_field`, `skip_object` or `fail`
//! - `PUBQUERY_IDENTIFIERS` - `sequential` or `uuid`
//! - `PUBQUERY_SQL_DATETIME_CAST` - epoch cast template, `{column}` is replaced
//! - `PUBQUERY_DOCUMENT_DATES` - `extended_json` or `string`
//!
//! ```toml
//! [index]
//! accessor_failure = "skip_object"
//!
//! [sql]
//! datetime_cast = "EXTRACT(EPOCH FROM {column})"
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

pub const ENV_ACCESSOR_FAILURE: &str = "PUBQUERY_ACCESSOR_FAILURE";
pub const ENV_IDENTIFIERS: &str = "PUBQUERY_IDENTIFIERS";
pub const ENV_SQL_DATETIME_CAST: &str = "PUBQUERY_SQL_DATETIME_CAST";
pub const ENV_DOCUMENT_DATES: &str = "PUBQUERY_DOCUMENT_DATES";

/// What `add_objects` does when a field accessor fails on an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorFailurePolicy {
    /// Leave only that field's entry out; the object is still indexed under
    /// its other fields and counts towards NOT.
    #[default]
    SkipField,
    /// Leave the whole object out.
    SkipObject,
    /// Stop and return the error. Objects added before the failing one stay
    /// indexed; the failing object leaves no entries.
    Fail,
}

impl FromStr for AccessorFailurePolicy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip_field" => Ok(Self::SkipField),
            "skip_object" => Ok(Self::SkipObject),
            "fail" => Ok(Self::Fail),
            other => Err(QueryError::Config(format!(
                "unknown accessor failure policy '{}'",
                other
            ))),
        }
    }
}

/// Default identifier generation for objects added without explicit ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// `0`, `1`, `2`, ... continuing across calls.
    #[default]
    Sequential,
    /// Random v4 UUIDs.
    Uuid,
}

impl FromStr for IdentifierKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "uuid" => Ok(Self::Uuid),
            other => Err(QueryError::Config(format!(
                "unknown identifier kind '{}'",
                other
            ))),
        }
    }
}

/// How datetimes are written into document filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateEncoding {
    /// `{"$date": "2000-01-01T00:00:00Z"}`
    #[default]
    ExtendedJson,
    /// `"2000-01-01T00:00:00Z"`
    String,
}

impl FromStr for DateEncoding {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extended_json" => Ok(Self::ExtendedJson),
            "string" => Ok(Self::String),
            other => Err(QueryError::Config(format!(
                "unknown document date encoding '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub accessor_failure: AccessorFailurePolicy,
    #[serde(default)]
    pub identifiers: IdentifierKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlConfig {
    /// Expression turning a datetime column into UNIX seconds.
    #[serde(default = "default_datetime_cast")]
    pub datetime_cast: String,
}

fn default_datetime_cast() -> String {
    "CAST(strftime('%s', {column}) AS INT)".to_string()
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            datetime_cast: default_datetime_cast(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    #[serde(default)]
    pub dates: DateEncoding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub sql: SqlConfig,
    #[serde(default)]
    pub document: DocumentConfig,
}

impl QueryConfig {
    pub fn from_toml_str(s: &str) -> QueryResult<Self> {
        let config: QueryConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QueryError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded query config");
        config.apply_env_overrides()
    }

    pub fn apply_env_overrides(self) -> QueryResult<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; `apply_env_overrides` uses the
    /// process environment.
    pub fn apply_overrides<F>(mut self, lookup: F) -> QueryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_ACCESSOR_FAILURE) {
            self.index.accessor_failure = v.parse()?;
        }
        if let Some(v) = lookup(ENV_IDENTIFIERS) {
            self.index.identifiers = v.parse()?;
        }
        if let Some(v) = lookup(ENV_SQL_DATETIME_CAST) {
            self.sql.datetime_cast = v;
        }
        if let Some(v) = lookup(ENV_DOCUMENT_DATES) {
            self.document.dates = v.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> QueryResult<()> {
        if !self.sql.datetime_cast.contains("{column}") {
            return Err(QueryError::Config(format!(
                "sql.datetime_cast '{}' does not mention {{column}}",
                self.sql.datetime_cast
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.index.accessor_failure, AccessorFailurePolicy::SkipField);
        assert_eq!(config.index.identifiers, IdentifierKind::Sequential);
        assert_eq!(config.sql.datetime_cast, "CAST(strftime('%s', {column}) AS INT)");
        assert_eq!(config.document.dates, DateEncoding::ExtendedJson);
    }

    #[test]
    fn test_partial_toml() {
        let config = QueryConfig::from_toml_str(
            r#"
            [index]
            accessor_failure = "fail"

            [document]
            dates = "string"
            "#,
        )
        .unwrap();
        assert_eq!(config.index.accessor_failure, AccessorFailurePolicy::Fail);
        assert_eq!(config.index.identifiers, IdentifierKind::Sequential);
        assert_eq!(config.document.dates, DateEncoding::String);
        assert_eq!(config.sql, SqlConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = QueryConfig::from_toml_str("[index]\naccessor_failure = \"sometimes\"").unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));

        let err = QueryConfig::from_toml_str("[sql]\ndatetime_cast = \"EPOCH(x)\"").unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_ACCESSOR_FAILURE, "SKIP_OBJECT"),
            (ENV_IDENTIFIERS, "uuid"),
            (ENV_SQL_DATETIME_CAST, "EXTRACT(EPOCH FROM {column})"),
        ]);
        let config = QueryConfig::default()
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.index.accessor_failure, AccessorFailurePolicy::SkipObject);
        assert_eq!(config.index.identifiers, IdentifierKind::Uuid);
        assert_eq!(config.sql.datetime_cast, "EXTRACT(EPOCH FROM {column})");
        assert_eq!(config.document.dates, DateEncoding::ExtendedJson);

        let err = QueryConfig::default()
            .apply_overrides(|k| (k == ENV_DOCUMENT_DATES).then(|| "bson".to_string()))
            .unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[index]\nidentifiers = \"uuid\"").unwrap();
        let config = QueryConfig::load(file.path()).unwrap();
        assert_eq!(config.index.identifiers, IdentifierKind::Uuid);

        let missing = QueryConfig::load(Path::new("/nonexistent/pubquery.toml"));
        assert!(matches!(missing, Err(QueryError::Config(_))));
    }
}
