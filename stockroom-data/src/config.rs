use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::sort::SortDirection;

pub const ENV_DEFAULT_LIMIT: &str = "STOCKROOM_DATA_DEFAULT_LIMIT";
pub const ENV_MAX_LIMIT: &str = "STOCKROOM_DATA_MAX_LIMIT";
pub const ENV_DEFAULT_SORT_ORDER: &str = "STOCKROOM_DATA_DEFAULT_SORT_ORDER";

/// Engine-wide list defaults.
///
/// Sources, lowest precedence first:
/// 1. built-in defaults
/// 2. a YAML file (`load`) or string (`from_yaml_str`)
/// 3. `.env` (loaded into the process environment, never overriding it)
/// 4. `STOCKROOM_DATA_*` environment variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub default_limit: u64,
    pub max_limit: u64,
    pub default_sort_order: SortDirection,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 1000,
            default_sort_order: SortDirection::Desc,
        }
    }
}

impl DataSettings {
    /// Parse settings from YAML. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, DataError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: DataSettings = serde_yaml::from_str(yaml)
            .map_err(|e| DataError::Other(format!("invalid data settings: {e}")))?;
        settings.validate()
    }

    /// Load settings from `path` (defaults when the file does not exist),
    /// then apply `.env` and environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let settings = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| DataError::Other(format!("{}: {e}", path.display())))?;
            Self::from_yaml_str(&content)?
        } else {
            tracing::debug!(path = %path.display(), "No data settings file, using defaults");
            Self::default()
        };

        let _ = dotenvy::dotenv();
        settings.with_env_overrides()
    }

    /// Apply `STOCKROOM_DATA_*` variables from the current environment.
    pub fn with_env_overrides(mut self) -> Result<Self, DataError> {
        if let Some(raw) = env_var(ENV_DEFAULT_LIMIT) {
            self.default_limit = parse_limit(ENV_DEFAULT_LIMIT, &raw)?;
        }
        if let Some(raw) = env_var(ENV_MAX_LIMIT) {
            self.max_limit = parse_limit(ENV_MAX_LIMIT, &raw)?;
        }
        if let Some(raw) = env_var(ENV_DEFAULT_SORT_ORDER) {
            self.default_sort_order = SortDirection::parse(&raw);
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, DataError> {
        if self.max_limit == 0 {
            return Err(DataError::Other("max_limit must be at least 1".into()));
        }
        if self.default_limit == 0 {
            return Err(DataError::Other("default_limit must be at least 1".into()));
        }
        Ok(self)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_limit(key: &str, raw: &str) -> Result<u64, DataError> {
    raw.trim()
        .parse()
        .map_err(|_| DataError::Other(format!("{key}: expected a positive integer, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        std::env::remove_var(ENV_DEFAULT_LIMIT);
        std::env::remove_var(ENV_MAX_LIMIT);
        std::env::remove_var(ENV_DEFAULT_SORT_ORDER);
    }

    #[test]
    fn test_yaml_partial_keeps_defaults() {
        let settings = DataSettings::from_yaml_str("max_limit: 200\n").unwrap();
        assert_eq!(settings.max_limit, 200);
        assert_eq!(settings.default_limit, 10);
        assert_eq!(settings.default_sort_order, SortDirection::Desc);
    }

    #[test]
    fn test_yaml_errors() {
        assert!(matches!(
            DataSettings::from_yaml_str("max_limit: lots"),
            Err(DataError::Other(_))
        ));
        assert!(DataSettings::from_yaml_str("max_limit: 0").is_err());
        assert_eq!(DataSettings::from_yaml_str("").unwrap(), DataSettings::default());
    }

    #[test]
    #[serial]
    fn test_load_missing_file_gives_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let settings = DataSettings::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(settings, DataSettings::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_limit: 25\ndefault_sort_order: asc").unwrap();

        std::env::set_var(ENV_DEFAULT_LIMIT, "50");
        let settings = DataSettings::load(file.path()).unwrap();
        clear_env();

        assert_eq!(settings.default_limit, 50);
        assert_eq!(settings.default_sort_order, SortDirection::Asc);
        assert_eq!(settings.max_limit, 1000);
    }

    #[test]
    #[serial]
    fn test_bad_env_value_is_rejected() {
        clear_env();
        std::env::set_var(ENV_MAX_LIMIT, "-3");
        let result = DataSettings::default().with_env_overrides();
        clear_env();
        assert!(matches!(result, Err(DataError::Other(_))));
    }
}
