//! Runtime configuration from environment variables.

use std::env;

/// Behaviour switches for loading and serializing MMIF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmifConfig {
    /// Validate payloads before building objects.
    pub validate: bool,
    /// Match vocabulary types across adjacent versions in container queries.
    pub fuzzy_types: bool,
    /// Generate capital annotations before serializing.
    pub autogenerate_capital_annotations: bool,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for MmifConfig {
    fn default() -> Self {
        Self {
            validate: true,
            fuzzy_types: true,
            autogenerate_capital_annotations: true,
            log_level: "info".to_string(),
        }
    }
}

impl MmifConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `MMIF_VALIDATE`: validate on load (default: true)
    /// - `MMIF_FUZZY_TYPES`: fuzzy type matching (default: true)
    /// - `MMIF_AUTOGENERATE_CAPITAL`: capital annotation generation (default: true)
    /// - `MMIF_LOG_LEVEL`: logging level (default: "info")
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            validate: bool_var("MMIF_VALIDATE", defaults.validate)?,
            fuzzy_types: bool_var("MMIF_FUZZY_TYPES", defaults.fuzzy_types)?,
            autogenerate_capital_annotations: bool_var(
                "MMIF_AUTOGENERATE_CAPITAL",
                defaults.autogenerate_capital_annotations,
            )?,
            log_level: env::var("MMIF_LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn bool_var(name: &str, default: bool) -> Result<bool, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected a boolean, got {raw:?}"),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid environment variable value.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        // SAFETY: no other test reads or writes MMIF_FUZZY_TYPES or MMIF_LOG_LEVEL.
        unsafe {
            env::set_var("MMIF_FUZZY_TYPES", "off");
            env::set_var("MMIF_LOG_LEVEL", "debug");
        }

        let config = MmifConfig::from_env().unwrap();
        assert!(!config.fuzzy_types);
        assert_eq!(config.log_level, "debug");

        // SAFETY: see above.
        unsafe {
            env::remove_var("MMIF_FUZZY_TYPES");
            env::remove_var("MMIF_LOG_LEVEL");
        }
    }

    #[test]
    fn test_invalid_bool() {
        // SAFETY: MMIF_TEST_INVALID_BOOL is only touched by this test.
        unsafe { env::set_var("MMIF_TEST_INVALID_BOOL", "maybe") };

        let err = bool_var("MMIF_TEST_INVALID_BOOL", true).unwrap_err();
        assert!(err.to_string().contains("MMIF_TEST_INVALID_BOOL"));
        assert!(bool_var("MMIF_TEST_UNSET_BOOL", true).unwrap());

        // SAFETY: see above.
        unsafe { env::remove_var("MMIF_TEST_INVALID_BOOL") };
    }

    #[test]
    fn test_default_values() {
        let config = MmifConfig::default();
        assert!(config.validate);
        assert!(config.fuzzy_types);
        assert!(config.autogenerate_capital_annotations);
        assert_eq!(config.log_level, "info");
    }
}
