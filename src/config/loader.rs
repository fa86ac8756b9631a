//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use lazy_static::lazy_static;
use std::path::Path;

lazy_static! {
    // ${VAR} or ${VAR:-default}
    static ref ENV_PLACEHOLDER: regex_lite::Regex =
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("placeholder pattern is valid");
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR_NAME}` and `${VAR_NAME:-default}` placeholders.
    ///
    /// A placeholder whose variable is unset and has no default is left as-is.
    fn expand_env_vars(content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut last_match = 0;

        for cap in ENV_PLACEHOLDER.captures_iter(content) {
            let (Some(full), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            result.push_str(&content[last_match..full.start()]);

            match (std::env::var(name.as_str()), cap.get(2)) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default.as_str()),
                (Err(_), None) => result.push_str(full.as_str()),
            }

            last_match = full.end();
        }

        result.push_str(&content[last_match..]);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expand_env_vars() {
        std::env::set_var("DOCVAULT_TEST_VAR", "test_value");
        let expanded = ConfigLoader::expand_env_vars("key: ${DOCVAULT_TEST_VAR}");
        assert_eq!(expanded, "key: test_value");
        std::env::remove_var("DOCVAULT_TEST_VAR");
    }

    #[test]
    #[serial]
    fn test_expand_env_vars_default() {
        std::env::remove_var("DOCVAULT_MISSING_VAR");
        let expanded = ConfigLoader::expand_env_vars("flag: ${DOCVAULT_MISSING_VAR:-false}");
        assert_eq!(expanded, "flag: false");
    }

    #[test]
    #[serial]
    fn test_unset_var_without_default_is_kept() {
        std::env::remove_var("DOCVAULT_MISSING_VAR");
        let expanded = ConfigLoader::expand_env_vars("key: ${DOCVAULT_MISSING_VAR}");
        assert_eq!(expanded, "key: ${DOCVAULT_MISSING_VAR}");
    }

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = ConfigLoader::from_yaml(
            r#"
server:
  address: "127.0.0.1:3000"
auth:
  skip_for_testing: true
"#,
        )
        .unwrap();

        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.secrets.secret_id, "ai-powered-secrets");
        assert_eq!(config.server.max_body_bytes, 6291456);
        assert!(config.metrics.enabled);
    }
}
