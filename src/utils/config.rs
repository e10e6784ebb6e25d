use crate::utils::errors::{Result, VaultCliError};
use crate::utils::paths::VaultCliPaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Optional YAML settings file, lowest precedence after built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CliConfig {
    /// Alternate credential file location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
    /// tracing filter directive used when no -v flag is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl CliConfig {
    /// Load from an explicit path, or from the default location if it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) if !path.exists() => Err(VaultCliError::Config(format!(
                "Config file not found: {}",
                path.display()
            ))),
            Some(path) => Self::load_from(path),
            None => {
                let path = VaultCliPaths::config_file()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: CliConfig = serde_yaml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve the credential file: flag/env value first, then config, then default.
    pub fn resolve_token_file(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = &self.token_file {
            return Ok(path.clone());
        }
        VaultCliPaths::token_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_yaml_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pasmcli.yaml");
        fs::write(
            &path,
            "token_file: /tmp/other_token.txt\nlog_filter: pasm_vault_cli=debug\n",
        )
        .unwrap();

        let config = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(config.token_file, Some(PathBuf::from("/tmp/other_token.txt")));
        assert_eq!(config.log_filter.as_deref(), Some("pasm_vault_cli=debug"));
    }

    #[test]
    fn test_empty_config_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pasmcli.yaml");
        fs::write(&path, "\n").unwrap();
        assert_eq!(CliConfig::load_from(&path).unwrap(), CliConfig::default());
    }

    #[test]
    fn test_flag_overrides_config_token_file() {
        let config = CliConfig {
            token_file: Some(PathBuf::from("/from/config")),
            log_filter: None,
        };
        let resolved = config
            .resolve_token_file(Some(Path::new("/from/flag")))
            .unwrap();
        assert_eq!(resolved, PathBuf::from("/from/flag"));
        assert_eq!(
            config.resolve_token_file(None).unwrap(),
            PathBuf::from("/from/config")
        );
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pasmcli.yaml");
        fs::write(&path, "token_file: [unterminated\n").unwrap();
        assert!(CliConfig::load_from(&path).is_err());
    }
}
