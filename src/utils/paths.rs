use crate::utils::errors::{Result, VaultCliError};
use std::fs;
use std::path::{Path, PathBuf};

pub struct VaultCliPaths;
const DATA_DIR_NAME: &str = "pasmcli.data";

impl VaultCliPaths {
    /// Get the base data directory: ~/pasmcli.data/
    pub fn data_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|dir| dir.join(DATA_DIR_NAME))
            .ok_or_else(|| VaultCliError::Config("Cannot determine home directory".to_string()))
    }

    /// Get the default token file path: ~/pasmcli.data/pasm_token.txt
    pub fn token_file() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("pasm_token.txt"))
    }

    /// Get the default config file path: ~/pasmcli.data/pasmcli.yaml
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("pasmcli.yaml"))
    }

    /// Ensure a directory exists with proper permissions
    pub fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = fs::metadata(path)?.permissions();
                perms.set_mode(0o700);
                fs::set_permissions(path, perms)?;
            }
        }
        Ok(())
    }

    /// Ensure the parent directory of a file exists
    pub fn ensure_parent_exists(file: &Path) -> Result<()> {
        match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Self::ensure_dir_exists(parent),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_exists_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        VaultCliPaths::ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&nested).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_ensure_parent_exists_for_bare_filename() {
        VaultCliPaths::ensure_parent_exists(Path::new("token.txt")).unwrap();
    }
}
