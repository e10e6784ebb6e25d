use crate::utils::errors::{Result, VaultCliError};
use crate::utils::paths::VaultCliPaths;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Lease handed out by a checkout, kept so the secret can be checked in later.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeaseRecord {
    #[serde(default)]
    pub box_id: String,
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub expires_at: String,
    /// Kept as text, the server value is echoed as-is
    #[serde(default)]
    pub renewable: String,
    #[serde(default)]
    pub version: i64,
}

impl LeaseRecord {
    pub fn save(&self, path: &Path) -> Result<()> {
        VaultCliPaths::ensure_parent_exists(path)?;
        fs::write(path, serde_json::to_string(self)?)?;
        tracing::debug!("Lease stored at: {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let record: LeaseRecord = serde_json::from_str(&content)?;
        if record.lease_id.is_empty() {
            return Err(VaultCliError::InvalidInput(
                "Invalid or corrupt lease file - missing lease_id".to_string(),
            ));
        }
        Ok(record)
    }
}

/// Default lease file path under the data directory.
pub fn lease_file_path(box_id: &str, secret_id: &str, version: Option<i64>) -> Result<PathBuf> {
    Ok(lease_file_path_in(
        &VaultCliPaths::data_dir()?,
        box_id,
        secret_id,
        version,
    ))
}

/// `<dir>/vault_lease_<base64(box|secret[|version])>.txt`
pub fn lease_file_path_in(
    dir: &Path,
    box_id: &str,
    secret_id: &str,
    version: Option<i64>,
) -> PathBuf {
    let identifier = match version {
        Some(v) => format!("{box_id}|{secret_id}|{v}"),
        None => format!("{box_id}|{secret_id}"),
    };
    dir.join(format!("vault_lease_{}.txt", STANDARD.encode(identifier)))
}
