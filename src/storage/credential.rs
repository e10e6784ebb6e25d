use crate::utils::errors::{Result, VaultCliError};
use crate::utils::paths::VaultCliPaths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Session credential written by `login` and read by every other command.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredCredential {
    #[serde(default)]
    pub access_token: String,
    /// host[:port] of the Vault server
    #[serde(default)]
    pub server: String,
    /// Path to the CA bundle, empty when TLS verification is disabled
    #[serde(default)]
    pub cacert_file: String,
}

impl StoredCredential {
    pub fn new(access_token: String, server: String, cacert_file: String) -> Self {
        Self {
            access_token,
            server,
            cacert_file,
        }
    }

    /// CA bundle path, if one was recorded at login
    pub fn ca_file(&self) -> Option<&Path> {
        if self.cacert_file.is_empty() {
            None
        } else {
            Some(Path::new(&self.cacert_file))
        }
    }

    /// Store the credential, replacing any previous file
    pub fn save(&self, path: &Path) -> Result<()> {
        VaultCliPaths::ensure_parent_exists(path)?;

        let content = serde_json::to_string(self)?;
        fs::write(path, content)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        tracing::debug!("Credential stored at: {}", path.display());
        Ok(())
    }

    /// Read a stored credential; empty token or server is rejected
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VaultCliError::Auth(format!(
                "Cannot read token file {}: {e}. Please login first.",
                path.display()
            ))
        })?;

        let credential: StoredCredential = serde_json::from_str(&content).map_err(|e| {
            VaultCliError::Auth(format!(
                "Invalid or corrupt Token File {} - {e}",
                path.display()
            ))
        })?;

        if credential.access_token.is_empty() || credential.server.is_empty() {
            return Err(VaultCliError::Auth(
                "Invalid or corrupt Token File - access_token or server is missing".to_string(),
            ));
        }

        tracing::trace!("Loaded credential for server {}", credential.server);
        Ok(credential)
    }

    /// Token prefix safe for logs
    pub fn masked_token(&self) -> String {
        let prefix: String = self.access_token.chars().take(8).collect();
        format!("{prefix}***")
    }
}
