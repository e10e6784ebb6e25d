pub mod auth;
pub mod client;
pub mod tls;
pub mod types;

use crate::utils::errors::{Result, VaultCliError};
use reqwest::Client;
use std::path::Path;

const INSECURE_BANNER: &str = "\
###############################################################################
Insecure request. Vault server certificate not verified.
It is strongly recommended to verify the same by specifying CA
Certificate, using the --cacert option, to mitigate Man-in-the-middle attack
###############################################################################";

/// Create the HTTP client, pinned to the CA bundle when one is given
pub fn create_http_client(ca_file: Option<&Path>) -> Result<Client> {
    let builder = Client::builder().timeout(std::time::Duration::from_secs(60));

    let builder = match ca_file {
        Some(path) => {
            let roots = tls::load_ca_roots(path)?;
            builder.use_preconfigured_tls(tls::pinned_client_config(roots)?)
        }
        None => {
            eprintln!("\n{INSECURE_BANNER}");
            tracing::warn!("No CA certificate configured, server identity is not verified");
            builder.use_rustls_tls().danger_accept_invalid_certs(true)
        }
    };

    builder
        .build()
        .map_err(|e| VaultCliError::Tls(format!("Failed to create HTTP client: {e}")))
}
