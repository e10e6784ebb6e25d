use crate::utils::errors::{Result, VaultCliError};
use crate::vault::client::{JsonResponse, VaultClient};
use crate::vault::types::{LoginRequest, LoginResponse, RenewResponse};
use reqwest::{Method, Url};
use serde_json::json;

/// Validated login endpoint and the server identity stored with the credential.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginTarget {
    pub url: String,
    /// host, or host:port when the URL names a port
    pub server: String,
}

impl LoginTarget {
    pub fn parse(raw: &str) -> Result<Self> {
        if !raw.starts_with("https://") {
            return Err(VaultCliError::InvalidInput(
                "Provide complete login URL".to_string(),
            ));
        }

        // The server rejects paths without a trailing slash
        let url = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };

        let parsed = Url::parse(&url)
            .map_err(|e| VaultCliError::Request(format!("Invalid URL {url} - {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| VaultCliError::Request(format!("Invalid URL {url} - missing host")))?;
        let server = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self { url, server })
    }
}

pub struct VaultAuth<'a> {
    client: &'a VaultClient,
}

impl<'a> VaultAuth<'a> {
    pub fn new(client: &'a VaultClient) -> Self {
        Self { client }
    }

    /// Exchange username and password for an access token
    pub async fn login(&self, url: &str, username: &str, password: &str) -> Result<LoginResponse> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .client
            .call(Method::POST, url, &request, &JsonResponse)
            .await?;

        if response.access_token.is_empty() {
            return Err(VaultCliError::Auth(
                "Invalid response from Vault authentication".to_string(),
            ));
        }
        tracing::info!("Successfully authenticated as {username}");
        Ok(response)
    }

    /// Renew the current session token
    pub async fn renew(&self) -> Result<RenewResponse> {
        let response: RenewResponse = self
            .client
            .post_json("Renew", &json!({}))
            .await
            .map_err(|e| VaultCliError::Auth(format!("Session Renew failed:\n\n{e}")))?;
        tracing::info!("Successfully renewed token");
        Ok(response)
    }
}
