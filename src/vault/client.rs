use crate::utils::errors::{ApiError, Result, VaultCliError};
use crate::utils::output::pretty_json;
use reqwest::header::{CONNECTION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const AUTH_HEADER: &str = "X-VAULT-AUTH";
pub const CONTENT_TYPE_JSON: &str = "application/json";
const API_VERSION: &str = "1.0";

/// Status, declared content type and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub url: String,
    pub status: u16,
    /// e.g. "404 Not Found"
    pub status_text: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|essence| essence.trim().eq_ignore_ascii_case(CONTENT_TYPE_JSON))
            .unwrap_or(false)
    }

    pub fn is_success(&self) -> bool {
        self.status == 200 || self.status == 201
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON, `None` when empty or malformed
    pub fn json_value(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Shared reading of a raw exchange: empty 404 is "not found", a non-JSON
    /// body is unexpected, and a JSON body with an `error` key is a server error.
    pub fn interpret(&self, not_found: &str) -> Result<Option<Value>> {
        if self.body.is_empty() {
            if self.status == 404 {
                return Err(VaultCliError::NotFound(not_found.to_string()));
            }
            return Ok(None);
        }

        let value: Value = serde_json::from_slice(&self.body)
            .map_err(|_| VaultCliError::UnexpectedResponse(self.text()))?;
        if value.get("error").is_some() {
            return Err(VaultCliError::ServerReported(pretty_json(&value)));
        }
        Ok(Some(value))
    }

    pub fn into_api_error(self) -> ApiError {
        let error_json = if self.is_json() {
            Some(self.text())
        } else {
            None
        };
        ApiError {
            request_url: self.url,
            status_code: self.status,
            status: self.status_text,
            error_json,
        }
    }
}

/// Strategy turning a completed exchange into a typed result.
pub trait ResponseHandler<T> {
    fn process(&self, response: ApiResponse) -> Result<T>;
}

/// 200/201 with a JSON body decoded into the target type, anything else an `ApiError`.
pub struct JsonResponse;

impl<T: DeserializeOwned> ResponseHandler<T> for JsonResponse {
    fn process(&self, response: ApiResponse) -> Result<T> {
        if !response.is_success() {
            return Err(response.into_api_error().into());
        }
        if !response.is_json() {
            return Err(VaultCliError::UnexpectedResponse(format!(
                "Invalid Content-Type: {}",
                response.content_type.as_deref().unwrap_or("")
            )));
        }
        Ok(serde_json::from_slice(&response.body)?)
    }
}

/// 200/201 body returned untouched.
pub struct RawResponse;

impl ResponseHandler<Vec<u8>> for RawResponse {
    fn process(&self, response: ApiResponse) -> Result<Vec<u8>> {
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(response.into_api_error().into())
        }
    }
}

/// Parameters of a CSV import upload. Only these keys are ever sent.
#[derive(Debug, Clone, Default)]
pub struct MultipartParams {
    pub csv_file: Option<PathBuf>,
    pub public_key: Option<PathBuf>,
    pub secret_type: Option<String>,
}

pub struct VaultClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl VaultClient {
    /// Client for `https://<server>/vault/1.0`
    pub fn new(server: &str, ca_file: Option<&Path>, token: Option<String>) -> Result<Self> {
        let client = super::create_http_client(ca_file)?;
        Ok(Self {
            client,
            base_url: format!("https://{server}/vault/{API_VERSION}"),
            token,
        })
    }

    /// Client with an explicit base URL and default TLS settings
    pub fn with_base_url(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Endpoint for an action; the server requires the trailing slash
    pub fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/", self.base_url, action)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, url).header(CONNECTION, "close");
        if let Some(token) = &self.token {
            builder = builder.header(AUTH_HEADER, token);
        }
        builder
    }

    async fn collect(url: &str, response: Response) -> Result<ApiResponse> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        tracing::debug!("Response status: {status} ({} bytes)", body.len());
        Ok(ApiResponse {
            url: url.to_string(),
            status: status.as_u16(),
            status_text: status.to_string(),
            content_type,
            body,
        })
    }

    /// Send a JSON payload to a full URL and return the exchange for any status
    pub async fn send_to<B>(&self, method: Method, url: &str, payload: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)
            .map_err(|e| VaultCliError::Request(format!("Error building JSON request: {e}")))?;

        tracing::debug!("Making {method} request to: {url}");
        let response = self
            .request(method, url)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(body)
            .send()
            .await?;

        Self::collect(url, response).await
    }

    /// Send a JSON payload to an action endpoint
    pub async fn send<B>(&self, method: Method, action: &str, payload: &B) -> Result<ApiResponse>
    where
        B: Serialize + ?Sized,
    {
        self.send_to(method, &self.endpoint(action), payload).await
    }

    /// Send and let a handler interpret the result
    pub async fn call<T, B, H>(&self, method: Method, url: &str, payload: &B, handler: &H) -> Result<T>
    where
        B: Serialize + ?Sized,
        H: ResponseHandler<T>,
    {
        let response = self.send_to(method, url, payload).await?;
        handler.process(response)
    }

    /// POST to an action and decode a JSON response
    pub async fn post_json<T, B>(&self, action: &str, payload: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(Method::POST, &self.endpoint(action), payload, &JsonResponse)
            .await
    }

    /// GET an action and stream the body under `dest_dir`, named after its
    /// Content-Disposition filename. A partial file is removed on failure.
    pub async fn download(&self, action: &str, dest_dir: &Path) -> Result<PathBuf> {
        let url = self.endpoint(action);

        tracing::debug!("Making GET download request to: {url}");
        let mut response = self.request(Method::GET, &url).send().await?;

        if response.status().as_u16() != 200 {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Could not read error body from {url}: {e}");
                    String::new()
                }
            };
            println!("\n{text}\n");
            return Err(VaultCliError::ServerReported(format!(
                "Download from {url} failed"
            )));
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename)
            .ok_or_else(|| {
                VaultCliError::UnexpectedResponse("filename not found".to_string())
            })?;

        let target = dest_dir.join(filename);
        let mut file = File::create(&target).await?;
        match copy_body(&mut response, &mut file).await {
            Ok(written) => {
                tracing::info!("Downloaded {written} bytes to {}", target.display());
                Ok(target)
            }
            Err(e) => {
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(&target).await {
                    tracing::warn!("Could not remove partial {}: {cleanup}", target.display());
                }
                Err(e)
            }
        }
    }

    /// Upload a CSV import as multipart form data
    pub async fn post_multipart(&self, action: &str, params: &MultipartParams) -> Result<ApiResponse> {
        let url = self.endpoint(action);
        let mut form = Form::new();

        if let Some(path) = &params.public_key {
            form = form.part("public_key", file_part(path).await?);
        }
        if let Some(path) = &params.csv_file {
            form = form.part("csv_file", file_part(path).await?);
        }
        if let Some(secret_type) = &params.secret_type {
            form = form.text("secret_type", secret_type.clone());
        }

        tracing::debug!("Making multipart POST request to: {url}");
        let response = self
            .request(Method::POST, &url)
            .multipart(form)
            .send()
            .await?;

        Self::collect(&url, response).await
    }
}

/// Write the response body chunk by chunk, returning the byte count.
async fn copy_body<W>(response: &mut Response, out: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(written)
}

async fn file_part(path: &Path) -> Result<Part> {
    let content = tokio::fs::read(path).await.map_err(|e| {
        VaultCliError::Io(std::io::Error::new(
            e.kind(),
            format!("Error opening file {} - {e}", path.display()),
        ))
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(content).file_name(name))
}

/// Value of the `filename=` parameter, reduced to a bare file name.
pub fn disposition_filename(header: &str) -> Option<String> {
    let start = header.find("filename=")? + "filename=".len();
    let raw = header[start..].split(';').next()?.trim().trim_matches('"');
    let name = Path::new(raw).file_name()?.to_string_lossy().into_owned();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
