use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultCliError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid request: {0}")]
    Request(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Server reported an error: {0}")]
    ServerReported(String),

    #[error("Unexpected response from server: {0}")]
    UnexpectedResponse(String),

    #[error("{message}")]
    Unknown { message: String, code: i32 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SSH error: {0}")]
    Ssh(String),

    #[error("SSH error: {0}")]
    Ssh2(#[from] ssh2::Error),

    #[error("Key generation error: {0}")]
    KeyGen(#[from] ssh_key::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl VaultCliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            VaultCliError::Auth(_)
            | VaultCliError::Tls(_)
            | VaultCliError::InvalidInput(_)
            | VaultCliError::Config(_)
            | VaultCliError::Yaml(_) => 1,
            VaultCliError::Request(_) | VaultCliError::Json(_) | VaultCliError::Base64(_) => 2,
            VaultCliError::ServerReported(_) => 3,
            VaultCliError::Api(api) if api.is_not_found() => 5,
            VaultCliError::Api(_) => 3,
            VaultCliError::Http(_)
            | VaultCliError::UnexpectedResponse(_)
            | VaultCliError::Storage(_)
            | VaultCliError::Ssh(_)
            | VaultCliError::Ssh2(_)
            | VaultCliError::KeyGen(_)
            | VaultCliError::Io(_)
            | VaultCliError::Csv(_) => 4,
            VaultCliError::NotFound(_) => 5,
            VaultCliError::Unknown { code, .. } => *code,
        }
    }
}

/// Failure of a typed API call: anything other than 200/201.
#[derive(Error, Debug, Clone)]
pub struct ApiError {
    pub request_url: String,
    pub status_code: u16,
    /// e.g. "404 Not Found"
    pub status: String,
    /// Raw error body, kept only when the server declared it as JSON.
    pub error_json: Option<String>,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_json {
            Some(body) if !body.is_empty() => {
                write!(f, "{}\n{}\n{}", self.request_url, self.status, body)
            }
            _ => write!(f, "{}\n{}", self.request_url, self.status),
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultCliError>;
