//! Registry error types

use thiserror::Error;

/// Errors raised by the CPI-side registry client
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a complete response
    #[error("Registry request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Registry returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid response received from registry: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Transport-level failures (refused, reset, timed out, truncated) are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Transport { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_request() || source.is_body()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors raised on the VM while loading agent settings
#[derive(Error, Debug)]
pub enum LoadSettingsError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Error requesting endpoint {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Cannot parse data: {0}")]
    Parse(String),

    #[error("Invalid data: object expected, {0} provided")]
    NotAnObject(&'static str),

    #[error("Failed to get user data from metadata endpoint: {0}")]
    UserData(#[source] Box<LoadSettingsError>),

    #[error("Cannot get registry endpoint from user data")]
    MissingRegistryEndpoint,

    #[error("Cannot get instance name from user data")]
    MissingInstanceName,

    #[error("Cannot extract registry hostname from {0}")]
    InvalidEndpoint(String),

    #[error("Cannot lookup {host} using {nameservers}: {message}")]
    Lookup {
        host: String,
        nameservers: String,
        message: String,
    },

    #[error("Invalid response received from registry: {0}")]
    InvalidResponse(String),

    #[error("Unsupported network type '{0}', valid types are: dynamic, vip")]
    UnsupportedNetworkType(String),
}
