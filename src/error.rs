//! Error types for zoneauth.

use thiserror::Error;

/// Error type for zoneauth operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level failure while fetching a remote resource
    #[error("fetch of {url} failed: {message}")]
    Fetch { url: String, message: String },

    /// Remote answered with a non-success status
    #[error("fetch of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Remote answered with an empty body
    #[error("fetch of {0} returned an empty body")]
    EmptyResponse(String),

    /// Gzip payload could not be decoded
    #[error("gzip decompression failed: {0}")]
    Decompress(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid country code
    #[error("invalid country code: {0}")]
    InvalidCountryCode(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for zoneauth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for a single zone-file line.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IndexError {
    /// Invalid CIDR notation
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
}

/// Error type for a single exclusion-list line.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExclusionError {
    /// Invalid IP address
    #[error("invalid IP address: {0}")]
    InvalidIp(String),
}
