use common_utils::errors::ApiClientError;

use crate::types::ResponseFields;

/// Failure kinds of one gateway exchange.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to reach the gateway: {reason}")]
    NetworkError { reason: String },
    #[error("Gateway did not respond within the configured timeout")]
    RequestTimeout,
    #[error("Gateway responded with HTTP status {status_code}")]
    ErrorResponseReceived { status_code: u16 },
    #[error("Failed to build the request envelope")]
    EncodingError,
    #[error("Failed to parse the gateway response")]
    DecodingError,
    #[error("Failed to load key material from {path}")]
    KeyLoadError { path: String },
    #[error("Failed to compute the request signature")]
    SigningFailed,
    /// The decoded response is kept so callers can still inspect what the gateway said.
    #[error("Response signature does not match")]
    SignatureMismatch { response: Box<ResponseFields> },
}

impl GatewayError {
    /// Whether a caller-driven retry may succeed. The client never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { .. } | Self::RequestTimeout => true,
            Self::ErrorResponseReceived { status_code } => *status_code >= 500,
            Self::EncodingError
            | Self::DecodingError
            | Self::KeyLoadError { .. }
            | Self::SigningFailed
            | Self::SignatureMismatch { .. } => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkError { .. } => "network_error",
            Self::RequestTimeout => "request_timeout",
            Self::ErrorResponseReceived { .. } => "error_response_received",
            Self::EncodingError => "encoding_error",
            Self::DecodingError => "decoding_error",
            Self::KeyLoadError { .. } => "key_load_error",
            Self::SigningFailed => "signing_failed",
            Self::SignatureMismatch { .. } => "signature_mismatch",
        }
    }
}

impl From<&ApiClientError> for GatewayError {
    fn from(error: &ApiClientError) -> Self {
        match error {
            ApiClientError::RequestTimeoutReceived => Self::RequestTimeout,
            ApiClientError::HeaderMapConstructionFailed | ApiClientError::UrlEncodingFailed => {
                Self::EncodingError
            }
            ApiClientError::ResponseDecodingFailed => Self::DecodingError,
            ApiClientError::RequestNotSent(reason) => Self::NetworkError {
                reason: reason.clone(),
            },
            ApiClientError::ClientConstructionFailed
            | ApiClientError::InvalidProxyConfiguration
            | ApiClientError::UnexpectedServerResponse => Self::NetworkError {
                reason: error.to_string(),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadFailed(#[from] config::ConfigError),
    #[error("Invalid configuration value for `{field}`: {reason}")]
    InvalidConfigValue { field: &'static str, reason: String },
    #[error("Failed to build the HTTP client for the configured endpoint and proxy")]
    HttpClientSetupFailed,
    #[error("Failed to install the tracing subscriber")]
    LoggerSetupFailed,
}
