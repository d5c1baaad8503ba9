//! Error types for reqwest-based webhook delivery.

use thiserror::Error;

/// Result type alias for tsuru-reqwest operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for tsuru-reqwest operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// The webhook method is not a valid HTTP method.
    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),

    /// A webhook header name or value cannot be sent.
    #[error("invalid header: {0:?}")]
    InvalidHeader(String),

    /// The proxy URL was rejected by the client.
    #[error("invalid proxy {url:?}: {source}")]
    Proxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<Error> for tsuru_webhook::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    tsuru_webhook::Error::Timeout
                } else if e.is_connect() {
                    tsuru_webhook::Error::delivery_with_source("connection failed", e)
                } else {
                    tsuru_webhook::Error::delivery_with_source(e.to_string(), e)
                }
            }
            Error::Config(message) => tsuru_webhook::Error::Config(message.into()),
            err @ (Error::InvalidMethod(_) | Error::InvalidHeader(_) | Error::Proxy { .. }) => {
                tsuru_webhook::Error::delivery_with_source(err.to_string(), err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_become_delivery_errors() {
        let err: tsuru_webhook::Error = Error::InvalidMethod("BAD METHOD".into()).into();
        assert!(err.is_delivery());
        assert_eq!(
            err.to_string(),
            "webhook delivery failed: invalid HTTP method: \"BAD METHOD\""
        );

        let err: tsuru_webhook::Error = Error::InvalidHeader("X-Bad\n".into()).into();
        assert!(err.is_delivery());
    }

    #[test]
    fn test_config_error_is_preserved() {
        let err: tsuru_webhook::Error = Error::Config("timeout cannot be zero".into()).into();
        assert!(matches!(err, tsuru_webhook::Error::Config(_)));
    }
}
