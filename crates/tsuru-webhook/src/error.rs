//! Error types for webhook registry, rendering and delivery.

use std::borrow::Cow;

use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Webhook field rejected by registry validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The webhook name is blank.
    #[error("webhook name must not be empty")]
    EmptyName,

    /// The webhook name does not match the required pattern.
    #[error(
        "Invalid webhook name, webhook name should have at most 40 characters, \
         containing only lower case letters, numbers or dashes, starting with a letter."
    )]
    InvalidName,

    /// The webhook URL is blank.
    #[error("webhook url must not be empty")]
    EmptyUrl,

    /// The webhook URL is not an absolute URL.
    #[error("webhook url is not valid: {0}")]
    InvalidUrl(#[source] url::ParseError),

    /// The proxy URL is present but not an absolute URL.
    #[error("webhook proxy url is not valid: {0}")]
    InvalidProxyUrl(#[source] url::ParseError),
}

impl ValidationError {
    /// Returns the name of the webhook field that failed validation.
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyName | Self::InvalidName => "name",
            Self::EmptyUrl | Self::InvalidUrl(_) => "url",
            Self::InvalidProxyUrl(_) => "proxy_url",
        }
    }
}

/// Error type for webhook operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Webhook input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No webhook is registered under the requested name.
    #[error("webhook not found")]
    NotFound,

    /// A webhook is already registered under the requested name.
    #[error("webhook already exists")]
    AlreadyExists,

    /// The dispatcher no longer accepts submissions.
    #[error("webhook dispatcher is shut down")]
    Closed,

    /// Shutdown deadline elapsed before outstanding deliveries finished.
    #[error("shutdown deadline elapsed with {pending} deliveries outstanding")]
    ShutdownDeadline { pending: usize },

    /// Webhook storage backend failed.
    #[error("webhook storage error: {message}")]
    Storage {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxedError>,
    },

    /// Event store backend failed.
    #[error("event store error: {message}")]
    EventStore {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxedError>,
    },

    /// The outbound request could not be completed.
    #[error("webhook delivery failed: {message}")]
    Delivery {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxedError>,
    },

    /// The outbound request exceeded its timeout.
    #[error("webhook delivery timed out")]
    Timeout,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(Cow<'static, str>),

    /// The default event body could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates a storage error with a message.
    pub fn storage(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a storage error with a message and source.
    pub fn storage_with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl Into<BoxedError>,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an event store error with a message and source.
    pub fn event_store_with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl Into<BoxedError>,
    ) -> Self {
        Self::EventStore {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a delivery error with a message.
    pub fn delivery(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Delivery {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a delivery error with a message and source.
    pub fn delivery_with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl Into<BoxedError>,
    ) -> Self {
        Self::Delivery {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` for errors that originate from the outbound request.
    pub const fn is_delivery(&self) -> bool {
        matches!(self, Self::Delivery { .. } | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_fields() {
        assert_eq!(ValidationError::EmptyName.field(), "name");
        assert_eq!(ValidationError::InvalidName.field(), "name");
        assert_eq!(ValidationError::EmptyUrl.field(), "url");

        let parse = url::Url::parse(":/:x").unwrap_err();
        assert_eq!(ValidationError::InvalidProxyUrl(parse).field(), "proxy_url");
    }

    #[test]
    fn test_validation_messages() {
        let err: Error = ValidationError::EmptyName.into();
        assert_eq!(err.to_string(), "webhook name must not be empty");

        let parse = url::Url::parse(":/:x").unwrap_err();
        let err: Error = ValidationError::InvalidUrl(parse).into();
        assert!(err.to_string().starts_with("webhook url is not valid: "));
    }

    #[test]
    fn test_is_delivery() {
        assert!(Error::Timeout.is_delivery());
        assert!(Error::delivery("connection refused").is_delivery());
        assert!(!Error::NotFound.is_delivery());
    }
}
