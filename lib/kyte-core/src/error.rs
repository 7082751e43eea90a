//! Error types for kyte.
//!
//! Every failure a call can produce is an [`Error`]. Errors are `Clone`: a
//! settled response promise hands the same failure to every awaiter.

use derive_more::{Display, Error, From};

use crate::{Method, Response};

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Malformed or contradictory options, detected before any network attempt.
    #[display("configuration")]
    Configuration,
    /// The transport could not complete the exchange.
    #[display("transport")]
    Transport,
    /// A completed response with a failing status.
    #[display("http")]
    Http,
    /// A hook raised.
    #[display("hook")]
    Hook,
    /// A body could not be decoded, or there is no body to decode.
    #[display("decode")]
    Decode,
    /// Aborted through a cancellation signal or a timeout.
    #[display("cancellation")]
    Cancellation,
}

/// Main error type for kyte operations.
#[derive(Debug, Clone, Display, Error, From)]
pub enum Error {
    /// Invalid or conflicting options.
    #[display("invalid options: {_0}")]
    #[from(skip)]
    InvalidOptions(#[error(not(source))] String),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from(skip)]
    JsonSerialization(#[error(not(source))] String),

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from(skip)]
    FormSerialization(#[error(not(source))] String),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// The final response has a failing status.
    #[display("request failed with status code {status}: {method} {url}")]
    #[from(skip)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Method of the failed request.
        method: Method,
        /// URL of the failed request.
        url: String,
        /// The failing response, body included.
        #[error(not(source))]
        response: Box<Response>,
    },

    /// Raised by a hook.
    #[display("hook failed: {_0}")]
    #[from(skip)]
    Hook(#[error(not(source))] String),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Body is not valid UTF-8.
    #[display("text decode error: {_0}")]
    #[from(skip)]
    TextDecode(#[error(not(source))] String),

    /// Body is not valid form data for the requested type.
    #[display("form deserialization error: {_0}")]
    #[from(skip)]
    FormDeserialization(#[error(not(source))] String),

    /// A body accessor was used on a call that a before-retry hook stopped.
    #[display("no response to decode: retries were stopped by a before-retry hook")]
    #[from(skip)]
    NoResponse,

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// Aborted through the cancellation signal.
    #[display("request cancelled")]
    #[from(skip)]
    Cancelled,
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonSerialization(err.to_string())
    }
}

impl From<serde_html_form::ser::Error> for Error {
    fn from(err: serde_html_form::ser::Error) -> Self {
        Self::FormSerialization(err.to_string())
    }
}

impl Error {
    /// Create an invalid options error.
    #[must_use]
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a hook error. Return it from a hook to abort the call.
    #[must_use]
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// Create an HTTP error carrying the failing response.
    #[must_use]
    pub fn http(method: Method, url: &url::Url, response: Response) -> Self {
        Self::Http {
            status: response.status(),
            method,
            url: url.to_string(),
            response: Box::new(response),
        }
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidOptions(_)
            | Self::InvalidUrl(_)
            | Self::JsonSerialization(_)
            | Self::FormSerialization(_) => ErrorKind::Configuration,
            Self::Connection(_) | Self::Tls(_) => ErrorKind::Transport,
            Self::Http { .. } => ErrorKind::Http,
            Self::Hook(_) => ErrorKind::Hook,
            Self::JsonDeserialization { .. }
            | Self::TextDecode(_)
            | Self::FormDeserialization(_)
            | Self::NoResponse => ErrorKind::Decode,
            Self::Timeout | Self::Cancelled => ErrorKind::Cancellation,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if the call was aborted through its signal.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns the HTTP status code if this is an HTTP error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the failing response if this is an HTTP error.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Http { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Try to decode the HTTP error body as JSON.
    ///
    /// Returns `None` if this is not an HTTP error.
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        self.response().map(Response::json)
    }
}
