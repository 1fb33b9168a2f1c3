use reqwest::StatusCode;
use thiserror::Error;

use super::codec::CodecError;

/// Whether a failure is expected to go away on its own.
///
/// The HTTP layer branches on this alone: temporary failures surface as a
/// 500, permanent ones as a diagnostic feed item.
pub trait Temporary {
    fn is_temporary(&self) -> bool;
}

/// A failed fetch or generation, tagged with the source it came from.
///
/// Displays as `Failed to fetch {origin}: ...`, or `Failed to generate
/// {origin}: ...` for [`FetchErrorKind::Generation`].
#[derive(Debug, Error)]
#[error("Failed to {} {origin}: {kind}", .kind.action())]
pub struct FetchError {
    origin: String,
    #[source]
    kind: FetchErrorKind,
}

/// Underlying cause of a [`FetchError`].
#[derive(Debug, Error)]
pub enum FetchErrorKind {
    /// Transport-level error (DNS, connection, TLS, timeout)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-success HTTP status
    #[error("{0}")]
    HttpStatus(StatusCode),
    /// Body ended before Content-Length bytes arrived
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Malformed URL or an unsupported scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Response too large")]
    ResponseTooLarge,
    /// Media type missing, unparsable, or not in the allow-list
    #[error("{0}")]
    ContentType(String),
    /// Unknown charset label or bytes invalid for the declared charset
    #[error("{0}")]
    Charset(String),
    #[error(transparent)]
    Decode(#[from] CodecError),
    /// Local file missing or unreadable
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The fetch task ended without producing a result
    #[error("The fetch task was aborted")]
    Aborted,
    /// Raised by feed generators for their own failures
    #[error("{message}")]
    Generation { message: String, temporary: bool },
}

impl FetchError {
    /// Wraps `kind` with the source that produced it and logs it.
    pub fn new(origin: impl Into<String>, kind: impl Into<FetchErrorKind>) -> Self {
        let err = Self {
            origin: origin.into(),
            kind: kind.into(),
        };
        tracing::error!(temporary = err.is_temporary(), "{err}");
        err
    }

    /// Shorthand for a generator-defined error.
    pub fn generation(origin: impl Into<String>, message: impl Into<String>, temporary: bool) -> Self {
        Self::new(
            origin,
            FetchErrorKind::Generation {
                message: message.into(),
                temporary,
            },
        )
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn kind(&self) -> &FetchErrorKind {
        &self.kind
    }
}

impl FetchErrorKind {
    fn action(&self) -> &'static str {
        match self {
            Self::Generation { .. } => "generate",
            _ => "fetch",
        }
    }
}

impl Temporary for FetchError {
    fn is_temporary(&self) -> bool {
        self.kind.is_temporary()
    }
}

impl Temporary for FetchErrorKind {
    fn is_temporary(&self) -> bool {
        match self {
            Self::Network(e) => e.is_temporary(),
            Self::HttpStatus(status) => status.is_server_error(),
            Self::IncompleteResponse { .. } => true,
            Self::Generation { temporary, .. } => *temporary,
            Self::InvalidUrl(_)
            | Self::ResponseTooLarge
            | Self::ContentType(_)
            | Self::Charset(_)
            | Self::Decode(_)
            | Self::Io(_)
            | Self::Aborted => false,
        }
    }
}

impl Temporary for reqwest::Error {
    fn is_temporary(&self) -> bool {
        // DNS failures and refused connections both surface as connect errors
        self.is_timeout() || self.is_connect() || self.status().is_some_and(|s| s.is_server_error())
    }
}
