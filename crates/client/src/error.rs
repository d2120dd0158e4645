use core::fmt::{self, Display};
use hyper::{http, http::uri::InvalidUri, StatusCode};

#[derive(Debug)]
pub enum Error {
    /// The backend could not be reached at all.
    Transport(hyper_util::client::legacy::Error),
    /// The connection dropped while streaming the response body.
    Body(hyper::Error),
    /// The backend answered with a server error.
    Unavailable(StatusCode),
    /// The backend rejected the request outright.
    Rejected(StatusCode),
    /// Request construction failed.
    Http(http::Error),
    /// The configured base URL or a derived endpoint is not a valid URI.
    Uri(InvalidUri),
    /// The response body did not match the expected schema.
    Malformed(serde_json::Error),
}

impl Error {
    /// Whether a retry has any chance of succeeding. Connection-level
    /// failures and `5xx` answers are transient; everything else is
    /// terminal on the first attempt.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Body(_) | Self::Unavailable(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "backend unreachable: {err}"),
            Self::Body(err) => write!(f, "response interrupted: {err}"),
            Self::Unavailable(status) => write!(f, "backend unavailable ({status})"),
            Self::Rejected(status) => write!(f, "backend rejected the request ({status})"),
            Self::Http(err) => write!(f, "malformed request: {err}"),
            Self::Uri(err) => write!(f, "invalid endpoint: {err}"),
            Self::Malformed(err) => write!(f, "unexpected response schema: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<hyper_util::client::legacy::Error> for Error {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<hyper::Error> for Error {
    fn from(err: hyper::Error) -> Self {
        Self::Body(err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::Http(err)
    }
}

impl From<InvalidUri> for Error {
    fn from(err: InvalidUri) -> Self {
        Self::Uri(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
