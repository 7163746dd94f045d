//! Error types of the task store and of the sync providers

use reqwest::StatusCode;
use thiserror::Error;

/// An iCalendar document could not be parsed or built
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid iCalendar data: {0}")]
pub struct IcalError(pub String);

/// Errors returned by the [`TaskStore`](crate::store::TaskStore)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("list {0} not found")]
    ListNotFound(String),

    #[error("task {uid} not found in list {list_uid}")]
    TaskNotFound { list_uid: String, uid: String },

    /// Setting this parent would make the task one of its own ancestors
    #[error("task {uid} cannot have {parent} as parent: this would create a cycle")]
    ParentCycle { uid: String, parent: String },

    #[error("invalid date {0:?}")]
    InvalidDate(String),

    #[error("the database connection is poisoned")]
    Poisoned,

    #[error(transparent)]
    Ical(#[from] IcalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a [`RemoteError`] should be presented to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The server refused the credentials
    Authorization,
    /// The server could not be resolved or reached
    Connection,
    /// The server answered something that is not valid CalDAV
    Protocol,
    /// Missing or unusable account settings
    Credentials,
}

/// Errors that happen while talking to a remote server
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("no sync account is configured")]
    MissingCredentials,

    #[error("invalid server URL {url:?}: {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    #[error("the server rejected the credentials (HTTP {0})")]
    Unauthorized(StatusCode),

    #[error("unable to reach the server: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { status: StatusCode, url: String },

    #[error("invalid server response: {0}")]
    Protocol(String),

    #[error(transparent)]
    Ical(#[from] IcalError),

    #[error("calendar {0} does not exist on the server")]
    CalendarNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Tells which family of user-facing message this error belongs to
    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteError::Unauthorized(_) => FailureKind::Authorization,
            RemoteError::Connection(_) | RemoteError::Http(_) => FailureKind::Connection,
            RemoteError::MissingCredentials | RemoteError::InvalidUrl { .. } => FailureKind::Credentials,
            RemoteError::Protocol(_)
            | RemoteError::UnexpectedStatus { .. }
            | RemoteError::Ical(_)
            | RemoteError::CalendarNotFound(_)
            | RemoteError::Store(_)
            | RemoteError::Other(_) => FailureKind::Protocol,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            RemoteError::Connection(err)
        } else {
            RemoteError::Http(err)
        }
    }
}

impl From<minidom::Error> for RemoteError {
    fn from(err: minidom::Error) -> Self {
        RemoteError::Protocol(err.to_string())
    }
}
