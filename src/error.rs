use std::fmt;
use thiserror::Error;

/// Conditions that abort a run before any report is written.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("required configuration missing: {0}")]
    ConfigMissing(String),
    #[error("config invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("root folder `{root}` is not accessible: {source}")]
    RootInaccessible {
        root: String,
        #[source]
        source: CapabilityError,
    },
    #[error("listing folder `{folder}` failed: {source}")]
    ListingFailed {
        folder: String,
        #[source]
        source: CapabilityError,
    },
    #[error("cannot create download work dir: {0}")]
    WorkDirUnavailable(#[source] std::io::Error),
    #[error("writing the report failed: {0}")]
    ReportWriteFailed(String),
}

impl ScanError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigMissing(_) => "CONFIG_MISSING",
            Self::InvalidConfig(_) => "CONFIG_INVALID",
            Self::RootInaccessible { .. } => "ROOT_INACCESSIBLE",
            Self::ListingFailed { .. } => "LISTING_FAILED",
            Self::WorkDirUnavailable(_) => "WORK_DIR_UNAVAILABLE",
            Self::ReportWriteFailed(_) => "REPORT_WRITE_FAILED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Http,
    Network,
    Timeout,
    NotFound,
    Io,
    Auth,
    ToolMissing,
    ToolFailed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::Io => "io",
            Self::Auth => "auth",
            Self::ToolMissing => "tool_missing",
            Self::ToolFailed => "tool_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the storage and text extraction collaborators.
///
/// Only `kind` is carried into the failure ledger; `message` goes to the
/// warning stream.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct CapabilityError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CapabilityError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CapabilityError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::Io,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.status().is_some() {
            ErrorKind::Http
        } else {
            ErrorKind::Network
        };
        Self::new(kind, err.to_string())
    }
}
