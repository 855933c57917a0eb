use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("malformed response for {context}: {reason}")]
    Malformed { context: String, reason: String },

    /// The catalog answered correctly but publishes nothing for the request.
    #[error("nothing published for {context}")]
    Empty { context: String },

    #[error("request to {url} rejected as automated traffic")]
    BotBlocked { url: String },

    #[error("{context} still failing after {attempts} attempts: {source}")]
    Exhausted {
        context: String,
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },

    #[error("unsupported content in {name}: {reason}")]
    UnsupportedFormat { name: String, reason: String },

    #[error("corrupt archive {name}: {reason}")]
    CorruptArchive { name: String, reason: String },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl FetchError {
    /// Taxonomy label used in events and run reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Unreachable(_) | FetchError::UnexpectedStatus { .. } => "unreachable",
            FetchError::Malformed { .. } => "malformed",
            FetchError::Empty { .. } => "empty",
            FetchError::BotBlocked { .. } => "bot_blocked",
            FetchError::Exhausted { .. } => "exhausted",
            FetchError::UnsupportedFormat { .. } => "unsupported_format",
            FetchError::CorruptArchive { .. } => "corrupt_archive",
            FetchError::Write { .. } => "write_error",
            FetchError::InvalidUrl { .. } => "config",
            FetchError::Timeout { .. } => "timeout",
        }
    }

    pub(crate) fn malformed(context: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::Malformed {
            context: context.into(),
            reason: reason.to_string(),
        }
    }
}
