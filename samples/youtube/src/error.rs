//! Error taxonomy shared by the authorization flow and the API client.

use http::StatusCode;
use std::path::Path;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client secrets or other local configuration is missing or unusable.
    ///
    /// Fatal: the program cannot do anything useful until the user fixes it.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The provider or the user refused: denied consent, a rejected code or an
    /// invalid refresh grant.
    #[error("authorization failed")]
    Authorization(#[source] BoxError),

    /// The YouTube API answered with a non-success status.
    #[error("YouTube API request failed with status {status}: {message}")]
    RemoteApi { status: StatusCode, message: String },

    /// Local files, the redirect listener, or the connection to the provider failed.
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn authorization(e: impl Into<BoxError>) -> Self {
        Self::Authorization(e.into())
    }

    pub(crate) fn io(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Io {
            context: context.into(),
            source: source.into(),
        }
    }

    pub(crate) fn file(path: &Path, source: std::io::Error) -> Self {
        Self::io(path.display().to_string(), source)
    }

    /// Recovers a typed error from a report, treating anything untyped as an
    /// authorization failure.
    pub(crate) fn from_provider(report: eyre::Report) -> Self {
        match report.downcast::<Error>() {
            Ok(e) => e,
            Err(report) => Self::authorization(report),
        }
    }
}
