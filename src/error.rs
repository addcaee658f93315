// src/error.rs
use thiserror::Error;
use url::Url;

use crate::feed::FeedKind;

/// Failure while reading one feed endpoint. Every variant names the URL.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http request to {url} failed: {source}")]
    Http {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: Url, status: reqwest::StatusCode },

    #[error("i/o error reading {url}: {source}")]
    Io {
        url: Url,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported scheme {scheme:?} in {url}")]
    UnsupportedScheme { url: Url, scheme: String },

    #[error("malformed feed from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: prost::DecodeError,
    },
}

impl FeedError {
    pub fn url(&self) -> &Url {
        match self {
            FeedError::Http { url, .. }
            | FeedError::Status { url, .. }
            | FeedError::Io { url, .. }
            | FeedError::UnsupportedScheme { url, .. }
            | FeedError::Decode { url, .. } => url,
        }
    }
}

/// Why a cycle stopped short.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("{kind} feed unavailable: {source}")]
    Fetch {
        kind: FeedKind,
        #[source]
        source: FeedError,
    },

    #[error("archiving {kind} feed failed: {source}")]
    Dispatch {
        kind: FeedKind,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("cycle task aborted: {0}")]
    Panicked(String),
}

impl CycleError {
    /// Source URL implicated in the failure, when there is one.
    pub fn url(&self) -> Option<&Url> {
        match self {
            CycleError::Fetch { source, .. } => Some(source.url()),
            _ => None,
        }
    }
}
