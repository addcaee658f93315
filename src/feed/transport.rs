// src/feed/transport.rs
//! Byte streams for feed endpoints: HTTP(S) through `reqwest`, `file://` from disk.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use url::Url;

use crate::error::FeedError;

/// Opens a readable stream for a feed endpoint.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Box<dyn FeedStream>, FeedError>;
}

/// An open endpoint. Callers must `close` it once they are done reading.
#[async_trait]
pub trait FeedStream: Send {
    /// Read the remaining payload.
    async fn read_all(&mut self) -> Result<Vec<u8>, FeedError>;

    async fn close(self: Box<Self>) -> Result<(), FeedError>;
}

pub const DEFAULT_USER_AGENT: &str = concat!("gtfs-realtime-archiver/", env!("CARGO_PKG_VERSION"));

/// Transport used by the binary: `http`/`https` through a shared client,
/// `file` straight from disk.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn open(&self, url: &Url) -> Result<Box<dyn FeedStream>, FeedError> {
        match url.scheme() {
            "http" | "https" => {
                let resp = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|source| FeedError::Http {
                        url: url.clone(),
                        source,
                    })?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(FeedError::Status {
                        url: url.clone(),
                        status,
                    });
                }
                Ok(Box::new(HttpStream {
                    url: url.clone(),
                    resp,
                }))
            }
            "file" => {
                let path = url.to_file_path().map_err(|_| FeedError::Io {
                    url: url.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "file url has no local path",
                    ),
                })?;
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|source| FeedError::Io {
                        url: url.clone(),
                        source,
                    })?;
                Ok(Box::new(FileStream {
                    url: url.clone(),
                    file,
                }))
            }
            other => Err(FeedError::UnsupportedScheme {
                url: url.clone(),
                scheme: other.to_string(),
            }),
        }
    }
}

struct HttpStream {
    url: Url,
    resp: reqwest::Response,
}

#[async_trait]
impl FeedStream for HttpStream {
    async fn read_all(&mut self) -> Result<Vec<u8>, FeedError> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.resp.chunk().await.map_err(|source| FeedError::Http {
            url: self.url.clone(),
            source,
        })? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }

    async fn close(self: Box<Self>) -> Result<(), FeedError> {
        // Dropping the response hands the connection back to the pool.
        drop(self);
        Ok(())
    }
}

struct FileStream {
    url: Url,
    file: tokio::fs::File,
}

#[async_trait]
impl FeedStream for FileStream {
    async fn read_all(&mut self) -> Result<Vec<u8>, FeedError> {
        let mut buf = Vec::new();
        self.file
            .read_to_end(&mut buf)
            .await
            .map_err(|source| FeedError::Io {
                url: self.url.clone(),
                source,
            })?;
        Ok(buf)
    }

    async fn close(self: Box<Self>) -> Result<(), FeedError> {
        drop(self);
        Ok(())
    }
}
