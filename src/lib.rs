// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod agency;
pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod poller;
pub mod readiness;
pub mod scheduler;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::archive::{FeedService, LoggingArchiveSink};
pub use crate::config::ArchiverConfig;
pub use crate::feed::gtfs_realtime::FeedMessage;
pub use crate::feed::FeedKind;
pub use crate::scheduler::{ArchiverTask, TaskConfig, TaskState};
