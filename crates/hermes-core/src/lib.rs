pub mod backoff;
pub mod client;
pub mod config;
pub mod datasets;
pub mod deadline;
pub mod error;
pub mod job;
pub mod protocol;
pub mod proxy;
pub mod testutil;
pub mod tools;
pub mod traits;

pub use backoff::Backoff;
pub use client::ScrapeClient;
pub use config::Config;
pub use datasets::Platform;
pub use deadline::Deadline;
pub use error::AppError;
pub use job::{JobStatus, ScrapeRequest, SnapshotJob};
pub use traits::{ApiRequest, ApiResponse, HttpMethod, ScrapeTransport};
