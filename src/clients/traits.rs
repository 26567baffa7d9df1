use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Credentials;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("research worker executable not found")]
    NotFound,
    #[error("failed to start research worker: {0}")]
    Spawn(String),
    #[error("research worker io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{0}")]
    Remote(String),
    #[error("research worker exited before replying")]
    Closed,
    #[error("cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Protocol(err.to_string())
    }
}

/// Entry point into an external research pipeline. One session per request.
#[async_trait]
pub trait ResearchPipeline: Send + Sync {
    async fn open(
        &self,
        query: &str,
        report_type: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn ResearchSession>, PipelineError>;
}

/// A single research run. The two phases receive a cancellation token and must
/// stop promptly once it fires; the accessors are only called after a report exists.
#[async_trait]
pub trait ResearchSession: Send {
    async fn conduct_research(&mut self, cancel: CancellationToken) -> Result<(), PipelineError>;

    async fn write_report(&mut self, cancel: CancellationToken) -> Result<String, PipelineError>;

    async fn source_urls(&mut self) -> Result<Vec<Value>, PipelineError>;

    /// Raw cost value; not guaranteed to be numeric.
    async fn costs(&mut self) -> Result<Value, PipelineError>;

    async fn research_sources(&mut self) -> Result<Vec<Value>, PipelineError>;
}
