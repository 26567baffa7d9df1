//! Domain-specific error types for research-agent

use std::fmt;
use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::clients::PipelineError;

/// The two bounded phases of a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Research,
    Report,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Research => f.write_str("Research"),
            Phase::Report => f.write_str("Report generation"),
        }
    }
}

/// Main error type for the research gateway
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(
        "{phase} timed out after {}. Try a more specific query or a shorter report type.",
        describe_budget(.budget)
    )]
    Timeout { phase: Phase, budget: Duration },

    #[error("Pipeline error: {message}")]
    Pipeline { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ResearchError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResearchError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            ResearchError::Config { .. }
            | ResearchError::Pipeline { .. }
            | ResearchError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Terse message returned to the caller; full detail stays in the server logs.
    pub fn detail(&self) -> String {
        match self {
            ResearchError::Config { message }
            | ResearchError::Pipeline { message }
            | ResearchError::Internal { message } => message.clone(),
            ResearchError::Timeout { .. } => self.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResearchError::Timeout { .. })
    }
}

fn describe_budget(budget: &Duration) -> String {
    if budget.subsec_millis() == 0 {
        format!("{} seconds", budget.as_secs())
    } else {
        format!("{} ms", budget.as_millis())
    }
}

impl From<PipelineError> for ResearchError {
    fn from(err: PipelineError) -> Self {
        ResearchError::Pipeline {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ResearchError {
    fn from(err: anyhow::Error) -> Self {
        ResearchError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ResearchError {
    fn from(err: serde_json::Error) -> Self {
        ResearchError::Internal {
            message: format!("Serialization error: {}", err),
        }
    }
}

/// Convert ResearchError to an HTTP response with a `{"detail": ...}` body
impl IntoResponse for ResearchError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Result type alias for research operations
pub type Result<T> = std::result::Result<T, ResearchError>;
