//! In-process pipeline stub shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use research_agent::clients::{PipelineError, ResearchPipeline, ResearchSession};
use research_agent::config::{Credentials, ExecutorConfig};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Call counters observed from outside the pipeline
#[derive(Debug, Default)]
pub struct Calls {
    pub opened: AtomicUsize,
    pub research: AtomicUsize,
    pub reports: AtomicUsize,
    pub cancelled: AtomicUsize,
}

impl Calls {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
    pub fn research(&self) -> usize {
        self.research.load(Ordering::SeqCst)
    }
    pub fn reports(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scripted behavior for one stub session
#[derive(Debug, Clone)]
pub struct Script {
    pub research_delay: Duration,
    pub report_delay: Duration,
    /// Applied to the source URL accessor only
    pub aux_delay: Duration,
    pub research_error: Option<String>,
    pub report: String,
    pub sources: Result<Vec<Value>, String>,
    pub costs: Result<Value, String>,
    pub research_sources: Result<Vec<Value>, String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            research_delay: Duration::ZERO,
            report_delay: Duration::ZERO,
            aux_delay: Duration::ZERO,
            research_error: None,
            report: "# Report\n\nFindings.".to_string(),
            sources: Ok(vec![json!("https://example.com/a")]),
            costs: Ok(json!(0.01)),
            research_sources: Ok(vec![json!({"url": "https://example.com/a"})]),
        }
    }
}

pub struct StubPipeline {
    pub script: Script,
    pub calls: Arc<Calls>,
}

impl StubPipeline {
    pub fn new(script: Script) -> (Arc<Self>, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let pipeline = Arc::new(Self {
            script,
            calls: calls.clone(),
        });
        (pipeline, calls)
    }
}

#[async_trait]
impl ResearchPipeline for StubPipeline {
    async fn open(
        &self,
        _query: &str,
        _report_type: &str,
        _credentials: &Credentials,
    ) -> Result<Box<dyn ResearchSession>, PipelineError> {
        self.calls.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            script: self.script.clone(),
            calls: self.calls.clone(),
        }))
    }
}

struct StubSession {
    script: Script,
    calls: Arc<Calls>,
}

impl StubSession {
    async fn wait(&self, delay: Duration, cancel: &CancellationToken) -> Result<(), PipelineError> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => {
                self.calls.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::Cancelled)
            }
        }
    }
}

#[async_trait]
impl ResearchSession for StubSession {
    async fn conduct_research(&mut self, cancel: CancellationToken) -> Result<(), PipelineError> {
        self.calls.research.fetch_add(1, Ordering::SeqCst);
        self.wait(self.script.research_delay, &cancel).await?;
        match &self.script.research_error {
            Some(message) => Err(PipelineError::Remote(message.clone())),
            None => Ok(()),
        }
    }

    async fn write_report(&mut self, cancel: CancellationToken) -> Result<String, PipelineError> {
        self.calls.reports.fetch_add(1, Ordering::SeqCst);
        self.wait(self.script.report_delay, &cancel).await?;
        Ok(self.script.report.clone())
    }

    async fn source_urls(&mut self) -> Result<Vec<Value>, PipelineError> {
        tokio::time::sleep(self.script.aux_delay).await;
        self.script.sources.clone().map_err(PipelineError::Remote)
    }

    async fn costs(&mut self) -> Result<Value, PipelineError> {
        self.script.costs.clone().map_err(PipelineError::Remote)
    }

    async fn research_sources(&mut self) -> Result<Vec<Value>, PipelineError> {
        self.script.research_sources.clone().map_err(PipelineError::Remote)
    }
}

pub fn test_credentials() -> Credentials {
    Credentials::new("sk-test", "tvly-test")
}

/// Millisecond budgets so timeout tests finish quickly
pub fn short_limits() -> ExecutorConfig {
    ExecutorConfig {
        research_timeout_ms: 100,
        report_timeout_ms: 100,
        aux_timeout_ms: 100,
    }
}
