//! Bounded research executor
//!
//! Runs one research request against the external pipeline:
//! credentials check, research phase and report phase under independent
//! deadlines, then post-processing where auxiliary accessor failures degrade
//! their field to a default instead of failing the request.

pub mod shaping;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clients::{PipelineError, ResearchPipeline, ResearchSession};
use crate::config::{Credentials, ExecutorConfig};
use crate::error::{Phase, ResearchError, Result};
use crate::schemas::{Costs, ResearchRequest, ResearchResponse};
use crate::utils::sanitize_report;

pub use shaping::{MAX_RESPONSE_BYTES, TRUNCATED_REPORT_CHARS, TRUNCATION_NOTICE};

pub struct ResearchExecutor {
    pipeline: Arc<dyn ResearchPipeline>,
    credentials: Credentials,
    limits: ExecutorConfig,
}

impl ResearchExecutor {
    pub fn new(
        pipeline: Arc<dyn ResearchPipeline>,
        credentials: Credentials,
        limits: ExecutorConfig,
    ) -> Self {
        Self {
            pipeline,
            credentials,
            limits,
        }
    }

    /// Execute one request end to end. No retries; a timeout or error ends the request.
    pub async fn run(&self, request: &ResearchRequest) -> Result<ResearchResponse> {
        let request_id = Uuid::new_v4();
        if let Err(err) = self.check_credentials() {
            error!(%request_id, "Refusing research request: {}", err);
            return Err(err);
        }

        let started = Instant::now();
        info!(
            %request_id,
            report_type = %request.report_type,
            "Starting research for: {}",
            request.query
        );

        let outcome = self.execute(request_id, request).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &outcome {
            Ok(response) => info!(
                %request_id,
                elapsed_ms,
                num_sources = response.num_sources,
                report_chars = response.report.chars().count(),
                "Research completed"
            ),
            Err(err) if err.is_timeout() => warn!(%request_id, elapsed_ms, "{}", err),
            Err(err) => error!(%request_id, elapsed_ms, error = ?err, "Error during research: {}", err),
        }
        outcome
    }

    fn check_credentials(&self) -> Result<()> {
        if !self.credentials.openai_configured() {
            return Err(ResearchError::Config {
                message: "OpenAI API key not configured".into(),
            });
        }
        if !self.credentials.tavily_configured() {
            return Err(ResearchError::Config {
                message: "Tavily API key not configured".into(),
            });
        }
        Ok(())
    }

    async fn execute(&self, request_id: Uuid, request: &ResearchRequest) -> Result<ResearchResponse> {
        let pipeline = &self.pipeline;
        let credentials = &self.credentials;

        // Opening the session counts against the research budget
        let research_token = CancellationToken::new();
        let phase_token = research_token.clone();
        let mut session = bounded(
            Phase::Research,
            self.limits.research_timeout(),
            research_token,
            async move {
                let mut session = pipeline
                    .open(&request.query, &request.report_type, credentials)
                    .await?;
                session.conduct_research(phase_token).await?;
                Ok::<_, PipelineError>(session)
            },
        )
        .await?;

        info!(%request_id, "Generating report...");
        let report_token = CancellationToken::new();
        let raw_report = bounded(
            Phase::Report,
            self.limits.report_timeout(),
            report_token.clone(),
            session.write_report(report_token),
        )
        .await?;

        Ok(self.assemble(request_id, &raw_report, session.as_mut()).await)
    }

    /// Post-processing never fails: every accessor degrades to its default.
    async fn assemble(
        &self,
        request_id: Uuid,
        raw_report: &str,
        session: &mut dyn ResearchSession,
    ) -> ResearchResponse {
        let report = sanitize_report(raw_report);

        let sources = self
            .auxiliary(request_id, "source URLs", session.source_urls())
            .await
            .map(shaping::coerce_sources)
            .unwrap_or_default();
        let total_cost = self
            .auxiliary(request_id, "costs", session.costs())
            .await
            .map(|value| shaping::coerce_cost(&value))
            .unwrap_or(0.0);
        let num_sources = self
            .auxiliary(request_id, "research sources", session.research_sources())
            .await
            .map(|items| items.len())
            .unwrap_or(0);

        let mut response = ResearchResponse {
            report,
            sources,
            costs: Costs {
                total_cost,
                total_tokens: 0,
            },
            num_sources,
        };

        if shaping::enforce_size_ceiling(&mut response, MAX_RESPONSE_BYTES) {
            warn!(
                %request_id,
                max_bytes = MAX_RESPONSE_BYTES,
                "Response exceeded size ceiling, report truncated to {} characters",
                TRUNCATED_REPORT_CHARS
            );
        }
        response
    }

    async fn auxiliary<T, F>(&self, request_id: Uuid, field: &str, call: F) -> Option<T>
    where
        F: Future<Output = std::result::Result<T, PipelineError>>,
    {
        let budget = self.limits.aux_timeout();
        match tokio::time::timeout(budget, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                warn!(%request_id, field, error = %err, "Could not fetch {}, using default", field);
                None
            }
            Err(_) => {
                warn!(
                    %request_id,
                    field,
                    timeout_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                    "Fetching {} timed out, using default",
                    field
                );
                None
            }
        }
    }
}

/// Await `work` for at most `budget`. On expiry the token is cancelled and the
/// unit of work dropped; nothing it produced is kept.
async fn bounded<T, F>(
    phase: Phase,
    budget: Duration,
    token: CancellationToken,
    work: F,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, PipelineError>>,
{
    // Cancels the token if this future is dropped mid-phase (client went away)
    let guard = token.clone().drop_guard();
    match tokio::time::timeout(budget, work).await {
        Ok(result) => {
            let _ = guard.disarm();
            result.map_err(ResearchError::from)
        }
        Err(_) => {
            token.cancel();
            Err(ResearchError::Timeout { phase, budget })
        }
    }
}
