//! Request and response records for the HTTP surface

use serde::{Deserialize, Serialize};

pub const DEFAULT_REPORT_TYPE: &str = "research_report";

fn default_report_type() -> String {
    DEFAULT_REPORT_TYPE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default = "default_report_type")]
    pub report_type: String,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            report_type: default_report_type(),
        }
    }

    pub fn with_report_type(mut self, report_type: impl Into<String>) -> Self {
        self.report_type = report_type.into();
        self
    }
}

/// Cost summary. Token counts are not exposed by the pipeline and always report 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Costs {
    pub total_cost: f64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub report: String,
    pub sources: Vec<String>,
    pub costs: Costs,
    pub num_sources: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeysConfigured {
    pub openai: bool,
    pub tavily: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub api_keys_configured: ApiKeysConfigured,
}
