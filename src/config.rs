use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const TAVILY_KEY_VAR: &str = "TAVILY_API_KEY";
pub const DEFAULT_LOG_FILTER: &str = "research_agent=info,tower_http=info";

const DEFAULT_CONFIG_PATH: &str = "research_agent.toml";
const MIB: usize = 1024 * 1024;

/// Main configuration structure loaded from research_agent.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub executor: ExecutorConfig,
    pub bridge: BridgeConfig,
    /// Credentials only ever come from the environment
    #[serde(skip)]
    pub credentials: Credentials,
}

/// Listener and transport lifecycle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub static_dir: PathBuf,
    pub keepalive_sec: u64,
    pub shutdown_timeout_sec: u64,
    pub max_concurrency: usize,
    /// Requests served before the process drains and exits; 0 disables recycling
    pub max_requests: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            static_dir: PathBuf::from("static"),
            keepalive_sec: 5,
            shutdown_timeout_sec: 30,
            max_concurrency: 64,
            max_requests: 0,
            max_body_bytes: 16 * MIB,
        }
    }
}

impl ServerConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_sec)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_sec)
    }
}

/// Budgets for the bounded research executor
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub research_timeout_ms: u64,
    pub report_timeout_ms: u64,
    pub aux_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            research_timeout_ms: 480_000,
            report_timeout_ms: 120_000,
            aux_timeout_ms: 30_000,
        }
    }
}

impl ExecutorConfig {
    pub fn research_timeout(&self) -> Duration {
        Duration::from_millis(self.research_timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }

    pub fn aux_timeout(&self) -> Duration {
        Duration::from_millis(self.aux_timeout_ms)
    }
}

/// How to launch the external research worker
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub command: String,
    pub args: Vec<String>,
    pub verbose: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: "gpt-researcher-bridge".to_string(),
            args: Vec::new(),
            verbose: true,
        }
    }
}

/// The model-inference and search credentials. Empty values count as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("tavily_api_key", &self.tavily_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(openai: impl Into<String>, tavily: impl Into<String>) -> Self {
        Self {
            openai_api_key: non_empty(Some(openai.into())),
            tavily_api_key: non_empty(Some(tavily.into())),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            openai_api_key: non_empty(lookup(OPENAI_KEY_VAR)),
            tavily_api_key: non_empty(lookup(TAVILY_KEY_VAR)),
        }
    }

    pub fn openai_configured(&self) -> bool {
        self.openai_api_key.is_some()
    }

    pub fn tavily_configured(&self) -> bool {
        self.tavily_api_key.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses `path`, else RESEARCH_AGENT_CONFIG, else "research_agent.toml".
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        crate::load_env();

        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RESEARCH_AGENT_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(_) => {
                tracing::warn!(
                    "Config file {} not found, using defaults",
                    config_path.display()
                );
                Self::default()
            }
        };

        let lookup = |key: &str| std::env::var(key).ok();
        config.apply_overrides(lookup);
        config.credentials = Credentials::from_lookup(lookup);
        config.validate();

        Ok(config)
    }

    /// Apply env-style overrides (env-first) from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_u64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let parse_usize = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        if let Some(raw) = lookup("RESEARCH_HTTP_BIND") {
            match raw.parse::<SocketAddr>() {
                Ok(bind) => self.server.bind = bind,
                Err(_) => tracing::warn!("Ignoring invalid RESEARCH_HTTP_BIND '{}'", raw),
            }
        }
        if let Some(dir) = lookup("RESEARCH_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_u64("RESEARCH_KEEPALIVE_SEC") {
            self.server.keepalive_sec = v;
        }
        if let Some(v) = parse_u64("RESEARCH_SHUTDOWN_TIMEOUT_SEC") {
            self.server.shutdown_timeout_sec = v;
        }
        if let Some(v) = parse_usize("RESEARCH_MAX_CONCURRENCY") {
            self.server.max_concurrency = v;
        }
        if let Some(v) = parse_u64("RESEARCH_MAX_REQUESTS") {
            self.server.max_requests = v;
        }
        if let Some(v) = parse_usize("RESEARCH_MAX_BODY_BYTES") {
            self.server.max_body_bytes = v;
        }

        if let Some(v) = parse_u64("RESEARCH_PHASE_TIMEOUT_MS") {
            self.executor.research_timeout_ms = v;
        }
        if let Some(v) = parse_u64("RESEARCH_REPORT_TIMEOUT_MS") {
            self.executor.report_timeout_ms = v;
        }
        if let Some(v) = parse_u64("RESEARCH_AUX_TIMEOUT_MS") {
            self.executor.aux_timeout_ms = v;
        }

        if let Some(cmd) = lookup("RESEARCH_BRIDGE_CMD") {
            let mut parts = cmd.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                self.bridge.command = program;
                self.bridge.args = parts.collect();
            }
        }
        if let Some(v) = lookup("RESEARCH_BRIDGE_VERBOSE") {
            self.bridge.verbose = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    /// Clamp values that would make the server unusable
    pub fn validate(&mut self) {
        let defaults = ExecutorConfig::default();
        if self.server.max_concurrency == 0 {
            tracing::warn!("max_concurrency 0 is not usable, clamping to 1");
            self.server.max_concurrency = 1;
        }
        if self.server.max_body_bytes == 0 {
            tracing::warn!("max_body_bytes 0 is not usable, using 16 MiB");
            self.server.max_body_bytes = 16 * MIB;
        }
        if self.executor.research_timeout_ms == 0 {
            tracing::warn!("research timeout 0 is not usable, using default");
            self.executor.research_timeout_ms = defaults.research_timeout_ms;
        }
        if self.executor.report_timeout_ms == 0 {
            tracing::warn!("report timeout 0 is not usable, using default");
            self.executor.report_timeout_ms = defaults.report_timeout_ms;
        }
        if self.executor.aux_timeout_ms == 0 {
            self.executor.aux_timeout_ms = defaults.aux_timeout_ms;
        }
        if self.bridge.command.trim().is_empty() {
            tracing::warn!("Empty bridge command, falling back to default");
            self.bridge.command = BridgeConfig::default().command;
        }
    }
}
