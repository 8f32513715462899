//! API Configuration Module
//!
//! Configuration for the HTTP surface, the reasoning agent, the tracing
//! service, transcript storage and the flattener. Every section is loaded
//! from environment variables with defaults that work for local development;
//! `main` loads a `.env` file first when one is present.

use distill_core::{ConfigError, DistillResult};
use distill_flatten::{FlattenConfig, TranscriptSource};
use distill_llm::{FetchPolicy, LangfuseCredentials};
use std::path::PathBuf;
use std::time::Duration;

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_string(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env_string(key)
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP surface configuration: CORS, static mount, response shape.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Directory served read-only at `/data` when it exists at startup.
    pub static_dir: PathBuf,

    /// Whether chat responses carry `raw_data` and `refined_data`.
    pub include_dataset: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_allow_credentials: true,
            cors_max_age_secs: 86400,
            static_dir: PathBuf::from("/app/data"),
            include_dataset: true,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DISTILL_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `DISTILL_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: true)
    /// - `DISTILL_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `DISTILL_STATIC_DIR`: Static mount source (default: /app/data)
    /// - `DISTILL_INCLUDE_DATASET`: "true" or "false" (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_origins = env_string("DISTILL_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            cors_origins,
            cors_allow_credentials: env_flag(
                "DISTILL_CORS_ALLOW_CREDENTIALS",
                defaults.cors_allow_credentials,
            ),
            cors_max_age_secs: env_parse("DISTILL_CORS_MAX_AGE_SECS", defaults.cors_max_age_secs),
            static_dir: env_string("DISTILL_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            include_dataset: env_flag("DISTILL_INCLUDE_DATASET", defaults.include_dataset),
        }
    }

    /// Check if CORS is restricted to an explicit origin list.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.cors_origins.is_empty()
            || self
                .cors_origins
                .iter()
                .any(|allowed| allowed == "*" || allowed == origin)
    }
}

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

/// Where the reasoning agent runs and how long a single run may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub base_url: String,
    /// Data directory handed to the agent on every run.
    pub data_path: String,
    pub timeout: Duration,
    /// Bound on the health check made before the agent is handed out.
    pub health_timeout: Duration,
    /// Name given to each trace in the tracing service.
    pub trace_name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8500".to_string(),
            data_path: "../biomni_data".to_string(),
            timeout: Duration::from_secs(600),
            health_timeout: Duration::from_secs(10),
            trace_name: "Biomni Chat Interaction".to_string(),
        }
    }
}

impl AgentConfig {
    /// Environment variables:
    /// - `DISTILL_AGENT_URL` (default: http://localhost:8500)
    /// - `BIOMNI_DATA_PATH` (default: ../biomni_data)
    /// - `DISTILL_AGENT_TIMEOUT_SECS` (default: 600)
    /// - `DISTILL_AGENT_HEALTH_TIMEOUT_SECS` (default: 10)
    /// - `DISTILL_TRACE_NAME` (default: Biomni Chat Interaction)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_string("DISTILL_AGENT_URL").unwrap_or(defaults.base_url),
            data_path: env_string("BIOMNI_DATA_PATH").unwrap_or(defaults.data_path),
            timeout: Duration::from_secs(env_parse(
                "DISTILL_AGENT_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            health_timeout: Duration::from_secs(env_parse(
                "DISTILL_AGENT_HEALTH_TIMEOUT_SECS",
                defaults.health_timeout.as_secs(),
            )),
            trace_name: env_string("DISTILL_TRACE_NAME").unwrap_or(defaults.trace_name),
        }
    }
}

// ============================================================================
// LANGFUSE CONFIGURATION
// ============================================================================

/// Tracing service endpoint, keys and fetch timing.
#[derive(Clone)]
pub struct LangfuseConfig {
    pub host: String,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub timeout: Duration,
    pub fetch_policy: FetchPolicy,
}

impl Default for LangfuseConfig {
    fn default() -> Self {
        Self {
            host: "https://cloud.langfuse.com".to_string(),
            public_key: None,
            secret_key: None,
            timeout: Duration::from_secs(30),
            fetch_policy: FetchPolicy::default(),
        }
    }
}

impl LangfuseConfig {
    /// Environment variables:
    /// - `LANGFUSE_HOST` (default: https://cloud.langfuse.com)
    /// - `LANGFUSE_PUBLIC_KEY` / `LANGFUSE_SECRET_KEY` (unset disables tracing)
    /// - `DISTILL_LANGFUSE_TIMEOUT_SECS` (default: 30)
    /// - `DISTILL_TRACE_SETTLE_MS` (default: 3000)
    /// - `DISTILL_TRACE_FETCH_ATTEMPTS` (default: 3)
    /// - `DISTILL_TRACE_RETRY_MS` (default: 1500)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let policy = defaults.fetch_policy;
        Self {
            host: env_string("LANGFUSE_HOST").unwrap_or(defaults.host),
            public_key: env_string("LANGFUSE_PUBLIC_KEY"),
            secret_key: env_string("LANGFUSE_SECRET_KEY"),
            timeout: Duration::from_secs(env_parse(
                "DISTILL_LANGFUSE_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            fetch_policy: FetchPolicy {
                settle: Duration::from_millis(env_parse(
                    "DISTILL_TRACE_SETTLE_MS",
                    policy.settle.as_millis() as u64,
                )),
                attempts: env_parse("DISTILL_TRACE_FETCH_ATTEMPTS", policy.attempts),
                retry_delay: Duration::from_millis(env_parse(
                    "DISTILL_TRACE_RETRY_MS",
                    policy.retry_delay.as_millis() as u64,
                )),
            },
        }
    }

    /// Credentials when both keys are set; tracing is disabled otherwise.
    pub fn credentials(&self) -> Option<LangfuseCredentials> {
        match (&self.public_key, &self.secret_key) {
            (Some(public), Some(secret)) => {
                Some(LangfuseCredentials::new(&self.host, public, secret))
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for LangfuseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LangfuseConfig")
            .field("host", &self.host)
            .field("public_key", &self.public_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("fetch_policy", &self.fetch_policy)
            .finish()
    }
}

// ============================================================================
// STORAGE CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root under which `raw/` and `refined/` are created.
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("/app/logs"),
        }
    }
}

impl StorageConfig {
    /// Environment variables:
    /// - `DISTILL_LOG_DIR` (default: /app/logs)
    pub fn from_env() -> Self {
        Self {
            log_dir: env_string("DISTILL_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| Self::default().log_dir),
        }
    }
}

// ============================================================================
// FLATTEN CONFIGURATION
// ============================================================================

/// Transcript source selection and system prompt override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenSettings {
    pub source: TranscriptSource,
    pub config: FlattenConfig,
}

impl FlattenSettings {
    /// Environment variables:
    /// - `DISTILL_TRANSCRIPT_SOURCE`: auto, trace or log (default: auto)
    /// - `DISTILL_SYSTEM_PROMPT`: fallback system prompt (default: built-in)
    ///
    /// Unlike the other sections an unknown transcript source is an error
    /// rather than a silent fallback.
    pub fn from_env() -> DistillResult<Self> {
        let source = match env_string("DISTILL_TRANSCRIPT_SOURCE") {
            Some(value) => value.parse::<TranscriptSource>()?,
            None => TranscriptSource::default(),
        };

        let mut config = FlattenConfig::default();
        if let Some(prompt) = env_string("DISTILL_SYSTEM_PROMPT") {
            config.default_system_prompt = prompt;
        }

        Ok(Self { source, config })
    }
}

/// Resolve the listening address from `DISTILL_API_BIND` and `PORT`
/// (or `DISTILL_API_PORT`).
pub fn resolve_bind_addr() -> DistillResult<std::net::SocketAddr> {
    let host = env_string("DISTILL_API_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
    let port_str = env_string("PORT")
        .or_else(|| env_string("DISTILL_API_PORT"))
        .unwrap_or_else(|| "8000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidValue {
            field: "PORT".to_string(),
            value: port_str.clone(),
            reason: e.to_string(),
        })?;

    let addr = format!("{}:{}", host, port);
    addr.parse().map_err(|e: std::net::AddrParseError| {
        ConfigError::InvalidValue {
            field: "DISTILL_API_BIND".to_string(),
            value: addr.clone(),
            reason: e.to_string(),
        }
        .into()
    })
}
