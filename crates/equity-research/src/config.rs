//! Configuration for equity research runs
//!
//! A [`ResearchConfig`] is assembled once per session (builder or
//! [`ResearchConfig::from_env`]) and handed explicitly to the fetcher, the
//! search tool and the orchestrator.

use crate::error::ConfigError;
use research_utils::env;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Environment variable holding the language-model key
pub const LLM_API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable holding the search-provider key
pub const SEARCH_API_KEY_VAR: &str = "SERPER_API_KEY";

const DEFAULT_LLM_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SEARCH_ENDPOINT: &str = "https://google.serper.dev";

/// Largest number of hits a single search may request
pub const MAX_RESULTS_PER_QUERY: usize = 20;

/// API credentials for the two external services
///
/// `Debug` never prints the key material.
#[derive(Clone, Default)]
pub struct Credentials {
    pub search_api_key: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Credentials {
    /// Names of the variables whose credential is missing
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(self.search_api_key.as_deref()) {
            missing.push(SEARCH_API_KEY_VAR);
        }
        if is_blank(self.llm_api_key.as_deref()) {
            missing.push(LLM_API_KEY_VAR);
        }
        missing
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn redact(value: Option<&String>) -> &'static str {
    if value.is_some() { "<redacted>" } else { "<unset>" }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("search_api_key", &redact(self.search_api_key.as_ref()))
            .field("llm_api_key", &redact(self.llm_api_key.as_ref()))
            .finish()
    }
}

/// Ceilings passed into agent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionBounds {
    /// Maximum reasoning/tool iterations
    pub max_iterations: usize,
    /// Cumulative token budget for one run
    pub max_token_limit: usize,
}

impl Default for ExecutionBounds {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            max_token_limit: 15_000,
        }
    }
}

/// Web-search provider settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Base URL of the search API
    pub endpoint: String,
    /// Hits requested when the model does not ask for a specific count
    pub results_per_query: usize,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            results_per_query: 10,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for a research session
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub credentials: Credentials,

    /// OpenAI-compatible API base
    pub llm_api_base: String,

    /// Chat model used by the research agent
    pub model: String,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Upper bound on tokens requested per completion
    pub max_tokens_per_completion: usize,

    /// HTTP timeout for a single completion request
    pub llm_request_timeout: Duration,

    pub bounds: ExecutionBounds,

    pub search: SearchSettings,

    /// Timeout for market-data requests
    pub market_data_timeout: Duration,

    /// Wall-clock deadline for the execution step of a run
    pub run_timeout: Option<Duration>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            llm_api_base: DEFAULT_LLM_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(0.7),
            max_tokens_per_completion: 4096,
            llm_request_timeout: Duration::from_secs(120),
            bounds: ExecutionBounds::default(),
            search: SearchSettings::default(),
            market_data_timeout: Duration::from_secs(30),
            run_timeout: None,
        }
    }
}

impl ResearchConfig {
    /// Create a new configuration builder
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Build a configuration from process environment variables
    ///
    /// Unset variables fall back to defaults; malformed numbers are errors.
    /// Missing credentials are not an error here, see [`Self::preflight`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Some(key) = env::var(LLM_API_KEY_VAR) {
            builder = builder.llm_api_key(key);
        }
        if let Some(key) = env::var(SEARCH_API_KEY_VAR) {
            builder = builder.search_api_key(key);
        }
        if let Some(base) = env::var("OPENAI_API_BASE") {
            builder = builder.llm_api_base(base);
        }
        if let Some(model) = env::var("RESEARCH_MODEL") {
            builder = builder.model(model);
        }
        if let Some(n) = env::parse_var::<usize>("RESEARCH_MAX_ITERATIONS")? {
            builder = builder.max_iterations(n);
        }
        if let Some(n) = env::parse_var::<usize>("RESEARCH_MAX_TOKEN_LIMIT")? {
            builder = builder.max_token_limit(n);
        }
        if let Some(secs) = env::parse_var::<u64>("RESEARCH_TIMEOUT_SECS")? {
            builder = builder.run_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Check that both credentials are present before a run is attempted
    ///
    /// Every missing credential is reported at once.
    pub fn preflight(&self) -> Result<(), ConfigError> {
        let missing = self.credentials.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounds.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }
        if self.bounds.max_token_limit == 0 {
            return Err(invalid("max_token_limit", "must be at least 1"));
        }
        if self.max_tokens_per_completion == 0 {
            return Err(invalid("max_tokens_per_completion", "must be at least 1"));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(invalid("temperature", format!("{t} is outside 0.0..=2.0")));
            }
        }
        if !(1..=MAX_RESULTS_PER_QUERY).contains(&self.search.results_per_query) {
            return Err(invalid(
                "results_per_query",
                format!("must be between 1 and {MAX_RESULTS_PER_QUERY}"),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty"));
        }
        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err(invalid("run_timeout", "must be greater than zero"));
        }
        check_url("llm_api_base", &self.llm_api_base)?;
        check_url("search.endpoint", &self.search.endpoint)?;
        Ok(())
    }
}

fn invalid(field: &'static str, detail: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        detail: detail.into(),
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid(field, format!("'{value}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(field, format!("unsupported scheme '{other}'"))),
    }
}

/// Builder for ResearchConfig
#[derive(Debug, Default)]
pub struct ResearchConfigBuilder {
    search_api_key: Option<String>,
    llm_api_key: Option<String>,
    llm_api_base: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens_per_completion: Option<usize>,
    llm_request_timeout: Option<Duration>,
    max_iterations: Option<usize>,
    max_token_limit: Option<usize>,
    search_endpoint: Option<String>,
    results_per_query: Option<usize>,
    search_timeout: Option<Duration>,
    market_data_timeout: Option<Duration>,
    run_timeout: Option<Duration>,
}

impl ResearchConfigBuilder {
    /// Set the search-provider key
    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(key.into());
        self
    }

    /// Set the language-model key
    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm_api_key = Some(key.into());
        self
    }

    /// Set the OpenAI-compatible API base
    pub fn llm_api_base(mut self, base: impl Into<String>) -> Self {
        self.llm_api_base = Some(base.into());
        self
    }

    /// Set the chat model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the per-completion token cap
    pub fn max_tokens_per_completion(mut self, tokens: usize) -> Self {
        self.max_tokens_per_completion = Some(tokens);
        self
    }

    /// Set the completion request timeout
    pub fn llm_request_timeout(mut self, timeout: Duration) -> Self {
        self.llm_request_timeout = Some(timeout);
        self
    }

    /// Set the iteration ceiling
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Set the cumulative token budget
    pub fn max_token_limit(mut self, n: usize) -> Self {
        self.max_token_limit = Some(n);
        self
    }

    /// Set the search API base URL
    pub fn search_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.search_endpoint = Some(endpoint.into());
        self
    }

    /// Set the default number of hits per search
    pub fn results_per_query(mut self, n: usize) -> Self {
        self.results_per_query = Some(n);
        self
    }

    /// Set the search request timeout
    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = Some(timeout);
        self
    }

    /// Set the market-data request timeout
    pub fn market_data_timeout(mut self, timeout: Duration) -> Self {
        self.market_data_timeout = Some(timeout);
        self
    }

    /// Set the wall-clock deadline for a run
    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ResearchConfig, ConfigError> {
        let defaults = ResearchConfig::default();

        let config = ResearchConfig {
            credentials: Credentials {
                search_api_key: self.search_api_key,
                llm_api_key: self.llm_api_key,
            },
            llm_api_base: self
                .llm_api_base
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or(defaults.llm_api_base),
            model: self.model.unwrap_or(defaults.model),
            temperature: self.temperature.or(defaults.temperature),
            max_tokens_per_completion: self
                .max_tokens_per_completion
                .unwrap_or(defaults.max_tokens_per_completion),
            llm_request_timeout: self.llm_request_timeout.unwrap_or(defaults.llm_request_timeout),
            bounds: ExecutionBounds {
                max_iterations: self.max_iterations.unwrap_or(defaults.bounds.max_iterations),
                max_token_limit: self.max_token_limit.unwrap_or(defaults.bounds.max_token_limit),
            },
            search: SearchSettings {
                endpoint: self
                    .search_endpoint
                    .map(|e| e.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.search.endpoint),
                results_per_query: self
                    .results_per_query
                    .unwrap_or(defaults.search.results_per_query),
                request_timeout: self.search_timeout.unwrap_or(defaults.search.request_timeout),
            },
            market_data_timeout: self.market_data_timeout.unwrap_or(defaults.market_data_timeout),
            run_timeout: self.run_timeout,
        };

        config.validate()?;
        Ok(config)
    }
}
