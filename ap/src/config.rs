//! AStarPlanner configuration types and loading

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::planner::Budget;
use crate::validation::{RiskCatalog, RiskRule, Severity};

/// Main AStarPlanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Generation service configuration
    pub llm: LlmConfig,

    /// Search budget and frontier limits
    pub search: SearchConfig,

    /// Progress governor tuning
    pub governor: GovernorConfig,

    /// Oracle prompt and parsing settings
    pub oracle: OracleConfig,

    /// Experience store and heuristic correction
    pub experience: ExperienceConfig,

    /// Plan validation
    pub validation: ValidationConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if s.max_nodes == 0 || s.max_time_ms == 0 || s.max_depth == 0 {
            bail!("search budget must be non-zero (max-nodes, max-time-ms, max-depth)");
        }
        if s.frontier_capacity == 0 {
            bail!("search.frontier-capacity must be at least 1");
        }
        if s.scoring_workers == 0 || s.max_candidates == 0 {
            bail!("search.scoring-workers and search.max-candidates must be at least 1");
        }
        if s.call_timeout_ms == 0 {
            bail!("search.call-timeout-ms must be non-zero");
        }
        // An oracle call is one request plus one stricter retry
        let attempts_ms = self.oracle.request_timeout_ms.saturating_mul(2);
        if s.call_timeout_ms < attempts_ms {
            bail!(
                "search.call-timeout-ms ({}) must cover two oracle.request-timeout-ms attempts ({})",
                s.call_timeout_ms,
                attempts_ms
            );
        }

        let g = &self.governor;
        if g.plateau_window < 2 {
            bail!("governor.plateau-window must be at least 2 (got {})", g.plateau_window);
        }
        if !(0.0..1.0).contains(&g.plateau_threshold) {
            bail!("governor.plateau-threshold must be in [0, 1) (got {})", g.plateau_threshold);
        }

        let e = &self.experience;
        if e.min_matches == 0 {
            bail!("experience.min-matches must be at least 1");
        }
        if !(0.0..=1.0).contains(&e.similarity_threshold) {
            bail!(
                "experience.similarity-threshold must be in [0, 1] (got {})",
                e.similarity_threshold
            );
        }

        if self.validation.max_replans > 1 {
            bail!("validation.max-replans is capped at 1 (got {})", self.validation.max_replans);
        }
        RiskCatalog::new(&self.validation.risk_categories).context("Invalid validation.risk-categories")?;

        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .astarplanner.yml
        let local_config = PathBuf::from(".astarplanner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/astarplanner/astarplanner.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed: the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(p) => vec![p.clone()],
            None => std::iter::once(PathBuf::from(".astarplanner.yml"))
                .chain(Self::user_config_path())
                .collect(),
        };
        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("astarplanner").join("astarplanner.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Upper bound on tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!(
            "LLM API key not found. Set the {} environment variable.",
            self.api_key_env
        ))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 30_000,
        }
    }
}

/// Search budget and frontier limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Hard ceiling on node expansions
    #[serde(rename = "max-nodes")]
    pub max_nodes: u64,

    /// Session deadline in milliseconds
    #[serde(rename = "max-time-ms")]
    pub max_time_ms: u64,

    /// Depth at which search stops without success
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Frontier size before the worst entries are evicted
    #[serde(rename = "frontier-capacity")]
    pub frontier_capacity: usize,

    /// Concurrent heuristic calls while scoring siblings
    #[serde(rename = "scoring-workers")]
    pub scoring_workers: usize,

    /// Candidates kept per expansion
    #[serde(rename = "max-candidates")]
    pub max_candidates: usize,

    /// Timeout for a single oracle call, retries included
    #[serde(rename = "call-timeout-ms")]
    pub call_timeout_ms: u64,
}

impl SearchConfig {
    pub fn budget(&self) -> Budget {
        Budget {
            max_nodes: self.max_nodes,
            max_time: Duration::from_millis(self.max_time_ms),
            max_depth: self.max_depth,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_nodes: 200,
            max_time_ms: 120_000,
            max_depth: 12,
            frontier_capacity: 1_000,
            scoring_workers: 4,
            max_candidates: 5,
            call_timeout_ms: 60_000,
        }
    }
}

/// Progress governor tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Number of best-f samples compared for plateau detection (K)
    #[serde(rename = "plateau-window")]
    pub plateau_window: usize,

    /// Relative improvement below which the window counts as flat
    #[serde(rename = "plateau-threshold")]
    pub plateau_threshold: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            plateau_window: 5,
            plateau_threshold: 0.01,
        }
    }
}

/// Oracle prompt and parsing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Most recent actions quoted verbatim in proposal prompts
    #[serde(rename = "history-window")]
    pub history_window: usize,

    /// Token cap for proposal requests
    #[serde(rename = "propose-max-tokens")]
    pub propose_max_tokens: u32,

    /// Token cap for estimate requests
    #[serde(rename = "estimate-max-tokens")]
    pub estimate_max_tokens: u32,

    /// Estimate used when the response contains no integer
    #[serde(rename = "unparsable-estimate")]
    pub unparsable_estimate: u64,

    /// Timeout for one generation request
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,
}

impl OracleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            propose_max_tokens: 1024,
            estimate_max_tokens: 16,
            unparsable_estimate: 1_000,
            request_timeout_ms: 20_000,
        }
    }
}

/// Experience store and heuristic correction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceConfig {
    /// Rescale heuristic estimates with recorded outcomes
    pub enabled: bool,

    /// Store directory (defaults to the experiencestore data dir)
    #[serde(rename = "store-path", skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Records kept before FIFO eviction
    pub capacity: usize,

    /// Records older than this many days are pruned
    #[serde(rename = "max-age-days", skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,

    /// Matches required before any correction applies (N)
    #[serde(rename = "min-matches")]
    pub min_matches: usize,

    /// Minimum descriptor similarity for a record to count
    #[serde(rename = "similarity-threshold")]
    pub similarity_threshold: f64,

    /// Records fetched per lookup
    #[serde(rename = "query-limit")]
    pub query_limit: usize,
}

impl ExperienceConfig {
    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(experiencestore::config::default_store_path)
    }

    pub fn store_options(&self) -> experiencestore::StoreOptions {
        experiencestore::StoreOptions {
            capacity: self.capacity,
            max_age_days: self.max_age_days,
        }
    }
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store_path: None,
            capacity: experiencestore::DEFAULT_CAPACITY,
            max_age_days: None,
            min_matches: 3,
            similarity_threshold: 0.5,
            query_limit: 50,
        }
    }
}

/// Plan validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Lowest severity that rejects a plan
    #[serde(rename = "reject-threshold")]
    pub reject_threshold: Severity,

    /// Re-plans allowed after a rejection (0 or 1)
    #[serde(rename = "max-replans")]
    pub max_replans: u32,

    /// Risk categories scanned in every plan
    #[serde(rename = "risk-categories")]
    pub risk_categories: Vec<RiskRule>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reject_threshold: Severity::High,
            max_replans: 1,
            risk_categories: RiskRule::defaults(),
        }
    }
}
