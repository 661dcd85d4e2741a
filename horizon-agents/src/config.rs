//! Discovery configuration.
//!
//! Loaded once from an optional TOML file and handed to the pipeline as an
//! immutable value. Every field has a default, so an empty file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default location of the record store.
pub const DEFAULT_STORE_PATH: &str = "outputs/discovered_startups.json";
/// Default model for stage agents.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    pub discovery: DiscoveryConfig,
    pub pacing: Pacing,
    pub agents: AgentSettings,
    pub output: OutputSettings,
}

impl HorizonConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// What to look for and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub target_countries: Vec<String>,
    pub ai_technologies: Vec<String>,
    pub market_sectors: Vec<String>,
    pub funding_stages: Vec<String>,
    pub latam_vcs: Vec<String>,
    /// Industry substituted into discovery queries.
    pub industry: String,
    /// Reserved. Declared for evaluation stages but not applied by any
    /// scoring code.
    pub scoring_weights: BTreeMap<String, f64>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target_countries: strings(&[
                "Brazil", "Mexico", "Argentina", "Chile", "Colombia", "Peru", "Uruguay",
                "Costa Rica", "Ecuador", "Panama",
            ]),
            ai_technologies: strings(&[
                "Machine Learning",
                "Deep Learning",
                "Natural Language Processing",
                "Computer Vision",
                "Reinforcement Learning",
                "Neural Networks",
                "Generative AI",
                "LLMs",
                "Computer Graphics",
                "Data Analytics",
                "Predictive Analytics",
                "Speech Recognition",
                "Robotics",
                "Autonomous Systems",
                "AI Infrastructure",
                "MLOps",
            ]),
            market_sectors: strings(&[
                "FinTech",
                "HealthTech",
                "EdTech",
                "AgTech",
                "RetailTech",
                "LegalTech",
                "PropTech",
                "InsurTech",
                "LogisticsTech",
                "MarketingTech",
                "HRTech",
                "Gaming",
                "Entertainment",
                "Manufacturing",
                "Energy",
                "Transportation",
                "Security",
            ]),
            funding_stages: strings(&[
                "Pre-Seed", "Seed", "Series A", "Series B", "Series C", "Series D+", "Growth",
                "IPO", "Acquisition",
            ]),
            latam_vcs: strings(&[
                "Kaszek Ventures",
                "Monashees",
                "MAYA Capital",
                "QED Investors",
                "Riverwood Capital",
                "Tiger Global",
                "SoftBank",
                "Andreessen Horowitz",
                "General Atlantic",
                "Goldman Sachs",
                "Sequoia Capital",
                "Battery Ventures",
                "Insight Partners",
            ]),
            industry: "AI".to_string(),
            scoring_weights: BTreeMap::from([
                ("technology_innovation".to_string(), 0.25),
                ("market_potential".to_string(), 0.20),
                ("team_strength".to_string(), 0.20),
                ("funding_attractiveness".to_string(), 0.15),
                ("nvidia_alignment".to_string(), 0.10),
                ("traction".to_string(), 0.10),
            ]),
        }
    }
}

impl DiscoveryConfig {
    /// Countries to run: the requested ones, or the configured targets when
    /// none were named.
    pub fn countries(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            self.target_countries.clone()
        } else {
            requested.to_vec()
        }
    }
}

/// First `limit` entries joined with ", " for prompt templating.
pub fn prompt_list(items: &[String], limit: usize) -> String {
    items
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fixed pauses between calls to external services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Between general discovery searches.
    pub query_delay_ms: u64,
    /// Between searches for a named venture.
    pub venture_query_delay_ms: u64,
    /// Between countries in a multi-country run.
    pub country_delay_secs: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            query_delay_ms: 2000,
            venture_query_delay_ms: 1500,
            country_delay_secs: 30,
        }
    }
}

impl Pacing {
    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            query_delay_ms: 0,
            venture_query_delay_ms: 0,
            country_delay_secs: 0,
        }
    }

    pub fn query_delay(&self) -> Duration {
        Duration::from_millis(self.query_delay_ms)
    }

    pub fn venture_query_delay(&self) -> Duration {
        Duration::from_millis(self.venture_query_delay_ms)
    }

    pub fn country_delay(&self) -> Duration {
        Duration::from_secs(self.country_delay_secs)
    }
}

/// Sleep for `delay`; zero returns immediately.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    /// Tool-use rounds per stage before the agent is asked to conclude.
    pub max_tool_rounds: usize,
    /// Characters of each earlier stage's output passed on as context.
    pub context_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            max_tool_rounds: 8,
            context_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory for per-run reports.
    pub dir: PathBuf,
    /// File-name prefix for reports.
    pub prefix: String,
    pub store_path: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: "nvidia_inception".to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
