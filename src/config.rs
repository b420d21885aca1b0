//! Tool settings
//!
//! Every component receives its section of [`Settings`] through its
//! constructor. Values come from built-in defaults, an optional YAML file
//! (`--config`), and finally CLI overrides.

use crate::providers::LogoProvider;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

/// Root settings document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parallel requests for batch commands
    pub threads: usize,
    /// Directory that receives report files
    pub results_dir: PathBuf,
    pub probe: ProbeConfig,
    pub logo: LogoConfig,
    pub describe: DescribeConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threads: 3,
            results_dir: PathBuf::from("results"),
            probe: ProbeConfig::default(),
            logo: LogoConfig::default(),
            describe: DescribeConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// HTTP probe behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_secs: u64,
    /// Timeout for domains known to answer slowly (`.cn` family)
    pub slow_timeout_secs: u64,
    pub max_redirects: usize,
    /// Retries for transient failures (timeout, connection reset)
    pub retries: u32,
    /// Linear backoff step between retries
    pub backoff_ms: u64,
    pub user_agent: String,
    /// Skip certificate verification; TLS problems are then not reported
    pub accept_invalid_certs: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            slow_timeout_secs: 20,
            max_redirects: 10,
            retries: 2,
            backoff_ms: 500,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_invalid_certs: false,
        }
    }
}

/// Logo lookup and scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoConfig {
    pub timeout_secs: u64,
    pub slow_timeout_secs: u64,
    pub weights: ScoreWeights,
    pub sweet_spot: SizeRange,
    pub acceptable: SizeRange,
    /// Below this many bytes a logo is reported as low quality
    pub low_quality_below: u64,
    /// Above this many bytes a logo is reported as high quality
    pub high_quality_above: u64,
    /// Replaces the built-in provider lists for every domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<LogoProvider>>,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            slow_timeout_secs: 15,
            weights: ScoreWeights::default(),
            sweet_spot: SizeRange {
                min: 1_000,
                max: 20_000,
            },
            acceptable: SizeRange {
                min: 500,
                max: 50_000,
            },
            low_quality_below: 500,
            high_quality_above: 50_000,
            providers: None,
        }
    }
}

/// Empirical scoring points; tunable since their origin is undocumented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub sweet_spot: u32,
    pub acceptable: u32,
    pub fallback: u32,
    /// Points per provider ranked below the candidate's provider
    pub priority_step: u32,
    pub professional: u32,
    pub large_size: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            sweet_spot: 50,
            acceptable: 30,
            fallback: 10,
            priority_step: 5,
            professional: 20,
            large_size: 15,
        }
    }
}

/// Inclusive byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: u64,
    pub max: u64,
}

impl SizeRange {
    pub fn contains(&self, size: u64) -> bool {
        (self.min..=self.max).contains(&size)
    }
}

/// Description extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescribeConfig {
    /// Maximum description length in characters (before the ellipsis)
    pub max_len: usize,
    /// Trailing title fragments stripped from extracted text
    pub boilerplate_suffixes: Vec<String>,
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            max_len: 100,
            boilerplate_suffixes: [
                "Home",
                "Homepage",
                "Home Page",
                "Official Site",
                "Official Website",
                "Welcome",
                "首页",
                "官网",
                "官方网站",
                "主页",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}
