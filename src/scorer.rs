//! Logo candidate scoring
//!
//! Score = size bucket points + provider priority points + professional-service
//! bonus + large-size bonus. Ties go to the provider tried first. The score
//! depends only on the candidate, so selection is reproducible.

use crate::config::{LogoConfig, ScoreWeights, SizeRange};
use crate::providers::LogoProvider;
use serde::Serialize;
use std::cmp::Ordering;

/// One fetched logo considered for selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoCandidate {
    /// Provider name
    pub source: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Position in the provider list, 1-based; lower is preferred
    pub priority_rank: usize,
    /// Length of the provider list the rank refers to
    #[serde(skip)]
    pub provider_count: usize,
    pub professional: bool,
    pub large_size: bool,
}

impl LogoCandidate {
    pub fn from_provider(
        provider: &LogoProvider,
        domain: &str,
        priority_rank: usize,
        provider_count: usize,
        byte_size: Option<u64>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            source: provider.name.to_string(),
            url: provider.url_for(domain),
            byte_size,
            content_type,
            priority_rank,
            provider_count,
            professional: provider.professional,
            large_size: provider.large_size,
        }
    }
}

/// Size-based quality label shown by `logo check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoQuality {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct LogoScorer {
    weights: ScoreWeights,
    sweet_spot: SizeRange,
    acceptable: SizeRange,
    low_quality_below: u64,
    high_quality_above: u64,
}

impl LogoScorer {
    pub fn new(config: &LogoConfig) -> Self {
        Self {
            weights: config.weights,
            sweet_spot: config.sweet_spot,
            acceptable: config.acceptable,
            low_quality_below: config.low_quality_below,
            high_quality_above: config.high_quality_above,
        }
    }

    pub fn score(&self, candidate: &LogoCandidate) -> u32 {
        let mut score = match candidate.byte_size {
            Some(size) if self.sweet_spot.contains(size) => self.weights.sweet_spot,
            Some(size) if self.acceptable.contains(size) => self.weights.acceptable,
            Some(_) => self.weights.fallback,
            None => 0,
        };
        score += self.priority_points(candidate);
        if candidate.professional {
            score += self.weights.professional;
        }
        if candidate.large_size {
            score += self.weights.large_size;
        }
        score
    }

    /// `step` per provider ranked below this one; nothing for the last provider
    /// or for candidates outside the list
    fn priority_points(&self, candidate: &LogoCandidate) -> u32 {
        let below = candidate.provider_count.saturating_sub(candidate.priority_rank);
        u32::try_from(below)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.weights.priority_step)
    }

    /// Candidates serving something other than an image are never selected
    pub fn accepts(&self, candidate: &LogoCandidate) -> bool {
        candidate
            .content_type
            .as_deref()
            .map_or(true, is_image_content_type)
    }

    /// Highest score wins; equal scores go to the lower priority rank
    pub fn select_best<'a>(&self, candidates: &'a [LogoCandidate]) -> Option<&'a LogoCandidate> {
        candidates
            .iter()
            .filter(|c| self.accepts(c))
            .min_by(|a, b| self.compare(a, b))
    }

    fn compare(&self, a: &LogoCandidate, b: &LogoCandidate) -> Ordering {
        self.score(b)
            .cmp(&self.score(a))
            .then(a.priority_rank.cmp(&b.priority_rank))
            .then_with(|| a.url.cmp(&b.url))
    }

    pub fn quality(&self, byte_size: Option<u64>) -> LogoQuality {
        match byte_size {
            Some(size) if size < self.low_quality_below => LogoQuality::Low,
            Some(size) if size > self.high_quality_above => LogoQuality::High,
            _ => LogoQuality::Medium,
        }
    }
}

/// Image types, plus the generic binary type some icon services send
pub fn is_image_content_type(content_type: &str) -> bool {
    let lower = content_type.to_lowercase();
    lower.contains("image/") || lower.contains("application/octet-stream")
}
