//! Logo lookup: validate icon URLs and find one for a domain

use crate::config::LogoConfig;
use crate::probe::{is_slow_region, Prober};
use crate::providers::{direct_favicon_urls, providers_for, LogoProvider};
use crate::scorer::{is_image_content_type, LogoCandidate, LogoQuality, LogoScorer};
use futures::future::join_all;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Text bodies larger than this are not error stubs, and not icons either
pub const MAX_TEXT_BODY: usize = 10_000;

const ERROR_INDICATORS: [&str; 8] = [
    "404",
    "not found",
    "页面不存在",
    "资源不存在",
    "error",
    "错误",
    "exception",
    "异常",
];

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("link[rel][href]").expect("link selector is valid"));

/// Validation result for one icon URL
#[derive(Debug, Clone, Serialize)]
pub struct LogoCheck {
    pub url: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    /// Why the URL was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LogoCheck {
    fn reject(mut self, reason: impl Into<String>) -> Self {
        self.valid = false;
        self.reason = Some(reason.into());
        self
    }

    fn accept(mut self) -> Self {
        self.valid = true;
        self
    }
}

/// `logo check` output
#[derive(Debug, Clone, Serialize)]
pub struct LogoInspection {
    #[serde(flatten)]
    pub check: LogoCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<LogoQuality>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LogoFinder {
    prober: Prober,
    scorer: LogoScorer,
    low_quality_below: u64,
    providers: Option<Vec<LogoProvider>>,
}

impl LogoFinder {
    pub fn new(prober: &Prober, config: &LogoConfig) -> Self {
        let prober = prober.clone().with_timeouts(
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.slow_timeout_secs),
        );
        Self {
            prober,
            scorer: LogoScorer::new(config),
            low_quality_below: config.low_quality_below,
            providers: config.providers.clone(),
        }
    }

    /// Use a fixed provider list instead of the regional defaults
    pub fn with_providers(mut self, providers: Vec<LogoProvider>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn scorer(&self) -> &LogoScorer {
        &self.scorer
    }

    fn providers(&self, domain: &str) -> &[LogoProvider] {
        self.providers
            .as_deref()
            .unwrap_or_else(|| providers_for(domain))
    }

    /// HEAD must answer 200. Images pass; small HTML/JSON bodies pass unless
    /// they read like an error page.
    pub async fn validate(&self, url: &str) -> LogoCheck {
        let head = self.prober.head(url).await;
        let check = LogoCheck {
            url: url.to_string(),
            valid: false,
            status: head.status,
            content_type: head.content_type.clone(),
            byte_size: head.byte_size(),
            reason: None,
        };

        if let Some(failure) = head.failure {
            return check.reject(format!("{}: {}", failure, head.error.unwrap_or_default()));
        }
        match head.status {
            Some(200) => {}
            Some(status) => return check.reject(format!("HTTP {}", status)),
            None => return check.reject("no response"),
        }

        let content_type = head.content_type.as_deref().unwrap_or("").to_lowercase();
        if is_image_content_type(&content_type) {
            return check.accept();
        }
        if !(content_type.contains("json") || content_type.contains("html")) {
            return check.accept();
        }

        let page = self.prober.fetch(url).await;
        let body = match (page.is_success(), page.body) {
            (true, Some(body)) => body,
            _ => return check.reject(format!("{} body could not be fetched", content_type)),
        };
        let check = LogoCheck {
            byte_size: Some(body.len() as u64),
            ..check
        };
        if body.len() > MAX_TEXT_BODY {
            return check.reject(format!("{} body of {} bytes", content_type, body.len()));
        }
        let text = String::from_utf8_lossy(&body).to_lowercase();
        match ERROR_INDICATORS.iter().find(|marker| text.contains(*marker)) {
            Some(marker) => check.reject(format!("error response ({})", marker)),
            None => check.accept(),
        }
    }

    /// Validate and, when the server did not say, measure the icon
    async fn measure(&self, url: &str) -> LogoCheck {
        let check = self.validate(url).await;
        if !check.valid || check.byte_size.is_some() {
            return check;
        }
        let page = self.prober.fetch(url).await;
        LogoCheck {
            byte_size: page.byte_size(),
            ..check
        }
    }

    /// First provider, in list order, that serves a usable icon
    pub async fn find_first(&self, domain: &str) -> Option<LogoCandidate> {
        let providers = self.providers(domain);
        for (idx, provider) in providers.iter().enumerate() {
            let check = self.validate(&provider.url_for(domain)).await;
            if check.valid {
                debug!("{}: {} answered", domain, provider.name);
                return Some(LogoCandidate::from_provider(
                    provider,
                    domain,
                    idx + 1,
                    providers.len(),
                    check.byte_size,
                    check.content_type,
                ));
            }
            debug!("{}: {} rejected ({})", domain, provider.name, check.reason.unwrap_or_default());
        }

        if is_slow_region(domain) {
            return self.from_site(domain).await;
        }
        None
    }

    /// Ask every provider at once and keep the best-scoring icon
    pub async fn find_best(&self, domain: &str) -> Option<LogoCandidate> {
        let providers = self.providers(domain);
        let checks = join_all(
            providers
                .iter()
                .map(|provider| async move { self.measure(&provider.url_for(domain)).await }),
        )
        .await;

        let candidates: Vec<LogoCandidate> = providers
            .iter()
            .zip(checks)
            .enumerate()
            .filter(|(_, (_, check))| check.valid)
            .map(|(idx, (provider, check))| {
                LogoCandidate::from_provider(
                    provider,
                    domain,
                    idx + 1,
                    providers.len(),
                    check.byte_size,
                    check.content_type,
                )
            })
            .collect();

        if let Some(best) = self.scorer.select_best(&candidates) {
            debug!("{}: best of {} candidates is {} (score {})", domain, candidates.len(), best.source, self.scorer.score(best));
            return Some(best.clone());
        }
        self.find_first(domain).await
    }

    /// Icons served by the site itself: well-known paths, then `<link rel=icon>`
    pub async fn from_site(&self, domain: &str) -> Option<LogoCandidate> {
        let count = self.providers(domain).len();
        let site = |url: String, check: LogoCheck| LogoCandidate {
            source: "site".to_string(),
            url,
            byte_size: check.byte_size,
            content_type: check.content_type,
            priority_rank: count + 1,
            provider_count: count,
            professional: false,
            large_size: false,
        };

        for url in direct_favicon_urls(domain) {
            let check = self.validate(&url).await;
            if check.valid {
                return Some(site(url, check));
            }
        }

        for scheme in ["https", "http"] {
            let home = self.prober.fetch(&format!("{}://{}", scheme, domain)).await;
            let (Some(body), Some(final_url)) = (home.body.as_deref(), home.final_url.as_deref()) else {
                continue;
            };
            if !home.is_success() {
                continue;
            }
            let Ok(base) = Url::parse(final_url) else {
                continue;
            };
            for url in icon_links(&String::from_utf8_lossy(body), &base) {
                let check = self.validate(&url).await;
                if check.valid {
                    return Some(site(url, check));
                }
            }
        }
        None
    }

    /// Validate a logo URL and grade it by size
    pub async fn inspect(&self, url: &str) -> LogoInspection {
        let check = self.measure(url).await;
        let mut warnings = Vec::new();
        let quality = check.valid.then(|| self.scorer.quality(check.byte_size));

        if let Some(ct) = check.content_type.as_deref().filter(|ct| !is_image_content_type(ct)) {
            warnings.push(format!("content type {} is not an image", ct));
        }
        if quality == Some(LogoQuality::Low) {
            warnings.push(format!("icon is smaller than {} bytes", self.low_quality_below));
        }
        LogoInspection {
            check,
            quality,
            warnings,
        }
    }
}

/// Absolute icon URLs declared by `<link rel="... icon ...">`, in page order
pub fn icon_links(html: &str, base: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&LINK_SELECTOR)
        .filter(|el| {
            el.value()
                .attr("rel")
                .is_some_and(|rel| rel.to_lowercase().contains("icon"))
        })
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(|url| url.to_string())
        .collect()
}
