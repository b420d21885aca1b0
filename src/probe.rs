//! HTTP probe
//!
//! One request (plus retries) against one URL. Redirects are followed by
//! hand so every hop can be recorded. Network trouble never escapes as an
//! error: it comes back as a [`ProbeResult`] with a [`FailureReason`].

use crate::config::ProbeConfig;
use crate::retry::{next_delay, RetryPolicy};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error as _;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Country-code suffixes whose sites tend to answer slowly from abroad
const SLOW_REGION_SUFFIXES: [&str; 6] = [".cn", ".com.cn", ".net.cn", ".org.cn", ".gov.cn", ".edu.cn"];

/// Why a probe produced no HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    Dns,
    /// Refused or otherwise failed to connect
    Connection,
    /// Connection dropped mid-exchange
    ConnectionReset,
    Tls,
    RedirectLoop,
    TooManyRedirects,
    InvalidUrl,
    Other,
}

impl FailureReason {
    /// Worth another attempt after a pause
    pub fn is_transient(self) -> bool {
        matches!(self, FailureReason::Timeout | FailureReason::ConnectionReset)
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::Timeout => "TIMEOUT",
            FailureReason::Dns => "DNS_FAILED",
            FailureReason::Connection => "CONNECTION_REFUSED",
            FailureReason::ConnectionReset => "CONNECTION_RESET",
            FailureReason::Tls => "SSL_ERROR",
            FailureReason::RedirectLoop => "REDIRECT_LOOP",
            FailureReason::TooManyRedirects => "TOO_MANY_REDIRECTS",
            FailureReason::InvalidUrl => "INVALID_URL",
            FailureReason::Other => "NETWORK_ERROR",
        };
        f.write_str(s)
    }
}

/// Outcome of probing one URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeResult {
    /// URL as given by the caller
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Duration of the last attempt; omitted in quick mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    /// URLs that answered with a redirect, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_chain: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    /// Whether the final URL was served over TLS; omitted in quick mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip)]
    pub body: Option<Vec<u8>>,
    pub attempts: u32,
}

impl ProbeResult {
    pub fn failed(url: &str, reason: FailureReason, error: String, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            failure: Some(reason),
            error: Some(error),
            attempts,
            ..Self::default()
        }
    }

    /// The server answered 2xx (after redirects)
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }

    pub fn was_redirected(&self) -> bool {
        !self.redirect_chain.is_empty()
    }

    /// `charset=` parameter of the Content-Type header
    pub fn charset(&self) -> Option<&str> {
        let content_type = self.content_type.as_deref()?;
        content_type.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"'))
        })
    }

    /// Body size: header value, else the captured body length
    pub fn byte_size(&self) -> Option<u64> {
        self.content_length
            .filter(|len| *len > 0)
            .or_else(|| self.body.as_ref().map(|b| b.len() as u64))
    }
}

/// What to send and what to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// GET; status, timing, redirects and TLS detail; body discarded
    Full,
    /// HEAD (GET when HEAD is refused); connectivity only
    Quick,
    /// HEAD; headers only, used for logo checks
    Head,
    /// GET; keeps the body
    Fetch,
}

struct Answer {
    status: StatusCode,
    final_url: Url,
    chain: Vec<String>,
    content_type: Option<String>,
    content_length: Option<u64>,
    body: Option<Vec<u8>>,
}

type Failure = (FailureReason, String);

/// Reusable prober; clones share the HTTP client
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    timeout: Duration,
    slow_timeout: Duration,
    max_redirects: usize,
    retry: RetryPolicy,
}

impl Prober {
    pub fn new(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .redirect(Policy::none())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
            slow_timeout: Duration::from_secs(config.slow_timeout_secs),
            max_redirects: config.max_redirects,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Same client with different per-attempt timeouts
    pub fn with_timeouts(mut self, timeout: Duration, slow_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.slow_timeout = slow_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Budget for one attempt on `url`, redirects and body included
    pub fn timeout_for(&self, url: &Url) -> Duration {
        match url.host_str() {
            Some(host) if is_slow_region(host) => self.slow_timeout,
            _ => self.timeout,
        }
    }

    /// Full probe: GET, follow redirects, record timing and TLS
    pub async fn probe(&self, url: &str) -> ProbeResult {
        self.run(url, ProbeMode::Full).await
    }

    /// Connectivity-only probe
    pub async fn probe_quick(&self, url: &str) -> ProbeResult {
        self.run(url, ProbeMode::Quick).await
    }

    /// HEAD request keeping headers
    pub async fn head(&self, url: &str) -> ProbeResult {
        self.run(url, ProbeMode::Head).await
    }

    /// GET request keeping the body
    pub async fn fetch(&self, url: &str) -> ProbeResult {
        self.run(url, ProbeMode::Fetch).await
    }

    pub async fn run(&self, raw_url: &str, mode: ProbeMode) -> ProbeResult {
        let start_url = match normalize_url(raw_url) {
            Ok(u) => u,
            Err(e) => {
                return ProbeResult::failed(raw_url, FailureReason::InvalidUrl, e.to_string(), 0)
            }
        };
        let timeout = self.timeout_for(&start_url);

        let mut attempts = 0;
        loop {
            attempts += 1;
            let started = Instant::now();
            // One budget for the whole attempt: every hop plus the body
            let answer = tokio::time::timeout(timeout, self.attempt(&start_url, mode))
                .await
                .unwrap_or_else(|_| {
                    Err((
                        FailureReason::Timeout,
                        format!("No complete answer within {:?}", timeout),
                    ))
                });
            let elapsed = started.elapsed();

            match answer {
                Ok(answer) => return into_result(raw_url, answer, elapsed, mode, attempts),
                Err((reason, error)) => match next_delay(&self.retry, attempts, reason) {
                    Some(delay) => {
                        debug!("{} failed ({}), retrying in {:?}", raw_url, reason, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => return ProbeResult::failed(raw_url, reason, error, attempts),
                },
            }
        }
    }

    async fn attempt(&self, url: &Url, mode: ProbeMode) -> Result<Answer, Failure> {
        match mode {
            ProbeMode::Quick => {
                let answer = self.follow(url, Method::HEAD, false).await?;
                if matches!(
                    answer.status,
                    StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
                ) {
                    return self.follow(url, Method::GET, false).await;
                }
                Ok(answer)
            }
            ProbeMode::Head => self.follow(url, Method::HEAD, false).await,
            ProbeMode::Full => self.follow(url, Method::GET, false).await,
            ProbeMode::Fetch => self.follow(url, Method::GET, true).await,
        }
    }

    async fn follow(
        &self,
        start: &Url,
        method: Method,
        capture_body: bool,
    ) -> Result<Answer, Failure> {
        let mut method = method;
        let mut current = start.clone();
        let mut chain = Vec::new();
        let mut visited = HashSet::from([current.to_string()]);

        loop {
            let response = self
                .client
                .request(method.clone(), current.clone())
                .send()
                .await
                .map_err(|e| classify_error(&e))?;

            let status = response.status();
            if status.is_redirection() {
                if let Some(next) = redirect_target(&current, &response) {
                    if chain.len() >= self.max_redirects {
                        return Err((
                            FailureReason::TooManyRedirects,
                            format!("More than {} redirects", self.max_redirects),
                        ));
                    }
                    if !visited.insert(next.to_string()) {
                        return Err((
                            FailureReason::RedirectLoop,
                            format!("Redirect loop at {}", next),
                        ));
                    }
                    if status == StatusCode::SEE_OTHER && method != Method::HEAD {
                        method = Method::GET;
                    }
                    chain.push(current.to_string());
                    current = next;
                    continue;
                }
            }

            let content_type = header_str(&response, CONTENT_TYPE.as_str());
            let content_length =
                header_str(&response, CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok());
            let body = if capture_body {
                let bytes = response.bytes().await.map_err(|e| classify_error(&e))?;
                Some(bytes.to_vec())
            } else {
                None
            };

            return Ok(Answer {
                status,
                final_url: current,
                chain,
                content_type,
                content_length,
                body,
            });
        }
    }
}

fn into_result(url: &str, answer: Answer, elapsed: Duration, mode: ProbeMode, attempts: u32) -> ProbeResult {
    let quick = mode == ProbeMode::Quick;
    ProbeResult {
        url: url.to_string(),
        status: Some(answer.status.as_u16()),
        failure: None,
        error: None,
        elapsed_ms: (!quick).then(|| elapsed.as_millis() as u64),
        redirect_chain: if quick { Vec::new() } else { answer.chain },
        secure: (!quick).then(|| answer.final_url.scheme() == "https"),
        final_url: Some(answer.final_url.to_string()),
        content_type: answer.content_type,
        content_length: answer.content_length,
        body: answer.body,
        attempts,
    }
}

fn header_str(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

/// Parse a data-file URL, defaulting to https when the scheme is missing
pub fn normalize_url(raw: &str) -> Result<Url, url::ParseError> {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("https://{}", raw))
    }
}

/// Host of a URL or bare domain, lowercased, without `www.`
pub fn domain_of(url_or_domain: &str) -> Option<String> {
    let url = normalize_url(url_or_domain).ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    (!host.is_empty()).then_some(host)
}

pub fn is_slow_region(host: &str) -> bool {
    let host = host.to_lowercase();
    SLOW_REGION_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

fn classify_error(error: &reqwest::Error) -> Failure {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }

    let reason = if error.is_builder() {
        FailureReason::InvalidUrl
    } else {
        classify_message(&message, error.is_timeout(), error.is_connect())
    };
    (reason, message)
}

/// Map an error description (with its source chain) to a reason
fn classify_message(message: &str, is_timeout: bool, is_connect: bool) -> FailureReason {
    let lower = message.to_lowercase();
    if is_timeout || lower.contains("timed out") {
        FailureReason::Timeout
    } else if lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
        || lower.contains("nodename nor servname")
    {
        FailureReason::Dns
    } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        FailureReason::Tls
    } else if lower.contains("connection reset")
        || lower.contains("broken pipe")
        || lower.contains("connection closed")
        || lower.contains("incomplete message")
    {
        FailureReason::ConnectionReset
    } else if is_connect || lower.contains("connection refused") {
        FailureReason::Connection
    } else {
        FailureReason::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober() -> Prober {
        let config = ProbeConfig {
            timeout_secs: 5,
            slow_timeout_secs: 5,
            retries: 0,
            ..ProbeConfig::default()
        };
        Prober::new(&config).unwrap()
    }

    #[test]
    fn test_classify_message() {
        assert_eq!(
            classify_message("error sending request: dns error: failed to lookup address", false, true),
            FailureReason::Dns
        );
        assert_eq!(
            classify_message("tcp connect error: Connection refused (os error 111)", false, true),
            FailureReason::Connection
        );
        assert_eq!(
            classify_message("invalid peer certificate: UnknownIssuer", false, true),
            FailureReason::Tls
        );
        assert_eq!(
            classify_message("connection reset by peer", false, false),
            FailureReason::ConnectionReset
        );
        assert_eq!(classify_message("whatever", true, false), FailureReason::Timeout);
        assert_eq!(classify_message("random error", false, false), FailureReason::Other);
    }

    #[test]
    fn test_normalize_url_adds_scheme() {
        assert_eq!(normalize_url("example.com").unwrap().as_str(), "https://example.com/");
        assert_eq!(normalize_url(" http://a.org/x ").unwrap().as_str(), "http://a.org/x");
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://www.GitHub.com/foo").as_deref(), Some("github.com"));
        assert_eq!(domain_of("baidu.com").as_deref(), Some("baidu.com"));
        assert_eq!(domain_of("http://"), None);
    }

    #[test]
    fn test_slow_region() {
        assert!(is_slow_region("www.example.com.cn"));
        assert!(is_slow_region("gov.cn"));
        assert!(!is_slow_region("example.com"));
        assert!(!is_slow_region("cnn.com"));
    }

    #[test]
    fn test_charset_and_size() {
        let result = ProbeResult {
            content_type: Some("text/html; charset=\"GBK\"".to_string()),
            body: Some(vec![0; 42]),
            ..ProbeResult::default()
        };
        assert_eq!(result.charset(), Some("GBK"));
        assert_eq!(result.byte_size(), Some(42));
    }

    #[tokio::test]
    async fn test_probe_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let result = prober().probe(&server.uri()).await;
        assert_eq!(result.status, Some(200));
        assert!(result.is_success());
        assert!(result.elapsed_ms.is_some());
        assert_eq!(result.secure, Some(false));
        assert!(result.body.is_none());
        assert!(!result.was_redirected());
    }

    #[tokio::test]
    async fn test_probe_records_redirect_chain() {
        let server = MockServer::start().await;
        Mock::given(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/middle"))
            .mount(&server)
            .await;
        Mock::given(path("/middle"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let url = format!("{}/old", server.uri());
        let result = prober().probe(&url).await;
        assert_eq!(result.status, Some(200));
        assert_eq!(
            result.redirect_chain,
            vec![url.clone(), format!("{}/middle", server.uri())]
        );
        assert_eq!(result.final_url, Some(format!("{}/new", server.uri())));
    }

    #[tokio::test]
    async fn test_timeout_covers_whole_redirect_chain() {
        let server = MockServer::start().await;
        for i in 0..3 {
            Mock::given(path(format!("/hop{}", i)))
                .respond_with(
                    ResponseTemplate::new(302)
                        .insert_header("Location", format!("/hop{}", i + 1))
                        .set_delay(Duration::from_millis(600)),
                )
                .mount(&server)
                .await;
        }
        Mock::given(path("/hop3"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(600)))
            .mount(&server)
            .await;

        let config = ProbeConfig {
            timeout_secs: 1,
            retries: 0,
            ..ProbeConfig::default()
        };
        let started = Instant::now();
        let result = Prober::new(&config)
            .unwrap()
            .probe(&format!("{}/hop0", server.uri()))
            .await;

        assert_eq!(result.failure, Some(FailureReason::Timeout));
        assert_eq!(result.status, None);
        assert!(started.elapsed() < Duration::from_millis(1_800));
    }

    #[tokio::test]
    async fn test_probe_redirect_loop() {
        let server = MockServer::start().await;
        Mock::given(path("/a"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/b"))
            .mount(&server)
            .await;
        Mock::given(path("/b"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/a"))
            .mount(&server)
            .await;

        let result = prober().probe(&format!("{}/a", server.uri())).await;
        assert_eq!(result.failure, Some(FailureReason::RedirectLoop));
        assert_eq!(result.status, None);
    }

    #[tokio::test]
    async fn test_probe_redirect_limit() {
        let server = MockServer::start().await;
        for i in 0..5 {
            Mock::given(path(format!("/{}", i)))
                .respond_with(
                    ResponseTemplate::new(302).insert_header("Location", format!("/{}", i + 1)),
                )
                .mount(&server)
                .await;
        }

        let config = ProbeConfig {
            max_redirects: 2,
            retries: 0,
            ..ProbeConfig::default()
        };
        let result = Prober::new(&config)
            .unwrap()
            .probe(&format!("{}/0", server.uri()))
            .await;
        assert_eq!(result.failure, Some(FailureReason::TooManyRedirects));
    }

    #[tokio::test]
    async fn test_http_errors_are_terminal() {
        let server = MockServer::start().await;
        Mock::given(path("/gone"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let config = ProbeConfig {
            retries: 3,
            backoff_ms: 1,
            ..ProbeConfig::default()
        };
        let result = Prober::new(&config)
            .unwrap()
            .probe(&format!("{}/gone", server.uri()))
            .await;
        assert_eq!(result.status, Some(503));
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
            .mount(&server)
            .await;

        let config = ProbeConfig {
            retries: 1,
            backoff_ms: 1,
            ..ProbeConfig::default()
        };
        let prober = Prober::new(&config)
            .unwrap()
            .with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
        let result = prober.probe(&format!("{}/slow", server.uri())).await;
        assert_eq!(result.failure, Some(FailureReason::Timeout));
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn test_connection_refused_is_value() {
        let result = prober().probe("http://127.0.0.1:1/").await;
        assert_eq!(result.failure, Some(FailureReason::Connection));
        assert!(result.error.is_some());
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_quick_mode_falls_back_to_get() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = prober().probe_quick(&server.uri()).await;
        assert_eq!(result.status, Some(200));
        assert_eq!(result.elapsed_ms, None);
        assert_eq!(result.secure, None);
    }

    #[tokio::test]
    async fn test_fetch_keeps_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<title>x</title>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let result = prober().fetch(&server.uri()).await;
        assert_eq!(result.body.as_deref(), Some(&b"<title>x</title>"[..]));
        assert_eq!(result.charset(), Some("utf-8"));
    }
}
