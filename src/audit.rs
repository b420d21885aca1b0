//! Link auditor: probe every entry and classify the answer

use crate::pool::run_bounded;
use crate::probe::{FailureReason, ProbeMode, ProbeResult, Prober};
use crate::report::{Report, ReportEntry};
use crate::schema::{NavigationEntry, Outcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

pub const LINK_CHECK_TOOL: &str = "link_check";

#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub concurrency: usize,
    /// Connectivity only: reachable or unreachable
    pub quick: bool,
    /// Wall-clock budget for the whole run; entries still pending when it
    /// runs out are reported unreachable
    pub deadline: Option<Duration>,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            quick: false,
            deadline: None,
        }
    }
}

/// Outcome for one probe
pub fn classify(probe: &ProbeResult, quick: bool) -> Outcome {
    let Some(status) = probe.status else {
        return Outcome::Unreachable;
    };
    if quick {
        return Outcome::Reachable;
    }
    match status {
        200..=299 => Outcome::Ok,
        300..=399 => Outcome::Redirect,
        400..=499 => Outcome::ClientError,
        500..=599 => Outcome::ServerError,
        _ => Outcome::Unreachable,
    }
}

/// Probe one URL and build its report line
pub async fn check_one(prober: &Prober, entry: &NavigationEntry, quick: bool) -> ReportEntry {
    let mode = if quick { ProbeMode::Quick } else { ProbeMode::Full };
    let probe = prober.run(&entry.url, mode).await;
    report_line(entry, &probe, quick)
}

fn report_line(entry: &NavigationEntry, probe: &ProbeResult, quick: bool) -> ReportEntry {
    let outcome = classify(probe, quick);
    let line = ReportEntry::new(entry, outcome).with_probe(probe);
    match (outcome, probe.status) {
        (Outcome::ClientError | Outcome::ServerError, Some(status)) => {
            line.with_detail(format!("HTTP {}", status))
        }
        _ => line,
    }
}

/// Probe all entries with bounded concurrency.
///
/// Entries appear in the report in input order. Every entry gets exactly
/// one line, even when its probe task dies.
pub async fn audit(prober: &Prober, entries: &[NavigationEntry], options: &AuditOptions) -> Report {
    let total = entries.len();
    let done = Arc::new(AtomicUsize::new(0));
    let deadline = options.deadline.map(|budget| Instant::now() + budget);
    let quick = options.quick;
    let prober = prober.clone();

    let lines = run_bounded(entries.to_vec(), options.concurrency, move |entry| {
        let prober = prober.clone();
        let done = Arc::clone(&done);
        async move {
            let mode = if quick { ProbeMode::Quick } else { ProbeMode::Full };
            let probe = match deadline {
                Some(at) => tokio::time::timeout_at(at, prober.run(&entry.url, mode))
                    .await
                    .unwrap_or_else(|_| {
                        ProbeResult::failed(
                            &entry.url,
                            FailureReason::Timeout,
                            "run deadline reached".to_string(),
                            0,
                        )
                    }),
                None => prober.run(&entry.url, mode).await,
            };
            let line = report_line(&entry, &probe, quick);

            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            let timing = line
                .elapsed_ms
                .map(|ms| format!(" ({} ms)", ms))
                .unwrap_or_default();
            info!("[{}/{}] {} {} {}{}", n, total, line.outcome.symbol(), line.title, line.outcome, timing);
            line
        }
    })
    .await;

    let lines = entries
        .iter()
        .zip(lines)
        .map(|(entry, line)| {
            line.unwrap_or_else(|| {
                ReportEntry::new(entry, Outcome::Unreachable).with_detail("probe task failed")
            })
        })
        .collect();

    Report::new(LINK_CHECK_TOOL, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbeConfig;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober() -> Prober {
        let config = ProbeConfig {
            timeout_secs: 5,
            retries: 0,
            ..ProbeConfig::default()
        };
        Prober::new(&config).unwrap()
    }

    fn entry(title: &str, url: String) -> NavigationEntry {
        NavigationEntry {
            taxonomy: "Dev".to_string(),
            category: "Tools".to_string(),
            title: title.to_string(),
            url,
            logo: None,
            description: None,
            locator: None,
        }
    }

    fn probe_with(status: Option<u16>, chain: &[&str]) -> ProbeResult {
        ProbeResult {
            status,
            redirect_chain: chain.iter().map(|s| s.to_string()).collect(),
            ..ProbeResult::default()
        }
    }

    #[test]
    fn test_classify_status_classes() {
        assert_eq!(classify(&probe_with(Some(200), &[]), false), Outcome::Ok);
        assert_eq!(classify(&probe_with(Some(204), &["a"]), false), Outcome::Ok);
        assert_eq!(classify(&probe_with(Some(304), &[]), false), Outcome::Redirect);
        assert_eq!(classify(&probe_with(Some(404), &[]), false), Outcome::ClientError);
        assert_eq!(classify(&probe_with(Some(503), &[]), false), Outcome::ServerError);
        assert_eq!(classify(&probe_with(None, &[]), false), Outcome::Unreachable);
    }

    #[test]
    fn test_classify_quick() {
        assert_eq!(classify(&probe_with(Some(404), &[]), true), Outcome::Reachable);
        assert_eq!(classify(&probe_with(None, &[]), true), Outcome::Unreachable);
    }

    async fn mixed_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(30)))
            .mount(&server)
            .await;
        Mock::given(path("/moved"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/ok"))
            .mount(&server)
            .await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        server
    }

    fn mixed_entries(base: &str) -> Vec<NavigationEntry> {
        vec![
            entry("Ok", format!("{}/ok", base)),
            entry("Moved", format!("{}/moved", base)),
            entry("Missing", format!("{}/missing", base)),
            entry("Broken", format!("{}/broken", base)),
            entry("Refused", "http://127.0.0.1:1/".to_string()),
        ]
    }

    #[tokio::test]
    async fn test_audit_outcomes_in_input_order() {
        let server = mixed_server().await;
        let entries = mixed_entries(&server.uri());
        let report = audit(&prober(), &entries, &AuditOptions::default()).await;

        let outcomes: Vec<Outcome> = report.entries.iter().map(|e| e.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                Outcome::Ok,
                Outcome::Ok,
                Outcome::ClientError,
                Outcome::ServerError,
                Outcome::Unreachable
            ]
        );
        assert_eq!(report.tool, LINK_CHECK_TOOL);
        assert_eq!(report.total, 5);
        assert!(report.entries[0].elapsed_ms.is_some());
        assert_eq!(report.entries[1].final_url, Some(format!("{}/ok", server.uri())));
        assert_eq!(report.entries[1].status, Some(200));
        assert_eq!(report.entries[1].redirect_chain, vec![format!("{}/moved", server.uri())]);
        assert_eq!(report.entries[2].detail.as_deref(), Some("HTTP 404"));
        assert!(report.entries[4]
            .detail
            .as_deref()
            .is_some_and(|d| d.starts_with("CONNECTION_REFUSED")));
        assert_eq!(report.entries[4].failure, Some(FailureReason::Connection));
        assert_eq!(report.failures.get(&FailureReason::Connection), Some(&1));
        assert_eq!(report.entries[2].failure, None);
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_outcomes() {
        let server = mixed_server().await;
        let entries = mixed_entries(&server.uri());

        let serial = audit(
            &prober(),
            &entries,
            &AuditOptions {
                concurrency: 1,
                ..AuditOptions::default()
            },
        )
        .await;
        let parallel = audit(
            &prober(),
            &entries,
            &AuditOptions {
                concurrency: 5,
                ..AuditOptions::default()
            },
        )
        .await;

        let outcomes = |r: &Report| r.entries.iter().map(|e| (e.url.clone(), e.outcome)).collect::<Vec<_>>();
        assert_eq!(outcomes(&serial), outcomes(&parallel));
        assert_eq!(serial.summary, parallel.summary);
    }

    #[tokio::test]
    async fn test_quick_mode() {
        let server = mixed_server().await;
        let entries = mixed_entries(&server.uri());
        let options = AuditOptions {
            quick: true,
            ..AuditOptions::default()
        };
        let report = audit(&prober(), &entries, &options).await;
        assert_eq!(report.count(Outcome::Reachable), 4);
        assert_eq!(report.count(Outcome::Unreachable), 1);
        assert!(report.entries.iter().all(|e| e.elapsed_ms.is_none()));
    }

    #[tokio::test]
    async fn test_deadline_marks_pending_unreachable() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let entries = vec![entry("Slow", format!("{}/slow", server.uri()))];
        let options = AuditOptions {
            deadline: Some(Duration::from_millis(200)),
            ..AuditOptions::default()
        };
        let report = audit(&prober(), &entries, &options).await;
        assert_eq!(report.entries[0].outcome, Outcome::Unreachable);
        assert!(report.entries[0]
            .detail
            .as_deref()
            .is_some_and(|d| d.contains("run deadline")));
        assert_eq!(report.entries[0].failure, Some(FailureReason::Timeout));
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_unreachable() {
        let entries = vec![entry("Nowhere", "http://nonexistent-host.invalid/".to_string())];
        let report = audit(&prober(), &entries, &AuditOptions::default()).await;
        assert_eq!(report.entries[0].outcome, Outcome::Unreachable);
        assert_eq!(report.entries[0].status, None);
    }

    #[tokio::test]
    async fn test_check_one() {
        let server = mixed_server().await;
        let line = check_one(&prober(), &entry("Ok", format!("{}/ok", server.uri())), false).await;
        assert_eq!(line.outcome, Outcome::Ok);
        assert_eq!(line.status, Some(200));
    }
}
