//! Reports: per-entry outcomes plus summary counts, rendered as Markdown,
//! JSON or plain text.
//!
//! Rendering is pure; [`write`] is the only function that touches the disk
//! and it writes exactly one new file.

use crate::error::ReportError;
use crate::probe::{FailureReason, ProbeResult};
use crate::schema::{NavigationEntry, Outcome};
use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Markdown,
    Json,
    Text,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
        }
    }
}

/// One line of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub title: String,
    pub url: String,
    /// "Taxonomy > Term"
    pub category: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub redirect_chain: Vec<String>,
    /// Why no HTTP answer came back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// Error text, logo URL, new description ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReportEntry {
    pub fn new(entry: &NavigationEntry, outcome: Outcome) -> Self {
        Self {
            title: entry.title.clone(),
            url: entry.url.clone(),
            category: entry.group_label(),
            outcome,
            status: None,
            elapsed_ms: None,
            final_url: None,
            redirect_chain: Vec::new(),
            failure: None,
            detail: None,
        }
    }

    /// Copy status, timing and redirect data from a probe
    pub fn with_probe(mut self, probe: &ProbeResult) -> Self {
        self.status = probe.status;
        self.elapsed_ms = probe.elapsed_ms;
        self.redirect_chain = probe.redirect_chain.clone();
        self.failure = probe.failure;
        self.final_url = probe
            .final_url
            .clone()
            .filter(|_| probe.was_redirected());
        if let (Some(reason), Some(error)) = (probe.failure, &probe.error) {
            self.detail = Some(format!("{}: {}", reason, error));
        }
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Result of one tool run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    /// Count per outcome; always matches `entries`
    pub summary: BTreeMap<Outcome, usize>,
    /// Count per failure reason among entries that got no HTTP answer
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<FailureReason, usize>,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn new(tool: impl Into<String>, entries: Vec<ReportEntry>) -> Self {
        Self::at(tool, entries, Utc::now())
    }

    pub fn at(tool: impl Into<String>, entries: Vec<ReportEntry>, generated_at: DateTime<Utc>) -> Self {
        let mut summary = BTreeMap::new();
        let mut failures = BTreeMap::new();
        for entry in &entries {
            *summary.entry(entry.outcome).or_insert(0) += 1;
            if let Some(reason) = entry.failure {
                *failures.entry(reason).or_insert(0) += 1;
            }
        }
        Self {
            tool: tool.into(),
            generated_at,
            total: entries.len(),
            summary,
            failures,
            entries,
        }
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.summary.get(&outcome).copied().unwrap_or(0)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Share of entries that did not fail, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total - self.failed_count()) as f64 / self.total as f64 * 100.0
    }

    fn local_time(&self) -> String {
        self.generated_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

/// Where a report goes
#[derive(Debug, Clone)]
pub enum Destination {
    /// Timestamped file inside this directory
    Dir(PathBuf),
    /// Exact file path
    File(PathBuf),
}

pub fn render(report: &Report, format: ReportFormat) -> Result<String, ReportError> {
    Ok(match format {
        ReportFormat::Markdown => render_markdown(report),
        ReportFormat::Json => serde_json::to_string_pretty(report)?,
        ReportFormat::Text => render_text(report),
    })
}

/// Render and write one file; returns its path
pub fn write(report: &Report, format: ReportFormat, destination: &Destination) -> Result<PathBuf, ReportError> {
    let content = render(report, format)?;
    let path = match destination {
        Destination::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_dir(parent)?;
            }
            path.clone()
        }
        Destination::Dir(dir) => {
            create_dir(dir)?;
            unique_path(dir, &report_file_name(report, format))
        }
    };

    std::fs::write(&path, content).map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// `{tool}_{YYYYmmdd_HHMMSS}.{ext}`
pub fn report_file_name(report: &Report, format: ReportFormat) -> String {
    format!(
        "{}_{}.{}",
        report.tool,
        report.generated_at.with_timezone(&Local).format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

fn create_dir(dir: &Path) -> Result<(), ReportError> {
    std::fs::create_dir_all(dir).map_err(|source| ReportError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Never overwrite an earlier report from the same second
fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, ""));
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn render_markdown(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} report", report.tool);
    let _ = writeln!(out);
    let _ = writeln!(out, "**Generated**: {}", report.local_time());
    let _ = writeln!(out, "**ISO time**: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Total**: {}", report.total);
    for (outcome, count) in &report.summary {
        let _ = writeln!(out, "- **{}**: {}", outcome, count);
        if *outcome == Outcome::Unreachable {
            for (reason, count) in &report.failures {
                let _ = writeln!(out, "  - {}: {}", reason, count);
            }
        }
    }
    let _ = writeln!(out, "- **Success rate**: {:.1}%", report.success_rate());
    let _ = writeln!(out);

    if report.failed_count() > 0 {
        let _ = writeln!(out, "## Failures");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Site | Category | URL | Outcome | Detail |");
        let _ = writeln!(out, "|------|----------|-----|---------|--------|");
        for entry in report.failed() {
            let status = entry
                .status
                .map(|s| format!(" (HTTP {})", s))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "| {} | {} | {} | {}{} | {} |",
                cell(&entry.title),
                cell(&entry.category),
                cell(&entry.url),
                entry.outcome,
                status,
                cell(entry.detail.as_deref().unwrap_or("")),
            );
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Details");
    let _ = writeln!(out);
    for (category, entries) in group_by_category(&report.entries) {
        let label = if category.is_empty() { "Uncategorized" } else { category };
        let _ = writeln!(out, "### {}", label);
        let _ = writeln!(out);
        for entry in entries {
            let timing = entry
                .elapsed_ms
                .map(|ms| format!(" ({} ms)", ms))
                .unwrap_or_default();
            let redirect = entry
                .final_url
                .as_ref()
                .map(|u| format!(" → [{}]({})", u, u))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "- {} **{}** - [{}]({}){}{}",
                entry.outcome.symbol(),
                entry.title,
                entry.url,
                entry.url,
                timing,
                redirect
            );
            if let Some(detail) = &entry.detail {
                let _ = writeln!(out, "  - {}", detail);
            }
        }
        let _ = writeln!(out);
    }
    out
}

fn render_text(report: &Report) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{} report", report.tool);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Generated: {}", report.local_time());
    let _ = writeln!(out);
    let _ = writeln!(out, "Total: {}", report.total);
    for (outcome, count) in &report.summary {
        let _ = writeln!(out, "  {}: {}", outcome, count);
        if *outcome == Outcome::Unreachable {
            for (reason, count) in &report.failures {
                let _ = writeln!(out, "    {}: {}", reason, count);
            }
        }
    }
    let _ = writeln!(out, "Success rate: {:.1}%", report.success_rate());
    let _ = writeln!(out);

    if report.failed_count() > 0 {
        let _ = writeln!(out, "Failures:");
        let _ = writeln!(out, "{}", "-".repeat(40));
        for entry in report.failed() {
            let _ = writeln!(out, "* {} ({})", entry.title, entry.url);
            let _ = writeln!(
                out,
                "  {} - {}",
                entry.outcome,
                entry.detail.as_deref().unwrap_or("no detail")
            );
        }
    }
    out
}

/// Categories in order of first appearance
fn group_by_category(entries: &[ReportEntry]) -> Vec<(&str, Vec<&ReportEntry>)> {
    let mut groups: Vec<(&str, Vec<&ReportEntry>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(c, _)| *c == entry.category) {
            Some((_, list)) => list.push(entry),
            None => groups.push((entry.category.as_str(), vec![entry])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(title: &str, category: &str, outcome: Outcome) -> ReportEntry {
        ReportEntry {
            title: title.to_string(),
            url: format!("https://{}.example", title.to_lowercase()),
            category: category.to_string(),
            outcome,
            status: None,
            elapsed_ms: None,
            final_url: None,
            redirect_chain: Vec::new(),
            failure: None,
            detail: None,
        }
    }

    fn unreachable(title: &str, reason: FailureReason) -> ReportEntry {
        ReportEntry {
            failure: Some(reason),
            detail: Some(format!("{}: gave up", reason)),
            ..entry(title, "Misc", Outcome::Unreachable)
        }
    }

    fn sample() -> Report {
        let mut broken = entry("Broken", "Dev > Tools", Outcome::ClientError);
        broken.status = Some(404);
        broken.detail = Some("HTTP 404".to_string());
        Report::at(
            "link_check",
            vec![
                entry("Alpha", "Dev > Hosting", Outcome::Ok),
                entry("Beta", "Dev > Hosting", Outcome::Redirect),
                broken,
                entry("Gamma", "Dev > Tools", Outcome::Ok),
            ],
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_summary_partitions_entries() {
        let report = sample();
        assert_eq!(report.total, 4);
        assert_eq!(report.count(Outcome::Ok), 2);
        assert_eq!(report.count(Outcome::Redirect), 1);
        assert_eq!(report.count(Outcome::ClientError), 1);
        assert_eq!(report.count(Outcome::Unreachable), 0);
        assert_eq!(report.summary.values().sum::<usize>(), report.entries.len());
        assert!((report.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    fn with_failures() -> Report {
        let mut entries = sample().entries;
        entries.push(unreachable("Slow", FailureReason::Timeout));
        entries.push(unreachable("Slower", FailureReason::Timeout));
        entries.push(unreachable("Cert", FailureReason::Tls));
        entries.push(unreachable("Gone", FailureReason::Dns));
        Report::new("link_check", entries)
    }

    #[test]
    fn test_json_round_trip_keeps_summary() {
        let report = with_failures();
        let json = render(&report, ReportFormat::Json).unwrap();
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.summary, report.summary);
        assert_eq!(parsed.failures, report.failures);
        assert_eq!(parsed.entries, report.entries);
        assert!(json.contains("\"client_error\": 1"));
        assert!(json.contains("\"unreachable\": 4"));
        assert!(json.contains("\"timeout\": 2"));
        assert!(json.contains("\"tls\": 1"));
        assert!(json.contains("\"dns\": 1"));
    }

    #[test]
    fn test_unreachable_breakdown_in_summaries() {
        let report = with_failures();
        assert_eq!(report.failures.get(&FailureReason::Timeout), Some(&2));
        assert_eq!(report.failures.values().sum::<usize>(), report.count(Outcome::Unreachable));

        let md = render(&report, ReportFormat::Markdown).unwrap();
        assert!(md.contains("- **unreachable**: 4\n  - TIMEOUT: 2\n  - DNS_FAILED: 1\n  - SSL_ERROR: 1\n"));

        let text = render(&report, ReportFormat::Text).unwrap();
        assert!(text.contains("  unreachable: 4\n    TIMEOUT: 2\n"));
    }

    #[test]
    fn test_no_breakdown_without_failures() {
        let json = render(&sample(), ReportFormat::Json).unwrap();
        assert!(!json.contains("\"failures\""));
    }

    #[test]
    fn test_markdown_sections() {
        let md = render(&sample(), ReportFormat::Markdown).unwrap();
        assert!(md.starts_with("# link_check report"));
        assert!(md.contains("| Broken | Dev > Tools | https://broken.example | client_error (HTTP 404) | HTTP 404 |"));
        let hosting = md.find("### Dev > Hosting").unwrap();
        let tools = md.find("### Dev > Tools").unwrap();
        assert!(hosting < tools);
    }

    #[test]
    fn test_text_lists_failures() {
        let text = render(&sample(), ReportFormat::Text).unwrap();
        assert!(text.contains("Failures:"));
        assert!(text.contains("* Broken (https://broken.example)"));
        assert!(!text.contains("* Alpha"));
    }

    #[test]
    fn test_empty_report() {
        let report = Report::new("logo_status", Vec::new());
        assert_eq!(report.success_rate(), 0.0);
        assert!(render(&report, ReportFormat::Text).unwrap().contains("Total: 0"));
    }

    #[test]
    fn test_write_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let destination = Destination::Dir(dir.path().join("results"));
        let report = sample();

        let first = write(&report, ReportFormat::Markdown, &destination).unwrap();
        let second = write(&report, ReportFormat::Markdown, &destination).unwrap();
        assert_ne!(first, second);
        assert!(first.file_name().unwrap().to_string_lossy().starts_with("link_check_"));
        assert!(second.exists());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        let written = write(&sample(), ReportFormat::Json, &Destination::File(path.clone())).unwrap();
        assert_eq!(written, path);
        let parsed: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.total, 4);
    }
}
