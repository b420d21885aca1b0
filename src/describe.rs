//! describe command: fill in entry descriptions from the sites themselves

use crate::cli::{emit, RunContext, RunSummary};
use crate::extract::{decode_html, DescriptionExtractor};
use crate::pool::run_bounded;
use crate::probe::{domain_of, Prober};
use crate::report::{Report, ReportEntry};
use crate::schema::{NavigationEntry, Outcome};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args)]
pub struct DescribeArgs {
    /// Regenerate descriptions that are already set
    #[arg(long)]
    pub all: bool,

    /// Describe a single URL and print the result
    #[arg(long)]
    pub url: Option<String>,
}

/// What a page offered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageText {
    /// Extracted and cleaned description
    Found(String),
    /// Page was readable but had nothing usable
    Empty,
    /// Unreachable, non-2xx or undecodable; the reason
    Failed(String),
}

/// Fetch a page and extract its description
pub async fn describe_page(prober: &Prober, extractor: &DescriptionExtractor, url: &str) -> PageText {
    let page = prober.fetch(url).await;
    if let Some(failure) = page.failure {
        return PageText::Failed(format!("{}: {}", failure, page.error.unwrap_or_default()));
    }
    if !page.is_success() {
        return PageText::Failed(format!("HTTP {}", page.status.unwrap_or_default()));
    }

    let body = page.body.as_deref().unwrap_or_default();
    if let Some(text) = extractor.extract(body, page.charset()) {
        return PageText::Found(text);
    }
    match decode_html(body, page.charset()) {
        Some(_) => PageText::Empty,
        None => PageText::Failed("page could not be decoded".to_string()),
    }
}

/// `"{title} - {domain}"`, or just the domain when there is no title
pub fn fallback_description(title: &str, url: &str) -> String {
    let domain = domain_of(url).unwrap_or_else(|| url.to_string());
    match title.trim() {
        "" => domain,
        title => format!("{} - {}", title, domain),
    }
}

/// New description for an entry; readable pages without text get the fallback
pub async fn describe_entry(
    prober: &Prober,
    extractor: &DescriptionExtractor,
    entry: &NavigationEntry,
) -> Result<String, String> {
    match describe_page(prober, extractor, &entry.url).await {
        PageText::Found(text) => Ok(text),
        PageText::Empty => Ok(fallback_description(&entry.title, &entry.url)),
        PageText::Failed(reason) => Err(reason),
    }
}

#[derive(Debug, Serialize)]
struct SingleUrl<'a> {
    url: &'a str,
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the describe command
pub async fn run_describe(args: DescribeArgs, ctx: &RunContext) -> Result<()> {
    let prober = ctx.prober()?;
    let extractor = DescriptionExtractor::new(&ctx.settings.describe);

    if let Some(url) = &args.url {
        let output = match describe_page(&prober, &extractor, url).await {
            PageText::Found(text) => SingleUrl {
                url,
                description: Some(text),
                error: None,
            },
            PageText::Empty => SingleUrl {
                url,
                description: Some(fallback_description("", url)),
                error: None,
            },
            PageText::Failed(reason) => {
                warn!("{}: {}", url, reason);
                SingleUrl {
                    url,
                    description: None,
                    error: Some(reason),
                }
            }
        };
        return emit(&output);
    }

    let mut store = ctx.load_webstack()?;
    let entries = ctx.select(
        store
            .entries()
            .into_iter()
            .filter(|e| args.all || !e.has_description())
            .collect(),
    );
    info!("Describing {} entries ({} parallel)", entries.len(), ctx.threads());

    let prober = Arc::new(prober);
    let extractor = Arc::new(extractor);
    let total = entries.len();
    let results = run_bounded(entries.clone(), ctx.threads(), move |entry| {
        let prober = Arc::clone(&prober);
        let extractor = Arc::clone(&extractor);
        async move {
            let result = describe_entry(&prober, &extractor, &entry).await;
            match &result {
                Ok(text) => info!("📝 {}: {}", entry.title, text),
                Err(reason) => info!("⚠️ {}: {}", entry.title, reason),
            }
            result
        }
    })
    .await;

    let lines: Vec<ReportEntry> = entries
        .iter()
        .zip(results)
        .map(|(entry, result)| match (result, entry.locator) {
            (Some(Ok(text)), Some(loc)) => {
                store.set_description(&loc, &text);
                ReportEntry::new(entry, Outcome::Updated).with_detail(text)
            }
            (Some(Err(reason)), _) => ReportEntry::new(entry, Outcome::Unresolved).with_detail(reason),
            _ => ReportEntry::new(entry, Outcome::Unresolved).with_detail("describe task failed"),
        })
        .collect();

    let saved = ctx.save(&store)?;
    let report = Report::new("describe", lines);
    info!(
        "Done: {}/{} described{}",
        report.count(Outcome::Updated),
        total,
        if ctx.dry_run { " (dry run, nothing written)" } else { "" }
    );
    emit(
        &RunSummary::new(&report, ctx)
            .saved(saved)
            .entries(&report.entries),
    )
}
