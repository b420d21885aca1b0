//! check-links command: probe every link in the data file
//!
//! One-line JSON summary on stdout, progress on stderr, full report on disk.

use crate::audit::{audit, check_one, AuditOptions};
use crate::cli::{emit, RunContext, RunSummary};
use crate::report::{self, ReportFormat};
use crate::schema::NavigationEntry;
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Args)]
pub struct CheckLinksArgs {
    /// Report format
    #[arg(long, value_enum, default_value = "markdown")]
    pub format: ReportFormat,

    /// Connectivity only (HEAD); no timing or redirect detail
    #[arg(long)]
    pub quick: bool,

    /// Check a single URL and print the result
    #[arg(long)]
    pub url: Option<String>,

    /// List only failing entries on stdout
    #[arg(long)]
    pub failed_only: bool,

    /// Report file (default: timestamped file in the results directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Give up on the whole run after this many seconds
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,
}

/// Run the check-links command
pub async fn run_check_links(args: CheckLinksArgs, ctx: &RunContext) -> Result<()> {
    let prober = ctx.prober()?;

    if let Some(url) = &args.url {
        let entry = NavigationEntry {
            taxonomy: String::new(),
            category: String::new(),
            title: url.clone(),
            url: url.clone(),
            logo: None,
            description: None,
            locator: None,
        };
        let line = check_one(&prober, &entry, args.quick).await;
        info!("{} {} {}", line.outcome.symbol(), url, line.outcome);
        return emit(&line);
    }

    let store = ctx.load_webstack()?;
    let entries = ctx.select(store.entries());
    if entries.is_empty() {
        bail!("No links found in {}", ctx.webstack.display());
    }

    info!(
        "Checking {} links ({} parallel{})",
        entries.len(),
        ctx.threads(),
        if args.quick { ", quick" } else { "" }
    );

    let options = AuditOptions {
        concurrency: ctx.threads(),
        quick: args.quick,
        deadline: args.deadline.map(Duration::from_secs),
    };
    let report = audit(&prober, &entries, &options).await;

    let path = report::write(&report, args.format, &ctx.destination(args.output))?;
    info!(
        "Done: {}/{} OK ({:.1}%), report at {}",
        report.total - report.failed_count(),
        report.total,
        report.success_rate(),
        path.display()
    );

    let summary = RunSummary::new(&report, ctx).report_file(path);
    if args.failed_only {
        emit(&summary.entries(report.failed()))
    } else {
        emit(&summary.entries(&report.entries))
    }
}
