//! logo command: find, check and maintain entry logos

use crate::cli::{emit, RunContext, RunSummary};
use crate::favicon::LogoFinder;
use crate::pool::run_bounded;
use crate::probe::domain_of;
use crate::report::{self, Report, ReportEntry, ReportFormat};
use crate::schema::{NavigationEntry, Outcome};
use crate::scorer::LogoCandidate;
use crate::store::Webstack;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args)]
pub struct LogoArgs {
    #[command(subcommand)]
    pub command: LogoCommand,
}

#[derive(Subcommand)]
pub enum LogoCommand {
    /// First working logo for a URL or domain
    Get {
        #[arg(value_name = "URL_OR_DOMAIN")]
        target: String,
    },
    /// Ask every provider and pick the best-scoring logo
    GetHq {
        #[arg(value_name = "URL_OR_DOMAIN")]
        target: String,
    },
    /// Validate a logo URL and grade it by size
    Check {
        #[arg(value_name = "LOGO_URL")]
        url: String,
    },
    /// List entries without a logo
    Scan,
    /// Fill in missing logos
    Update {
        /// Score all providers instead of taking the first that works
        #[arg(long)]
        hq: bool,
    },
    /// Validate existing logos and clear broken ones
    Verify,
    /// Write a logo coverage report
    Report {
        #[arg(long, value_enum, default_value = "markdown")]
        format: ReportFormat,

        /// Report file (default: timestamped file in the results directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// `logo get` / `logo get-hq` output
#[derive(Debug, Serialize)]
struct Lookup {
    domain: String,
    logo: Option<LogoCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// Run the logo command
pub async fn run_logo(args: LogoArgs, ctx: &RunContext) -> Result<()> {
    match args.command {
        LogoCommand::Get { target } => lookup(ctx, &target, false).await,
        LogoCommand::GetHq { target } => lookup(ctx, &target, true).await,
        LogoCommand::Check { url } => {
            let finder = finder(ctx)?;
            let inspection = finder.inspect(&url).await;
            if !inspection.check.valid {
                warn!("{} is not a usable logo", url);
            }
            emit(&inspection)
        }
        LogoCommand::Scan => scan(ctx),
        LogoCommand::Update { hq } => update(ctx, hq).await,
        LogoCommand::Verify => verify(ctx).await,
        LogoCommand::Report { format, output } => write_report(ctx, format, output),
    }
}

fn finder(ctx: &RunContext) -> Result<LogoFinder> {
    Ok(LogoFinder::new(&ctx.prober()?, &ctx.settings.logo))
}

async fn lookup(ctx: &RunContext, target: &str, hq: bool) -> Result<()> {
    let domain = domain_of(target).with_context(|| format!("Cannot extract a domain from '{}'", target))?;
    let finder = finder(ctx)?;
    info!("Looking up logo for {}", domain);

    let logo = if hq {
        finder.find_best(&domain).await
    } else {
        finder.find_first(&domain).await
    };
    if logo.is_none() {
        warn!("No provider returned a usable logo for {}", domain);
    }

    emit(&Lookup {
        score: logo
            .as_ref()
            .filter(|_| hq)
            .map(|c| finder.scorer().score(c)),
        error: logo.is_none().then_some("no provider returned a usable logo"),
        domain,
        logo,
    })
}

/// Entries without a logo
fn scan(ctx: &RunContext) -> Result<()> {
    let store = ctx.load_webstack()?;
    let lines: Vec<ReportEntry> = ctx
        .select(missing_logos(&store))
        .iter()
        .map(|entry| {
            let line = ReportEntry::new(entry, Outcome::MissingLogo);
            match domain_of(&entry.url) {
                Some(domain) => line.with_detail(domain),
                None => line,
            }
        })
        .collect();

    info!("{} entries without a logo", lines.len());
    let report = Report::new("logo_scan", lines);
    emit(&RunSummary::new(&report, ctx).entries(&report.entries))
}

fn missing_logos(store: &Webstack) -> Vec<NavigationEntry> {
    store.entries().into_iter().filter(|e| !e.has_logo()).collect()
}

/// Fill in missing logos, one lookup per distinct domain
async fn update(ctx: &RunContext, hq: bool) -> Result<()> {
    let mut store = ctx.load_webstack()?;
    let entries = ctx.select(missing_logos(&store));
    if entries.is_empty() {
        info!("Every entry already has a logo");
    }

    let mut domains: Vec<String> = Vec::new();
    for entry in &entries {
        if let Some(domain) = domain_of(&entry.url) {
            if !domains.contains(&domain) {
                domains.push(domain);
            }
        }
    }
    info!(
        "Looking up logos for {} entries ({} domains, {} parallel)",
        entries.len(),
        domains.len(),
        ctx.threads()
    );

    let finder = Arc::new(finder(ctx)?);
    let found = run_bounded(domains.clone(), ctx.threads(), move |domain| {
        let finder = Arc::clone(&finder);
        async move {
            let logo = if hq {
                finder.find_best(&domain).await
            } else {
                finder.find_first(&domain).await
            };
            match &logo {
                Some(c) => info!("✅ {} -> {} ({})", domain, c.url, c.source),
                None => info!("⚠️ {} -> no logo", domain),
            }
            logo
        }
    })
    .await;

    let lines: Vec<ReportEntry> = entries
        .iter()
        .map(|entry| {
            let logo = domain_of(&entry.url)
                .and_then(|d| domains.iter().position(|known| *known == d))
                .and_then(|idx| found[idx].clone().flatten());
            match (logo, entry.locator) {
                (Some(logo), Some(loc)) => {
                    store.set_logo(&loc, &logo.url);
                    ReportEntry::new(entry, Outcome::Updated).with_detail(logo.url)
                }
                _ => ReportEntry::new(entry, Outcome::Unresolved).with_detail("no usable logo found"),
            }
        })
        .collect();

    let saved = ctx.save(&store)?;
    let report = Report::new("logo_update", lines);
    log_totals(&report, ctx, saved);
    emit(
        &RunSummary::new(&report, ctx)
            .saved(saved)
            .entries(report.entries.iter().filter(|e| e.outcome == Outcome::Updated)),
    )
}

/// Validate every existing logo; broken ones are blanked
async fn verify(ctx: &RunContext) -> Result<()> {
    let mut store = ctx.load_webstack()?;
    let entries: Vec<NavigationEntry> =
        ctx.select(store.entries().into_iter().filter(|e| e.has_logo()).collect());
    info!("Verifying {} logos ({} parallel)", entries.len(), ctx.threads());

    let finder = Arc::new(finder(ctx)?);
    let urls: Vec<String> = entries
        .iter()
        .map(|e| e.logo.clone().unwrap_or_default())
        .collect();
    let checks = run_bounded(urls, ctx.threads(), move |url| {
        let finder = Arc::clone(&finder);
        async move { finder.validate(&url).await }
    })
    .await;

    let lines: Vec<ReportEntry> = entries
        .iter()
        .zip(checks)
        .map(|(entry, check)| match check {
            Some(check) if check.valid => ReportEntry::new(entry, Outcome::Valid),
            Some(check) => {
                warn!("❌ {}: {}", entry.title, check.reason.as_deref().unwrap_or("invalid"));
                if let Some(loc) = &entry.locator {
                    store.clear_logo(loc);
                }
                ReportEntry::new(entry, Outcome::Invalid)
                    .with_detail(check.reason.unwrap_or_else(|| "invalid".to_string()))
            }
            None => ReportEntry::new(entry, Outcome::Unresolved).with_detail("check task failed"),
        })
        .collect();

    let saved = ctx.save(&store)?;
    let report = Report::new("logo_verify", lines);
    log_totals(&report, ctx, saved);
    emit(&RunSummary::new(&report, ctx).saved(saved).entries(report.failed()))
}

fn write_report(ctx: &RunContext, format: ReportFormat, output: Option<PathBuf>) -> Result<()> {
    let store = ctx.load_webstack()?;
    let lines = ctx
        .select(store.entries())
        .iter()
        .map(|entry| match entry.logo.as_deref().filter(|_| entry.has_logo()) {
            Some(logo) => ReportEntry::new(entry, Outcome::HasLogo).with_detail(logo),
            None => ReportEntry::new(entry, Outcome::MissingLogo),
        })
        .collect();

    let report = Report::new("logo_status", lines);
    let path = report::write(&report, format, &ctx.destination(output))?;
    info!(
        "Logo coverage {}/{} written to {}",
        report.count(Outcome::HasLogo),
        report.total,
        path.display()
    );
    emit(&RunSummary::new(&report, ctx).report_file(path))
}

fn log_totals(report: &Report, ctx: &RunContext, saved: bool) {
    let summary: Vec<String> = report
        .summary
        .iter()
        .map(|(outcome, count)| format!("{} {}", count, outcome))
        .collect();
    info!("Done: {}", summary.join(", "));
    if ctx.dry_run {
        info!("Dry run: {} left unchanged", ctx.webstack.display());
    } else if saved {
        info!("Saved {}", ctx.webstack.display());
    }
}
