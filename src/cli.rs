//! Flags shared by every command and the run context built from them

use crate::config::Settings;
use crate::probe::{FailureReason, Prober};
use crate::report::{Destination, Report, ReportEntry};
use crate::schema::{NavigationEntry, Outcome};
use crate::store::Webstack;
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Navigation data file
    #[arg(long, global = true, default_value = "data/webstack.yml", env = "WEBSTACK_FILE")]
    pub webstack: PathBuf,

    /// Show what would change without writing the data file
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Parallel requests (1-32)
    #[arg(short = 't', long, global = true, value_parser = clap::value_parser!(u16).range(1..=32))]
    pub threads: Option<u16>,

    /// Process at most this many entries
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Settings file (YAML)
    #[arg(long, global = true, env = "WEBSTACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for report files
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,
}

/// Settings and flags resolved once per invocation
#[derive(Debug, Clone)]
pub struct RunContext {
    pub settings: Settings,
    pub webstack: PathBuf,
    pub dry_run: bool,
    pub limit: Option<usize>,
}

impl RunContext {
    /// Defaults, then the settings file, then CLI flags
    pub fn from_args(args: &CommonArgs) -> Result<Self> {
        let mut settings = Settings::load(args.config.as_deref())?;
        if let Some(threads) = args.threads {
            settings.threads = threads as usize;
        }
        if let Some(dir) = &args.results_dir {
            settings.results_dir = dir.clone();
        }

        Ok(Self {
            settings,
            webstack: args.webstack.clone(),
            dry_run: args.dry_run,
            limit: args.limit,
        })
    }

    pub fn threads(&self) -> usize {
        self.settings.threads.clamp(1, 32)
    }

    pub fn load_webstack(&self) -> Result<Webstack> {
        Webstack::load(&self.webstack)
            .with_context(|| format!("Cannot load navigation data from {}", self.webstack.display()))
    }

    /// Apply `--limit`
    pub fn select(&self, entries: Vec<NavigationEntry>) -> Vec<NavigationEntry> {
        match self.limit {
            Some(limit) => entries.into_iter().take(limit).collect(),
            None => entries,
        }
    }

    pub fn prober(&self) -> Result<Prober> {
        Prober::new(&self.settings.probe).context("Failed to build HTTP client")
    }

    /// `--output` when given, else a timestamped file in the results dir
    pub fn destination(&self, output: Option<PathBuf>) -> Destination {
        match output {
            Some(path) => Destination::File(path),
            None => Destination::Dir(self.settings.results_dir.clone()),
        }
    }

    /// Persist store changes unless this is a dry run; returns whether the file was written
    pub fn save(&self, store: &Webstack) -> Result<bool> {
        if self.dry_run || !store.is_dirty() {
            return Ok(false);
        }
        store.save()?;
        Ok(true)
    }
}

/// One-line stdout summary of a batch run
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub tool: &'a str,
    pub total: usize,
    pub summary: &'a BTreeMap<Outcome, usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: &'a BTreeMap<FailureReason, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
    pub dry_run: bool,
    /// Whether the data file was rewritten
    pub saved: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<&'a ReportEntry>,
}

impl<'a> RunSummary<'a> {
    pub fn new(report: &'a Report, ctx: &RunContext) -> Self {
        Self {
            tool: &report.tool,
            total: report.total,
            summary: &report.summary,
            failures: &report.failures,
            report: None,
            dry_run: ctx.dry_run,
            saved: false,
            entries: Vec::new(),
        }
    }

    pub fn report_file(mut self, path: PathBuf) -> Self {
        self.report = Some(path);
        self
    }

    pub fn saved(mut self, saved: bool) -> Self {
        self.saved = saved;
        self
    }

    pub fn entries(mut self, entries: impl IntoIterator<Item = &'a ReportEntry>) -> Self {
        self.entries = entries.into_iter().collect();
        self
    }
}

/// Print a compact JSON document to stdout
pub fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
