//! webstack CLI
//!
//! Maintenance tools for a webstack navigation data file: link health,
//! logos and descriptions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use webstack_tools::check_links::{run_check_links, CheckLinksArgs};
use webstack_tools::cli::{CommonArgs, RunContext};
use webstack_tools::describe::{run_describe, DescribeArgs};
use webstack_tools::logo::{run_logo, LogoArgs};

#[derive(Parser)]
#[command(name = "webstack")]
#[command(version)]
#[command(about = "Maintenance tools for a webstack navigation data file")]
#[command(long_about = "Keeps a webstack.yml navigation file healthy.\n\nCommands:\n  check-links   Probe every link and write a report\n  logo          Find, check and maintain logos\n  describe      Fill in descriptions from the sites themselves")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the health of every link, or of a single URL
    CheckLinks(CheckLinksArgs),
    /// Find, check and maintain entry logos
    Logo(LogoArgs),
    /// Generate descriptions for entries that have none
    Describe(DescribeArgs),
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
            0 => EnvFilter::new("webstack_tools=info,warn"),
            1 => EnvFilter::new("webstack_tools=debug,info"),
            _ => EnvFilter::new("trace"),
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let ctx = RunContext::from_args(&cli.common)?;
    match cli.command {
        Commands::CheckLinks(args) => run_check_links(args, &ctx).await,
        Commands::Logo(args) => run_logo(args, &ctx).await,
        Commands::Describe(args) => run_describe(args, &ctx).await,
    }
}
