//! Feedback Triage CLI
//!
//! The `feedback-triage` command reads every comment of a Reddit thread,
//! files Jira tickets for the complaints it finds and mails a digest of
//! whatever went wrong.
//!
//! ## Commands
//!
//! - `run`: triage one submission
//! - `show-config`: print the effective configuration, secrets redacted

mod config;
mod dry_run;
mod report;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use triage_clients::{EmailNotifier, JiraClient, RedditClient, TextAnalyticsClient};
use triage_core::{
    Collaborators, LogFormat, LogNotifier, Notifier, Orchestrator, TicketTracker,
};

use crate::config::RunArgs;
use crate::dry_run::DryRunTracker;

#[derive(Parser)]
#[command(name = "feedback-triage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn complaint comments on a Reddit thread into Jira tickets", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage every comment of a submission
    Run(RunArgs),

    /// Print the effective configuration with secrets redacted
    ShowConfig(RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    triage_core::init_tracing(LogFormat::from_json_flag(cli.json_logs), level);

    match cli.command {
        Commands::Run(args) => cmd_run(&args).await,
        Commands::ShowConfig(args) => cmd_show_config(&args),
    }
}

fn build_collaborators(args: &RunArgs) -> Result<Collaborators> {
    let threads = RedditClient::new(args.reddit_config()?)
        .context("Failed to create Reddit client")?;
    let language = TextAnalyticsClient::new(args.azure_config()?)
        .context("Failed to create Azure AI Language client")?;
    let jira = JiraClient::new(args.jira_config()?).context("Failed to create Jira client")?;

    let tracker: Arc<dyn TicketTracker> = if args.dry_run {
        warn!("dry run: tickets will not be created");
        Arc::new(DryRunTracker::new(Arc::new(jira)))
    } else {
        Arc::new(jira)
    };

    let notifier: Arc<dyn Notifier> = match args.email_config()? {
        Some(email) => Arc::new(
            EmailNotifier::new(email).context("Failed to create e-mail notifier")?,
        ),
        None => {
            info!("no e-mail connection string configured, the digest will be logged");
            Arc::new(LogNotifier)
        }
    };

    Ok(Collaborators::new(
        Arc::new(threads),
        tracker,
        Arc::new(language),
        notifier,
    ))
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let clients = build_collaborators(args)?;
    let orchestrator = Orchestrator::new(clients, args.tuning.pipeline_config())
        .context("Invalid pipeline configuration")?;

    let report = orchestrator
        .run(&args.submission_id)
        .await
        .with_context(|| format!("Triage run for submission {} failed", args.submission_id))?;

    if args.json {
        println!("{}", report::render_json(&report)?);
    } else {
        print!("{}", report::render_text(&report));
    }
    Ok(())
}

fn cmd_show_config(args: &RunArgs) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&args.redacted())
        .context("Failed to serialize configuration")?;
    println!("{rendered}");
    Ok(())
}
