use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leadscope_classify::{leads_to_csv, parse_title, CategoryScorer, KeywordTable};
use leadscope_sync::{load_latest_run, load_run, SyncConfig, SyncPipeline};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "leadscope-cli")]
#[command(about = "Leadscope profile lead finder")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run every enabled query once and write a report run.
    Sync,
    /// Score a single search result without touching the network.
    Classify {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        snippet: String,
    },
    /// Write a run's leads as CSV. Defaults to the newest run.
    Export {
        #[arg(long)]
        run: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => sync().await?,
        Commands::Classify { title, snippet } => classify(&title, &snippet)?,
        Commands::Export { run, out } => export(run.as_deref(), &out)?,
        Commands::Serve => leadscope_web::serve_from_env().await?,
    }

    Ok(())
}

async fn sync() -> Result<()> {
    let pipeline = Arc::new(SyncPipeline::new(SyncConfig::from_env())?);
    let summary = pipeline.run_once().await?;
    println!(
        "sync complete: run_id={} queries={} failed={} candidates={} leads={} reports={}",
        summary.run_id,
        summary.enabled_queries,
        summary.failed_queries,
        summary.candidates,
        summary.unique_leads,
        summary.reports_dir
    );

    if let Some(sched) = pipeline.maybe_build_scheduler().await? {
        sched.start().await.context("starting scheduler")?;
        info!(cron = %pipeline.config().sync_cron, "scheduler running; ctrl-c to stop");
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}

fn classify(title: &str, snippet: &str) -> Result<()> {
    let root = SyncConfig::from_env().workspace_root;
    let rules_path = root.join("rules").join("categories.yaml");
    let table = KeywordTable::load_or_default(&rules_path)
        .with_context(|| format!("loading keyword table {}", rules_path.display()))?;
    let scorer = CategoryScorer::new(table);

    let parsed = parse_title(title);
    let classification = scorer.score(title, snippet);
    println!("name:       {}", parsed.name);
    println!("headline:   {}", parsed.headline);
    println!("category:   {}", classification.category);
    println!("confidence: {}", classification.confidence);
    for (category, score) in classification.scores.iter() {
        println!("  {category}: {score}");
    }
    Ok(())
}

fn export(run: Option<&str>, out: &std::path::Path) -> Result<()> {
    let root = SyncConfig::from_env().workspace_root;
    let delta = match run {
        Some(run_id) => load_run(&root, run_id)?,
        None => load_latest_run(&root)?.context("no runs found under reports/")?,
    };
    let csv = leads_to_csv(&delta.leads).context("rendering leads csv")?;
    std::fs::write(out, csv)
        .with_context(|| format!("writing {}", out.display()))?;
    println!(
        "exported {} leads from run {} to {}",
        delta.leads.len(),
        delta.run.run_id,
        out.display()
    );
    Ok(())
}
