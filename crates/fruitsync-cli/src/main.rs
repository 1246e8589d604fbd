use anyhow::{anyhow, bail, Context};
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fruitsync::{Command, Config, OutputFormat};
use fruitsync_client::FruityviceClient;
use fruitsync_core::sync::ERROR_SEPARATOR;
use fruitsync_core::{load_config, Entity, FileConfig, Reconciler, RunLog, RunSummary};
use fruitsync_db::FruitRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::parse();

    // Setup logging (stderr to keep stdout clean for JSON output)
    let level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let file_config =
        load_config(config.config.as_deref()).map_err(|e| anyhow!(e.user_message()))?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(file_config.db_config().max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let repo = FruitRepository::new(pool);

    match config.command {
        Command::Sync => {
            sync(&config, &file_config, repo).await?;
        }
        Command::Logs {
            limit,
            pending,
            format,
        } => {
            show_logs(&repo, limit, pending, format).await?;
        }
        Command::Stats => {
            show_stats(&repo).await?;
        }
    }

    Ok(())
}

/// Run one reconciliation pass against the configured API
async fn sync(
    config: &Config,
    file_config: &FileConfig,
    repo: FruitRepository,
) -> anyhow::Result<()> {
    repo.seed_statuses()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    let source = config.source_config(file_config);
    info!("Starting sync from: {}", source.base_url);

    let client = FruityviceClient::with_config(&source, &file_config.http_config())
        .map_err(|e| anyhow!(e.user_message()))?;

    let reconciler = Reconciler::new(client, repo);
    let summary = reconciler
        .run()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    print_summary(&summary);

    if !summary.logged() {
        bail!("Sync completed but the run log could not be written");
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\nSync finished: {}\n", summary.status);
    println!("  Records fetched:  {}", summary.records);
    println!();
    println!("  {:<12} {:>9} {:>9}", "Entity", "Inserted", "Updated");
    for entity in Entity::PIPELINE {
        let counts = summary.counters.get(entity);
        println!(
            "  {:<12} {:>9} {:>9}",
            entity.label(),
            counts.inserted,
            counts.updated
        );
    }

    if !summary.error_message.is_empty() {
        println!("\n  Errors:");
        for message in summary.error_message.split(ERROR_SEPARATOR) {
            println!("    - {}", message);
        }
    }
    if let Some(id) = summary.log_id {
        println!("\n  Run log:          {}", id);
    }
    println!();
}

/// Show recent run logs
async fn show_logs(
    repo: &FruitRepository,
    limit: usize,
    pending: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let logs = repo
        .recent_logs(limit, pending)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&logs)?);
        }
        OutputFormat::Table => {
            if logs.is_empty() {
                eprintln!("No runs found.");
                return Ok(());
            }
            print_log_table(&logs);
        }
    }

    Ok(())
}

fn print_log_table(logs: &[RunLog]) {
    println!(
        "{:<20} {:<18} {:>11} {:>11} {:>8} {:>8}",
        "Date", "Status", "Fruits +/~", "Genera +/~", "Errors", "Notified"
    );
    for log in logs {
        let errors = if log.error_message.is_empty() {
            0
        } else {
            log.error_message.split(ERROR_SEPARATOR).count()
        };
        println!(
            "{:<20} {:<18} {:>11} {:>11} {:>8} {:>8}",
            log.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            log.status,
            format!("{}/{}", log.fruits_inserted, log.fruits_updated),
            format!("{}/{}", log.genera_inserted, log.genera_updated),
            errors,
            if log.notification_sent { "yes" } else { "no" }
        );
    }
}

/// Show database statistics
async fn show_stats(repo: &FruitRepository) -> anyhow::Result<()> {
    let stats = repo
        .get_stats()
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    println!("\nDatabase Statistics\n");
    println!("  Fruits:        {}", stats.fruits);
    println!("  Genera:        {}", stats.genera);
    println!("  Families:      {}", stats.families);
    println!("  Orders:        {}", stats.orders);
    println!("  Nutritions:    {}", stats.nutritions);
    println!("  Runs logged:   {}", stats.runs);
    if let Some(last_run) = stats.last_run {
        println!("  Last run:      {}", last_run);
    }
    println!();

    Ok(())
}
