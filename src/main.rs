use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::info;

use txbridge::agent::SyncAgent;
use txbridge::config::Config;
use txbridge::zendesk::ListQuery;

/// txbridge - sync Zendesk Help Center content with a Transifex project
#[derive(Parser, Debug)]
#[command(name = "txbridge", version, about)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "txbridge.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show per-article sync standing for one listing page
    Status {
        /// Listing page to inspect
        #[arg(long)]
        page: Option<u32>,
    },
    /// Upload source articles to Transifex
    Push {
        /// Push a single article by id
        #[arg(long, conflicts_with = "page")]
        article: Option<u64>,
        /// Push one listing page (defaults to the first)
        #[arg(long)]
        page: Option<u32>,
    },
    /// Download completed translations for one article
    Pull {
        #[arg(long)]
        article: u64,
    },
    /// Run periodic push and pull passes until interrupted
    Watch {
        /// Override the configured interval
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();
    let config = Config::from_file(&args.config)?;
    let configured_interval = config.sync.watch_interval_secs;

    let mut agent = SyncAgent::new(config)?;
    info!(run_id = %agent.run_id(), "🔁 txbridge starting");
    agent.bootstrap().await?;

    match args.command {
        Command::Status { page } => {
            let query = with_page(agent.query_from_config(), page);
            let rows = agent.status_page(&query).await?;
            print_json(&rows)?;
        }
        Command::Push { article: Some(id), .. } => {
            let outcome = agent.push_article_by_id(id).await?;
            print_json(&serde_json::json!({ "article": id, "outcome": outcome }))?;
        }
        Command::Push { page, .. } => {
            let query = with_page(agent.query_from_config(), page);
            let report = agent.push_page(&query).await?;
            print_json(&report)?;
        }
        Command::Pull { article } => {
            let report = agent.pull_article(article).await?;
            print_json(&report)?;
        }
        Command::Watch { interval_secs } => {
            let secs = interval_secs.unwrap_or(configured_interval);
            agent.watch(Duration::from_secs(secs)).await?;
        }
    }

    Ok(())
}

fn with_page(mut query: ListQuery, page: Option<u32>) -> ListQuery {
    query.page = page;
    query
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
