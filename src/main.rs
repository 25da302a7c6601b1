use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use feedcrawl::config::Config;
use feedcrawl::engine::{CrawlEngine, FeedSelector};
use feedcrawl::output::{write_output, OutputFormat};
use feedcrawl::storage::{Category, FeedDefinition, FeedRegistry, FeedUpdate, MetricsStore};

#[derive(Parser, Debug)]
#[command(name = "feedcrawl", about = "Collect yesterday's AI news from RSS/Atom feeds")]
struct Args {
    /// Crawler configuration file
    #[arg(long, global = true, value_name = "FILE", default_value = "config/crawler.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate feeds, crawl them and write the output collection
    Crawl {
        /// Feed selector: all, general, specialized or korean
        #[arg(long = "type", default_value = "all")]
        feed_type: FeedSelector,

        /// Maximum entries kept per feed
        #[arg(long, default_value_t = 5)]
        max: usize,

        /// Output shape: rss or simple
        #[arg(long, default_value = "rss")]
        format: OutputFormat,
    },
    /// Probe every feed and heal redirected URLs
    Validate,
    /// Manage the feed registry
    Feeds {
        #[command(subcommand)]
        action: FeedsAction,
    },
    /// Show per-feed health counters
    Metrics,
}

#[derive(Subcommand, Debug)]
enum FeedsAction {
    /// List registered feeds
    List,
    /// Add or overwrite a feed
    Add {
        name: String,
        url: String,
        #[arg(long, default_value = "general")]
        category: Category,
        #[arg(long, default_value = "tech")]
        content_type: String,
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(long, default_value = "daily")]
        update_frequency: String,
    },
    /// Remove a feed, searching every category unless one is given
    Remove {
        name: String,
        #[arg(long)]
        category: Option<Category>,
    },
    /// Change fields of an existing feed
    Update {
        name: String,
        #[arg(long)]
        category: Category,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        update_frequency: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;

    match args.command {
        Command::Crawl {
            feed_type,
            max,
            format,
        } => crawl(config, feed_type, max, format).await,
        Command::Validate => validate(config).await,
        Command::Feeds { action } => feeds(&config, action),
        Command::Metrics => metrics(&config),
    }
}

async fn crawl(
    config: Config,
    selector: FeedSelector,
    max: usize,
    format: OutputFormat,
) -> Result<()> {
    let output_dir = config.output_dir.clone();
    let mut engine = CrawlEngine::open(config).context("Failed to start crawl engine")?;

    let entries = engine.crawl(selector, Some(max)).await;
    let path = write_output(&output_dir, Utc::now().date_naive(), &entries, format)
        .context("Failed to write crawl output")?;

    println!("Collected {} items", entries.len());
    println!("Saved to {}", path.display());
    Ok(())
}

async fn validate(config: Config) -> Result<()> {
    let mut engine = CrawlEngine::open(config).context("Failed to start crawl engine")?;
    let report = engine.validate().await;

    for (category, names) in &report.invalid {
        for name in names {
            println!("invalid  {category:<12} {name}");
        }
    }
    for (category, names) in &report.updated {
        for name in names {
            println!("updated  {category:<12} {name}");
        }
    }
    println!(
        "{} valid, {} invalid, {} updated",
        report.valid_count(),
        report.invalid_count(),
        report.updated_count()
    );
    Ok(())
}

fn feeds(config: &Config, action: FeedsAction) -> Result<()> {
    let mut registry = FeedRegistry::load(&config.feeds_file).with_context(|| {
        format!(
            "Failed to load feed registry '{}'",
            config.feeds_file.display()
        )
    })?;

    match action {
        FeedsAction::List => {
            if registry.is_empty() {
                println!("No feeds registered in {}", registry.path().display());
            }
            for feed in registry.iter() {
                println!(
                    "{:<12} {:<30} {:<6} {}",
                    feed.category, feed.name, feed.language, feed.url
                );
            }
        }
        FeedsAction::Add {
            name,
            url,
            category,
            content_type,
            language,
            update_frequency,
        } => {
            let feed = FeedDefinition {
                content_type,
                language,
                update_frequency,
                ..FeedDefinition::new(name, url, category)
            };
            registry.add(feed).context("Failed to save feed registry")?;
            println!("Feed added");
        }
        FeedsAction::Remove { name, category } => {
            match registry
                .remove(&name, category)
                .context("Failed to save feed registry")?
            {
                Some(cat) => println!("Removed {name} from {cat}"),
                None => println!("No feed named {name}"),
            }
        }
        FeedsAction::Update {
            name,
            category,
            url,
            content_type,
            language,
            update_frequency,
        } => {
            let changes = FeedUpdate {
                url,
                content_type,
                language,
                update_frequency,
            };
            if changes.is_empty() {
                anyhow::bail!("Nothing to update: pass at least one field");
            }
            if registry
                .update(&name, category, changes)
                .context("Failed to save feed registry")?
            {
                println!("Updated {name}");
            } else {
                println!("No feed named {name} in {category}");
            }
        }
    }
    Ok(())
}

fn metrics(config: &Config) -> Result<()> {
    let store = MetricsStore::load(&config.metrics_file).with_context(|| {
        format!(
            "Failed to load metrics '{}'",
            config.metrics_file.display()
        )
    })?;

    if store.is_empty() {
        println!("No metrics recorded yet");
        return Ok(());
    }

    for (name, m) in store.iter() {
        let rate = m
            .success_rate()
            .map(|r| format!("{:.0}%", r * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<30} {:>5} ok/{:<5} {:>5} avg {:>8.0} ms",
            name, m.successful_requests, m.total_requests, rate, m.avg_response_time_ms
        );
    }
    Ok(())
}
