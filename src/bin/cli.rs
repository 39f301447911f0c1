//! techpost CLI
//!
//! Manual crawl trigger and post actions. For the daily run, use
//! `techpost-scheduler`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use techpost::{
    cache::{CacheCoordinator, MemoryCache},
    crawlers::CrawlerRegistry,
    error::Result,
    models::{Config, PostId},
    pipeline::CrawlOrchestrator,
    posts::PostService,
    storage::{CommentId, LocalPostStore, PostStore, SearchQuery},
    trigger::{self, TriggerResponse},
    utils::http,
};

/// techpost - Tech Blog Aggregator
#[derive(Parser, Debug)]
#[command(
    name = "techpost",
    version,
    about = "Tech blog aggregator with cached like counts and rankings"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the storage directory from the configuration
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every configured source
    CrawlAll,

    /// Crawl a single source by name
    Crawl {
        #[arg(long)]
        source: String,
    },

    /// List configured sources
    Sources,

    /// Show the most liked posts
    Top {
        #[arg(short, default_value_t = 10)]
        n: usize,
    },

    /// Search posts by keyword and source
    Search {
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        size: usize,
    },

    /// Show like and comment counts for a post
    Counts { id: PostId },

    /// Like a post
    Like {
        id: PostId,
        #[arg(long)]
        user: String,
    },

    /// Withdraw a like
    Unlike {
        id: PostId,
        #[arg(long)]
        user: String,
    },

    /// Comment on a post
    Comment {
        id: PostId,
        #[arg(long)]
        user: String,
        #[arg(long)]
        body: String,
    },

    /// Remove a comment from a post
    Uncomment { id: PostId, comment_id: CommentId },

    /// Delete a post with its likes and comments
    Delete { id: PostId },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a trigger response and exit non-zero on failure.
fn finish(response: TriggerResponse) -> Result<()> {
    print_json(&response.body)?;
    if !response.is_success() {
        std::process::exit(if response.status == trigger::BAD_REQUEST { 2 } else { 1 });
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK ({} sources)", config.sources.len());
        return Ok(());
    }
    config.validate()?;

    let data_dir = cli.data_dir.unwrap_or_else(|| config.storage.data_dir.clone());
    let store: Arc<dyn PostStore> = Arc::new(LocalPostStore::open(&data_dir).await?);
    log::debug!("Using storage at {}", data_dir.display());

    let coordinator = Arc::new(CacheCoordinator::with_backend(
        Arc::new(MemoryCache::new()),
        store.clone(),
        &config.cache,
    ));

    let client = http::create_async_client(&config.crawler)?;
    let registry = CrawlerRegistry::from_config(&config, client)?;
    let orchestrator = CrawlOrchestrator::new(
        registry,
        store.clone(),
        coordinator.clone(),
        &config.crawler,
    );
    let posts = PostService::new(store, coordinator);

    match cli.command {
        Command::CrawlAll => finish(trigger::crawl_all(&orchestrator).await)?,
        Command::Crawl { source } => finish(trigger::crawl_source(&orchestrator, &source).await)?,
        Command::Sources => finish(trigger::sources(&orchestrator))?,

        Command::Top { n } => print_json(&posts.popular(n).await?)?,
        Command::Search {
            keyword,
            source,
            page,
            size,
        } => {
            let query = SearchQuery {
                keyword,
                source,
                page,
                size,
            };
            print_json(&posts.search(&query).await?)?
        }
        Command::Counts { id } => print_json(&posts.counts(id).await?)?,

        Command::Like { id, user } => {
            let added = posts.like(id, &user).await?;
            log::info!("{}", if added { "Liked" } else { "Already liked" });
        }
        Command::Unlike { id, user } => {
            let removed = posts.unlike(id, &user).await?;
            log::info!("{}", if removed { "Unliked" } else { "No like to remove" });
        }
        Command::Comment { id, user, body } => {
            print_json(&posts.add_comment(id, &user, &body).await?)?
        }
        Command::Uncomment { id, comment_id } => {
            let removed = posts.remove_comment(id, comment_id).await?;
            log::info!("{}", if removed { "Comment removed" } else { "No such comment" });
        }
        Command::Delete { id } => {
            let deleted = posts.delete_post(id).await?;
            log::info!("{}", if deleted { "Post deleted" } else { "No such post" });
        }

        Command::Validate => {}
    }

    Ok(())
}
