use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use blogsync::catalog::{BackgroundRefresher, CatalogFetcher, RefreshReport};
use blogsync::config::Config;
use blogsync::feed::{FeedPoller, FeedTask};
use blogsync::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(
    name = "blogsync",
    about = "Synchronizes blog catalogs into a local registry and polls their feeds"
)]
struct Args {
    /// Configuration file
    #[arg(long, value_name = "FILE", default_value = "blogsync.toml")]
    config: PathBuf,

    /// Poll every active blog's feed after refreshing
    #[arg(long)]
    poll: bool,

    /// Keep refreshing every `refresh_interval_minutes` until Ctrl-C
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The blog database is in use by another process.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("blogsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let fetcher = Arc::new(CatalogFetcher::new(
        db.clone(),
        client.clone(),
        config.catalogs.clone(),
        config.fetcher_options(),
    ));

    if let Some(report) = fetcher.refresh().await {
        print_report(&report);
    }

    if args.poll {
        poll_active_blogs(&db, client, &config).await?;
    }

    if args.watch {
        watch(fetcher, &config).await;
    }

    Ok(())
}

fn print_report(report: &RefreshReport) {
    for (category, result) in &report.categories {
        println!("{:<9} {}", category, result);
    }
}

/// Submit every active blog to a feed poller and print what it finds.
async fn poll_active_blogs(db: &Database, client: reqwest::Client, config: &Config) -> Result<()> {
    let blogs = db
        .get_active_blogs()
        .await
        .context("Failed to load active blogs")?;
    tracing::info!(blogs = blogs.len(), "Polling feeds");

    let (poller, mut posts) = FeedPoller::start(client, config.poller_options());

    let printer = tokio::spawn(async move {
        while let Some(post) = posts.recv().await {
            println!(
                "[{}] {} {}",
                post.owner,
                post.item.title,
                post.item.link.as_deref().unwrap_or("")
            );
        }
    });

    for blog in &blogs {
        poller.submit(FeedTask::for_blog(blog)).await?;
    }

    let summary = poller.shutdown().await;
    printer.await.context("Post printer task failed")?;
    println!(
        "Polled {} feeds ({} failed), {} posts found",
        summary.tasks, summary.failed, summary.posts
    );
    Ok(())
}

/// Trigger background refreshes on an interval until Ctrl-C.
async fn watch(fetcher: Arc<CatalogFetcher>, config: &Config) {
    let Some(period) = config.refresh_interval() else {
        tracing::warn!("refresh_interval_minutes is 0, nothing to watch");
        return;
    };

    let refresher = BackgroundRefresher::spawn(fetcher);
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately; the initial refresh already ran.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                refresher.request_refresh();
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    tracing::info!("Shutting down");
    refresher.shutdown().await;
}
