use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use feedmux::config::Config;
use feedmux::feed::FetchParams;
use feedmux::pipe::Pipe;
use feedmux::server::FeedServer;

/// Get the default config file path (~/.config/feedmux/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedmux")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "feedmux", about = "Merge RSS/Atom feeds and serve them over HTTP", version)]
struct Args {
    /// Config file (default: ~/.config/feedmux/config.toml)
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    if config.pipes.is_empty() {
        tracing::warn!(
            path = %config_path.display(),
            "No [[pipe]] tables configured, every path will answer 404"
        );
    }

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(config.user_agent.clone())
        .build()
        .context("Failed to build HTTP client")?;
    let params = FetchParams {
        max_size: config.max_feed_size,
        ..FetchParams::default()
    };

    let mut server = FeedServer::new();
    for pipe_config in &config.pipes {
        let pipe = Arc::new(Pipe::new(pipe_config, client.clone(), params.clone()));
        tracing::info!(
            path = %pipe_config.path,
            sources = pipe.sources().len(),
            "Serving pipe"
        );
        server = server
            .register(&pipe_config.path, move || {
                let pipe = Arc::clone(&pipe);
                async move { pipe.generate().await }
            })
            .with_context(|| format!("Failed to register {}", pipe_config.path))?;
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    };

    server
        .serve(config.listen.as_str(), shutdown)
        .await
        .with_context(|| format!("Server on {} failed", config.listen))?;

    Ok(())
}
