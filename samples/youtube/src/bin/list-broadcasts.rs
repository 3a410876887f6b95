use clap::Parser;
use eyre::Context;
use std::io::IsTerminal;
use tokio_stream::StreamExt;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_api_samples::auth::Authorizer;
use youtube_api_samples::config::AuthSettings;
use youtube_api_samples::scopes::{self, ScopeSet};
use youtube_api_samples::youtube_api::YouTubeClient;

/// List every live broadcast on your channel.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    auth: AuthSettings,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();

    let authorizer = Authorizer::from_settings(&cli.auth)?;
    let scopes: ScopeSet = [scopes::YOUTUBE_READONLY].into_iter().collect();
    let credential = authorizer
        .authorize(&scopes, "listbroadcasts")
        .await
        .context("authorize with YouTube")?;
    let yt = YouTubeClient::new(
        credential,
        authorizer.provider().clone(),
        reqwest::Client::new(),
    );

    println!("================== Returned Broadcasts ==================");
    let mut broadcasts = std::pin::pin!(yt.list_my_live_broadcasts());
    while let Some(broadcast) = broadcasts.next().await {
        let broadcast = broadcast.context("fetch broadcast")?;
        println!("  - Id: {}", broadcast.id);
        println!("  - Title: {}", broadcast.snippet.title);
        if let Some(status) = &broadcast.status {
            println!("  - Status: {}", status.life_cycle_status);
        }
        if let Some(start) = broadcast.snippet.scheduled_start_time {
            println!("  - Scheduled start: {start}");
        }
        println!();
    }

    Ok(())
}
