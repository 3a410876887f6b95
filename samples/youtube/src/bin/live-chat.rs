use clap::{Parser, Subcommand};
use eyre::Context;
use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_api_samples::auth::Authorizer;
use youtube_api_samples::chat_poller::{ChatPoller, TokioClock};
use youtube_api_samples::config::AuthSettings;
use youtube_api_samples::scopes::{self, ScopeSet};
use youtube_api_samples::youtube_api::YouTubeClient;

/// Read and write the live chat of your current YouTube broadcast.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    auth: AuthSettings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the live chat id of a video, or of your active broadcast.
    GetId {
        /// Look up the chat of this video instead of your active broadcast.
        #[arg(long)]
        video_id: Option<String>,
    },
    /// Follow a live chat and print each message as it arrives.
    List {
        #[arg(long)]
        video_id: Option<String>,
    },
    /// Post a text message to a live chat.
    Post {
        #[arg(long)]
        video_id: Option<String>,
        message: String,
    },
    /// Delete a live chat message by id.
    Delete { message_id: String },
}

impl Command {
    /// Datastore the cached credential for this command lives under.
    fn datastore(&self) -> &'static str {
        match self {
            Command::GetId { .. } => "getlivechatid",
            Command::List { .. } => "listlivechatmessages",
            Command::Post { .. } => "insertlivechatmessage",
            Command::Delete { .. } => "deletelivechatmessage",
        }
    }

    fn scopes(&self) -> ScopeSet {
        let scope = match self {
            Command::GetId { .. } | Command::List { .. } => scopes::YOUTUBE_READONLY,
            Command::Post { .. } | Command::Delete { .. } => scopes::YOUTUBE_FORCE_SSL,
        };
        [scope].into_iter().collect()
    }
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
    let credential = authorizer
        .authorize(&cli.command.scopes(), cli.command.datastore())
        .await
        .context("authorize with YouTube")?;
    let yt = YouTubeClient::new(
        credential,
        authorizer.provider().clone(),
        reqwest::Client::new(),
    );

    match cli.command {
        Command::GetId { video_id } => match yt.get_live_chat_id(video_id.as_deref()).await? {
            Some(chat_id) => println!("Live chat id: {chat_id}"),
            None => println!("Unable to find active live chat."),
        },
        Command::List { video_id } => {
            let chat_id = require_chat_id(&yt, video_id.as_deref()).await?;
            println!("Live chat id: {chat_id}");
            let poller = ChatPoller::new(yt, TokioClock, std::io::stdout(), chat_id);
            match poller.run().await? {}
        }
        Command::Post { video_id, message } => {
            let chat_id = require_chat_id(&yt, video_id.as_deref()).await?;
            let inserted = yt
                .insert_live_chat_message(&chat_id, &message)
                .await
                .context("post live chat message")?;
            println!("Inserted live chat message {}", inserted.id);
        }
        Command::Delete { message_id } => {
            yt.delete_live_chat_message(&message_id)
                .await
                .context("delete live chat message")?;
            println!("Deleted live chat message {message_id}");
        }
    }

    Ok(())
}

async fn require_chat_id(yt: &YouTubeClient, video_id: Option<&str>) -> eyre::Result<String> {
    yt.get_live_chat_id(video_id)
        .await
        .context("look up live chat id")?
        .ok_or_else(|| match video_id {
            Some(id) => eyre::eyre!("video {id} has no active live chat"),
            None => eyre::eyre!("unable to find an active live broadcast"),
        })
}
