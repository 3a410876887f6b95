//! YouTube Data API v3 client.
//!
//! Only the live streaming surface the sample programs need is modeled: live chat
//! messages, live broadcasts, and the live streaming details of videos.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use youtube_api_samples::auth::Authorizer;
//! use youtube_api_samples::config::AuthSettings;
//! use youtube_api_samples::scopes::{self, ScopeSet};
//! use youtube_api_samples::youtube_api::YouTubeClient;
//!
//! # async fn example(settings: AuthSettings) -> eyre::Result<()> {
//! let authorizer = Authorizer::from_settings(&settings)?;
//! let scopes: ScopeSet = [scopes::YOUTUBE_READONLY].into_iter().collect();
//! let credential = authorizer.authorize(&scopes, "getlivechatid").await?;
//!
//! let client = YouTubeClient::new(
//!     credential,
//!     authorizer.provider().clone(),
//!     reqwest::Client::new(),
//! );
//! if let Some(chat_id) = client.get_live_chat_id(None).await? {
//!     println!("Live chat id: {chat_id}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod broadcasts;
pub mod chat;
pub mod client;
pub mod types;
pub mod videos;

pub use client::YouTubeClient;
pub use types::{PageInfo, PagedStream};

pub use broadcasts::{
    BroadcastLifeCycleStatus, BroadcastPrivacyStatus, LiveBroadcast, LiveBroadcastSnippet,
    LiveBroadcastStatus,
};

pub use chat::{
    LiveChatMessage, LiveChatMessageAuthor, LiveChatMessageListResponse, LiveChatMessageSnippet,
    SuperChatDetails, render_message,
};

pub use videos::{LiveStreamingDetails, Video};
