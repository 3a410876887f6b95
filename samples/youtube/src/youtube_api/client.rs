//! Core YouTube API client functionality and authentication management.

use crate::credential::Credential;
use crate::error::Error;
use crate::oauth::OAuthManager;
use crate::youtube_api::{
    broadcasts::{LiveBroadcast, LiveBroadcastListResponse},
    chat::{
        LIVE_CHAT_FIELDS, LIVE_CHAT_PARTS, LiveChatMessage, LiveChatMessageInsert,
        LiveChatMessageListResponse,
    },
    types::PagedStream,
    videos::VideoListResponse,
};
use eyre::Context;
use http::{Method, StatusCode};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::Stream;
use tracing::instrument;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Client for the YouTube Data API v3.
///
/// Wraps a [`Credential`] and attaches it to every request. Expired access tokens are
/// refreshed through the [`OAuthManager`] before the request goes out. Cloning is cheap
/// and clones share the credential.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    credential: Arc<Mutex<Credential>>,
    oauth_manager: Arc<OAuthManager>,
    client: reqwest::Client,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(
        credential: Credential,
        oauth_manager: Arc<OAuthManager>,
        client: reqwest::Client,
    ) -> Self {
        Self::with_base_url(credential, oauth_manager, client, API_BASE)
    }

    /// Like [`YouTubeClient::new`], but sends requests to `base_url` instead of
    /// `https://www.googleapis.com/youtube/v3`.
    pub fn with_base_url(
        credential: Credential,
        oauth_manager: Arc<OAuthManager>,
        client: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            credential: Arc::new(Mutex::new(credential)),
            oauth_manager,
            client,
            base_url: base_url.into(),
        }
    }

    /// Gets a guaranteed-fresh access token, refreshing if necessary.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut credential = self.credential.lock().await;

        if credential.is_expired(Timestamp::now()) {
            tracing::debug!("access token expired, attempting refresh");
            let Some(refresh_token) = credential.refresh_token().map(str::to_string) else {
                eyre::bail!("access token expired and no refresh token is available");
            };
            match self
                .oauth_manager
                .refresh_token(&refresh_token)
                .await
                .context("refresh OAuth token")?
            {
                Some(new_token) => {
                    credential.apply_refresh(new_token);
                    tracing::debug!("access token successfully refreshed");
                }
                None => {
                    tracing::error!("access token refresh failed, client is unusable");
                    return Err(Error::authorization(eyre::eyre!(
                        "refresh token was rejected; re-run to authorize again"
                    ))
                    .into());
                }
            }
        }

        Ok(credential.access_token().to_string())
    }

    /// Makes an authenticated HTTP request to the YouTube API.
    ///
    /// Non-success responses are turned into [`Error::RemoteApi`], which callers can recover
    /// with `downcast_ref`.
    #[instrument(skip(self, json_body), level = tracing::Level::TRACE)]
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        path: &str,
        query_params: &[(&str, &str)],
        json_body: Option<&impl Serialize>,
    ) -> eyre::Result<reqwest::Response> {
        let access_token = self.fresh_access_token().await?;
        let url = format!("{}/{path}", self.base_url);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(query_params);
        if let Some(body) = json_body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("send {method} request to YouTube API: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(api_error(status, &body).into());
        }

        Ok(response)
    }

    /// Fetches one page of messages from a live chat.
    ///
    /// Pass `None` as `page_token` for the first page and the previous response's
    /// `next_page_token` afterwards to get only messages that arrived since.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly` (or broader)
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/list>
    #[instrument(skip(self))]
    pub async fn list_live_chat_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> eyre::Result<LiveChatMessageListResponse> {
        let mut query_params = vec![
            ("liveChatId", live_chat_id),
            ("part", LIVE_CHAT_PARTS),
            ("fields", LIVE_CHAT_FIELDS),
        ];
        if let Some(token) = page_token {
            query_params.push(("pageToken", token));
        }

        let response = self
            .make_authenticated_request(Method::GET, "liveChat/messages", &query_params, None::<&()>)
            .await?;
        let page: LiveChatMessageListResponse = response
            .json()
            .await
            .context("parse YouTube liveChatMessages API response as JSON")?;

        tracing::debug!(
            returned_items = page.items.len(),
            next_page_token = page.next_page_token.as_deref(),
            polling_interval_millis = page.polling_interval_millis,
            "fetched live chat messages"
        );
        Ok(page)
    }

    /// Finds the live chat to read from.
    ///
    /// With a `video_id`, returns the active chat of that (live) video. Without one, returns
    /// the chat of the authenticated user's first active broadcast. `Ok(None)` means there
    /// is no such chat right now.
    ///
    /// # API Reference
    ///
    /// * <https://developers.google.com/youtube/v3/docs/videos/list>
    /// * <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/list>
    #[instrument(skip(self), ret)]
    pub async fn get_live_chat_id(&self, video_id: Option<&str>) -> eyre::Result<Option<String>> {
        if let Some(video_id) = video_id {
            let query_params = [
                ("id", video_id),
                ("part", "liveStreamingDetails"),
                ("fields", "items/liveStreamingDetails/activeLiveChatId"),
            ];
            let response = self
                .make_authenticated_request(Method::GET, "videos", &query_params, None::<&()>)
                .await?;
            let videos: VideoListResponse = response
                .json()
                .await
                .context("parse YouTube videos API response as JSON")?;
            return Ok(videos
                .items
                .into_iter()
                .filter_map(|v| v.live_streaming_details?.active_live_chat_id)
                .next());
        }

        let query_params = [
            ("part", "snippet"),
            ("broadcastType", "all"),
            ("broadcastStatus", "active"),
            ("fields", "items/snippet/liveChatId"),
        ];
        let response = self
            .make_authenticated_request(Method::GET, "liveBroadcasts", &query_params, None::<&()>)
            .await?;
        let broadcasts: LiveBroadcastListResponse = response
            .json()
            .await
            .context("parse YouTube liveBroadcasts API response as JSON")?;
        Ok(broadcasts
            .items
            .into_iter()
            .filter_map(|b| b.snippet.live_chat_id)
            .next())
    }

    /// Posts a text message to a live chat as the authenticated user.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.force-ssl`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/insert>
    #[instrument(skip(self))]
    pub async fn insert_live_chat_message(
        &self,
        live_chat_id: &str,
        text: &str,
    ) -> eyre::Result<LiveChatMessage> {
        let body = LiveChatMessageInsert::text(live_chat_id, text);
        let response = self
            .make_authenticated_request(
                Method::POST,
                "liveChat/messages",
                &[("part", "snippet")],
                Some(&body),
            )
            .await?;
        let message: LiveChatMessage = response
            .json()
            .await
            .context("parse YouTube liveChatMessages.insert response as JSON")?;
        tracing::debug!(message_id = %message.id, "inserted live chat message");
        Ok(message)
    }

    /// Deletes a live chat message.
    ///
    /// The authenticated user must own the message or moderate the chat.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.force-ssl`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/delete>
    #[instrument(skip(self))]
    pub async fn delete_live_chat_message(&self, message_id: &str) -> eyre::Result<()> {
        self.make_authenticated_request(
            Method::DELETE,
            "liveChat/messages",
            &[("id", message_id)],
            None::<&()>,
        )
        .await?;
        tracing::debug!(message_id, "deleted live chat message");
        Ok(())
    }

    /// Returns a paginated stream of all broadcasts owned by the authenticated user.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly` (or broader)
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/list>
    #[instrument(skip(self))]
    pub fn list_my_live_broadcasts(
        &self,
    ) -> impl Stream<Item = eyre::Result<LiveBroadcast>> + use<'_> {
        PagedStream::new(|page_token| async {
            let response = self.list_live_broadcasts_internal(50, page_token).await?;
            Ok((response.items, response.next_page_token))
        })
    }

    async fn list_live_broadcasts_internal(
        &self,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<LiveBroadcastListResponse> {
        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "id,snippet,status"),
            ("mine", "true"),
            ("broadcastType", "all"),
            ("maxResults", max_results_string.as_str()),
        ];
        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let response = self
            .make_authenticated_request(Method::GET, "liveBroadcasts", &query_params, None::<&()>)
            .await?;
        let live_broadcasts: LiveBroadcastListResponse = response
            .json()
            .await
            .context("parse YouTube API response as JSON")?;

        tracing::debug!(
            total_results = live_broadcasts.page_info.as_ref().map(|p| p.total_results),
            returned_items = live_broadcasts.items.len(),
            "fetched live broadcasts"
        );
        Ok(live_broadcasts)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Builds an [`Error::RemoteApi`] from a failed response, preferring the message in
/// Google's JSON error envelope over the raw body.
fn api_error(status: StatusCode, body: &str) -> Error {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().to_string(),
    };
    Error::RemoteApi { status, message }
}
