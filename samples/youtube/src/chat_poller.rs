//! Polling loop that prints a live chat as it happens.
//!
//! Each cycle waits for the delay the previous response asked for, fetches the messages
//! that arrived since the previous page token, prints them, and carries the new token and
//! delay into the next cycle. The server drives both values; nothing is recomputed locally.

use crate::youtube_api::YouTubeClient;
use crate::youtube_api::chat::{LiveChatMessageListResponse, render_message};
use eyre::Context;
use std::convert::Infallible;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

/// Anything that can list a page of live chat messages.
pub trait ChatSource {
    fn list_live_chat_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = eyre::Result<LiveChatMessageListResponse>> + Send;
}

impl ChatSource for YouTubeClient {
    async fn list_live_chat_messages(
        &self,
        live_chat_id: &str,
        page_token: Option<&str>,
    ) -> eyre::Result<LiveChatMessageListResponse> {
        YouTubeClient::list_live_chat_messages(self, live_chat_id, page_token).await
    }
}

/// Source of delays between polls.
pub trait Clock {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// The real clock, backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What the next poll cycle should do, exactly as dictated by the last response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NextPoll {
    /// Continuation token to send; `None` for the very first request.
    pub page_token: Option<String>,
    /// How long to wait before sending it.
    pub delay: Duration,
}

impl NextPoll {
    /// The first cycle: no token, no delay.
    pub fn first() -> Self {
        Self::default()
    }
}

impl From<&LiveChatMessageListResponse> for NextPoll {
    fn from(response: &LiveChatMessageListResponse) -> Self {
        Self {
            page_token: response.next_page_token.clone(),
            delay: Duration::from_millis(response.polling_interval_millis),
        }
    }
}

/// Repeatedly fetches and prints the messages of one live chat.
#[derive(Debug)]
pub struct ChatPoller<S, C, W> {
    source: S,
    clock: C,
    out: W,
    live_chat_id: String,
}

impl<S, C, W> ChatPoller<S, C, W>
where
    S: ChatSource,
    C: Clock,
    W: Write,
{
    pub fn new(source: S, clock: C, out: W, live_chat_id: impl Into<String>) -> Self {
        Self {
            source,
            clock,
            out,
            live_chat_id: live_chat_id.into(),
        }
    }

    /// Polls forever.
    ///
    /// The loop only ends when a cycle fails: the failure is logged and returned, and no
    /// further poll is scheduled.
    pub async fn run(mut self) -> eyre::Result<Infallible> {
        let mut next = NextPoll::first();
        loop {
            next = match self.poll_once(next).await {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(
                        live_chat_id = %self.live_chat_id,
                        error = ?e,
                        "live chat poll failed, no longer polling"
                    );
                    return Err(e);
                }
            };
        }
    }

    /// Runs a single WAITING then FETCHING cycle and returns the schedule for the next one.
    pub async fn poll_once(&mut self, next: NextPoll) -> eyre::Result<NextPoll> {
        tracing::trace!(delay = ?next.delay, "waiting for next poll");
        self.clock.sleep(next.delay).await;

        tracing::trace!(page_token = next.page_token.as_deref(), "polling live chat");
        let response = self
            .source
            .list_live_chat_messages(&self.live_chat_id, next.page_token.as_deref())
            .await
            .context("list live chat messages")?;

        for message in &response.items {
            writeln!(self.out, "{}", render_message(message)).context("write chat message")?;
        }
        self.out.flush().context("flush chat output")?;

        Ok(NextPoll::from(&response))
    }

    pub fn into_output(self) -> W {
        self.out
    }
}
