//! YouTube Live Broadcasts API types.
//!
//! A [`LiveBroadcast`] is the viewer-facing side of a live event: title, schedule,
//! lifecycle and the live chat attached to it. Each broadcast is exactly one YouTube video.

use crate::youtube_api::types::PageInfo;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Response structure for the `liveBroadcasts.list` API call.
///
/// Most fields are optional since callers often narrow the response with a field mask.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/list>
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastListResponse {
    #[serde(default)]
    pub items: VecDeque<LiveBroadcast>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PageInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct LiveBroadcast {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub snippet: LiveBroadcastSnippet,
    /// Only present when `status` is among the requested parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LiveBroadcastStatus>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#snippet>
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the broadcast was added to the schedule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<Timestamp>,
    /// Unset means the broadcast runs until it is ended manually.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_end_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_end_time: Option<Timestamp>,
    /// The broadcast's live chat, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_chat_id: Option<String>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#status>
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastStatus {
    pub life_cycle_status: BroadcastLifeCycleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_status: Option<BroadcastPrivacyStatus>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#status.lifeCycleStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastLifeCycleStatus {
    /// Created but not yet bound to a stream.
    Created,
    /// Ready to be activated.
    Ready,
    /// Visible only to the broadcaster for testing.
    Testing,
    /// Visible to the audience.
    Live,
    /// Ended.
    Complete,
    /// Removed by an admin action.
    Revoked,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for BroadcastLifeCycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Ready => "ready",
            Self::Testing => "testing",
            Self::Live => "live",
            Self::Complete => "complete",
            Self::Revoked => "revoked",
            Self::Unknown => "unknown",
        })
    }
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#status.privacyStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastPrivacyStatus {
    Public,
    Unlisted,
    Private,
}

impl fmt::Display for BroadcastPrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
        })
    }
}
