//! YouTube Videos API types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Response structure for the `videos.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoListResponse {
    /// A list of videos that match the request criteria.
    #[serde(default)]
    pub items: VecDeque<Video>,
}

/// A `video` resource represents a YouTube video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    #[serde(default)]
    pub id: String,
    /// Present only for live broadcasts (upcoming, live, or completed).
    #[serde(
        rename = "liveStreamingDetails",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub live_streaming_details: Option<LiveStreamingDetails>,
}

/// Metadata about a live video broadcast.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#liveStreamingDetails>
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamingDetails {
    /// The ID of the currently active live chat attached to this video.
    ///
    /// Only present while the broadcast is live and has chat enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_live_chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<Timestamp>,
    /// Number of people watching right now, as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrent_viewers: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_masked_live_details() {
        // what the `items/liveStreamingDetails/activeLiveChatId` field mask returns
        let videos: VideoListResponse = serde_json::from_str(
            r#"{"items": [{"liveStreamingDetails": {"activeLiveChatId": "Cg0KC2xpdmUtY2hhdA"}}]}"#,
        )
        .unwrap();
        let details = videos.items[0].live_streaming_details.as_ref().unwrap();
        assert_eq!(
            details.active_live_chat_id.as_deref(),
            Some("Cg0KC2xpdmUtY2hhdA")
        );
    }

    #[test]
    fn ended_broadcast_has_no_chat() {
        let videos: VideoListResponse =
            serde_json::from_str(r#"{"items": [{"liveStreamingDetails": {}}]}"#).unwrap();
        let details = videos.items[0].live_streaming_details.as_ref().unwrap();
        assert!(details.active_live_chat_id.is_none());
    }
}
