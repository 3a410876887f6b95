//! YouTube Live Chat API types and console rendering of chat messages.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// `part` requested when listing chat messages.
pub(crate) const LIVE_CHAT_PARTS: &str = "snippet,authorDetails";

/// Field mask for `liveChatMessages.list`, trimmed to what [`render_message`] prints.
pub(crate) const LIVE_CHAT_FIELDS: &str = "items(id,authorDetails(channelId,displayName,\
    isChatModerator,isChatOwner,isChatSponsor,profileImageUrl),\
    snippet(displayMessage,superChatDetails,publishedAt)),\
    nextPageToken,pollingIntervalMillis";

/// Response structure for the `liveChatMessages.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/list>
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageListResponse {
    /// Chat messages since the page token the request was made with, oldest first.
    #[serde(default)]
    pub items: Vec<LiveChatMessage>,
    /// Token for retrieving the messages that arrive after this page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    /// How long the server wants the client to wait before polling again.
    #[serde(default)]
    pub polling_interval_millis: u64,
}

/// A `liveChatMessage` resource represents a chat message in a YouTube live stream.
///
/// Only the fields selected by the list field mask are modeled.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessage {
    /// The ID that YouTube assigns to uniquely identify the message.
    #[serde(default)]
    pub id: String,
    /// Contains basic details about the chat message.
    pub snippet: LiveChatMessageSnippet,
    /// Contains details about the message author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_details: Option<LiveChatMessageAuthor>,
}

/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#snippet>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageSnippet {
    /// The date and time when the message was originally published.
    pub published_at: Timestamp,
    /// Contains a string that can be displayed to the user.
    ///
    /// If this field is not present, the message is being deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_message: Option<String>,
    /// Present only for Super Chat messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_chat_details: Option<SuperChatDetails>,
}

/// Details about the author of a live chat message.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#authorDetails>
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveChatMessageAuthor {
    /// The unique YouTube channel ID of the message author.
    #[serde(default)]
    pub channel_id: String,
    /// The display name of the channel as it appears in chat.
    pub display_name: String,
    /// URL to the channel's profile image/avatar.
    #[serde(default)]
    pub profile_image_url: String,
    /// Whether the author is the owner/broadcaster of the live stream.
    #[serde(default)]
    pub is_chat_owner: bool,
    /// Whether the author is a channel member (sponsor).
    #[serde(default)]
    pub is_chat_sponsor: bool,
    /// Whether the author is a chat moderator.
    #[serde(default)]
    pub is_chat_moderator: bool,
}

/// Details about a Super Chat purchase.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages#snippet.superChatDetails>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperChatDetails {
    /// A localized string like "$5.00" that's ready for display.
    pub amount_display_string: String,
    /// The purchase amount in micros (millionths of the currency unit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_micros: Option<String>,
    /// The currency code in ISO 4217 format (e.g., "USD", "EUR", "JPY").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// The Super Chat tier level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<u32>,
    /// Optional text message included with the Super Chat purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_comment: Option<String>,
}

/// Request body for `liveChatMessages.insert` with a plain text message.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveChatMessages/insert>
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveChatMessageInsert<'a> {
    pub snippet: LiveChatMessageInsertSnippet<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveChatMessageInsertSnippet<'a> {
    pub live_chat_id: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text_message_details: TextMessageDetails<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextMessageDetails<'a> {
    pub message_text: &'a str,
}

impl<'a> LiveChatMessageInsert<'a> {
    pub(crate) fn text(live_chat_id: &'a str, message_text: &'a str) -> Self {
        Self {
            snippet: LiveChatMessageInsertSnippet {
                live_chat_id,
                kind: "textMessageEvent",
                text_message_details: TextMessageDetails { message_text },
            },
        }
    }
}

/// Formats a chat message as a single console line.
///
/// The shape is `[amount ]name[ (ROLE, ...)][: text]`, with roles always listed as
/// OWNER, MODERATOR, SPONSOR (whichever apply).
pub fn render_message(message: &LiveChatMessage) -> String {
    let mut line = String::new();
    if let Some(super_chat) = &message.snippet.super_chat_details {
        line.push_str(&super_chat.amount_display_string);
        line.push(' ');
    }

    let author = message.author_details.as_ref();
    line.push_str(author.map_or("Anonymous", |a| a.display_name.as_str()));

    if let Some(author) = author {
        let roles: Vec<&str> = [
            (author.is_chat_owner, "OWNER"),
            (author.is_chat_moderator, "MODERATOR"),
            (author.is_chat_sponsor, "SPONSOR"),
        ]
        .into_iter()
        .filter_map(|(set, role)| set.then_some(role))
        .collect();
        if !roles.is_empty() {
            let _ = write!(line, " ({})", roles.join(", "));
        }
    }

    if let Some(text) = message
        .snippet
        .display_message
        .as_deref()
        .filter(|t| !t.is_empty())
    {
        let _ = write!(line, ": {text}");
    }
    line
}
