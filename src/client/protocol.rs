//! Wire types of the command endpoint.
//!
//! Request: `{ "text": "<command>" }`.
//!
//! Reply: `{ "response": <reply> }` where `<reply>` is either a plain string
//! or an object with a `type` discriminator:
//!
//! | `type`       | `content`                         | `text_response` |
//! |--------------|-----------------------------------|-----------------|
//! | `text`       | string                            | (none)          |
//! | `image`      | image URL                         | optional        |
//! | `image_list` | list of `{ "url", "title"? }`     | optional        |
//!
//! Anything else is kept as raw JSON so the caller can still look for a
//! `content` string.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandResponse {
    pub response: AssistantReply,
}

/// One entry of an `image_list` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuredResponse {
    Text {
        #[serde(default)]
        content: Option<String>,
    },
    Image {
        content: String,
        #[serde(default)]
        text_response: Option<String>,
    },
    ImageList {
        content: Vec<ImageItem>,
        #[serde(default)]
        text_response: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AssistantReply {
    Text(String),
    Structured(StructuredResponse),
    Other(serde_json::Value),
}

impl AssistantReply {
    /// Plain text carried by the reply, if any.
    ///
    /// Image replies are not covered here; their text lives in
    /// `text_response`.
    pub fn content_text(&self) -> Option<&str> {
        match self {
            AssistantReply::Text(text) => Some(text),
            AssistantReply::Structured(StructuredResponse::Text { content }) => content.as_deref(),
            AssistantReply::Structured(_) => None,
            AssistantReply::Other(value) => value.get("content").and_then(|c| c.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
