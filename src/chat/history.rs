//! Chat log model: messages, word tokens and highlight marks.
//!
//! Assistant messages are split into [`DisplayToken`]s, one per
//! whitespace-delimited word, so the playback synchronizer can mark the word
//! currently being spoken.  User messages are kept as a single block of text
//! and carry no tokens.

use crate::client::ImageItem;

// ---------------------------------------------------------------------------
// Identifiers and enums
// ---------------------------------------------------------------------------

/// Stable identifier of a message inside one [`ChatLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
    /// An assistant-side failure notice (network, server, microphone).
    AssistantError,
}

impl Sender {
    /// Assistant and error messages are rendered word by word.
    pub fn is_assistant(&self) -> bool {
        matches!(self, Sender::Assistant | Sender::AssistantError)
    }
}

/// Media shown under the text of a structured reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Image { url: String },
    ImageList(Vec<ImageItem>),
}

// ---------------------------------------------------------------------------
// DisplayToken / Message
// ---------------------------------------------------------------------------

/// One rendered word.  Its index is its position in [`Message::tokens`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayToken {
    pub text: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    /// Display text after sanitising.
    pub text: String,
    /// Word tokens; empty for user messages.
    pub tokens: Vec<DisplayToken>,
    pub attachment: Option<Attachment>,
}

/// Strip the bold/italic markers the server sometimes leaves in replies.
///
/// ```
/// use voice_chat::chat::sanitize;
///
/// assert_eq!(sanitize("  **Hello** ***there***  "), "Hello there");
/// ```
pub fn sanitize(text: &str) -> String {
    text.replace("***", "").replace("**", "").trim().to_string()
}

/// Split `text` into one token per whitespace-delimited word.
pub fn tokenize(text: &str) -> Vec<DisplayToken> {
    text.split_whitespace()
        .map(|word| DisplayToken {
            text: word.to_string(),
            highlighted: false,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ChatLog
// ---------------------------------------------------------------------------

/// Ordered list of chat messages.
///
/// Messages are never removed, so a [`MessageId`] is also the message's
/// position.  At most one token in the log is highlighted at a time.
#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<Message>,
    next_id: u64,
    highlight: Option<(MessageId, usize)>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its id.
    ///
    /// Assistant-side messages are sanitised and tokenised; user messages are
    /// stored verbatim.
    pub fn push(&mut self, sender: Sender, text: &str, attachment: Option<Attachment>) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;

        let (text, tokens) = if sender.is_assistant() {
            let clean = sanitize(text);
            let tokens = tokenize(&clean);
            (clean, tokens)
        } else {
            (text.to_string(), Vec::new())
        };

        self.messages.push(Message {
            id,
            sender,
            text,
            tokens,
            attachment,
        });
        id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        let index = usize::try_from(id.0).ok()?;
        self.messages.get(index).filter(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        let index = usize::try_from(id.0).ok()?;
        self.messages.get_mut(index).filter(|m| m.id == id)
    }

    fn token_mut(&mut self, (id, index): (MessageId, usize)) -> Option<&mut DisplayToken> {
        self.get_mut(id).and_then(|m| m.tokens.get_mut(index))
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of word tokens in message `id` (0 when unknown).
    pub fn token_count(&self, id: MessageId) -> usize {
        self.get(id).map_or(0, |m| m.tokens.len())
    }

    /// Remove the highlight mark, if any.  Returns `true` when anything
    /// changed.
    pub fn clear_highlights(&mut self) -> bool {
        let Some(mark) = self.highlight.take() else {
            return false;
        };
        if let Some(token) = self.token_mut(mark) {
            token.highlighted = false;
        }
        true
    }

    /// Mark token `index` of message `id`, moving the mark off whichever
    /// token held it.  Returns `false` (and changes nothing) when the token
    /// does not exist.
    pub fn highlight(&mut self, id: MessageId, index: usize) -> bool {
        if self.token_mut((id, index)).is_none() {
            return false;
        }
        if self.highlight == Some((id, index)) {
            return true;
        }

        self.clear_highlights();
        if let Some(token) = self.token_mut((id, index)) {
            token.highlighted = true;
        }
        self.highlight = Some((id, index));
        true
    }

    /// The highlighted token as `(message, index)`.
    pub fn highlighted(&self) -> Option<(MessageId, usize)> {
        self.highlight
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
