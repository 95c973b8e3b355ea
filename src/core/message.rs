use serde::{Deserialize, Serialize};

/// Prefix the loading indicator writes into an in-flight assistant message.
/// Messages still carrying it are transient and never sent to the remote API.
pub const GENERATING_PREFIX: &str = "Generating";

/// One turn in a conversation. Immutable once created, except for the `text`
/// of an in-flight assistant message, which accumulates streamed content.
///
/// Serialized with camelCase field names so the persisted document matches
/// what earlier builds of the client wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub text: String,
    pub is_user: bool,
}

impl Message {
    pub fn user(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            is_user: true,
        }
    }

    /// Empty assistant message appended when a request is dispatched; the
    /// streaming/accumulation step fills it in.
    pub fn assistant_placeholder(id: i64) -> Self {
        Self {
            id,
            text: String::new(),
            is_user: false,
        }
    }

    pub fn api_role(&self) -> &'static str {
        if self.is_user {
            "user"
        } else {
            "assistant"
        }
    }

    /// True for messages that must not be sent upstream: blank text, or a
    /// placeholder the loading indicator is still cycling through.
    pub fn is_transient(&self) -> bool {
        self.text.trim().is_empty() || self.text.starts_with(GENERATING_PREFIX)
    }
}
