use serde::{Deserialize, Serialize};

use crate::core::message::Message;
use crate::core::models::ChatModel;

/// Title every session carries until the summarizer produces a real one.
pub const DEFAULT_TITLE: &str = "New Chat";

/// A named, ordered conversation bound to one model selection.
///
/// `title` and `model` have serde defaults so documents written before either
/// field existed still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: u32,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub model: ChatModel,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl Session {
    pub fn new(id: u32, model: ChatModel) -> Self {
        Self {
            id,
            messages: Vec::new(),
            title: default_title(),
            model,
        }
    }

    /// Empty sessions are filtered out of the persisted document.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn message_mut(&mut self, id: i64) -> Option<&mut Message> {
        self.messages.iter_mut().find(|message| message.id == id)
    }
}
