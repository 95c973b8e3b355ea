use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::message::Message;
use crate::core::models::ChatModel;

pub mod title;

/// System instruction pinned ahead of every history-bearing request. The
/// client renders plain text, so markup is ruled out at the source.
pub(crate) const PLAIN_TEXT_INSTRUCTION: &str = "IMPORTANT: Write your response in plain text \
only. Do not use Markdown formatting (no bold, italics, headers, or code blocks).";

/// Conversation context sent upstream is capped to the most recent entries.
pub(crate) const HISTORY_LIMIT: usize = 20;

#[derive(Serialize, Clone, Debug)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
}

/// One streamed chat-completion frame.
#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Deserialize)]
pub struct CompletionMessage {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct CompletionChoice {
    pub message: Option<CompletionMessage>,
}

/// Whole-reply chat-completion body (`stream: false`).
#[derive(Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Shape a conversation for the API: plain-text system preamble, then one
/// entry per retained message. Transient messages (blank text, a cycling
/// placeholder) are dropped, and the tail is capped at [`HISTORY_LIMIT`].
pub fn build_api_messages(history: &[Message]) -> Vec<ChatMessage> {
    let retained: Vec<&Message> = history
        .iter()
        .filter(|message| !message.is_transient())
        .collect();
    let skip = retained.len().saturating_sub(HISTORY_LIMIT);

    let mut messages = Vec::with_capacity(retained.len() - skip + 1);
    messages.push(ChatMessage::new("system", PLAIN_TEXT_INSTRUCTION));
    for message in retained.into_iter().skip(skip) {
        messages.push(ChatMessage::new(message.api_role(), message.text.clone()));
    }
    messages
}

/// The streaming request variant that carries no history: a bare
/// single-user-message body, no preamble.
pub fn single_user_message(text: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::new("user", text)]
}

/// Whole-reply completion. Every failure degrades to a displayable string:
/// a non-2xx status becomes `Error: <code> <reason>`, a transport failure
/// becomes `[Connection Error: …]`, an unexpected body shape becomes the
/// empty string. This never returns `Err` to the caller.
pub async fn fetch_chat_completion(
    client: &reqwest::Client,
    api_key: &str,
    model: ChatModel,
    messages: Vec<ChatMessage>,
) -> String {
    let request = ChatRequest {
        model: model.model_id().to_string(),
        messages,
        stream: false,
    };

    match client
        .post(model.endpoint())
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&request)
        .send()
        .await
    {
        Ok(response) => {
            let status = response.status();
            if !status.is_success() {
                debug!(status = %status, model = model.as_str(), "completion rejected");
                return http_error_text(status);
            }
            match response.text().await {
                Ok(body) => extract_completion_content(&body),
                Err(e) => connection_error_text(&e.to_string()),
            }
        }
        Err(e) => {
            debug!(error = %e, model = model.as_str(), "completion transport failure");
            connection_error_text(&e.to_string())
        }
    }
}

pub(crate) fn http_error_text(status: reqwest::StatusCode) -> String {
    format!(
        "Error: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Error")
    )
}

pub(crate) fn connection_error_text(detail: &str) -> String {
    format!("[Connection Error: {detail}]")
}

/// First choice's `message.content`, or the empty string when the body does
/// not have the expected shape.
pub(crate) fn extract_completion_content(body: &str) -> String {
    match serde_json::from_str::<CompletionResponse>(body) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}
