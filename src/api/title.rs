//! One-shot session title summarization.
//!
//! Titles come from a fixed small model on the proxy, independent of the
//! model a session is bound to. The call can only ever produce a usable
//! title string: any failure falls back to the default.

use tracing::debug;

use crate::api::{extract_completion_content, ChatMessage, ChatRequest};
use crate::core::session::DEFAULT_TITLE;

const TITLE_MODEL_ID: &str = "gpt-5-nano";
const TITLE_ENDPOINT: &str = "https://api.proxyapi.ru/openai/v1/chat/completions";

const TITLE_PROMPT: &str = "Summarize the following message into a short title (max 4 words). \
IMPORTANT: The title must be in the same language as the message. Do not use quotes.\n\nMessage: ";

/// Ask the title model to summarize a session's first user message.
///
/// Returns the trimmed content with one pair of surrounding quotes stripped
/// if present, or [`DEFAULT_TITLE`] on any failure. Never returns `Err`.
pub async fn generate_chat_title(
    client: &reqwest::Client,
    user_message: &str,
    api_key: &str,
) -> String {
    let request = ChatRequest {
        model: TITLE_MODEL_ID.to_string(),
        messages: vec![ChatMessage::new(
            "user",
            format!("{TITLE_PROMPT}{user_message}"),
        )],
        stream: false,
    };

    match client
        .post(TITLE_ENDPOINT)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&request)
        .send()
        .await
    {
        Ok(response) => {
            if !response.status().is_success() {
                debug!(status = %response.status(), "title request rejected");
                return DEFAULT_TITLE.to_string();
            }
            match response.text().await {
                Ok(body) => title_from_body(&body),
                Err(e) => {
                    debug!(error = %e, "title response unreadable");
                    DEFAULT_TITLE.to_string()
                }
            }
        }
        Err(e) => {
            debug!(error = %e, "title request failed");
            DEFAULT_TITLE.to_string()
        }
    }
}

fn title_from_body(body: &str) -> String {
    let content = extract_completion_content(body);
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    strip_surrounding_quotes(trimmed).to_string()
}

/// Models asked not to quote still quote; strip exactly one matched pair.
fn strip_surrounding_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(text)
}
