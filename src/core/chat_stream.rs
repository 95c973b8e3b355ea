//! Streaming chat completions over server-sent events.
//!
//! The service POSTs a `stream: true` chat request and reads the body line by
//! line. Each `data:` frame either carries a content delta, the `[DONE]`
//! sentinel, or something unparseable (skipped, the stream continues). Events
//! arrive on an unbounded channel; the consumer applies them in order, which
//! is what makes placeholder updates race-free.

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::api::{connection_error_text, ChatMessage, ChatRequest, ChatResponse};
use crate::core::models::ChatModel;

#[derive(Clone, Debug)]
pub enum StreamMessage {
    /// One content fragment from a `choices[0].delta`.
    Chunk(String),
    /// Trailing error annotation appended to whatever already arrived.
    Error(String),
    End,
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub api_key: String,
    pub model: ChatModel,
    pub api_messages: Vec<ChatMessage>,
    pub cancel_token: CancellationToken,
}

/// Spawn the streaming request; events arrive on the returned receiver.
///
/// Cancelling the token stops the read loop promptly; nothing is emitted
/// afterwards.
pub fn spawn_stream(params: StreamParams) -> mpsc::UnboundedReceiver<StreamMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let StreamParams {
            client,
            api_key,
            model,
            api_messages,
            cancel_token,
        } = params;

        let request = ChatRequest {
            model: model.model_id().to_string(),
            messages: api_messages,
            stream: true,
        };

        tokio::select! {
            _ = run_stream(&client, &api_key, model, &request, &tx, &cancel_token) => {}
            _ = cancel_token.cancelled() => {}
        }
    });
    rx
}

async fn run_stream(
    client: &reqwest::Client,
    api_key: &str,
    model: ChatModel,
    request: &ChatRequest,
    tx: &mpsc::UnboundedSender<StreamMessage>,
    cancel_token: &CancellationToken,
) {
    let result = client
        .post(model.endpoint())
        .header("Content-Type", "application/json")
        .header("Accept", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Authorization", format!("Bearer {api_key}"))
        .json(request)
        .send()
        .await;

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            let annotation = format!("\n{}", connection_error_text(&e.to_string()));
            let _ = tx.send(StreamMessage::Error(annotation));
            let _ = tx.send(StreamMessage::End);
            return;
        }
    };

    if !response.status().is_success() {
        error!(status = %response.status(), model = model.as_str(), "streaming request rejected");
        let _ = tx.send(StreamMessage::End);
        return;
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        if cancel_token.is_cancelled() {
            return;
        }

        let chunk_bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let annotation = format!("\n{}", connection_error_text(&e.to_string()));
                let _ = tx.send(StreamMessage::Error(annotation));
                let _ = tx.send(StreamMessage::End);
                return;
            }
        };

        buffer.extend_from_slice(&chunk_bytes);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let should_end = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(line) => process_sse_line(line.trim(), tx),
                Err(e) => {
                    debug!(error = %e, "invalid UTF-8 in stream");
                    false
                }
            };
            buffer.drain(..=newline_pos);
            if should_end {
                return;
            }
        }
    }

    let _ = tx.send(StreamMessage::End);
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Handle one SSE line. Returns true when the stream is finished.
fn process_sse_line(line: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    let Some(payload) = extract_data_payload(line) else {
        return false;
    };

    if payload == "[DONE]" {
        let _ = tx.send(StreamMessage::End);
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(choice) = response.choices.first() {
                if let Some(content) = &choice.delta.content {
                    if !content.is_empty() {
                        let _ = tx.send(StreamMessage::Chunk(content.clone()));
                    }
                }
            }
        }
        Err(e) => {
            // Malformed frames do not abort the stream.
            debug!(error = %e, "skipping malformed stream frame");
        }
    }
    false
}
