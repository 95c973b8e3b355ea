use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::api::title::generate_chat_title;
use crate::api::{fetch_chat_completion, ChatMessage};
use crate::core::chat_stream::{spawn_stream, StreamMessage, StreamParams};
use crate::core::models::ChatModel;

const SYNC_TIMEOUT: Duration = Duration::from_secs(60);
const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Network seam for the controller. One implementation speaks HTTP to the
/// proxy; tests script their own.
#[async_trait]
pub trait CompletionBackend: Send + Sync + 'static {
    /// Start a streaming completion; events arrive on the returned channel.
    fn stream_completion(
        &self,
        messages: Vec<ChatMessage>,
        model: ChatModel,
        cancel_token: CancellationToken,
    ) -> UnboundedReceiver<StreamMessage>;

    /// Whole-reply completion. Failures degrade to displayable text.
    async fn complete(&self, messages: Vec<ChatMessage>, model: ChatModel) -> String;

    /// Summarize a session's first user message into a title. Always yields
    /// a usable string.
    async fn title_for(&self, first_user_message: &str) -> String;
}

pub struct HttpBackend {
    sync_client: reqwest::Client,
    stream_client: reqwest::Client,
    api_key: String,
}

impl HttpBackend {
    pub fn new(api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let sync_client = reqwest::Client::builder()
            .connect_timeout(SYNC_TIMEOUT)
            .timeout(SYNC_TIMEOUT)
            .build()?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(STREAM_CONNECT_TIMEOUT)
            .read_timeout(STREAM_READ_TIMEOUT)
            .build()?;
        Ok(Self {
            sync_client,
            stream_client,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    fn stream_completion(
        &self,
        messages: Vec<ChatMessage>,
        model: ChatModel,
        cancel_token: CancellationToken,
    ) -> UnboundedReceiver<StreamMessage> {
        spawn_stream(StreamParams {
            client: self.stream_client.clone(),
            api_key: self.api_key.clone(),
            model,
            api_messages: messages,
            cancel_token,
        })
    }

    async fn complete(&self, messages: Vec<ChatMessage>, model: ChatModel) -> String {
        fetch_chat_completion(&self.sync_client, &self.api_key, model, messages).await
    }

    async fn title_for(&self, first_user_message: &str) -> String {
        generate_chat_title(&self.sync_client, first_user_message, &self.api_key).await
    }
}
