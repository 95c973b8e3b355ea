//! The enumerated model catalog.
//!
//! Each selectable backend model is bound to a fixed `(model id, endpoint)`
//! pair used verbatim when constructing requests. The proxy fronts every
//! backend with the same chat-completions wire shape, so nothing else varies
//! per model. This is read-only configuration, not user-editable state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChatModel {
    #[default]
    Gpt5,
    Sonnet45,
    Grok4,
    GigaChat,
    YandexGpt,
}

impl ChatModel {
    pub const ALL: [ChatModel; 5] = [
        ChatModel::Gpt5,
        ChatModel::Sonnet45,
        ChatModel::Grok4,
        ChatModel::GigaChat,
        ChatModel::YandexGpt,
    ];

    /// Stable id used in persisted documents and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            ChatModel::Gpt5 => "gpt5",
            ChatModel::Sonnet45 => "sonnet45",
            ChatModel::Grok4 => "grok4",
            ChatModel::GigaChat => "gigachat",
            ChatModel::YandexGpt => "yandexgpt",
        }
    }

    /// Human-facing name for pickers and session headers.
    pub fn display_name(self) -> &'static str {
        match self {
            ChatModel::Gpt5 => "GPT-5",
            ChatModel::Sonnet45 => "Sonnet 4.5",
            ChatModel::Grok4 => "Grok 4",
            ChatModel::GigaChat => "GigaChat",
            ChatModel::YandexGpt => "YandexGPT",
        }
    }

    /// Model identifier sent in the request body.
    pub fn model_id(self) -> &'static str {
        match self {
            ChatModel::Gpt5 => "gpt-5",
            ChatModel::Sonnet45 => "claude-sonnet-4-5",
            ChatModel::Grok4 => "grok-4",
            ChatModel::GigaChat => "gigachat",
            ChatModel::YandexGpt => "yandexgpt",
        }
    }

    /// Full chat-completions URL on the proxy, used verbatim.
    pub fn endpoint(self) -> &'static str {
        match self {
            ChatModel::Gpt5 => "https://api.proxyapi.ru/openai/v1/chat/completions",
            ChatModel::Sonnet45 => "https://api.proxyapi.ru/anthropic/v1/chat/completions",
            ChatModel::Grok4 => "https://api.proxyapi.ru/xai/v1/chat/completions",
            ChatModel::GigaChat => "https://api.proxyapi.ru/sber/v1/chat/completions",
            ChatModel::YandexGpt => "https://api.proxyapi.ru/yandex/v1/chat/completions",
        }
    }
}

impl AsRef<str> for ChatModel {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for ChatModel {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown chat model: {value}"))
    }
}

impl TryFrom<String> for ChatModel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<ChatModel> for String {
    fn from(value: ChatModel) -> Self {
        value.as_str().to_string()
    }
}
