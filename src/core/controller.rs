//! The session controller: user input in, persisted conversation out.
//!
//! One exchange runs at a time per controller (`is_generating` guard). All
//! placeholder writes (indicator frames, streamed chunks, the final reply)
//! are applied by the exchange loop itself, so the first real content write
//! happens-after the last indicator write by construction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api;
use crate::core::backend::CompletionBackend;
use crate::core::chat_stream::StreamMessage;
use crate::core::config::Config;
use crate::core::message::Message;
use crate::core::models::ChatModel;
use crate::core::session::Session;
use crate::core::store::SessionStore;

/// Frames cycled into the assistant placeholder until content arrives.
const LOADING_FRAMES: [&str; 3] = ["Generating", "Generating.", "Generating.."];
const LOADING_FRAME_INTERVAL: Duration = Duration::from_millis(500);

/// Per-character reveal delay for replies fetched in one piece.
const CHAR_REVEAL_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Model newly created sessions are bound to.
    pub default_model: ChatModel,
    /// Stream replies instead of fetching them whole.
    pub stream_replies: bool,
    /// Whether streaming requests carry the truncated history or only the
    /// newly submitted message.
    pub stream_with_history: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            default_model: ChatModel::default(),
            stream_replies: true,
            stream_with_history: true,
        }
    }
}

impl From<&Config> for ControllerOptions {
    fn from(config: &Config) -> Self {
        Self {
            default_model: config.default_model(),
            stream_replies: config.stream_replies,
            stream_with_history: config.stream_with_history,
        }
    }
}

enum ExchangeOutcome {
    Completed { got_content: bool },
    Cancelled,
}

struct ControllerState {
    sessions: Vec<Session>,
    active_id: u32,
    next_session_id: u32,
    last_message_id: i64,
    is_generating: bool,
    cancel_token: Option<CancellationToken>,
}

impl ControllerState {
    fn session_index(&self, id: u32) -> Option<usize> {
        self.sessions.iter().position(|session| session.id == id)
    }

    /// Ids derive from the creation timestamp but stay strictly monotonic
    /// even when exchanges land inside the same millisecond.
    fn next_message_id(&mut self) -> i64 {
        let id = Utc::now()
            .timestamp_millis()
            .max(self.last_message_id + 1);
        self.last_message_id = id;
        id
    }
}

/// Cheaply cloneable handle on the shared conversation state. The controller
/// exclusively owns the in-memory collection; the store owns the durable one.
#[derive(Clone)]
pub struct ChatController {
    state: Arc<Mutex<ControllerState>>,
    backend: Arc<dyn CompletionBackend>,
    store: Arc<dyn SessionStore>,
    options: ControllerOptions,
}

impl ChatController {
    /// Load the persisted collection and adopt the first session as active,
    /// or fabricate a fresh empty one on first launch.
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        store: Arc<dyn SessionStore>,
        options: ControllerOptions,
    ) -> Self {
        let mut sessions = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to load sessions, starting empty");
            Vec::new()
        });

        let next_session_id = sessions
            .iter()
            .map(|session| session.id)
            .max()
            .map(|id| id + 1)
            .unwrap_or(2);
        let last_message_id = sessions
            .iter()
            .flat_map(|session| session.messages.iter())
            .map(|message| message.id)
            .max()
            .unwrap_or(0);
        let active_id = match sessions.first().map(|session| session.id) {
            Some(id) => id,
            None => {
                sessions.push(Session::new(1, options.default_model));
                1
            }
        };

        Self {
            state: Arc::new(Mutex::new(ControllerState {
                sessions,
                active_id,
                next_session_id,
                last_message_id,
                is_generating: false,
                cancel_token: None,
            })),
            backend,
            store,
            options,
        }
    }

    /// Submit user input against the active session.
    ///
    /// Blank input and input submitted while a reply is already in flight
    /// are no-ops. Otherwise the user message and an empty assistant
    /// placeholder are appended atomically and persisted before the network
    /// round trip starts. Returns whether a send happened.
    pub async fn send_message(&self, input: &str) -> bool {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return false;
        }

        let cancel_token = CancellationToken::new();
        let (session_id, model, assistant_id, api_messages) = {
            let mut state = self.state.lock().await;
            if state.is_generating {
                return false;
            }
            let active_id = state.active_id;
            let Some(index) = state.session_index(active_id) else {
                return false;
            };

            state.is_generating = true;
            state.cancel_token = Some(cancel_token.clone());

            let user_id = state.next_message_id();
            let assistant_id = user_id + 1;
            state.last_message_id = assistant_id;

            let session = &mut state.sessions[index];
            session.messages.push(Message::user(user_id, trimmed));
            session.messages.push(Message::assistant_placeholder(assistant_id));

            let model = session.model;
            let api_messages = if self.options.stream_replies && !self.options.stream_with_history
            {
                api::single_user_message(trimmed)
            } else {
                api::build_api_messages(&session.messages)
            };

            self.persist(&state);
            (active_id, model, assistant_id, api_messages)
        };

        let outcome = if self.options.stream_replies {
            self.run_streaming_exchange(session_id, assistant_id, model, api_messages, &cancel_token)
                .await
        } else {
            self.run_blocking_exchange(session_id, assistant_id, model, api_messages, &cancel_token)
                .await
        };

        self.finish_exchange(session_id, assistant_id, outcome, trimmed.to_string())
            .await;
        true
    }

    async fn run_streaming_exchange(
        &self,
        session_id: u32,
        assistant_id: i64,
        model: ChatModel,
        api_messages: Vec<api::ChatMessage>,
        cancel_token: &CancellationToken,
    ) -> ExchangeOutcome {
        let mut rx = self
            .backend
            .stream_completion(api_messages, model, cancel_token.clone());
        let mut ticker = tokio::time::interval(LOADING_FRAME_INTERVAL);
        let mut frame = 0usize;
        let mut got_content = false;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(StreamMessage::Chunk(fragment)) | Some(StreamMessage::Error(fragment)) => {
                        self.apply_content(session_id, assistant_id, &fragment, !got_content)
                            .await;
                        got_content = true;
                    }
                    Some(StreamMessage::End) | None => break,
                },
                _ = ticker.tick(), if !got_content => {
                    self.apply_indicator(session_id, assistant_id, LOADING_FRAMES[frame % LOADING_FRAMES.len()])
                        .await;
                    frame += 1;
                }
                _ = cancel_token.cancelled() => return ExchangeOutcome::Cancelled,
            }
        }

        ExchangeOutcome::Completed { got_content }
    }

    async fn run_blocking_exchange(
        &self,
        session_id: u32,
        assistant_id: i64,
        model: ChatModel,
        api_messages: Vec<api::ChatMessage>,
        cancel_token: &CancellationToken,
    ) -> ExchangeOutcome {
        let request = self.backend.complete(api_messages, model);
        tokio::pin!(request);

        let mut ticker = tokio::time::interval(LOADING_FRAME_INTERVAL);
        let mut frame = 0usize;
        let reply = loop {
            tokio::select! {
                reply = &mut request => break reply,
                _ = ticker.tick() => {
                    self.apply_indicator(session_id, assistant_id, LOADING_FRAMES[frame % LOADING_FRAMES.len()])
                        .await;
                    frame += 1;
                }
                _ = cancel_token.cancelled() => return ExchangeOutcome::Cancelled,
            }
        };

        // Reveal the fetched reply one character at a time.
        let mut buf = [0u8; 4];
        let mut first = true;
        for ch in reply.chars() {
            if cancel_token.is_cancelled() {
                return ExchangeOutcome::Cancelled;
            }
            self.apply_content(session_id, assistant_id, ch.encode_utf8(&mut buf), first)
                .await;
            first = false;
            tokio::time::sleep(CHAR_REVEAL_DELAY).await;
        }

        ExchangeOutcome::Completed { got_content: !first }
    }

    async fn finish_exchange(
        &self,
        session_id: u32,
        assistant_id: i64,
        outcome: ExchangeOutcome,
        first_user_text: String,
    ) {
        let mut state = self.state.lock().await;
        state.cancel_token = None;
        state.is_generating = false;

        let got_content = match outcome {
            // Partial text already applied stays in place, but nothing is
            // persisted for a cancelled exchange.
            ExchangeOutcome::Cancelled => return,
            ExchangeOutcome::Completed { got_content } => got_content,
        };

        let mut message_count = 0;
        if let Some(index) = state.session_index(session_id) {
            if !got_content {
                // Nothing arrived: drop whatever indicator frame was showing.
                if let Some(message) = state.sessions[index].message_mut(assistant_id) {
                    message.text.clear();
                }
            }
            message_count = state.sessions[index].messages.len();
        }
        self.persist(&state);
        drop(state);

        if message_count == 2 {
            self.spawn_title_task(session_id, first_user_text);
        }
    }

    /// Fire-and-forget titling after a session's first exchange. The title
    /// is applied against the latest state by session id, so it commutes
    /// with any appends that happen in the meantime.
    fn spawn_title_task(&self, session_id: u32, first_user_text: String) {
        let controller = self.clone();
        tokio::spawn(async move {
            let title = controller.backend.title_for(&first_user_text).await;
            let mut state = controller.state.lock().await;
            let Some(index) = state.session_index(session_id) else {
                return;
            };
            state.sessions[index].title = title;
            controller.persist(&state);
        });
    }

    async fn apply_content(
        &self,
        session_id: u32,
        assistant_id: i64,
        fragment: &str,
        replace: bool,
    ) {
        let mut state = self.state.lock().await;
        if let Some(index) = state.session_index(session_id) {
            if let Some(message) = state.sessions[index].message_mut(assistant_id) {
                if replace {
                    message.text.clear();
                }
                message.text.push_str(fragment);
            }
        }
    }

    async fn apply_indicator(&self, session_id: u32, assistant_id: i64, frame: &str) {
        let mut state = self.state.lock().await;
        if let Some(index) = state.session_index(session_id) {
            if let Some(message) = state.sessions[index].message_mut(assistant_id) {
                message.text.clear();
                message.text.push_str(frame);
            }
        }
    }

    /// Cancel the in-flight exchange, if any. The read loop and indicator
    /// stop promptly; no persistence write follows.
    pub async fn cancel(&self) {
        let token = {
            let mut state = self.state.lock().await;
            state.cancel_token.take()
        };
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Create a fresh empty session and make it active. Returns its id.
    pub async fn new_chat(&self) -> u32 {
        let mut state = self.state.lock().await;
        let id = state.next_session_id;
        state.next_session_id += 1;
        state.sessions.push(Session::new(id, self.options.default_model));
        state.active_id = id;
        id
    }

    /// Make an existing session active. Returns false for unknown ids.
    pub async fn select_session(&self, id: u32) -> bool {
        let mut state = self.state.lock().await;
        if state.session_index(id).is_some() {
            state.active_id = id;
            true
        } else {
            false
        }
    }

    /// Remove a session and persist. Deleting the active session promotes
    /// the first remaining one, or fabricates a fresh empty session with a
    /// freshly incremented id when none remain.
    pub async fn delete_session(&self, id: u32) {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|session| session.id != id);
        if state.sessions.len() == before {
            return;
        }

        if state.active_id == id {
            let first_remaining = state.sessions.first().map(|session| session.id);
            match first_remaining {
                Some(first_id) => state.active_id = first_id,
                None => {
                    let fresh_id = state.next_session_id;
                    state.next_session_id += 1;
                    state
                        .sessions
                        .push(Session::new(fresh_id, self.options.default_model));
                    state.active_id = fresh_id;
                }
            }
        }
        self.persist(&state);
    }

    /// Rebind the active session to another model.
    pub async fn set_active_model(&self, model: ChatModel) {
        let mut state = self.state.lock().await;
        let active_id = state.active_id;
        if let Some(index) = state.session_index(active_id) {
            state.sessions[index].model = model;
        }
        self.persist(&state);
    }

    /// Snapshot of every session, in collection order.
    pub async fn sessions(&self) -> Vec<Session> {
        self.state.lock().await.sessions.clone()
    }

    /// Snapshot of the active session.
    pub async fn active_session(&self) -> Option<Session> {
        let state = self.state.lock().await;
        state
            .session_index(state.active_id)
            .map(|index| state.sessions[index].clone())
    }

    pub async fn active_session_id(&self) -> u32 {
        self.state.lock().await.active_id
    }

    pub async fn is_generating(&self) -> bool {
        self.state.lock().await.is_generating
    }

    /// Store failures are non-fatal: the in-memory state stays authoritative
    /// and the next successful save replaces the whole document.
    fn persist(&self, state: &ControllerState) {
        if let Err(e) = self.store.save(&state.sessions) {
            warn!(error = %e, "failed to persist sessions");
        }
    }
}
