//! Parley is the headless session and streaming engine for chat clients that
//! talk to a remote LLM proxy over HTTP.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session data model, the controller state machine that
//!   drives an exchange from user input to persisted reply, the SSE streaming
//!   service, session persistence, and configuration.
//! - [`api`] defines the chat payloads shared by the completion client and
//!   the title summarizer, plus the request-shaping rules (system preamble,
//!   role mapping, history truncation).
//!
//! A front end embeds [`core::controller::ChatController`], feeds it user
//! input, and renders the session snapshots it exposes; everything visual is
//! out of scope here. The controller never surfaces network failures as
//! errors: they degrade to displayable text inside the conversation, so the
//! embedding application has nothing to recover from.

pub mod api;
pub mod core;
