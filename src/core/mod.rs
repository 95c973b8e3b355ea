pub mod backend;
pub mod chat_stream;
pub mod config;
pub mod controller;
pub mod message;
pub mod models;
pub mod session;
pub mod store;
