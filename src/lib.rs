/// eventhook - forwards structured server events to a chat webhook
///
/// This library turns operational, request, response, error and log events
/// into Slack-style messages and posts each one to an incoming webhook.
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod filter;
pub mod formatting;
pub mod internal_metrics;
pub mod notification;
pub mod source;
pub mod task_manager;
pub mod types;

// Re-export core types for convenience
pub use core::*;
