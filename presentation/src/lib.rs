//! Presentation layer for streamchat
//!
//! This crate contains the HTML views, the HTTP server and the CLI
//! definitions.

pub mod cli;
pub mod server;
pub mod views;

// Re-export commonly used types
pub use cli::commands::Cli;
pub use server::{AppState, router, serve};
pub use views::HtmlChatView;
