//! HTML views

pub mod components;
mod html_view;

pub use html_view::HtmlChatView;
