//! Progressive rendering of async render trees

pub mod stream_renderer;

pub use stream_renderer::{RenderStream, StreamRenderer};
