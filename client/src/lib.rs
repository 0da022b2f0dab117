//! Browser client for streamchat
//!
//! Intercepts forms marked with `data-stream`, posts them with `fetch` and
//! patches the streamed response into the page as it arrives:
//!
//! - [`parser`] splits the body into complete top-level nodes
//! - [`patcher`] orders grafts and patch instructions
//! - [`interceptor`] ties transport, parser, patcher and document together
//!
//! Everything except the `wasm` bindings runs natively, so the whole
//! protocol is tested without a browser.

pub mod interceptor;
pub mod parser;
pub mod patcher;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(test)]
mod testing;

pub use interceptor::{
    ByteStream, DomSink, FormSubmission, ProtocolConfigurationError, SinkError, StreamForm,
    StreamTransport, StreamingSubmitter, SubmitError, SubmitReport, SwapDirective, TransportError,
};
pub use parser::{FragmentParser, NodeKind, ParsedNode};
pub use patcher::{PatchAction, Patcher, PatcherState};
