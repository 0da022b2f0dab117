//! Domain layer for streamchat
//!
//! This crate contains the core types, with no I/O and no dependency on
//! infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Render tree
//!
//! A page is a tree of [`RenderNode`]s. Some nodes are [`Pending`]: their
//! content comes from an asynchronous source (typically model output). A
//! renderer emits known markup immediately, shows each pending node's
//! fallback inside a boundary, and later sends [`PatchChunk`]s that graft the
//! resolved content into place.
//!
//! ## Chat
//!
//! [`Message`]s belong to a chat and are written once, by either `Me` or
//! `Bot`. A Bot message is only ever written with its complete text.

pub mod chat;
pub mod core;
pub mod render;

// Re-export commonly used types
pub use chat::{
    entities::{Author, ChatId, MAX_SAFE_INTEGER, Message, NewMessage},
    submission::Submission,
};
pub use core::{error::DomainError, preview::preview};
pub use render::{
    boundary::{
        Boundary, BoundaryId, BoundaryState, ChunkId, IdAllocator, IdParseError, PassToken,
    },
    markup::{escape_attr, escape_text},
    node::{DEFAULT_ERROR_MARKUP, FragmentSource, Pending, RenderNode, SourceError},
    patch::{
        ATTR_BOUNDARY, ATTR_MODE, ATTR_SOURCE, BOUNDARY_TAG, FALLBACK_TAG, InsertionMode,
        PatchChunk, PatchFormatError, PatchInstruction, boundary_markup,
    },
    runtime::{PATCH_RUNTIME, runtime_script},
};
