//! The async render tree.
//!
//! A [`RenderNode`] is either markup that is already known, a sequence of
//! nodes, or a [`Pending`] node whose content arrives later through a
//! [`FragmentSource`]. Trees are built once, handed to a renderer, and
//! consumed by it.

use super::markup::escape_text;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Markup shown for a failed boundary when the source supplied none
pub const DEFAULT_ERROR_MARKUP: &str = r#"<p class="text-red-500">Something went wrong.</p>"#;

/// Failure raised by a fragment source.
///
/// Carries the reason (for logs) and the user-visible markup that replaces
/// the failed boundary's fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct SourceError {
    reason: String,
    markup: String,
}

impl SourceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            markup: DEFAULT_ERROR_MARKUP.to_string(),
        }
    }

    /// Replace the user-visible markup
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = markup.into();
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }
}

/// Single-consumer lazy sequence of resolved nodes.
///
/// Stream end is the terminal signal. An `Err` item fails the boundary; the
/// renderer stops reading the source after it.
pub type FragmentSource = BoxStream<'static, Result<RenderNode, SourceError>>;

/// A node of the render tree
pub enum RenderNode {
    /// Markup emitted verbatim
    Literal(String),
    /// Children emitted in order
    Sequence(Vec<RenderNode>),
    /// Content that is not known yet
    Pending(Pending),
}

impl RenderNode {
    /// Trusted markup
    pub fn raw(markup: impl Into<String>) -> Self {
        RenderNode::Literal(markup.into())
    }

    /// Plain text, escaped
    pub fn text(text: &str) -> Self {
        RenderNode::Literal(escape_text(text))
    }

    pub fn empty() -> Self {
        RenderNode::Literal(String::new())
    }

    pub fn sequence(children: impl IntoIterator<Item = RenderNode>) -> Self {
        RenderNode::Sequence(children.into_iter().collect())
    }

    /// Wrap `children` between an opening and closing markup string
    pub fn wrap(open: impl Into<String>, children: RenderNode, close: impl Into<String>) -> Self {
        RenderNode::Sequence(vec![
            RenderNode::Literal(open.into()),
            children,
            RenderNode::Literal(close.into()),
        ])
    }

    /// Whether any pending node is reachable from this node
    pub fn has_pending(&self) -> bool {
        match self {
            RenderNode::Literal(_) => false,
            RenderNode::Sequence(children) => children.iter().any(RenderNode::has_pending),
            RenderNode::Pending(_) => true,
        }
    }
}

impl From<Pending> for RenderNode {
    fn from(pending: Pending) -> Self {
        RenderNode::Pending(pending)
    }
}

impl fmt::Debug for RenderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderNode::Literal(markup) => f.debug_tuple("Literal").field(markup).finish(),
            RenderNode::Sequence(children) => f.debug_tuple("Sequence").field(children).finish(),
            RenderNode::Pending(pending) => pending.fmt(f),
        }
    }
}

/// A node whose content is produced asynchronously
pub struct Pending {
    fallback: String,
    source: FragmentSource,
}

impl Pending {
    pub fn new(fallback: impl Into<String>, source: FragmentSource) -> Self {
        Self {
            fallback: fallback.into(),
            source,
        }
    }

    /// Pending node over any `Send` stream
    pub fn from_stream<S>(fallback: impl Into<String>, source: S) -> Self
    where
        S: Stream<Item = Result<RenderNode, SourceError>> + Send + 'static,
    {
        Self::new(fallback, source.boxed())
    }

    /// Pending node that resolves to exactly one node (or fails)
    pub fn once<F>(fallback: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<RenderNode, SourceError>> + Send + 'static,
    {
        Self::new(fallback, stream::once(future).boxed())
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn into_parts(self) -> (String, FragmentSource) {
        (self.fallback, self.source)
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}
