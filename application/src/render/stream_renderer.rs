//! Stream renderer: turns an async render tree into one ordered byte stream.
//!
//! Rendering happens in two phases:
//!
//! 1. **Synchronous pass** (inside [`StreamRenderer::render`]): walk the tree
//!    depth-first, emit literal markup, emit each pending node's fallback
//!    inside a boundary and register its source. Nothing is awaited.
//! 2. **Drain**: every registered source is polled through a single
//!    [`SelectAll`] queue. Each resolved node becomes an `append` chunk, the
//!    end of a source becomes an empty `replace` chunk, and a failure becomes
//!    a `replace` chunk carrying the source's error markup.
//!
//! Pending nodes found inside a resolved node are registered on the same
//! queue, so a reply rendered as a chain of boundaries is drained by a loop
//! rather than by recursion.
//!
//! Every pass draws a random [`PassToken`] and scopes all of its boundary and
//! chunk ids with it, so fragments of several responses can be patched into
//! one document without one response's chunks reaching another's boundaries.
//!
//! # Ordering
//!
//! Chunks of one boundary follow the order its source yields. Chunks of
//! independent boundaries interleave in whatever order their sources happen
//! to produce output; there is no order across boundaries beyond "all
//! synchronous markup first".

use async_stream::stream;
use bytes::Bytes;
use futures::stream::{self as fstream, BoxStream, SelectAll, StreamExt};
use std::collections::HashMap;
use streamchat_domain::{
    Boundary, BoundaryId, FragmentSource, IdAllocator, PassToken, PatchChunk, RenderNode,
    SourceError, boundary_markup,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Rendered output: the shell, then one item per patch chunk
pub type RenderStream = BoxStream<'static, Bytes>;

/// What happened to a boundary's source
#[derive(Debug)]
enum BoundaryEvent {
    Resolved(RenderNode),
    Failed(SourceError),
    Finished,
}

type EventStream = BoxStream<'static, (BoundaryId, BoundaryEvent)>;

/// Adapt a source so it reports its own end and stops after a failure.
fn drain(id: BoundaryId, source: FragmentSource) -> EventStream {
    fstream::unfold(Some(source), move |state| async move {
        let mut source = state?;
        match source.next().await {
            Some(Ok(node)) => Some(((id, BoundaryEvent::Resolved(node)), Some(source))),
            Some(Err(e)) => Some(((id, BoundaryEvent::Failed(e)), None)),
            None => Some(((id, BoundaryEvent::Finished), None)),
        }
    })
    .boxed()
}

/// State of one render pass
struct RenderPass {
    ids: IdAllocator,
    boundaries: HashMap<BoundaryId, Boundary>,
    queue: SelectAll<EventStream>,
    failures: usize,
}

impl RenderPass {
    fn new(ids: IdAllocator) -> Self {
        Self {
            ids,
            boundaries: HashMap::new(),
            queue: SelectAll::new(),
            failures: 0,
        }
    }

    /// Emit `node` into `out`, registering every pending node it contains.
    fn write(&mut self, node: RenderNode, out: &mut String) {
        match node {
            RenderNode::Literal(markup) => out.push_str(&markup),
            RenderNode::Sequence(children) => {
                for child in children {
                    self.write(child, out);
                }
            }
            RenderNode::Pending(pending) => {
                let id = self.ids.next_boundary();
                let (fallback, source) = pending.into_parts();
                out.push_str(&boundary_markup(id, &fallback));
                self.boundaries.insert(id, Boundary::new(id));
                self.queue.push(drain(id, source));
                trace!(boundary = %id, "Registered boundary");
            }
        }
    }

    fn apply(&mut self, id: BoundaryId, event: BoundaryEvent) -> Bytes {
        let chunk = match event {
            BoundaryEvent::Resolved(node) => {
                let mut markup = String::new();
                self.write(node, &mut markup);
                PatchChunk::append(id, markup)
            }
            BoundaryEvent::Failed(error) => {
                self.failures += 1;
                warn!(boundary = %id, error = %error, "Boundary source failed");
                PatchChunk::replace(id, error.markup())
            }
            BoundaryEvent::Finished => PatchChunk::replace(id, ""),
        };

        if chunk.mode.is_terminal() {
            if let Some(boundary) = self.boundaries.get_mut(&id) {
                boundary.resolve();
            }
        }

        let chunk_id = self.ids.next_chunk();
        trace!(boundary = %id, chunk = %chunk_id, mode = %chunk.mode, "Emitting patch chunk");
        Bytes::from(chunk.encode(chunk_id))
    }

    fn unresolved(&self) -> usize {
        self.boundaries.values().filter(|b| !b.is_resolved()).count()
    }
}

/// Progressive HTML renderer
///
/// Cheap to clone. Every render pass gets a child of the renderer's shutdown
/// token, so cancelling the parent stops every in-flight response.
#[derive(Debug, Clone, Default)]
pub struct StreamRenderer {
    shutdown: CancellationToken,
}

impl StreamRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `shutdown` as the parent of every render pass's cancellation token
    pub fn with_shutdown(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }

    /// Render `tree`, stopping if the renderer's shutdown token is cancelled.
    pub fn render(&self, tree: RenderNode) -> RenderStream {
        self.render_with_cancellation(tree, self.shutdown.child_token())
    }

    /// Render `tree`, stopping without further output once `cancel` fires.
    ///
    /// The synchronous pass runs before this function returns. Dropping the
    /// returned stream drops every registered source.
    pub fn render_with_cancellation(
        &self,
        tree: RenderNode,
        cancel: CancellationToken,
    ) -> RenderStream {
        let pass = PassToken::new(rand::random());
        self.render_pass(tree, cancel, IdAllocator::scoped(pass))
    }

    fn render_pass(
        &self,
        tree: RenderNode,
        cancel: CancellationToken,
        ids: IdAllocator,
    ) -> RenderStream {
        let mut pass = RenderPass::new(ids);
        let mut shell = String::new();
        pass.write(tree, &mut shell);
        debug!(
            pass = ?pass.ids.pass(),
            boundaries = pass.ids.boundaries(),
            bytes = shell.len(),
            "Synchronous pass complete"
        );

        stream! {
            if !shell.is_empty() {
                yield Bytes::from(shell);
            }

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(unresolved = pass.unresolved(), "Render cancelled");
                        break;
                    }
                    next = pass.queue.next() => next,
                };
                let Some((id, event)) = next else {
                    debug!(
                        boundaries = pass.ids.boundaries(),
                        chunks = pass.ids.chunks(),
                        failures = pass.failures,
                        "Render complete"
                    );
                    break;
                };
                yield pass.apply(id, event);
            }
        }
        .boxed()
    }
}
