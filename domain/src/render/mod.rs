//! Progressive rendering domain.
//!
//! - [`node`]: the async render tree ([`RenderNode`](node::RenderNode), [`Pending`](node::Pending))
//! - [`boundary`]: boundary and chunk ids, boundary lifecycle
//! - [`patch`]: the patch chunk wire format shared by server and client
//! - [`markup`]: escaping helpers
//! - [`runtime`]: inline `$sp` runtime for natively parsed full-page streams

pub mod boundary;
pub mod markup;
pub mod node;
pub mod patch;
pub mod runtime;
