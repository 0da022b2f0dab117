//! Boundary identity and lifecycle.
//!
//! A boundary is the placeholder region around one pending node. Its id is
//! allocated by the render pass that encounters it. Responses streamed into
//! the same document must not share ids, so a render pass scopes its ids
//! with a [`PassToken`]: `sb-{token}-{n}` and `sc-{token}-{n}`. Unscoped ids
//! (`sb-{n}`) are only unique within one response.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const BOUNDARY_PREFIX: &str = "sb-";
const CHUNK_PREFIX: &str = "sc-";

/// Error returned when an id attribute does not have the expected shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed {kind} id: {value:?}")]
pub struct IdParseError {
    kind: &'static str,
    value: String,
}

/// Scope shared by every id of one render pass, written as 8 hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassToken(u32);

impl PassToken {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PassToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// `(pass, index)` of an id, shared by both id kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct ScopedIndex {
    pass: Option<PassToken>,
    index: u64,
}

impl ScopedIndex {
    fn write(&self, f: &mut fmt::Formatter<'_>, prefix: &str) -> fmt::Result {
        match self.pass {
            Some(pass) => write!(f, "{prefix}{pass}-{}", self.index),
            None => write!(f, "{prefix}{}", self.index),
        }
    }

    fn parse(s: &str, prefix: &str, kind: &'static str) -> Result<Self, IdParseError> {
        let error = || IdParseError {
            kind,
            value: s.to_string(),
        };
        let rest = s.strip_prefix(prefix).ok_or_else(error)?;
        let (pass, digits) = match rest.split_once('-') {
            Some((token, digits)) => {
                if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(error());
                }
                let token = u32::from_str_radix(token, 16).map_err(|_| error())?;
                (Some(PassToken(token)), digits)
            }
            None => (None, rest),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(error());
        }
        let index = digits.parse().map_err(|_| error())?;
        Ok(Self { pass, index })
    }
}

/// Identifier of a boundary (`sb-{token}-{n}`, or `sb-{n}` when unscoped)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundaryId(ScopedIndex);

impl BoundaryId {
    /// Unscoped id
    pub fn new(index: u64) -> Self {
        Self(ScopedIndex { pass: None, index })
    }

    pub fn scoped(pass: PassToken, index: u64) -> Self {
        Self(ScopedIndex {
            pass: Some(pass),
            index,
        })
    }

    pub fn get(self) -> u64 {
        self.0.index
    }

    pub fn pass(self) -> Option<PassToken> {
        self.0.pass
    }
}

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write(f, BOUNDARY_PREFIX)
    }
}

impl FromStr for BoundaryId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScopedIndex::parse(s, BOUNDARY_PREFIX, "boundary").map(Self)
    }
}

/// Identifier of one emitted patch chunk (`sc-{token}-{n}`, or `sc-{n}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(ScopedIndex);

impl ChunkId {
    /// Unscoped id
    pub fn new(index: u64) -> Self {
        Self(ScopedIndex { pass: None, index })
    }

    pub fn scoped(pass: PassToken, index: u64) -> Self {
        Self(ScopedIndex {
            pass: Some(pass),
            index,
        })
    }

    pub fn get(self) -> u64 {
        self.0.index
    }

    pub fn pass(self) -> Option<PassToken> {
        self.0.pass
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write(f, CHUNK_PREFIX)
    }
}

impl FromStr for ChunkId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScopedIndex::parse(s, CHUNK_PREFIX, "chunk").map(Self)
    }
}

/// Monotonic id source owned by a single render pass
#[derive(Debug, Default)]
pub struct IdAllocator {
    pass: Option<PassToken>,
    next_boundary: u64,
    next_chunk: u64,
}

impl IdAllocator {
    /// Allocator of unscoped ids
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose ids all carry `pass`
    pub fn scoped(pass: PassToken) -> Self {
        Self {
            pass: Some(pass),
            ..Self::default()
        }
    }

    pub fn pass(&self) -> Option<PassToken> {
        self.pass
    }

    pub fn next_boundary(&mut self) -> BoundaryId {
        let id = BoundaryId(ScopedIndex {
            pass: self.pass,
            index: self.next_boundary,
        });
        self.next_boundary += 1;
        id
    }

    pub fn next_chunk(&mut self) -> ChunkId {
        let id = ChunkId(ScopedIndex {
            pass: self.pass,
            index: self.next_chunk,
        });
        self.next_chunk += 1;
        id
    }

    /// Number of boundaries allocated so far
    pub fn boundaries(&self) -> u64 {
        self.next_boundary
    }

    /// Number of chunks allocated so far
    pub fn chunks(&self) -> u64 {
        self.next_chunk
    }
}

/// Lifecycle of a boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
    Unresolved,
    Resolved,
}

/// A registered boundary (Entity)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    id: BoundaryId,
    state: BoundaryState,
}

impl Boundary {
    pub fn new(id: BoundaryId) -> Self {
        Self {
            id,
            state: BoundaryState::Unresolved,
        }
    }

    pub fn id(&self) -> BoundaryId {
        self.id
    }

    pub fn state(&self) -> BoundaryState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state == BoundaryState::Resolved
    }

    /// Transition to resolved. Returns `false` if it already was.
    pub fn resolve(&mut self) -> bool {
        if self.is_resolved() {
            return false;
        }
        self.state = BoundaryState::Resolved;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_with_prefix() {
        assert_eq!(BoundaryId::new(3).to_string(), "sb-3");
        assert_eq!(ChunkId::new(12).to_string(), "sc-12");
    }

    #[test]
    fn test_ids_parse_back() {
        assert_eq!("sb-7".parse::<BoundaryId>().unwrap(), BoundaryId::new(7));
        assert_eq!("sc-0".parse::<ChunkId>().unwrap(), ChunkId::new(0));
    }

    #[test]
    fn test_ids_reject_wrong_prefix_or_digits() {
        assert!("sc-1".parse::<BoundaryId>().is_err());
        assert!("sb-".parse::<BoundaryId>().is_err());
        assert!("sb-1a".parse::<BoundaryId>().is_err());
        assert!("sb--1".parse::<BoundaryId>().is_err());
    }

    #[test]
    fn test_scoped_ids_round_trip() {
        let pass = PassToken::new(0x00ab_12cd);
        let boundary = BoundaryId::scoped(pass, 3);
        assert_eq!(boundary.to_string(), "sb-00ab12cd-3");
        assert_eq!("sb-00ab12cd-3".parse::<BoundaryId>().unwrap(), boundary);
        assert_eq!(
            "sc-ffffffff-0".parse::<ChunkId>().unwrap(),
            ChunkId::scoped(PassToken::new(u32::MAX), 0)
        );
    }

    #[test]
    fn test_scoped_ids_differ_from_unscoped() {
        let scoped = BoundaryId::scoped(PassToken::new(1), 0);
        assert_ne!(scoped, BoundaryId::new(0));
        assert_ne!(scoped, BoundaryId::scoped(PassToken::new(2), 0));
        assert_eq!(scoped.pass(), Some(PassToken::new(1)));
        assert_eq!(BoundaryId::new(0).pass(), None);
    }

    #[test]
    fn test_scoped_ids_reject_bad_token() {
        assert!("sb-abc-1".parse::<BoundaryId>().is_err());
        assert!("sb-0000000g-1".parse::<BoundaryId>().is_err());
        assert!("sb-00000001-".parse::<BoundaryId>().is_err());
        assert!("sb-00000001-2-3".parse::<BoundaryId>().is_err());
    }

    #[test]
    fn test_scoped_allocator() {
        let mut ids = IdAllocator::scoped(PassToken::new(7));
        assert_eq!(ids.next_boundary(), BoundaryId::scoped(PassToken::new(7), 0));
        assert_eq!(ids.next_chunk().to_string(), "sc-00000007-0");
        assert_eq!(ids.pass(), Some(PassToken::new(7)));
    }

    #[test]
    fn test_allocator_is_monotonic_per_kind() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_boundary(), BoundaryId::new(0));
        assert_eq!(ids.next_chunk(), ChunkId::new(0));
        assert_eq!(ids.next_boundary(), BoundaryId::new(1));
        assert_eq!(ids.boundaries(), 2);
        assert_eq!(ids.chunks(), 1);
    }

    #[test]
    fn test_boundary_resolves_exactly_once() {
        let mut boundary = Boundary::new(BoundaryId::new(0));
        assert_eq!(boundary.state(), BoundaryState::Unresolved);
        assert!(boundary.resolve());
        assert!(!boundary.resolve());
        assert!(boundary.is_resolved());
    }
}
