//! Patch chunk wire format.
//!
//! A boundary is first emitted as
//!
//! ```text
//! <stream-boundary id="sb-1f0c9a2e-0"><stream-fallback>…</stream-fallback></stream-boundary>
//! ```
//!
//! and every later change to it travels as one patch chunk:
//!
//! ```text
//! <template id="sc-1f0c9a2e-4">markup</template><script data-boundary="sb-1f0c9a2e-0" data-source="sc-1f0c9a2e-4" data-mode="append">$sp("sb-1f0c9a2e-0","sc-1f0c9a2e-4","append")</script>
//! ```
//!
//! followed by a newline. The newline matters: it is the node that follows
//! the instruction, which is what releases a deferred instruction in the
//! client patcher.

use super::boundary::{BoundaryId, ChunkId, IdParseError};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const BOUNDARY_TAG: &str = "stream-boundary";
pub const FALLBACK_TAG: &str = "stream-fallback";
pub const ATTR_BOUNDARY: &str = "data-boundary";
pub const ATTR_SOURCE: &str = "data-source";
pub const ATTR_MODE: &str = "data-mode";

/// Errors decoding a patch instruction from its attributes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchFormatError {
    #[error("Missing attribute: {0}")]
    MissingAttribute(&'static str),

    #[error(transparent)]
    InvalidId(#[from] IdParseError),

    #[error("Unknown insertion mode: {0:?}")]
    UnknownMode(String),
}

/// How a chunk's markup is applied to its boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertionMode {
    /// Insert before the fallback; the boundary stays open
    Append,
    /// Replace the fallback and unwrap the boundary; terminal
    Replace,
}

impl InsertionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsertionMode::Append => "append",
            InsertionMode::Replace => "replace",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InsertionMode::Replace)
    }
}

impl fmt::Display for InsertionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsertionMode {
    type Err = PatchFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(InsertionMode::Append),
            "replace" => Ok(InsertionMode::Replace),
            other => Err(PatchFormatError::UnknownMode(other.to_string())),
        }
    }
}

/// Markup for a boundary that has not resolved yet
pub fn boundary_markup(id: BoundaryId, fallback: &str) -> String {
    format!(
        "<{BOUNDARY_TAG} id=\"{id}\"><{FALLBACK_TAG}>{fallback}</{FALLBACK_TAG}></{BOUNDARY_TAG}>"
    )
}

/// One unit of change to a boundary (Value Object)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchChunk {
    pub boundary: BoundaryId,
    pub mode: InsertionMode,
    pub markup: String,
}

impl PatchChunk {
    pub fn append(boundary: BoundaryId, markup: impl Into<String>) -> Self {
        Self {
            boundary,
            mode: InsertionMode::Append,
            markup: markup.into(),
        }
    }

    pub fn replace(boundary: BoundaryId, markup: impl Into<String>) -> Self {
        Self {
            boundary,
            mode: InsertionMode::Replace,
            markup: markup.into(),
        }
    }

    /// Serialize as template + instruction + separator newline
    pub fn encode(&self, chunk: ChunkId) -> String {
        let boundary = self.boundary;
        let mode = self.mode;
        format!(
            "<template id=\"{chunk}\">{markup}</template>\
             <script {ATTR_BOUNDARY}=\"{boundary}\" {ATTR_SOURCE}=\"{chunk}\" {ATTR_MODE}=\"{mode}\">\
             $sp(\"{boundary}\",\"{chunk}\",\"{mode}\")</script>\n",
            markup = self.markup,
        )
    }
}

/// Decoded form of a chunk's `<script>` element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchInstruction {
    pub boundary: BoundaryId,
    pub source: ChunkId,
    pub mode: InsertionMode,
}

impl PatchInstruction {
    /// Decode from an attribute lookup (`name -> value`)
    pub fn from_attributes<F>(attribute: F) -> Result<Self, PatchFormatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| {
            attribute(name).ok_or(PatchFormatError::MissingAttribute(name))
        };
        Ok(Self {
            boundary: get(ATTR_BOUNDARY)?.parse()?,
            source: get(ATTR_SOURCE)?.parse()?,
            mode: get(ATTR_MODE)?.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_boundary_markup_wraps_fallback() {
        assert_eq!(
            boundary_markup(BoundaryId::new(2), "..."),
            r#"<stream-boundary id="sb-2"><stream-fallback>...</stream-fallback></stream-boundary>"#
        );
    }

    #[test]
    fn test_encode_append_chunk() {
        let chunk = PatchChunk::append(BoundaryId::new(0), "Hi");
        assert_eq!(
            chunk.encode(ChunkId::new(3)),
            "<template id=\"sc-3\">Hi</template>\
             <script data-boundary=\"sb-0\" data-source=\"sc-3\" data-mode=\"append\">\
             $sp(\"sb-0\",\"sc-3\",\"append\")</script>\n"
        );
    }

    #[test]
    fn test_encoded_chunk_ends_with_separator() {
        let encoded = PatchChunk::replace(BoundaryId::new(1), "").encode(ChunkId::new(0));
        assert!(encoded.ends_with("</script>\n"));
        assert!(encoded.contains("data-mode=\"replace\""));
    }

    #[test]
    fn test_instruction_decodes_from_attributes() {
        let attrs: HashMap<&str, &str> = [
            (ATTR_BOUNDARY, "sb-4"),
            (ATTR_SOURCE, "sc-9"),
            (ATTR_MODE, "replace"),
        ]
        .into_iter()
        .collect();

        let instruction =
            PatchInstruction::from_attributes(|name| attrs.get(name).map(|v| v.to_string()))
                .unwrap();
        assert_eq!(instruction.boundary, BoundaryId::new(4));
        assert_eq!(instruction.source, ChunkId::new(9));
        assert_eq!(instruction.mode, InsertionMode::Replace);
    }

    #[test]
    fn test_instruction_reports_missing_and_unknown() {
        let missing = PatchInstruction::from_attributes(|_| None);
        assert_eq!(
            missing,
            Err(PatchFormatError::MissingAttribute(ATTR_BOUNDARY))
        );

        let unknown = PatchInstruction::from_attributes(|name| {
            Some(match name {
                ATTR_BOUNDARY => "sb-0".to_string(),
                ATTR_SOURCE => "sc-0".to_string(),
                _ => "prepend".to_string(),
            })
        });
        assert_eq!(
            unknown,
            Err(PatchFormatError::UnknownMode("prepend".to_string()))
        );
    }

    #[test]
    fn test_mode_terminality() {
        assert!(!InsertionMode::Append.is_terminal());
        assert!(InsertionMode::Replace.is_terminal());
    }
}
