//! Incremental HTML fragment parser
//!
//! Turns a response body, fed in arbitrary byte slices, into complete
//! top-level nodes. A node is only returned once its closing tag has
//! arrived, so a consumer never sees half an element.
//!
//! This is not a general HTML parser: it splits well-formed server output
//! (balanced tags, quoted attributes) and leaves building the actual nodes
//! to the document.

use streamchat_domain::{ATTR_BOUNDARY, PatchInstruction};
use tracing::{trace, warn};

/// Elements whose content is not markup
const RAW_TEXT: [&str; 4] = ["script", "style", "textarea", "title"];

const VOID: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Longest tail held back as a possible character reference
const MAX_ENTITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Element { tag: String },
    /// Comment or `<!...>` declaration
    Comment,
    /// A patch instruction script
    Instruction(PatchInstruction),
}

/// One complete top-level node and its source markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNode {
    pub kind: NodeKind,
    pub markup: String,
}

impl ParsedNode {
    pub fn is_instruction(&self) -> bool {
        matches!(self.kind, NodeKind::Instruction(_))
    }

    /// Whitespace-only text, such as the newline ending a patch chunk
    pub fn is_separator(&self) -> bool {
        self.kind == NodeKind::Text && self.markup.trim().is_empty()
    }

    pub fn instruction(&self) -> Option<&PatchInstruction> {
        match &self.kind {
            NodeKind::Instruction(instruction) => Some(instruction),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag } => Some(tag),
            NodeKind::Instruction(_) => Some("script"),
            _ => None,
        }
    }
}

enum Scan {
    Complete(usize, NodeKind),
    /// Consumed without producing a node (stray end tag)
    Skip(usize),
    Incomplete,
}

/// Splits streamed bytes into complete top-level nodes
#[derive(Debug, Default)]
pub struct FragmentParser {
    buffer: String,
    undecoded: Vec<u8>,
}

impl FragmentParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next slice of the body; returns the nodes it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ParsedNode> {
        self.decode(bytes);
        self.drain()
    }

    /// End of body: every remaining node plus the incomplete tail, if any.
    pub fn finish(mut self) -> Vec<ParsedNode> {
        if !self.undecoded.is_empty() {
            let rest = String::from_utf8_lossy(&self.undecoded).into_owned();
            self.buffer.push_str(&rest);
            self.undecoded.clear();
        }

        let mut nodes = self.drain();
        if !self.buffer.is_empty() {
            let markup = std::mem::take(&mut self.buffer);
            trace!(bytes = markup.len(), "Flushing incomplete tail");
            let kind = match markup.strip_prefix('<').and_then(tag_name) {
                Some(tag) => NodeKind::Element { tag },
                None => NodeKind::Text,
            };
            nodes.push(ParsedNode { kind, markup });
        }
        nodes
    }

    /// Stop without flushing; returns how many bytes were discarded.
    pub fn abort(self) -> usize {
        self.buffer.len() + self.undecoded.len()
    }

    /// Bytes received but not yet part of a returned node
    pub fn pending(&self) -> usize {
        self.buffer.len() + self.undecoded.len()
    }

    fn decode(&mut self, bytes: &[u8]) {
        self.undecoded.extend_from_slice(bytes);
        let input = std::mem::take(&mut self.undecoded);
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    self.buffer
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // a sequence split across reads
                        None => {
                            self.undecoded = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    fn drain(&mut self) -> Vec<ParsedNode> {
        let mut nodes = Vec::new();
        let mut pos = 0;
        while pos < self.buffer.len() {
            let rest = &self.buffer[pos..];
            match scan_node(rest) {
                Scan::Complete(len, kind) => {
                    nodes.push(ParsedNode {
                        kind,
                        markup: rest[..len].to_string(),
                    });
                    pos += len;
                }
                Scan::Skip(len) => pos += len,
                Scan::Incomplete => break,
            }
        }
        self.buffer.drain(..pos);
        nodes
    }
}

fn scan_node(s: &str) -> Scan {
    if !s.starts_with('<') {
        return scan_text(s, 0);
    }
    match s[1..].chars().next() {
        None => Scan::Incomplete,
        Some('!') => match comment_end(s, 0) {
            Some(end) => Scan::Complete(end, NodeKind::Comment),
            None => Scan::Incomplete,
        },
        Some('/') => match tag_end(s, 2) {
            Some(end) => {
                trace!(tag = %&s[..end], "Skipping stray end tag");
                Scan::Skip(end)
            }
            None => Scan::Incomplete,
        },
        Some(c) if c.is_ascii_alphabetic() => scan_element(s),
        Some(_) => scan_text(s, 1),
    }
}

/// Text up to the next markup start
fn scan_text(s: &str, from: usize) -> Scan {
    let mut search = from;
    while let Some(offset) = s[search..].find('<') {
        let at = search + offset;
        match s[at + 1..].chars().next() {
            // can't tell yet whether this starts a tag
            None => return text_until(at),
            Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!' => return text_until(at),
            Some(_) => search = at + 1,
        }
    }
    text_until(s.len() - entity_holdback(s))
}

fn text_until(len: usize) -> Scan {
    if len == 0 {
        Scan::Incomplete
    } else {
        Scan::Complete(len, NodeKind::Text)
    }
}

/// Length of a trailing `&...` that may still become a character reference
fn entity_holdback(s: &str) -> usize {
    match s.rfind('&') {
        Some(amp) => {
            let tail = &s[amp + 1..];
            let open = tail.len() < MAX_ENTITY
                && tail.chars().all(|c| c.is_ascii_alphanumeric() || c == '#');
            if open { s.len() - amp } else { 0 }
        }
        None => 0,
    }
}

fn scan_element(s: &str) -> Scan {
    let Some(tag) = tag_name(&s[1..]) else {
        return scan_text(s, 1);
    };
    let Some(open_end) = tag_end(s, 1) else {
        return Scan::Incomplete;
    };

    if VOID.contains(&tag.as_str()) || s[..open_end].ends_with("/>") {
        return Scan::Complete(open_end, NodeKind::Element { tag });
    }

    if RAW_TEXT.contains(&tag.as_str()) {
        let Some(end) = raw_text_end(s, open_end, &tag) else {
            return Scan::Incomplete;
        };
        if tag == "script" {
            if let Some(instruction) = instruction(&s[..open_end]) {
                return Scan::Complete(end, NodeKind::Instruction(instruction));
            }
        }
        return Scan::Complete(end, NodeKind::Element { tag });
    }

    match element_end(s, open_end, &tag) {
        Some(end) => Scan::Complete(end, NodeKind::Element { tag }),
        None => Scan::Incomplete,
    }
}

/// Scan children until the element opened as `tag` is closed.
fn element_end(s: &str, mut pos: usize, tag: &str) -> Option<usize> {
    let mut open = vec![tag.to_string()];
    loop {
        let at = pos + s[pos..].find('<')?;
        let rest = &s[at..];
        match rest[1..].chars().next()? {
            '!' => pos = comment_end(s, at)?,
            '/' => {
                let end = tag_end(s, at + 2)?;
                let name = tag_name(&rest[2..]).unwrap_or_default();
                if let Some(depth) = open.iter().rposition(|t| *t == name) {
                    open.truncate(depth);
                    if open.is_empty() {
                        return Some(end);
                    }
                }
                pos = end;
            }
            c if c.is_ascii_alphabetic() => {
                let name = tag_name(&rest[1..]).unwrap_or_default();
                let end = tag_end(s, at + 1)?;
                if RAW_TEXT.contains(&name.as_str()) {
                    pos = raw_text_end(s, end, &name)?;
                } else {
                    if !VOID.contains(&name.as_str()) && !s[..end].ends_with("/>") {
                        open.push(name);
                    }
                    pos = end;
                }
            }
            _ => pos = at + 1,
        }
    }
}

/// Lowercased tag name at the start of `s`
fn tag_name(s: &str) -> Option<String> {
    let len = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(s.len());
    if len == 0 || !s.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(s[..len].to_ascii_lowercase())
}

/// Index just past the `>` closing a tag, honoring quoted attribute values
fn tag_end(s: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (i, b) in s.bytes().enumerate().skip(from) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

/// End of a comment or declaration starting at `at`
fn comment_end(s: &str, at: usize) -> Option<usize> {
    let rest = &s[at..];
    if rest.starts_with("<!--") {
        rest[4..].find("-->").map(|i| at + 4 + i + 3)
    } else if "<!--".starts_with(rest) {
        None
    } else {
        rest.find('>').map(|i| at + i + 1)
    }
}

/// Index just past `</tag>` for raw-text content starting at `from`
fn raw_text_end(s: &str, from: usize, tag: &str) -> Option<usize> {
    let lower = s[from..].to_ascii_lowercase();
    let needle = format!("</{tag}");
    let mut search = 0;
    while let Some(offset) = lower[search..].find(&needle) {
        let at = search + offset;
        let after = at + needle.len();
        match lower[after..].chars().next()? {
            c if c == '>' || c.is_ascii_whitespace() || c == '/' => {
                return tag_end(s, from + after);
            }
            _ => search = after,
        }
    }
    None
}

/// The patch instruction declared by a `<script ...>` start tag, if any
fn instruction(start_tag: &str) -> Option<PatchInstruction> {
    let attributes = attributes(start_tag);
    if !attributes.iter().any(|(name, _)| name == ATTR_BOUNDARY) {
        return None;
    }
    let lookup = |name: &str| {
        attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };
    match PatchInstruction::from_attributes(lookup) {
        Ok(instruction) => Some(instruction),
        Err(e) => {
            warn!("Ignoring malformed patch instruction: {}", e);
            None
        }
    }
}

/// Attribute pairs of a start tag (`<name a="1" b>`)
fn attributes(start_tag: &str) -> Vec<(String, String)> {
    let body = start_tag
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/');
    let mut chars = body
        .char_indices()
        .skip_while(|(_, c)| !c.is_whitespace())
        .peekable();
    let mut attrs = Vec::new();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace() || *c == '/').is_some() {}
        let Some(&(start, _)) = chars.peek() else {
            break;
        };
        let mut end = start;
        while let Some((i, c)) = chars.next_if(|(_, c)| !c.is_whitespace() && *c != '=') {
            end = i + c.len_utf8();
        }
        let name = body[start..end].to_ascii_lowercase();

        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let mut value = String::new();
        if chars.next_if(|(_, c)| *c == '=').is_some() {
            while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
            match chars.peek().map(|(_, c)| *c) {
                Some(q @ ('"' | '\'')) => {
                    chars.next();
                    for (_, c) in chars.by_ref() {
                        if c == q {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some((_, c)) = chars.next_if(|(_, c)| !c.is_whitespace()) {
                        value.push(c);
                    }
                }
            }
        }
        attrs.push((name, decode_entities(&value)));
    }
    attrs
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamchat_domain::{BoundaryId, ChunkId, InsertionMode, PatchChunk};

    fn markup(nodes: &[ParsedNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.markup.as_str()).collect()
    }

    #[test]
    fn test_splits_top_level_nodes() {
        let mut parser = FragmentParser::new();
        let nodes = parser.feed(b"<p>a</p>\n<b>x");
        assert_eq!(markup(&nodes), vec!["<p>a</p>", "\n"]);

        let nodes = parser.feed(b"y</b>");
        assert_eq!(markup(&nodes), vec!["<b>xy</b>"]);
        assert_eq!(nodes[0].tag(), Some("b"));
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn test_holds_back_partial_start_tag() {
        let mut parser = FragmentParser::new();
        assert!(parser.feed(b"<templ").is_empty());
        assert!(parser.feed(b"ate id=\"sc-0\">hi</temp").is_empty());
        let nodes = parser.feed(b"late>");
        assert_eq!(markup(&nodes), vec!["<template id=\"sc-0\">hi</template>"]);
    }

    #[test]
    fn test_multibyte_character_split_across_reads() {
        let bytes = "é!".as_bytes();
        let mut parser = FragmentParser::new();
        assert!(parser.feed(&bytes[..1]).is_empty());
        let nodes = parser.feed(&bytes[1..]);
        assert_eq!(markup(&nodes), vec!["é!"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut parser = FragmentParser::new();
        let nodes = parser.feed(&[b'a', 0xFF, b'b']);
        assert_eq!(markup(&nodes), vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn test_patch_chunk_yields_template_instruction_separator() {
        let encoded = PatchChunk::append(BoundaryId::new(2), "Hi <i>there</i>").encode(ChunkId::new(5));
        let nodes = FragmentParser::new().feed(encoded.as_bytes());

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].tag(), Some("template"));
        let instruction = nodes[1].instruction().unwrap();
        assert_eq!(instruction.boundary, BoundaryId::new(2));
        assert_eq!(instruction.source, ChunkId::new(5));
        assert_eq!(instruction.mode, InsertionMode::Append);
        assert_eq!(nodes[2].kind, NodeKind::Text);
        assert_eq!(nodes[2].markup, "\n");
        assert!(nodes[2].is_separator());
        assert!(!nodes[0].is_separator());
    }

    #[test]
    fn test_scoped_instruction_ids() {
        let nodes = FragmentParser::new().feed(
            br#"<script data-boundary="sb-0000beef-2" data-source="sc-0000beef-7" data-mode="append"></script>"#,
        );
        let instruction = nodes[0].instruction().unwrap();
        assert_eq!(instruction.boundary.to_string(), "sb-0000beef-2");
        assert_eq!(instruction.boundary.get(), 2);
        assert_eq!(instruction.source.to_string(), "sc-0000beef-7");
    }

    #[test]
    fn test_plain_script_is_an_element() {
        let nodes = FragmentParser::new().feed(b"<script>if (a<b && c) {}</script>");
        assert_eq!(nodes.len(), 1);
        assert_eq!(
            nodes[0].kind,
            NodeKind::Element {
                tag: "script".to_string()
            }
        );
    }

    #[test]
    fn test_raw_text_waits_for_its_closing_tag() {
        let mut parser = FragmentParser::new();
        assert!(parser.feed(b"<textarea><b>not a tag</").is_empty());
        let nodes = parser.feed(b"textarea>");
        assert_eq!(markup(&nodes), vec!["<textarea><b>not a tag</textarea>"]);
    }

    #[test]
    fn test_nested_same_tag() {
        let mut parser = FragmentParser::new();
        assert!(parser.feed(b"<div><div>x</div>").is_empty());
        let nodes = parser.feed(b"</div>tail");
        assert_eq!(markup(&nodes), vec!["<div><div>x</div></div>", "tail"]);
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let nodes = FragmentParser::new().feed(b"<br><input name=\"a>b\"><x-y/>");
        assert_eq!(markup(&nodes), vec!["<br>", "<input name=\"a>b\">", "<x-y/>"]);
    }

    #[test]
    fn test_comments() {
        let mut parser = FragmentParser::new();
        assert!(parser.feed(b"<!-").is_empty());
        assert!(parser.feed(b"- <p> -").is_empty());
        let nodes = parser.feed(b"->");
        assert_eq!(nodes[0].kind, NodeKind::Comment);
        assert_eq!(nodes[0].markup, "<!-- <p> -->");
    }

    #[test]
    fn test_less_than_in_text() {
        let nodes = FragmentParser::new().feed(b"a < b");
        assert_eq!(markup(&nodes), vec!["a < b"]);
    }

    #[test]
    fn test_trailing_entity_is_held_back() {
        let mut parser = FragmentParser::new();
        assert_eq!(markup(&parser.feed(b"a &am")), vec!["a "]);
        assert_eq!(markup(&parser.feed(b"p; b")), vec!["&amp; b"]);
    }

    #[test]
    fn test_stray_end_tag_is_dropped() {
        let nodes = FragmentParser::new().feed(b"</div>x");
        assert_eq!(markup(&nodes), vec!["x"]);
    }

    #[test]
    fn test_finish_flushes_incomplete_tail() {
        let mut parser = FragmentParser::new();
        assert!(parser.feed(b"<p>unterminated").is_empty());
        let nodes = parser.finish();
        assert_eq!(markup(&nodes), vec!["<p>unterminated"]);
        assert_eq!(nodes[0].tag(), Some("p"));
    }

    #[test]
    fn test_abort_discards_tail() {
        let mut parser = FragmentParser::new();
        parser.feed(b"<p>partial");
        assert_eq!(parser.abort(), "<p>partial".len());
    }

    #[test]
    fn test_attribute_parsing() {
        let attrs = attributes(r#"<script data-boundary="sb-1" data-source='sc-2' data-mode=replace defer>"#);
        assert_eq!(
            attrs,
            vec![
                ("data-boundary".to_string(), "sb-1".to_string()),
                ("data-source".to_string(), "sc-2".to_string()),
                ("data-mode".to_string(), "replace".to_string()),
                ("defer".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_malformed_instruction_is_a_plain_script() {
        let nodes = FragmentParser::new().feed(br#"<script data-boundary="sb-1" data-source="sc-1" data-mode="prepend"></script>"#);
        assert!(!nodes[0].is_instruction());
    }
}
