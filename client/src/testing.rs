//! A string-backed document for exercising the submitter without a browser.

use crate::interceptor::{DomSink, SinkError};
use crate::parser::ParsedNode;
use streamchat_domain::{BOUNDARY_TAG, FALLBACK_TAG, InsertionMode, PatchInstruction};

const ANCHOR: &str = "<stream-patcher></stream-patcher>";

/// Markup plus the operations the patcher needs.
///
/// Selectors are `.class`, `#id` or a bare tag name.
pub struct MemoryDocument {
    html: String,
}

impl MemoryDocument {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
        }
    }

    pub fn html(&self) -> String {
        self.html.clone()
    }

    fn anchor(&self) -> Result<usize, SinkError> {
        self.html
            .find(ANCHOR)
            .ok_or_else(|| SinkError::MissingElement("stream-patcher".to_string()))
    }

    /// (start, end of start tag) of the first element matching `selector`
    fn find_element(&self, selector: &str) -> Option<(usize, usize, String)> {
        let mut pos = 0;
        while let Some(offset) = self.html[pos..].find('<') {
            let start = pos + offset;
            let open_end = start + self.html[start..].find('>')? + 1;
            let tag = &self.html[start + 1..open_end - 1];
            let name: String = tag
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect();
            if !name.is_empty() && matches(selector, &name, tag) {
                return Some((start, open_end, name));
            }
            pos = open_end;
        }
        None
    }

    /// Start of the `</tag>` closing the element whose start tag ends at `from`
    fn matching_close(&self, tag: &str, from: usize) -> Option<usize> {
        let open = format!("<{tag}");
        let close = format!("</{tag}>");
        let mut depth = 1;
        let mut pos = from;
        loop {
            let next_close = pos + self.html[pos..].find(&close)?;
            match self.html[pos..next_close].find(&open) {
                Some(offset) => {
                    depth += 1;
                    pos += offset + open.len();
                }
                None => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(next_close);
                    }
                    pos = next_close + close.len();
                }
            }
        }
    }

    /// Remove the template `id` and return its content
    fn take_template(&mut self, id: &str) -> Result<String, SinkError> {
        let open = format!("<template id=\"{id}\">");
        let start = self
            .html
            .find(&open)
            .ok_or_else(|| SinkError::MissingElement(id.to_string()))?;
        let content_start = start + open.len();
        let content_end = self
            .matching_close("template", content_start)
            .ok_or_else(|| SinkError::MissingElement(id.to_string()))?;
        let content = self.html[content_start..content_end].to_string();
        self.html
            .replace_range(start..content_end + "</template>".len(), "");
        Ok(content)
    }
}

fn matches(selector: &str, name: &str, tag: &str) -> bool {
    let attribute = |attr: &str| {
        let needle = format!("{attr}=\"");
        tag.find(&needle).and_then(|i| {
            let value = &tag[i + needle.len()..];
            value.find('"').map(|end| value[..end].to_string())
        })
    };
    if let Some(class) = selector.strip_prefix('.') {
        attribute("class").is_some_and(|v| v.split_whitespace().any(|c| c == class))
    } else if let Some(id) = selector.strip_prefix('#') {
        attribute("id").as_deref() == Some(id)
    } else {
        name == selector
    }
}

impl DomSink for MemoryDocument {
    fn attach(&mut self, selector: &str) -> Result<(), SinkError> {
        let (_, open_end, tag) = self
            .find_element(selector)
            .ok_or_else(|| SinkError::TargetNotFound(selector.to_string()))?;
        let close = self
            .matching_close(&tag, open_end)
            .ok_or_else(|| SinkError::TargetNotFound(selector.to_string()))?;
        self.html.insert_str(close, ANCHOR);
        Ok(())
    }

    fn graft(&mut self, node: &ParsedNode) -> Result<(), SinkError> {
        let at = self.anchor()?;
        self.html.insert_str(at, &node.markup);
        Ok(())
    }

    fn execute(&mut self, instruction: &PatchInstruction) -> Result<(), SinkError> {
        let boundary_id = instruction.boundary.to_string();
        let open = format!("<{BOUNDARY_TAG} id=\"{boundary_id}\">");
        if !self.html.contains(&open) {
            return Err(SinkError::MissingElement(boundary_id));
        }
        let content = self.take_template(&instruction.source.to_string())?;

        let start = self
            .html
            .find(&open)
            .ok_or_else(|| SinkError::MissingElement(boundary_id.clone()))?;
        let open_end = start + open.len();
        let close = self
            .matching_close(BOUNDARY_TAG, open_end)
            .ok_or_else(|| SinkError::MissingElement(boundary_id.clone()))?;
        let fallback_open = format!("<{FALLBACK_TAG}>");
        let fallback_close = format!("</{FALLBACK_TAG}>");
        let fallback = self.html[open_end..close]
            .rfind(&fallback_open)
            .map(|i| open_end + i);

        match instruction.mode {
            InsertionMode::Append => {
                let at = fallback.unwrap_or(close);
                self.html.insert_str(at, &content);
            }
            InsertionMode::Replace => {
                let (before, after) = match fallback {
                    Some(f) => {
                        let end = f
                            + self.html[f..close]
                                .find(&fallback_close)
                                .map_or(close - f, |i| i + fallback_close.len());
                        (f, end)
                    }
                    None => (close, close),
                };
                let unwrapped = format!(
                    "{}{}{}",
                    &self.html[open_end..before],
                    content,
                    &self.html[after..close]
                );
                let end = close + format!("</{BOUNDARY_TAG}>").len();
                self.html.replace_range(start..end, &unwrapped);
            }
        }
        Ok(())
    }

    fn detach(&mut self) {
        if let Ok(at) = self.anchor() {
            self.html.replace_range(at..at + ANCHOR.len(), "");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamchat_domain::{BoundaryId, ChunkId, boundary_markup};

    fn instruction(boundary: u64, source: u64, mode: InsertionMode) -> PatchInstruction {
        PatchInstruction {
            boundary: BoundaryId::new(boundary),
            source: ChunkId::new(source),
            mode,
        }
    }

    #[test]
    fn test_attach_finds_matching_close() {
        let mut doc = MemoryDocument::new(r#"<div class="a messages"><div>x</div></div><p></p>"#);
        doc.attach(".messages").unwrap();
        assert_eq!(
            doc.html(),
            r#"<div class="a messages"><div>x</div><stream-patcher></stream-patcher></div><p></p>"#
        );
        doc.detach();
        assert!(!doc.html().contains("stream-patcher"));
    }

    #[test]
    fn test_append_then_replace() {
        let shell = boundary_markup(BoundaryId::new(0), "...");
        let mut doc = MemoryDocument::new(&format!(
            r#"{shell}<template id="sc-0">a</template><template id="sc-1"></template>"#
        ));

        doc.execute(&instruction(0, 0, InsertionMode::Append)).unwrap();
        assert_eq!(
            doc.html(),
            r#"<stream-boundary id="sb-0">a<stream-fallback>...</stream-fallback></stream-boundary><template id="sc-1"></template>"#
        );

        doc.execute(&instruction(0, 1, InsertionMode::Replace)).unwrap();
        assert_eq!(doc.html(), "a");
    }

    #[test]
    fn test_missing_boundary_is_an_error() {
        let mut doc = MemoryDocument::new(r#"<template id="sc-0">a</template>"#);
        assert!(doc.execute(&instruction(4, 0, InsertionMode::Append)).is_err());
        assert_eq!(doc.html(), r#"<template id="sc-0">a</template>"#);
    }
}
