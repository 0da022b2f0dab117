//! Inline patch runtime for full-page streams.
//!
//! When the browser itself parses a streamed document (`POST /` without the
//! client interceptor), each chunk's `<script>` calls `$sp`, which must
//! already be defined. The client patcher never runs this code; it applies
//! the same instruction from the `data-*` attributes.

/// `$sp(boundary, source, mode)` applies one patch chunk.
pub const PATCH_RUNTIME: &str = concat!(
    "function $sp(b,s,m){",
    "var e=document.getElementById(b),t=document.getElementById(s);",
    "if(!e||!t)return;",
    "var f=e.querySelector(':scope>stream-fallback'),c=t.content;",
    "if(m==='append'){e.insertBefore(c,f)}",
    "else{if(f){e.replaceChild(c,f)}else{e.appendChild(c)}",
    "while(e.firstChild){e.parentNode.insertBefore(e.firstChild,e)}e.remove()}",
    "t.remove()}",
);

/// The runtime wrapped in a `<script>` element
pub fn runtime_script() -> String {
    format!("<script>{PATCH_RUNTIME}</script>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::patch::{ATTR_BOUNDARY, FALLBACK_TAG};

    #[test]
    fn test_runtime_targets_fallback_tag() {
        assert!(PATCH_RUNTIME.contains(FALLBACK_TAG));
        assert!(!PATCH_RUNTIME.contains(ATTR_BOUNDARY));
    }

    #[test]
    fn test_runtime_script_is_a_single_element() {
        let script = runtime_script();
        assert!(script.starts_with("<script>function $sp("));
        assert_eq!(script.matches("</script>").count(), 1);
    }
}
