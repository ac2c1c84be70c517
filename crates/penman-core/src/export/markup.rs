//! Markup helpers shared by the export paths and clipboard copy.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(nbsp|amp|lt|gt|quot);").expect("entity regex"));

/// Removes every `<...>` tag.
pub fn strip_tags(markup: &str) -> Cow<'_, str> {
    TAG_RE.replace_all(markup, "")
}

/// Decodes `&nbsp;`, `&amp;`, `&lt;`, `&gt;` and `&quot;` in a single pass,
/// so `&amp;lt;` becomes `&lt;` rather than `<`.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    ENTITY_RE.replace_all(text, |caps: &Captures<'_>| match &caps[1] {
        "nbsp" => " ",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        _ => "\"",
    })
}

/// Plain-text rendition of markup: tags stripped, entities decoded, trimmed.
pub fn plain_text(markup: &str) -> String {
    decode_entities(&strip_tags(markup)).trim().to_string()
}
