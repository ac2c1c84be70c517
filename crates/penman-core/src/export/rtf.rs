//! Best-effort markup to simplified rich text conversion.
//!
//! An ordered list of tag substitutions, then tag stripping and entity
//! decoding. Nested or malformed markup is not handled precisely.

use std::sync::LazyLock;

use regex::Regex;

use super::markup::{decode_entities, strip_tags};

const RTF_HEADER: &str = r"{\rtf1\ansi\deff0 {\fonttbl {\f0 Times New Roman;}}\f0\fs24 ";
const RTF_FOOTER: &str = "}";

/// Tag substitutions, applied in order. Control words carry a trailing space
/// delimiter so following text is not read as part of the word.
static SUBSTITUTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?is)<h1(?:\s[^>]*)?>(.*?)</h1>", r"\b ${1}\b0 \par\par "),
        (r"(?is)<h2(?:\s[^>]*)?>(.*?)</h2>", r"\b ${1}\b0 \par "),
        (r"(?is)<h3(?:\s[^>]*)?>(.*?)</h3>", r"\b ${1}\b0 \par "),
        (r"(?is)<p(?:\s[^>]*)?>(.*?)</p>", r"${1}\par "),
        (r"(?i)<br\s*/?>", r"\par "),
        (r"(?is)<strong(?:\s[^>]*)?>(.*?)</strong>", r"\b ${1}\b0 "),
        (r"(?is)<b(?:\s[^>]*)?>(.*?)</b>", r"\b ${1}\b0 "),
        (r"(?is)<em(?:\s[^>]*)?>(.*?)</em>", r"\i ${1}\i0 "),
        (r"(?is)<i(?:\s[^>]*)?>(.*?)</i>", r"\i ${1}\i0 "),
        (r"(?is)<ul(?:\s[^>]*)?>(.*?)</ul>", "${1}"),
        (r"(?is)<ol(?:\s[^>]*)?>(.*?)</ol>", "${1}"),
        (r"(?is)<li(?:\s[^>]*)?>(.*?)</li>", r"• ${1}\par "),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("rtf regex"), replacement))
    .collect()
});

/// Converts markup into a complete RTF document.
pub fn to_rtf(markup: &str) -> String {
    let mut body = escape_rtf_syntax(markup);
    for (pattern, replacement) in SUBSTITUTIONS.iter() {
        body = pattern.replace_all(&body, *replacement).into_owned();
    }
    let body = decode_entities(&strip_tags(&body)).into_owned();

    let mut out = String::with_capacity(RTF_HEADER.len() + body.len() + RTF_FOOTER.len());
    out.push_str(RTF_HEADER);
    encode_non_ascii(&body, &mut out);
    out.push_str(RTF_FOOTER);
    out
}

/// Escapes characters that are syntax in RTF before control words are added.
fn escape_rtf_syntax(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Emits non-ASCII characters as `\uN?` escapes (UTF-16 units, signed).
fn encode_non_ascii(text: &str, out: &mut String) {
    let mut units = [0u16; 2];
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            let signed = *unit as i16;
            out.push_str(&format!("\\u{signed}?"));
        }
    }
}
