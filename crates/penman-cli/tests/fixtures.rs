//! Stream fixture helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use wiremock::ResponseTemplate;

// Load fixture templates at compile time
pub const STREAM_DOCUMENT: &str = include_str!("fixtures/stream_document.sse");
pub const STREAM_ERROR: &str = include_str!("fixtures/stream_error.sse");

/// Path of the sample profile JSON.
pub fn profile_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/profile.json")
}

/// Document stream with `subject` substituted into the body.
pub fn document_stream(subject: &str) -> String {
    STREAM_DOCUMENT.replace("{{SUBJECT}}", subject)
}

/// Wrap a stream body string in a ResponseTemplate.
pub fn stream_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}
