//! Streaming response consumption.
//!
//! The generation service answers with a chunked text body; [`consume`] turns
//! that byte stream into ordered [`Fragment`]s and hands each to a callback.
//! Every failure is folded into a single terminal fragment carrying an error.

mod decoder;

use std::fmt;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use decoder::{DONE_SENTINEL, DecoderState, FrameDecoder};

/// One decoded unit of streamed content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fragment {
    pub content: String,
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Fragment {
    /// Synthetic completion fragment (`[DONE]`, end of body).
    pub fn done() -> Self {
        Self {
            content: String::new(),
            is_complete: true,
            error: None,
        }
    }

    /// Terminal fragment describing a failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            is_complete: true,
            error: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_complete
    }

    /// The error message, if one is set and non-empty.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|msg| !msg.is_empty())
    }
}

/// Transport failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Nothing to send.
    EmptyRequest,
    /// Non-success HTTP status (4xx, 5xx).
    HttpStatus,
    /// The response carried no body to stream.
    MissingBody,
    /// Request timed out.
    Timeout,
    /// Connection or read failure.
    Network,
    /// Response body was not the expected JSON.
    Parse,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::EmptyRequest => write!(f, "empty_request"),
            TransportErrorKind::HttpStatus => write!(f, "http_status"),
            TransportErrorKind::MissingBody => write!(f, "missing_body"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Network => write!(f, "network"),
            TransportErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Network/HTTP failure talking to the generation service.
#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Raw response body, when there was one
    pub details: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting a JSON `error`/`detail`/`message`
    /// out of the body when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let extracted = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| {
                ["error", "detail", "message"].iter().find_map(|key| {
                    let value = json.get(key)?;
                    value
                        .as_str()
                        .or_else(|| value.get("message").and_then(|m| m.as_str()))
                        .map(ToString::to_string)
                })
            });

        let message = match extracted {
            Some(msg) => format!("HTTP error! status: {status}: {msg}"),
            None => format!("HTTP error! status: {status}"),
        };
        Self {
            kind: TransportErrorKind::HttpStatus,
            message,
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(TransportErrorKind::Timeout, format!("Request timed out: {err}"))
        } else if err.is_connect() {
            Self::new(TransportErrorKind::Network, format!("Connection failed: {err}"))
        } else if err.is_decode() {
            Self::new(TransportErrorKind::Parse, format!("Invalid response: {err}"))
        } else {
            Self::new(TransportErrorKind::Network, format!("Network error: {err}"))
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Drives a response byte stream through a [`FrameDecoder`].
///
/// Fragments reach `on_fragment` in framing order. Exactly one terminal
/// fragment is delivered: the first `isComplete` frame or `[DONE]`, a
/// synthetic completion when the body ends without one, or an error fragment
/// when reading fails. Reading stops as soon as the terminal fragment is out.
pub async fn consume<S, E, F>(stream: S, mut on_fragment: F)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
    F: FnMut(Fragment),
{
    let mut decoder = FrameDecoder::new();
    let mut stream = std::pin::pin!(stream);

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for fragment in decoder.feed(&bytes) {
                    on_fragment(fragment);
                }
                if decoder.is_terminal() {
                    debug!("stream reached terminal fragment");
                    return;
                }
            }
            Err(err) => {
                let error = TransportError::new(
                    TransportErrorKind::Network,
                    format!("Stream read failed: {err}"),
                );
                warn!(error = %error, "generation stream interrupted");
                on_fragment(Fragment::failure(error.message));
                return;
            }
        }
    }

    let tail = decoder.finish();
    let saw_terminal = tail.iter().any(Fragment::is_terminal);
    for fragment in tail {
        on_fragment(fragment);
    }
    if !saw_terminal {
        debug!("stream ended without terminal fragment");
        on_fragment(Fragment::done());
    }
}
