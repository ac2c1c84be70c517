//! Incremental line-frame decoder for the generation stream.
//!
//! Bytes arrive in arbitrary chunks. They are UTF-8 decoded with a carry for
//! split multi-byte sequences, split on `\n`, and each non-blank line is one
//! frame: `data: {json}`, a bare JSON object, or the `[DONE]` sentinel.

use tracing::warn;

use super::Fragment;

/// End-of-stream marker sent by the service.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Optional server-sent-event prefix on each frame.
const DATA_PREFIX: &str = "data: ";

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Accepting bytes.
    Reading,
    /// A terminal fragment was produced; all further input is discarded.
    Terminal,
}

/// Explicit frame decoder: `{Reading, Terminal}` plus a pending partial line.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    pending: String,
    utf8: Utf8Decoder,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Reading,
            pending: String::new(),
            utf8: Utf8Decoder::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == DecoderState::Terminal
    }

    /// Text received after the last newline, not yet framed.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Feeds one chunk and returns the fragments it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Fragment> {
        let mut out = Vec::new();
        if self.is_terminal() {
            return out;
        }

        let text = self.utf8.decode(chunk);
        self.pending.push_str(&text);

        let Some(last_newline) = self.pending.rfind('\n') else {
            return out;
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        for line in complete.split('\n') {
            if let Some(fragment) = self.decode_frame(line) {
                out.push(fragment);
            }
            if self.is_terminal() {
                self.pending.clear();
                break;
            }
        }

        out
    }

    /// Signals end of input: the leftover partial line, if any, is decoded as
    /// a final frame.
    pub fn finish(mut self) -> Vec<Fragment> {
        if self.is_terminal() {
            return Vec::new();
        }

        let tail = self.utf8.flush();
        self.pending.push_str(&tail);
        let leftover = std::mem::take(&mut self.pending);
        self.decode_frame(&leftover).into_iter().collect()
    }

    fn decode_frame(&mut self, line: &str) -> Option<Fragment> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return None;
        }

        let frame = line.strip_prefix(DATA_PREFIX).unwrap_or(line);
        if frame.trim() == DONE_SENTINEL {
            self.state = DecoderState::Terminal;
            return Some(Fragment::done());
        }

        match serde_json::from_str::<Fragment>(frame) {
            Ok(fragment) => {
                if fragment.is_terminal() {
                    self.state = DecoderState::Terminal;
                }
                Some(fragment)
            }
            Err(err) => {
                warn!(error = %err, frame = %line, "skipping malformed stream frame");
                None
            }
        }
    }
}

/// Streaming UTF-8 decoder; invalid sequences become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    if let Some(len) = err.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &rest[valid_up_to + len..];
                    } else {
                        // incomplete sequence at the end: wait for more bytes
                        self.carry = rest[valid_up_to..].to_vec();
                        break;
                    }
                }
            }
        }
        out
    }

    fn flush(&mut self) -> String {
        if self.carry.is_empty() {
            String::new()
        } else {
            self.carry.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<Fragment> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.feed(chunk));
        }
        out.extend(decoder.finish());
        out
    }

    const STREAM: &str = "data: {\"content\":\"Hello \"}\n\
                          {\"content\":\"wörld 你好\"}\n\
                          \n\
                          data: {\"content\":\"!\",\"isComplete\":false}\n\
                          data: [DONE]\n";

    #[test]
    fn test_decodes_sse_and_raw_json_frames() {
        let fragments = decode_all(&[STREAM.as_bytes()]);

        assert_eq!(fragments.len(), 4);
        assert_eq!(fragments[0].content, "Hello ");
        assert_eq!(fragments[1].content, "wörld 你好");
        assert_eq!(fragments[2].content, "!");
        assert_eq!(fragments[3], Fragment::done());
    }

    #[test]
    fn test_split_at_every_byte_offset_yields_same_fragments() {
        let whole = decode_all(&[STREAM.as_bytes()]);
        let bytes = STREAM.as_bytes();

        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(decode_all(&[a, b]), whole, "split at byte {split}");
        }
    }

    #[test]
    fn test_byte_by_byte_feed_yields_same_fragments() {
        let whole = decode_all(&[STREAM.as_bytes()]);
        let chunks: Vec<&[u8]> = STREAM.as_bytes().chunks(1).collect();
        assert_eq!(decode_all(&chunks), whole);
    }

    #[test]
    fn test_sentinel_discards_pending_and_later_frames() {
        let mut decoder = FrameDecoder::new();
        let fragments =
            decoder.feed(b"data: {\"content\":\"a\"}\ndata: [DONE]\ndata: {\"content\":\"late\"}\ndata: {\"con");

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1], Fragment::done());
        assert_eq!(decoder.state(), DecoderState::Terminal);
        assert!(decoder.pending().is_empty());
        assert!(decoder.feed(b"tent\":\"more\"}\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_sentinel_without_explicit_terminal_fragment() {
        let fragments = decode_all(&[&b"[DONE]\n"[..]]);
        assert_eq!(
            fragments,
            vec![Fragment {
                content: String::new(),
                is_complete: true,
                error: None,
            }]
        );
    }

    #[test]
    fn test_malformed_frame_is_skipped() {
        let fragments = decode_all(&[
            &b"data: {\"content\":\"a\"}\ndata: {not json\n: keep-alive\ndata: {\"content\":\"b\"}\n"[..],
        ]);

        let contents: Vec<_> = fragments.iter().map(|f| f.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[test]
    fn test_leftover_partial_line_is_framed_at_end() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: {\"content\":\"tail\"}").is_empty());
        assert_eq!(decoder.pending(), "data: {\"content\":\"tail\"}");

        let fragments = decoder.finish();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].content, "tail");
    }

    #[test]
    fn test_leftover_sentinel_is_recognized() {
        let fragments = decode_all(&[&b"data: {\"content\":\"x\"}\ndata: [DONE]"[..]]);
        assert_eq!(fragments.last(), Some(&Fragment::done()));
    }

    #[test]
    fn test_terminal_fragment_stops_decoding() {
        let fragments = decode_all(&[
            &b"{\"content\":\"end\",\"isComplete\":true}\n{\"content\":\"ignored\"}\n"[..],
        ]);
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].is_terminal());
        assert_eq!(fragments[0].content, "end");
    }

    #[test]
    fn test_crlf_line_endings() {
        let fragments = decode_all(&[&b"data: {\"content\":\"a\"}\r\ndata: [DONE]\r\n"[..]]);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].content, "a");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let fragments = decode_all(&[&b"{\"content\":\"a\xffb\"}\n"[..]]);
        assert_eq!(fragments[0].content, "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_multibyte_tail_is_replaced_on_finish() {
        let mut decoder = FrameDecoder::new();
        // "你" is e4 bd a0; stop after two bytes
        assert_eq!(decoder.feed(b"{\"content\":\"ok\"}\n\xe4\xbd").len(), 1);
        assert!(decoder.finish().is_empty());
    }
}
