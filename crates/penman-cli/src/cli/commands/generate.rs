//! Generate command handler.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use penman_core::client::GenerationClient;
use penman_core::config::Config;
use penman_core::export::markup::decode_entities;
use penman_core::export::{ExportFormat, ExportRequest, Exporter};
use penman_core::profile::GenerateRequest;
use penman_core::session::{Applied, Session, Status};
use tracing::debug;

const DRAFT_FILE: &str = "draft.html";

pub struct GenerateOptions<'a> {
    pub profile: &'a Path,
    pub document_type: Option<&'a str>,
    pub output: Option<&'a Path>,
    pub export: &'a [String],
    pub raw: bool,
    pub config: &'a Config,
}

pub async fn run(options: GenerateOptions<'_>) -> Result<()> {
    let form = super::load_profile(options.profile)?;
    let document_type = super::resolve_document_type(options.document_type, options.config)?;
    // parse formats before spending a request
    let formats = options
        .export
        .iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| f.parse::<ExportFormat>())
        .collect::<Result<Vec<_>, _>>()?;

    let client = GenerationClient::from_config(options.config)?;
    let request = GenerateRequest::from_profile(&form, document_type, None);

    let mut session = Session::new();
    let id = session.start();
    eprintln!("[{}] {document_type}", session.status().label());

    let mut live = LiveText::new(options.raw);
    let mut out = LiveSink::new(std::io::stdout());
    client
        .generate_stream(&request, |fragment| {
            let before = session.buffer().len();
            if session.apply(id, fragment) == Applied::Ignored {
                return;
            }
            out.write(&live.push(&session.buffer()[before..]));
        })
        .await;
    out.write(&live.finish());
    out.write("\n");

    if session.status() == Status::Error {
        let message = session.last_error().unwrap_or("unknown error");
        bail!(
            "[{}] Generation failed: {message}\nCheck the service and try again.",
            session.status().label()
        );
    }
    eprintln!(
        "[{}] {} characters",
        session.status().label(),
        session.buffer().chars().count()
    );

    let draft_path = options.output.map_or_else(
        || output_dir(options.config).join(DRAFT_FILE),
        Path::to_path_buf,
    );
    save_draft(&draft_path, session.buffer())?;
    eprintln!("Saved draft to {}", draft_path.display());

    if !formats.is_empty() {
        let exporter = Exporter::from_config(&options.config.export);
        for format in formats {
            let request = ExportRequest::today(document_type.as_str(), format);
            let path = exporter
                .export(session.buffer(), &request)
                .with_context(|| format!("export {format}"))?;
            eprintln!("Exported {}", path.display());
        }
    }

    Ok(())
}

fn output_dir(config: &Config) -> PathBuf {
    config
        .export
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
}

fn save_draft(path: &Path, buffer: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    std::fs::write(path, buffer).with_context(|| format!("write draft {}", path.display()))?;
    debug!(path = %path.display(), bytes = buffer.len(), "draft saved");
    Ok(())
}

/// Writes live text, giving up on the writer once its reader is gone.
struct LiveSink<W: Write> {
    writer: W,
    closed: bool,
}

impl<W: Write> LiveSink<W> {
    fn new(writer: W) -> Self {
        Self {
            writer,
            closed: false,
        }
    }

    fn write(&mut self, text: &str) {
        if self.closed || text.is_empty() {
            return;
        }
        let result = self
            .writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush());
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                debug!("stdout closed, no longer printing live text");
                self.closed = true;
            }
            Err(err) => debug!(error = %err, "failed to print live text"),
        }
    }
}

/// Turns streamed markup into readable terminal text as it arrives.
///
/// Tags and entities may be split across fragments, so partial ones are held
/// back until complete. Block-level closing tags and `<br>` become newlines.
struct LiveText {
    raw: bool,
    pending: String,
}

impl LiveText {
    /// Longest entity held back before it is treated as literal text.
    const MAX_ENTITY: usize = 8;

    fn new(raw: bool) -> Self {
        Self {
            raw,
            pending: String::new(),
        }
    }

    fn push(&mut self, chunk: &str) -> String {
        if self.raw {
            return chunk.to_string();
        }
        self.pending.push_str(chunk);

        let mut out = String::new();
        let mut rest = self.pending.as_str();
        loop {
            let Some(idx) = rest.find(['<', '&']) else {
                out.push_str(rest);
                rest = "";
                break;
            };
            out.push_str(&rest[..idx]);
            let tail = &rest[idx..];

            if tail.starts_with('<') {
                let Some(end) = tail.find('>') else {
                    rest = tail;
                    break;
                };
                out.push_str(tag_text(&tail[1..end]));
                rest = &tail[end + 1..];
            } else {
                match tail.find(';') {
                    Some(end) if end <= Self::MAX_ENTITY => {
                        out.push_str(&decode_entities(&tail[..=end]));
                        rest = &tail[end + 1..];
                    }
                    None if tail.len() <= Self::MAX_ENTITY => {
                        rest = tail;
                        break;
                    }
                    _ => {
                        out.push('&');
                        rest = &tail[1..];
                    }
                }
            }
        }

        self.pending = rest.to_string();
        out
    }

    /// Flushes whatever is still held back.
    fn finish(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

fn tag_text(tag: &str) -> &'static str {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let closing = tag.starts_with('/');
    match (name.as_str(), closing) {
        ("br", _) => "\n",
        ("li", false) => "• ",
        ("p" | "div" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6", true) => "\n",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(chunks: &[&str]) -> String {
        let mut live = LiveText::new(false);
        let mut out: String = chunks.iter().map(|c| live.push(c)).collect();
        out.push_str(&live.finish());
        out
    }

    #[test]
    fn test_live_text_strips_tags() {
        assert_eq!(feed(&["<h1>Title</h1><p>Body</p>"]), "Title\nBody\n");
    }

    #[test]
    fn test_live_text_handles_split_tags_and_entities() {
        assert_eq!(feed(&["<p>A &a", "mp; B</", "p><b", "r/>C"]), "A & B\n\nC");
    }

    #[test]
    fn test_live_text_keeps_lone_ampersand() {
        assert_eq!(feed(&["fish & chips and more text"]), "fish & chips and more text");
    }

    #[test]
    fn test_live_text_lists() {
        assert_eq!(feed(&["<ul><li>One</li><li>Two</li></ul>"]), "• One\n• Two\n");
    }

    #[test]
    fn test_live_text_raw_passthrough() {
        let mut live = LiveText::new(true);
        assert_eq!(live.push("<p>x</p>"), "<p>x</p>");
        assert_eq!(live.finish(), "");
    }

    /// Accepts `limit` writes, then reports a closed pipe.
    struct ClosingPipe {
        written: Vec<u8>,
        limit: usize,
        attempts: usize,
    }

    impl Write for ClosingPipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            if self.attempts > self.limit {
                return Err(std::io::Error::from(ErrorKind::BrokenPipe));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_live_sink_stops_after_broken_pipe() {
        let mut sink = LiveSink::new(ClosingPipe {
            written: Vec::new(),
            limit: 1,
            attempts: 0,
        });
        sink.write("first ");
        sink.write("second ");
        sink.write("third");

        assert!(sink.closed);
        assert_eq!(sink.writer.written, b"first ");
        assert_eq!(sink.writer.attempts, 2);
    }

    #[test]
    fn test_live_sink_skips_empty_text() {
        let mut sink = LiveSink::new(Vec::new());
        sink.write("");
        sink.write("a");
        assert_eq!(sink.writer, b"a");
        assert!(!sink.closed);
    }

    #[test]
    fn test_live_text_flushes_unterminated_tail() {
        assert_eq!(feed(&["text <unfinished"]), "text <unfinished");
    }
}
