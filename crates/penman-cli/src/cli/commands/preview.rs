//! Preview and copy command handlers.

use std::io::{IsTerminal, Write};
use std::path::Path;
#[cfg(target_os = "linux")]
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use penman_core::export::markup::plain_text;

pub fn preview(input: &Path, raw: bool) -> Result<()> {
    let buffer = super::read_document(input)?;
    if raw {
        print!("{buffer}");
    } else {
        println!("{}", plain_text(&buffer));
    }
    Ok(())
}

pub fn copy(input: &Path) -> Result<()> {
    let text = plain_text(&super::read_document(input)?);
    if text.is_empty() {
        bail!("Nothing to copy: the document is empty");
    }
    Clipboard::copy(&text)?;
    eprintln!("Copied {} characters to the clipboard", text.chars().count());
    Ok(())
}

/// Clipboard access with a terminal escape fallback.
struct Clipboard;

impl Clipboard {
    /// Copies text to the clipboard.
    ///
    /// Tries the system clipboard first, then OSC 52 when stdout is a
    /// terminal (works over SSH).
    fn copy(text: &str) -> Result<(), ClipboardError> {
        Self::copy_with(
            text,
            Self::copy_system,
            Self::copy_osc52,
            std::io::stdout().is_terminal(),
        )
    }

    fn copy_with(
        text: &str,
        system: impl FnOnce(&str) -> Result<(), ClipboardError>,
        osc52: impl FnOnce(&str) -> Result<(), ClipboardError>,
        terminal: bool,
    ) -> Result<(), ClipboardError> {
        match system(text) {
            Ok(()) => Ok(()),
            Err(err) if terminal => {
                tracing::debug!(error = %err, "system clipboard unavailable, using OSC 52");
                osc52(text)
            }
            Err(err) => Err(err),
        }
    }

    fn copy_system(text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::System(e.to_string()))?;

        set_text(&mut clipboard, text).map_err(|e| ClipboardError::System(e.to_string()))?;

        Ok(())
    }

    fn copy_osc52(text: &str) -> Result<(), ClipboardError> {
        use base64::Engine;

        let encoded = base64::engine::general_purpose::STANDARD.encode(text);

        // ESC ] 52 ; c ; <base64> ESC \
        let mut stdout = std::io::stdout();
        write!(stdout, "\x1b]52;c;{encoded}\x1b\\")
            .map_err(|e| ClipboardError::Osc52(e.to_string()))?;
        stdout
            .flush()
            .map_err(|e| ClipboardError::Osc52(e.to_string()))?;

        Ok(())
    }
}

/// How long `copy` keeps owning the selection before the process exits.
#[cfg(target_os = "linux")]
const SELECTION_HOLD: Duration = Duration::from_secs(3);

/// X11 and Wayland selections die with their owner, so the text is served
/// until another client takes the selection or [`SELECTION_HOLD`] passes.
#[cfg(target_os = "linux")]
fn set_text(clipboard: &mut arboard::Clipboard, text: &str) -> Result<(), arboard::Error> {
    use arboard::SetExtLinux;

    clipboard
        .set()
        .wait_until(Instant::now() + SELECTION_HOLD)
        .text(text)
}

#[cfg(not(target_os = "linux"))]
fn set_text(clipboard: &mut arboard::Clipboard, text: &str) -> Result<(), arboard::Error> {
    clipboard.set_text(text)
}

#[derive(Debug)]
enum ClipboardError {
    /// OSC 52 write failed.
    Osc52(String),
    /// System clipboard operation failed.
    System(String),
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipboardError::Osc52(msg) => write!(f, "OSC 52 clipboard failed: {msg}"),
            ClipboardError::System(msg) => write!(f, "System clipboard failed: {msg}"),
        }
    }
}

impl std::error::Error for ClipboardError {}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn unavailable(_: &str) -> Result<(), ClipboardError> {
        Err(ClipboardError::System("no display".to_string()))
    }

    #[test]
    fn test_copy_prefers_system_clipboard() {
        let osc_used = Cell::new(false);
        let result = Clipboard::copy_with(
            "text",
            |_| Ok(()),
            |_| {
                osc_used.set(true);
                Ok(())
            },
            true,
        );

        assert!(result.is_ok());
        assert!(!osc_used.get());
    }

    #[test]
    fn test_copy_falls_back_to_osc52_on_terminal() {
        let copied = Cell::new(None);
        let result = Clipboard::copy_with(
            "text",
            unavailable,
            |text| {
                copied.set(Some(text.len()));
                Ok(())
            },
            true,
        );

        assert!(result.is_ok());
        assert_eq!(copied.get(), Some(4));
    }

    #[test]
    fn test_copy_reports_failure_without_terminal() {
        let err = Clipboard::copy_with("text", unavailable, |_| Ok(()), false).unwrap_err();
        assert_eq!(err.to_string(), "System clipboard failed: no display");
    }
}
