//! Block layout for the rasterized export.
//!
//! Markup is parsed into styled blocks (headings, paragraphs, list items) and
//! word-wrapped into positioned lines inside a fixed-width box. Widths come
//! from a caller-supplied measure so layout stays independent of the font
//! backend.

use std::sync::LazyLock;

use regex::Regex;

use super::markup::decode_entities;

/// Width of the off-screen block, in logical units.
pub const BLOCK_WIDTH: f32 = 800.0;
/// Inner padding on every side.
pub const PADDING: f32 = 40.0;
/// Body font size.
pub const BASE_FONT_SIZE: f32 = 12.0;
/// Line height as a multiple of font size.
pub const LINE_HEIGHT: f32 = 1.6;

const LIST_INDENT: f32 = 40.0;
const BULLET: &str = "•";

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)\b[^>]*>|<[^>]*>").expect("token regex")
});

static PARAGRAPH_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n").expect("paragraph regex"));

/// Text style of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl TextStyle {
    pub fn line_height(&self) -> f32 {
        self.size * LINE_HEIGHT
    }
}

/// Kind of a laid-out block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    ListItem,
}

impl BlockKind {
    fn font_size(self) -> f32 {
        match self {
            BlockKind::Heading(1) => BASE_FONT_SIZE * 2.0,
            BlockKind::Heading(2) => BASE_FONT_SIZE * 1.5,
            BlockKind::Heading(_) => BASE_FONT_SIZE * 1.17,
            BlockKind::Paragraph | BlockKind::ListItem => BASE_FONT_SIZE,
        }
    }

    /// Space below the block, in logical units.
    fn margin(self) -> f32 {
        match self {
            BlockKind::Heading(1) => self.font_size() * 0.67,
            BlockKind::Heading(2) => self.font_size() * 0.83,
            BlockKind::Heading(_) | BlockKind::Paragraph => self.font_size(),
            BlockKind::ListItem => 0.0,
        }
    }

    fn base_style(self) -> TextStyle {
        TextStyle {
            size: self.font_size(),
            bold: matches!(self, BlockKind::Heading(_)),
            italic: false,
        }
    }
}

/// A styled span of text; `"\n"` marks a forced line break.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub spans: Vec<Span>,
}

/// A run of text placed at `x` on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedRun {
    pub x: f32,
    pub text: String,
    pub style: TextStyle,
}

/// One laid-out line; `top` is measured from the top of the block.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub top: f32,
    pub height: f32,
    pub runs: Vec<PlacedRun>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: f32,
    pub height: f32,
    pub lines: Vec<Line>,
}

/// Parses markup into blocks. Unknown tags are ignored; a blank line in raw
/// text separates paragraphs.
pub fn parse_blocks(markup: &str) -> Vec<Block> {
    let mut builder = BlockBuilder::default();
    let mut last = 0;

    for caps in TOKEN_RE.captures_iter(markup) {
        let Some(whole) = caps.get(0) else { continue };
        builder.text(&markup[last..whole.start()]);
        last = whole.end();

        let Some(name) = caps.get(2) else { continue };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        builder.tag(&name.as_str().to_ascii_lowercase(), closing);
    }
    builder.text(&markup[last..]);
    builder.finish()
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    current: Option<Block>,
    bold: usize,
    italic: usize,
}

impl BlockBuilder {
    fn tag(&mut self, name: &str, closing: bool) {
        match (name, closing) {
            ("h1", false) => self.open(BlockKind::Heading(1)),
            ("h2", false) => self.open(BlockKind::Heading(2)),
            ("h3" | "h4" | "h5" | "h6", false) => self.open(BlockKind::Heading(3)),
            ("p" | "div", false) => self.open(BlockKind::Paragraph),
            ("li", false) => self.open(BlockKind::ListItem),
            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "div" | "li" | "ul" | "ol", _) => {
                self.flush();
            }
            ("br", _) => self.push_span("\n".to_string()),
            ("strong" | "b", false) => self.bold += 1,
            ("strong" | "b", true) => self.bold = self.bold.saturating_sub(1),
            ("em" | "i", false) => self.italic += 1,
            ("em" | "i", true) => self.italic = self.italic.saturating_sub(1),
            _ => {}
        }
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let mut pieces = PARAGRAPH_BREAK_RE.split(raw).peekable();
        while let Some(piece) = pieces.next() {
            let collapsed = collapse_whitespace(&decode_entities(piece));
            if !collapsed.trim().is_empty() || self.current.is_some() {
                self.push_span(collapsed);
            }
            if pieces.peek().is_some() {
                self.flush();
            }
        }
    }

    fn open(&mut self, kind: BlockKind) {
        self.flush();
        self.current = Some(Block {
            kind,
            spans: Vec::new(),
        });
    }

    fn push_span(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let block = self.current.get_or_insert_with(|| Block {
            kind: BlockKind::Paragraph,
            spans: Vec::new(),
        });
        let mut style = block.kind.base_style();
        style.bold |= self.bold > 0;
        style.italic |= self.italic > 0;
        block.spans.push(Span { text, style });
    }

    fn flush(&mut self) {
        if let Some(block) = self.current.take()
            && block.spans.iter().any(|s| !s.text.trim().is_empty())
        {
            self.blocks.push(block);
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Lays blocks out inside the fixed-width box.
///
/// `measure` returns the advance width of `text` in logical units.
pub fn layout<M>(blocks: &[Block], measure: M) -> Layout
where
    M: Fn(&str, &TextStyle) -> f32,
{
    let content_width = BLOCK_WIDTH - 2.0 * PADDING;
    let mut lines = Vec::new();
    let mut y = PADDING;

    for block in blocks {
        let indent = if block.kind == BlockKind::ListItem {
            LIST_INDENT
        } else {
            0.0
        };
        let mut wrapper = LineWrapper::new(PADDING + indent, content_width - indent, &measure);
        if block.kind == BlockKind::ListItem {
            let style = block.kind.base_style();
            let bullet_width = measure(BULLET, &style) + measure(" ", &style);
            wrapper.lines.push(PendingLine {
                runs: vec![PlacedRun {
                    x: PADDING + indent - bullet_width,
                    text: BULLET.to_string(),
                    style,
                }],
                cursor: PADDING + indent,
                pending_space: false,
                has_content: false,
            });
        }
        for span in &block.spans {
            wrapper.push_span(span);
        }

        let base_height = block.kind.base_style().line_height();
        for pending in wrapper.finish() {
            let height = pending
                .runs
                .iter()
                .map(|r| r.style.line_height())
                .fold(base_height, f32::max);
            lines.push(Line {
                top: y,
                height,
                runs: pending.runs,
            });
            y += height;
        }
        y += block.kind.margin();
    }

    Layout {
        width: BLOCK_WIDTH,
        height: y + PADDING,
        lines,
    }
}

struct PendingLine {
    runs: Vec<PlacedRun>,
    cursor: f32,
    pending_space: bool,
    has_content: bool,
}

struct LineWrapper<'m, M> {
    left: f32,
    max_width: f32,
    measure: &'m M,
    lines: Vec<PendingLine>,
}

impl<'m, M> LineWrapper<'m, M>
where
    M: Fn(&str, &TextStyle) -> f32,
{
    fn new(left: f32, max_width: f32, measure: &'m M) -> Self {
        Self {
            left,
            max_width,
            measure,
            lines: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut PendingLine {
        if self.lines.is_empty() {
            self.new_line();
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn new_line(&mut self) {
        self.lines.push(PendingLine {
            runs: Vec::new(),
            cursor: self.left,
            pending_space: false,
            has_content: false,
        });
    }

    fn push_span(&mut self, span: &Span) {
        if span.text == "\n" {
            self.current();
            self.new_line();
            return;
        }
        for segment in segments(&span.text) {
            if segment.trim().is_empty() {
                let line = self.current();
                line.pending_space = line.has_content;
                continue;
            }
            self.place(segment, &span.style);
        }
    }

    fn place(&mut self, word: &str, style: &TextStyle) {
        let measure = self.measure;
        let width = measure(word, style);
        let space = measure(" ", style);
        let right = self.left + self.max_width;

        let line = self.current();
        let gap = if line.pending_space { space } else { 0.0 };
        if line.has_content && line.cursor + gap + width > right {
            self.new_line();
        }

        if width > self.max_width && word.chars().count() > 1 {
            // Longer than a whole line: break between characters.
            for c in word.chars() {
                let mut buf = [0u8; 4];
                self.place(c.encode_utf8(&mut buf), style);
            }
            return;
        }

        let line = self.current();
        let gap = if line.pending_space { space } else { 0.0 };
        let x = line.cursor + gap;
        match line.runs.last_mut() {
            Some(last) if last.style == *style && line.has_content => {
                if gap > 0.0 {
                    last.text.push(' ');
                }
                last.text.push_str(word);
            }
            _ => line.runs.push(PlacedRun {
                x,
                text: word.to_string(),
                style: *style,
            }),
        }
        line.cursor = x + width;
        line.pending_space = false;
        line.has_content = true;
    }

    fn finish(self) -> Vec<PendingLine> {
        self.lines
    }
}

/// Splits text into wrap units: whitespace runs, words, and individual
/// wide (CJK) characters, which may break anywhere.
fn segments(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev: Option<SegmentClass> = None;

    for (idx, c) in text.char_indices() {
        let class = SegmentClass::of(c);
        if let Some(p) = prev
            && (p != class || class == SegmentClass::Wide)
        {
            out.push(&text[start..idx]);
            start = idx;
        }
        prev = Some(class);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentClass {
    Space,
    Word,
    Wide,
}

impl SegmentClass {
    fn of(c: char) -> Self {
        if c == ' ' {
            SegmentClass::Space
        } else if is_wide(c) {
            SegmentClass::Wide
        } else {
            SegmentClass::Word
        }
    }
}

fn is_wide(c: char) -> bool {
    matches!(c,
        '\u{2E80}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FE30}'..='\u{FE4F}'
        | '\u{FF00}'..='\u{FFEF}'
        | '\u{20000}'..='\u{2FFFF}')
}
