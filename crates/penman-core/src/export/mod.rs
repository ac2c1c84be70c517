//! Export of a finished document buffer to `txt`, rich text or PDF.
//!
//! The buffer is read as lightweight HTML-ish markup. Files are written
//! through a temp file in the destination directory and persisted only once
//! fully written.

pub mod layout;
pub mod markup;
pub mod pdf;
pub mod raster;
pub mod rtf;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::ExportConfig;
use raster::{FontRasterizer, RASTER_SCALE, Rasterizer, RenderHost};

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    /// Requested as `docx`, written as simplified RTF.
    Docx,
    Txt,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
            ExportFormat::Txt => "txt",
        }
    }

    /// Extension of the file actually written.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "rtf",
            ExportFormat::Txt => "txt",
        }
    }

    pub fn all() -> &'static [ExportFormat] {
        &[ExportFormat::Pdf, ExportFormat::Docx, ExportFormat::Txt]
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" => Ok(ExportFormat::Docx),
            "txt" => Ok(ExportFormat::Txt),
            _ => Err(ExportError::new(
                ExportErrorKind::UnsupportedFormat,
                format!("Unsupported format: {s}"),
            )),
        }
    }
}

/// Export failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportErrorKind {
    /// Buffer is empty or whitespace only.
    EmptyContent,
    UnsupportedFormat,
    /// Layout, glyph drawing or image encoding failed.
    Rasterize,
    /// Writing the output file failed.
    Io,
}

impl fmt::Display for ExportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportErrorKind::EmptyContent => write!(f, "empty_content"),
            ExportErrorKind::UnsupportedFormat => write!(f, "unsupported_format"),
            ExportErrorKind::Rasterize => write!(f, "rasterize"),
            ExportErrorKind::Io => write!(f, "io"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportError {
    pub kind: ExportErrorKind,
    pub message: String,
}

impl ExportError {
    pub fn new(kind: ExportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn io(context: &str, path: &Path, err: &std::io::Error) -> Self {
        Self::new(
            ExportErrorKind::Io,
            format!("{context} {}: {err}", path.display()),
        )
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExportError {}

/// What to export and the file name to save it under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub file_name: String,
}

impl ExportRequest {
    /// Request named `{label}_{date}.{ext}` for `document_type`.
    pub fn new(document_type: &str, format: ExportFormat, date: NaiveDate) -> Self {
        Self {
            format,
            file_name: file_name(document_type, format, date),
        }
    }

    /// Request dated [`export_date`].
    pub fn today(document_type: &str, format: ExportFormat) -> Self {
        Self::new(document_type, format, export_date())
    }
}

/// Date stamped into export file names: the current UTC calendar day.
pub fn export_date() -> NaiveDate {
    Utc::now().date_naive()
}

/// Display label used in export file names; unknown types use the raw key.
pub fn document_label(document_type: &str) -> &str {
    match document_type.replace('_', "-").as_str() {
        "personal-statement" => "个人陈述",
        "motivation-letter" => "动机信",
        "research-proposal" => "研究计划",
        "recommendation-letter" => "推荐信",
        _ => document_type,
    }
}

/// `{label}_{YYYY-MM-DD}.{ext}`, with `docx` saved as `.rtf`.
pub fn file_name(document_type: &str, format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "{}_{}.{}",
        document_label(document_type),
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

enum RasterSource {
    Fonts {
        regular: Option<PathBuf>,
        bold: Option<PathBuf>,
    },
    Custom(Box<dyn Rasterizer>),
}

/// Converts buffers and writes them into an output directory.
pub struct Exporter {
    output_dir: PathBuf,
    host: RenderHost,
    raster: RasterSource,
}

impl Exporter {
    /// Exporter writing into `output_dir`, probing system fonts for PDF.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            host: RenderHost::new(),
            raster: RasterSource::Fonts {
                regular: None,
                bold: None,
            },
        }
    }

    /// Uses the configured output directory (current directory if unset) and
    /// fonts.
    pub fn from_config(config: &ExportConfig) -> Self {
        let mut exporter = Self::new(
            config
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        );
        exporter.raster = RasterSource::Fonts {
            regular: config.font_path.clone(),
            bold: config.bold_font_path.clone(),
        };
        exporter
    }

    /// Replaces the PDF rasterizer.
    #[must_use]
    pub fn with_rasterizer(mut self, rasterizer: Box<dyn Rasterizer>) -> Self {
        self.raster = RasterSource::Custom(rasterizer);
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn host(&self) -> &RenderHost {
        &self.host
    }

    /// Converts `buffer` to the bytes of `format`.
    ///
    /// # Errors
    /// Returns an error for an empty buffer or when PDF rendering fails.
    pub fn render(&self, buffer: &str, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        if buffer.trim().is_empty() {
            return Err(ExportError::new(
                ExportErrorKind::EmptyContent,
                "Nothing to export: the document is empty",
            ));
        }

        match format {
            ExportFormat::Txt => Ok(markup::plain_text(buffer).into_bytes()),
            ExportFormat::Docx => Ok(rtf::to_rtf(buffer).into_bytes()),
            ExportFormat::Pdf => self.render_pdf(buffer),
        }
    }

    fn render_pdf(&self, buffer: &str) -> Result<Vec<u8>, ExportError> {
        let loaded;
        let rasterizer: &dyn Rasterizer = match &self.raster {
            RasterSource::Custom(custom) => custom.as_ref(),
            RasterSource::Fonts { regular, bold } => {
                loaded = FontRasterizer::load(regular.as_deref(), bold.as_deref())?;
                &loaded
            }
        };

        let target = self.host.mount(buffer);
        let image = raster::rasterize(&target, rasterizer, RASTER_SCALE)?;
        drop(target);
        pdf::render_pdf(&image)
    }

    /// Renders `buffer` and saves it as `request.file_name` in the output
    /// directory. A `.docx` name is saved as `.rtf`.
    ///
    /// # Errors
    /// Returns an error if rendering or writing fails; no file is left behind.
    pub fn export(&self, buffer: &str, request: &ExportRequest) -> Result<PathBuf, ExportError> {
        let bytes = self.render(buffer, request.format)?;
        let path = self.output_dir.join(saved_name(&request.file_name, request.format));

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ExportError::io("create directory", &self.output_dir, &e))?;
        let mut tmp = NamedTempFile::new_in(&self.output_dir)
            .map_err(|e| ExportError::io("create temp file in", &self.output_dir, &e))?;
        tmp.write_all(&bytes)
            .map_err(|e| ExportError::io("write", tmp.path(), &e))?;
        tmp.persist(&path)
            .map_err(|e| ExportError::io("save", &path, &e.error))?;

        info!(path = %path.display(), format = %request.format, bytes = bytes.len(), "exported document");
        Ok(path)
    }
}

fn saved_name(file_name: &str, format: ExportFormat) -> String {
    let path = Path::new(file_name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("docx") || format == ExportFormat::Docx => {
            debug!(file_name, "saving rich text with .rtf extension");
            path.with_extension("rtf").to_string_lossy().into_owned()
        }
        Some(_) => file_name.to_string(),
        None => format!("{file_name}.{}", format.extension()),
    }
}
