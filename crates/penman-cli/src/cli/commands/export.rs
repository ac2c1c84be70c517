//! Export command handler.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use penman_core::config::Config;
use penman_core::export::{ExportFormat, ExportRequest, Exporter, export_date};

pub struct ExportOptions<'a> {
    pub input: &'a Path,
    pub format: Option<&'a str>,
    pub document_type: Option<&'a str>,
    pub out_dir: Option<&'a Path>,
    pub date: Option<&'a str>,
    pub config: &'a Config,
}

pub fn run(options: &ExportOptions<'_>) -> Result<()> {
    let buffer = super::read_document(options.input)?;
    let format: ExportFormat = options
        .format
        .unwrap_or(options.config.export.default_format.as_str())
        .parse()?;
    // unknown types are allowed here; they only name the file
    let document_type = options
        .document_type
        .unwrap_or(options.config.document_type.as_str());
    let date = match options.date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))?,
        None => export_date(),
    };

    let mut exporter = Exporter::from_config(&options.config.export);
    if let Some(dir) = options.out_dir {
        exporter = exporter.with_output_dir(dir);
    }

    let request = ExportRequest::new(document_type, format, date);
    let path = exporter.export(&buffer, &request)?;
    println!("{}", path.display());
    Ok(())
}
