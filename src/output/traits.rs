//! Report table trait and CSV rendering
//!
//! Both run reports are flat tables with a fixed header row. Each table
//! supplies its header and rows; rendering to CSV text is shared.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format report: {0}")]
    Csv(#[from] csv::Error),

    #[error("Report is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A table that can be exported as CSV text
pub trait ReportTable {
    /// Header row, written verbatim
    fn header(&self) -> &'static [&'static str];

    /// Data rows in display order
    fn rows(&self) -> Vec<Vec<String>>;

    /// Whether every data field is quoted
    fn quote_all(&self) -> bool {
        true
    }
}

/// Renders a table as CSV with CRLF line endings
///
/// The header row is never quoted. Data fields are quoted according to
/// [`ReportTable::quote_all`]; fields that need it are always quoted.
pub fn render_table(table: &dyn ReportTable) -> OutputResult<String> {
    let mut output = table.header().join(",");
    output.push_str("\r\n");

    let style = if table.quote_all() {
        QuoteStyle::Always
    } else {
        QuoteStyle::Necessary
    };
    let mut writer = WriterBuilder::new()
        .quote_style(style)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    for row in table.rows() {
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| OutputError::Io(e.into_error()))?;
    output.push_str(&String::from_utf8(bytes)?);
    Ok(output)
}
