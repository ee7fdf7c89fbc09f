//! Output module for run reports
//!
//! This module handles:
//! - Rendering report tables as CSV text
//! - Writing timestamped report files
//! - Run statistics

mod report;
pub mod stats;
mod traits;

pub use report::{report_file_name, write_report, SITE_TAG_REPORT, TAG_REPORT};
pub use stats::{print_statistics, Statistics};
pub use traits::{render_table, OutputError, OutputResult, ReportTable};
