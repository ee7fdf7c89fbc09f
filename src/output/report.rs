//! Report files
//!
//! Reports are written as `{domain}-{kind}-{timestamp}.csv` so repeated runs
//! against one site never overwrite each other.

use super::traits::OutputResult;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Report name for the tag tracker export
pub const TAG_REPORT: &str = "doubleclick-floodlight-report";

/// Report name for the site-tag export
pub const SITE_TAG_REPORT: &str = "gst-report";

/// Builds a report file name
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use tagwalk::output::report_file_name;
///
/// let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
/// assert_eq!(
///     report_file_name("example.com", "gst-report", &at),
///     "example.com-gst-report-20240309-140500.csv"
/// );
/// ```
pub fn report_file_name(domain: &str, kind: &str, at: &DateTime<Local>) -> String {
    let domain = if domain.is_empty() { "tagwalk" } else { domain };
    format!("{}-{}-{}.csv", domain, kind, at.format("%Y%m%d-%H%M%S"))
}

/// Writes `contents` to a new report file in `directory`
///
/// The directory is created if needed. Returns the path written.
pub fn write_report(
    directory: &Path,
    domain: &str,
    kind: &str,
    at: &DateTime<Local>,
    contents: &str,
) -> OutputResult<PathBuf> {
    fs::create_dir_all(directory)?;
    let path = directory.join(report_file_name(domain, kind, at));
    fs::write(&path, contents)?;
    tracing::info!("Wrote report {}", path.display());
    Ok(path)
}
