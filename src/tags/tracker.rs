//! Tag tracker store: per-page, per-record aggregation
//!
//! Pages and the records under them keep insertion order, which is also the
//! order of the exported report.

use super::record::{RecordKey, TagRecord};
use crate::output::{render_table, OutputResult, ReportTable};
use crate::url::PageKey;
use indexmap::IndexMap;

/// Report header for the tag export
pub const TAG_REPORT_HEADER: &[&str] = &[
    "Page",
    "Tag Type",
    "Account",
    "OGT (Y/N)",
    "Network Call",
    "Floodlight ID",
    "Floodlight Activity",
    "Floodlight Activity Group",
    "Sales Order",
    "U Variables",
    "Warnings",
    "Errors",
];

/// Locates a record in the tracker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordRef {
    pub page: PageKey,
    pub key: RecordKey,
}

/// What `track` did with a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// A new record was stored
    Created(RecordRef),

    /// The key already existed; the call was appended to that record
    Appended(RecordRef),
}

/// PageKey → RecordKey → TagRecord
#[derive(Debug, Default)]
pub struct TagTracker {
    pages: IndexMap<PageKey, IndexMap<RecordKey, TagRecord>>,

    /// Total number of records across all pages, placeholders included
    counter: usize,
}

impl TagTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` under `key`, or appends its calls to the record
    /// already stored under that key
    ///
    /// The stored record's fields are never overwritten on append.
    pub fn track(&mut self, page: PageKey, key: RecordKey, record: TagRecord) -> TrackOutcome {
        let records = self.pages.entry(page.clone()).or_default();
        let location = RecordRef {
            page,
            key: key.clone(),
        };

        match records.get_mut(&key) {
            Some(existing) => {
                existing.calls.extend(record.calls);
                TrackOutcome::Appended(location)
            }
            None => {
                records.insert(key, record);
                self.counter += 1;
                TrackOutcome::Created(location)
            }
        }
    }

    /// Inserts the placeholder row for a page that has no records
    ///
    /// Returns `None` and changes nothing if the page already has an entry.
    pub fn insert_placeholder(&mut self, page: &PageKey) -> Option<RecordRef> {
        if self.pages.contains_key(page) {
            return None;
        }

        let key = RecordKey::placeholder();
        let mut records = IndexMap::new();
        records.insert(key.clone(), TagRecord::placeholder(page));
        self.pages.insert(page.clone(), records);
        self.counter += 1;

        Some(RecordRef {
            page: page.clone(),
            key,
        })
    }

    pub fn get(&self, location: &RecordRef) -> Option<&TagRecord> {
        self.pages.get(&location.page)?.get(&location.key)
    }

    pub fn get_mut(&mut self, location: &RecordRef) -> Option<&mut TagRecord> {
        self.pages.get_mut(&location.page)?.get_mut(&location.key)
    }

    /// Records stored for one page, in insertion order
    pub fn records_for(&self, page: &PageKey) -> impl Iterator<Item = &TagRecord> {
        self.pages.get(page).into_iter().flat_map(|r| r.values())
    }

    /// Every record, pages and records in insertion order
    pub fn records(&self) -> impl Iterator<Item = &TagRecord> {
        self.pages.values().flat_map(|r| r.values())
    }

    /// Total number of records, placeholders included
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Number of records that are real tags
    pub fn tag_count(&self) -> usize {
        self.records().filter(|r| !r.is_placeholder()).count()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Removes every record and resets the counter
    pub fn clear(&mut self) {
        self.pages.clear();
        self.counter = 0;
    }

    /// Renders the tag report as CSV text
    pub fn export(&self) -> OutputResult<String> {
        render_table(self)
    }
}

fn or_none(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "None".to_string(),
    }
}

/// Converts line breaks to spaces
fn flatten(text: Option<&str>) -> String {
    or_none(text.map(|t| t.replace(['\r', '\n'], " ")).as_deref())
}

/// Characters left as-is when a page URL is written to the report
const URI_SAFE: &str = ";,/?:@&=+$-_.!~*'()";

/// Percent-encodes a page URL for the report; `#` becomes `%23`
fn encode_page(url: &str) -> String {
    let mut encoded = String::with_capacity(url.len());
    let mut buf = [0; 4];
    for c in url.chars() {
        if c.is_ascii_alphanumeric() || URI_SAFE.contains(c) {
            encoded.push(c);
        } else {
            encoded.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    encoded
}

fn export_row(record: &TagRecord) -> Vec<String> {
    let uvars = if record.fields.uvars.is_empty() {
        None
    } else {
        Some(record.fields.uvars.join("; "))
    };

    vec![
        or_none(Some(encode_page(&record.page).as_str())),
        or_none(record.kind.map(|k| k.label())),
        or_none(record.fields.advertiser.as_deref()),
        or_none(record.event_snippet.map(|s| if s { "true" } else { "false" })),
        or_none(record.first_call()),
        or_none(record.floodlight_id.as_deref()),
        or_none(record.fields.activity.as_deref()),
        or_none(record.fields.group.as_deref()),
        or_none(record.fields.order.as_deref()),
        flatten(uvars.as_deref()),
        flatten(record.warnings.as_deref()),
        flatten(record.errors.as_deref()),
    ]
}

impl ReportTable for TagTracker {
    fn header(&self) -> &'static [&'static str] {
        TAG_REPORT_HEADER
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.records().map(export_row).collect()
    }
}
