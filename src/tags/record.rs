use super::vendor::{TagFields, VendorKind};
use crate::url::PageKey;
use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

/// Error text carried by the placeholder row of a page without tags
pub const NO_TAGS_DETECTED: &str = "No Conversion Tags detected";

/// Identifies a record within one page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the placeholder row
    pub fn placeholder() -> Self {
        Self("0".to_string())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How record keys are derived from extracted calls
///
/// `PerEvent` gives every call its own record, so two calls to the same
/// logical endpoint produce two rows. `Logical` keys records by vendor,
/// advertiser, activity and group, so repeated calls append to one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKeyStrategy {
    #[default]
    PerEvent,
    Logical,
}

impl RecordKeyStrategy {
    pub fn key_for(&self, id: &Uuid, kind: VendorKind, fields: &TagFields) -> RecordKey {
        match self {
            Self::PerEvent => RecordKey(id.to_string()),
            Self::Logical => {
                let part = |v: &Option<String>| v.clone().unwrap_or_else(|| "null".to_string());
                RecordKey(format!(
                    "{:?}:{}_{}_{}",
                    kind,
                    part(&fields.advertiser),
                    part(&fields.activity),
                    part(&fields.group)
                ))
            }
        }
    }
}

/// One network call aggregated into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedCall {
    pub url: String,
    pub status_code: u16,
}

/// One classified tracking tag observed on a page
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub id: Uuid,
    pub page: String,

    /// `None` only for the placeholder row of a page without tags
    pub kind: Option<VendorKind>,

    pub calls: Vec<ObservedCall>,
    pub fields: TagFields,

    /// `None` only for the placeholder row
    pub event_snippet: Option<bool>,

    /// Resolved asynchronously by the floodlight lookup
    pub floodlight_id: Option<String>,

    /// Line-separated warning text
    pub warnings: Option<String>,

    pub errors: Option<String>,
}

impl TagRecord {
    /// A record for a freshly classified call
    pub fn observed(
        page: &PageKey,
        kind: VendorKind,
        fields: TagFields,
        event_snippet: bool,
        call: ObservedCall,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            page: page.to_string(),
            kind: Some(kind),
            calls: vec![call],
            fields,
            event_snippet: Some(event_snippet),
            floodlight_id: None,
            warnings: None,
            errors: None,
        }
    }

    /// The all-"None" row standing in for a page with no tags
    pub fn placeholder(page: &PageKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            page: page.to_string(),
            kind: None,
            calls: Vec::new(),
            fields: TagFields::default(),
            event_snippet: None,
            floodlight_id: None,
            warnings: None,
            errors: Some(NO_TAGS_DETECTED.to_string()),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind.is_none()
    }

    pub fn is_floodlight(&self) -> bool {
        self.kind == Some(VendorKind::Floodlight)
    }

    /// URL of the first call aggregated into this record
    pub fn first_call(&self) -> Option<&str> {
        self.calls.first().map(|c| c.url.as_str())
    }
}
