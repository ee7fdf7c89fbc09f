//! Tag classification, extraction and aggregation
//!
//! Captured calls are classified by vendor ([`classify`]), turned into
//! [`TagRecord`]s by the [`TagExtractor`] and aggregated per page in a
//! [`TagTracker`]. Floodlight records can be enriched with their activity ID
//! through a [`FloodlightIdResolver`].

mod extractor;
mod record;
mod resolver;
mod tracker;
mod vendor;
mod warnings;

pub use extractor::{Extraction, TagExtractor};
pub use record::{ObservedCall, RecordKey, RecordKeyStrategy, TagRecord, NO_TAGS_DETECTED};
pub use resolver::{
    FloodlightIdResolver, FloodlightQuery, HttpFloodlightResolver, DEFAULT_API_BASE,
};
pub use tracker::{RecordRef, TagTracker, TrackOutcome, TAG_REPORT_HEADER};
pub use vendor::{classify, Classification, TagFields, VendorKind};
pub use warnings::floodlight_warnings;
