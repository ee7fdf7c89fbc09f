//! Global site tag verification
//!
//! Tracks which container scripts load on each page and whether the
//! first-party click cookies carrying the session click ID are present.

mod correlator;
mod listeners;

pub use correlator::{
    generate_click_id, CookieFamily, GlobalSiteTagEntry, ObservationScope, SiteTagCorrelator,
    SITE_TAG_REPORT_HEADER,
};
pub use listeners::SiteTagListeners;
