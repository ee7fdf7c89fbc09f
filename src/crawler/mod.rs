//! Crawler module: frontier, navigation and run coordination
//!
//! This module contains the crawl logic, including:
//! - The found/visited frontier over normalized page keys
//! - Link discovery from rendered markup
//! - Navigation and settle pacing
//! - The per-run coordinator that ties tag extraction and site-tag
//!   verification to the crawl

mod coordinator;
mod discoverer;
mod frontier;
mod navigator;

pub use coordinator::{
    Collaborators, Coordinator, RunEvent, RunHandle, RunReport, DESIGNATED_TAB,
};
pub use discoverer::{extract_hrefs, LinkDiscoverer};
pub use frontier::{Frontier, FrontierEntry, VisitFilter};
pub use navigator::{Navigator, SettleTimer};
