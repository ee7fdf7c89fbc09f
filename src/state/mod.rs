//! State module for tracking crawl progress
//!
//! The frontier is a two-state machine: every page is `Found` until the
//! navigator takes it, then `Visited` for the rest of the run.

mod frontier_state;

// Re-export main types
pub use frontier_state::FrontierState;
