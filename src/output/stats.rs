//! Run statistics
//!
//! Statistics are recomputed from the frontier and tracker after every page
//! load and once more, flagged `done`, when the run ends.


/// Progress counters emitted during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Pages ever added to the frontier
    pub pages_found: usize,

    /// Pages handed to the navigator
    pub pages_visited: usize,

    /// Tag records, not counting placeholder rows
    pub tags_found: usize,

    /// Set on the final emission of a run
    pub done: bool,
}

impl Statistics {
    /// Pages found but not yet visited
    pub fn pages_pending(&self) -> usize {
        self.pages_found.saturating_sub(self.pages_visited)
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &Statistics) {
    println!("=== Run Statistics ===\n");
    println!("  Pages found:   {}", stats.pages_found);
    println!("  Pages visited: {}", stats.pages_visited);
    println!("  Tags found:    {}", stats.tags_found);

    if stats.pages_pending() > 0 {
        println!("  (run stopped, {} pages not visited)", stats.pages_pending());
    }
    println!();
}
