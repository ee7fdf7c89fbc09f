/// Frontier state definitions for tracking crawl progress
///
/// A page enters the frontier as `Found` and moves to `Visited` exactly once.
use std::fmt;

/// Represents the current state of a page in the crawl frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontierState {
    /// Page has been discovered but not yet handed to the navigator
    Found,

    /// Page has been handed to the navigator; terminal
    Visited,
}

impl FrontierState {
    /// Returns true once the page has been handed to the navigator
    pub fn is_visited(&self) -> bool {
        matches!(self, Self::Visited)
    }

    /// Returns true if `next` is a legal successor of this state
    ///
    /// The only transition is `Found` to `Visited`; nothing leaves `Visited`.
    pub fn can_transition_to(&self, next: FrontierState) -> bool {
        matches!((self, next), (Self::Found, Self::Visited))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Visited => "visited",
        }
    }
}

impl fmt::Display for FrontierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
