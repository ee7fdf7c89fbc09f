//! Crawl frontier: the found/visited state machine over page keys
//!
//! The frontier is insertion ordered, so `next_page` always hands out the
//! earliest discovered page that has not been visited yet.

use crate::state::FrontierState;
use crate::url::PageKey;
use indexmap::IndexMap;

/// Predicate deciding whether a discovered URL may enter the frontier
pub type VisitFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// A page known to the frontier
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Normalized key
    pub key: PageKey,

    /// URL to navigate to (the first URL recorded for this key)
    pub url: String,

    pub state: FrontierState,
}

/// Found/visited bookkeeping for one run
pub struct Frontier {
    entries: IndexMap<PageKey, FrontierEntry>,

    /// Number of entries still in `Found`
    pending: usize,

    /// Index of the earliest entry that may still be `Found`
    cursor: usize,

    filter: Option<VisitFilter>,
}

impl Frontier {
    /// Creates an empty frontier that accepts every URL
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            pending: 0,
            cursor: 0,
            filter: None,
        }
    }

    /// Creates an empty frontier that only accepts URLs passing `filter`
    pub fn with_filter(filter: VisitFilter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::new()
        }
    }

    /// Adds every URL in `urls`, in order
    pub fn seed<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for url in urls {
            self.found(url.as_ref());
        }
    }

    /// Records a discovered URL
    ///
    /// Returns true if the URL created a new entry. URLs whose key is already
    /// present, whose key is empty, or that the filter rejects are ignored.
    pub fn found(&mut self, url: &str) -> bool {
        let key = PageKey::new(url);
        if key.is_empty() || self.entries.contains_key(&key) {
            return false;
        }

        if let Some(filter) = &self.filter {
            if !filter(url) {
                tracing::debug!("Frontier filter rejected {}", url);
                return false;
            }
        }

        self.entries.insert(
            key.clone(),
            FrontierEntry {
                key,
                url: url.trim().to_string(),
                state: FrontierState::Found,
            },
        );
        self.pending += 1;
        true
    }

    /// Takes the earliest `Found` entry, marks it `Visited` and returns it
    ///
    /// Returns `None` once every entry has been visited.
    pub fn next_page(&mut self) -> Option<FrontierEntry> {
        while let Some((_, entry)) = self.entries.get_index_mut(self.cursor) {
            self.cursor += 1;
            if entry.state.can_transition_to(FrontierState::Visited) {
                entry.state = FrontierState::Visited;
                self.pending -= 1;
                return Some(entry.clone());
            }
        }
        None
    }

    pub fn state_of(&self, url: &str) -> Option<FrontierState> {
        self.entries.get(&PageKey::new(url)).map(|e| e.state)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(&PageKey::new(url))
    }

    /// Number of pages ever found, visited or not
    pub fn found_count(&self) -> usize {
        self.entries.len()
    }

    pub fn visited_count(&self) -> usize {
        self.entries.len() - self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrontierEntry> {
        self.entries.values()
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}
