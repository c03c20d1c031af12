// SPDX-License-Identifier: AGPL-3.0
// Gophie Core - Navigation history
//
// Back/forward over visited pages, kept in memory only.

use crate::page::Page;
use std::sync::RwLock;

/// Maximum number of history entries to keep
const MAX_HISTORY_ENTRIES: usize = 100;

struct HistoryState {
    pages: Vec<Page>,
    /// Index of the current page; meaningless while `pages` is empty
    position: usize,
}

/// Visited pages with a cursor for back and forward navigation
pub struct NavigationHistory {
    state: RwLock<HistoryState>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HistoryState {
                pages: Vec::new(),
                position: 0,
            }),
        }
    }

    /// Record a freshly loaded page.
    ///
    /// Reloading the current address changes nothing. Visiting another page
    /// from the middle of the history drops everything after the current
    /// page. Returns whether the page was added.
    pub fn visit(&self, page: Page) -> bool {
        let mut state = self.state.write().unwrap();

        if let Some(current) = state.pages.get(state.position) {
            if current.address().to_canonical_string() == page.address().to_canonical_string() {
                return false;
            }
            let keep = state.position + 1;
            state.pages.truncate(keep);
        }

        state.pages.push(page);

        // Trim to max entries, oldest first
        if state.pages.len() > MAX_HISTORY_ENTRIES {
            let excess = state.pages.len() - MAX_HISTORY_ENTRIES;
            state.pages.drain(..excess);
        }
        state.position = state.pages.len() - 1;
        true
    }

    /// Step back; returns the page to show
    pub fn back(&self) -> Option<Page> {
        let mut state = self.state.write().unwrap();
        if state.pages.is_empty() || state.position == 0 {
            return None;
        }
        state.position -= 1;
        state.pages.get(state.position).cloned()
    }

    /// Step forward; returns the page to show
    pub fn forward(&self) -> Option<Page> {
        let mut state = self.state.write().unwrap();
        if state.position + 1 >= state.pages.len() {
            return None;
        }
        state.position += 1;
        state.pages.get(state.position).cloned()
    }

    pub fn current(&self) -> Option<Page> {
        let state = self.state.read().unwrap();
        state.pages.get(state.position).cloned()
    }

    pub fn can_go_back(&self) -> bool {
        let state = self.state.read().unwrap();
        !state.pages.is_empty() && state.position > 0
    }

    pub fn can_go_forward(&self) -> bool {
        let state = self.state.read().unwrap();
        state.position + 1 < state.pages.len()
    }

    /// Clear all history
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        state.pages.clear();
        state.position = 0;
    }

    /// Get the count of history entries
    pub fn count(&self) -> usize {
        self.state.read().unwrap().pages.len()
    }
}

impl Default for NavigationHistory {
    fn default() -> Self {
        Self::new()
    }
}
