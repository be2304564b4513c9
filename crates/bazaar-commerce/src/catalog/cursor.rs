//! Offset/limit cursor for incremental listings.

use serde::{Deserialize, Serialize};

/// Default page size of storefront listings.
pub const DEFAULT_LIMIT: u32 = 15;

/// Position of an incremental ("load more") listing.
///
/// Once a page comes back short, `has_more` stays false until
/// [`Cursor::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub skip: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl Cursor {
    pub fn new(limit: u32) -> Self {
        Self {
            skip: 0,
            limit: limit.max(1),
            has_more: true,
        }
    }

    /// Record a received page of `received` items.
    pub fn advance(&mut self, received: usize) {
        if received < self.limit as usize {
            self.has_more = false;
        }
        self.skip = self.skip.saturating_add(self.limit);
    }

    /// Back to the first page.
    pub fn reset(&mut self) {
        self.skip = 0;
        self.has_more = true;
    }

    /// `(limit, skip)` query pairs.
    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("limit", self.limit.to_string()),
            ("skip", self.skip.to_string()),
        ]
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_page_keeps_going() {
        let mut c = Cursor::default();
        c.advance(15);
        assert!(c.has_more);
        assert_eq!(c.skip, 15);
    }

    #[test]
    fn test_short_page_stops() {
        let mut c = Cursor::default();
        c.advance(10);
        assert!(!c.has_more);
        c.reset();
        assert!(c.has_more);
        assert_eq!(c.skip, 0);
    }
}
