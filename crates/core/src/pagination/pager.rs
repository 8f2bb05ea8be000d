use crate::item::{Item, Key};
use crate::store::Page;

/// Accumulates pages of a query or scan until the limit is reached or the
/// store has nothing more to return.
#[derive(Debug, Clone)]
pub struct PageCollector {
    limit: Option<usize>,
    items: Vec<Item>,
    last_evaluated_key: Option<Key>,
    started: bool,
}

impl PageCollector {
    pub fn new(limit: Option<usize>, start_key: Option<Key>) -> Self {
        Self {
            limit,
            items: Vec::new(),
            last_evaluated_key: start_key,
            // A zero limit never reaches the store and keeps its position.
            started: limit == Some(0),
        }
    }

    /// Whether another page should be requested.
    pub fn has_next(&self) -> bool {
        !self.started || (self.last_evaluated_key.is_some() && !self.is_full())
    }

    /// Where the next page starts.
    pub fn exclusive_start_key(&self) -> Option<Key> {
        self.last_evaluated_key.clone()
    }

    /// How many items the next page may evaluate.
    pub fn remaining(&self) -> Option<usize> {
        self.limit
            .map(|limit| limit.saturating_sub(self.items.len()))
    }

    pub fn push(&mut self, page: Page) {
        self.started = true;
        self.items.extend(page.items);
        self.last_evaluated_key = page.last_evaluated_key;
    }

    /// Returns the collected items and, when a limit was given, the key to
    /// resume from.
    pub fn finish(self) -> (Vec<Item>, Option<Key>) {
        let resume_from = self.limit.and(self.last_evaluated_key);
        (self.items, resume_from)
    }

    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.items.len() >= limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter()
            .map(|id| json!({"id": id}).as_object().cloned().unwrap())
            .collect()
    }

    fn key(id: &str) -> Key {
        Key::new().with("id", id)
    }

    #[test]
    fn test_first_page_is_always_requested() {
        let collector = PageCollector::new(None, None);
        assert!(collector.has_next());
        assert_eq!(collector.exclusive_start_key(), None);
        assert_eq!(collector.remaining(), None);
    }

    #[test]
    fn test_unlimited_reads_until_exhausted() {
        let mut collector = PageCollector::new(None, None);
        collector.push(Page {
            items: items(&["a", "b"]),
            last_evaluated_key: Some(key("b")),
        });
        assert!(collector.has_next());
        assert_eq!(collector.exclusive_start_key(), Some(key("b")));

        collector.push(Page {
            items: items(&["c"]),
            last_evaluated_key: None,
        });
        assert!(!collector.has_next());

        let (collected, resume_from) = collector.finish();
        assert_eq!(collected.len(), 3);
        assert_eq!(resume_from, None);
    }

    #[test]
    fn test_limit_shrinks_each_request() {
        let mut collector = PageCollector::new(Some(5), Some(key("start")));
        assert_eq!(collector.exclusive_start_key(), Some(key("start")));
        collector.push(Page {
            items: items(&["a", "b"]),
            last_evaluated_key: Some(key("b")),
        });
        assert_eq!(collector.remaining(), Some(3));
    }

    #[test]
    fn test_limit_reached_keeps_resume_key() {
        let mut collector = PageCollector::new(Some(2), None);
        collector.push(Page {
            items: items(&["a", "b"]),
            last_evaluated_key: Some(key("b")),
        });
        assert!(!collector.has_next());

        let (collected, resume_from) = collector.finish();
        assert_eq!(collected.len(), 2);
        assert_eq!(resume_from, Some(key("b")));
    }

    #[test]
    fn test_zero_limit_keeps_position() {
        let collector = PageCollector::new(Some(0), Some(key("x")));
        assert!(!collector.has_next());
        assert_eq!(collector.finish(), (Vec::new(), Some(key("x"))));
    }
}
