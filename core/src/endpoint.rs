//! Ordered endpoint candidates with a shared, monotonic cursor.
//!
//! The first endpoint is primary; the rest are only used after the current
//! one fails DNS resolution. Once the cursor moves it never moves back, and
//! every client sharing the selector starts from the new position.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, SdkError};

#[derive(Debug)]
pub struct EndpointSelector {
    endpoints: Vec<String>,
    index: AtomicUsize,
}

impl EndpointSelector {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            index: AtomicUsize::new(0),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Index of the endpoint new attempts should use.
    pub fn current(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    pub fn get(&self, index: usize) -> Result<&str> {
        self.endpoints
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| SdkError::InvalidEndpoint {
                endpoint: String::new(),
                reason: format!("no endpoint at index {index} of {}", self.endpoints.len()),
            })
    }

    /// Move past `observed` after it failed. Returns whether a later
    /// candidate exists. Concurrent callers may race; the cursor only grows.
    pub fn advance_from(&self, observed: usize) -> bool {
        let next = observed + 1;
        if next >= self.endpoints.len() {
            return false;
        }
        self.index.fetch_max(next, Ordering::AcqRel);
        true
    }

    /// Return to the primary endpoint.
    pub fn reset(&self) {
        self.index.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn advances_until_last_candidate() {
        let selector = EndpointSelector::new(["https://a", "https://b", "https://c"]);
        assert_eq!(selector.get(selector.current()).unwrap(), "https://a");

        assert!(selector.advance_from(0));
        assert_eq!(selector.current(), 1);
        assert!(selector.advance_from(1));
        assert_eq!(selector.current(), 2);
        assert!(!selector.advance_from(2));
        assert_eq!(selector.current(), 2);
    }

    #[test]
    fn stale_advance_never_moves_backwards() {
        let selector = EndpointSelector::new(["a", "b", "c"]);
        selector.advance_from(1);
        assert_eq!(selector.current(), 2);
        selector.advance_from(0);
        assert_eq!(selector.current(), 2);
    }

    #[test]
    fn reset_returns_to_primary() {
        let selector = EndpointSelector::new(["a", "b"]);
        selector.advance_from(0);
        selector.reset();
        assert_eq!(selector.current(), 0);
    }

    #[test]
    fn empty_selector_has_no_endpoint() {
        let selector = EndpointSelector::new(Vec::<String>::new());
        assert!(matches!(
            selector.get(0),
            Err(SdkError::InvalidEndpoint { .. })
        ));
        assert!(!selector.advance_from(0));
    }

    #[test]
    fn concurrent_advances_settle_on_last() {
        let selector = Arc::new(EndpointSelector::new(["a", "b", "c", "d"]));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let selector = Arc::clone(&selector);
                std::thread::spawn(move || selector.advance_from(i % 3))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(selector.current(), 3);
    }
}
