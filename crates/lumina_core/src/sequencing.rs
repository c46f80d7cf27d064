//! crates/lumina_core/src/sequencing.rs
//!
//! Latest-wins bookkeeping for one-shot generative requests. A screen takes a
//! ticket before calling out and only shows the result if no newer request has
//! started since.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct LatestRequest {
    issued: AtomicU64,
}

impl LatestRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request, superseding every earlier ticket.
    pub fn begin(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// True while no newer request has begun.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }

    /// Returns `result` only if `ticket` is still the newest.
    pub fn accept<T>(&self, ticket: Ticket, result: T) -> Option<T> {
        self.is_current(ticket).then_some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_newest_ticket_is_accepted() {
        let latest = LatestRequest::new();
        let first = latest.begin();
        assert!(latest.is_current(first));

        let second = latest.begin();
        assert!(!latest.is_current(first));
        assert_eq!(latest.accept(first, "stale"), None);
        assert_eq!(latest.accept(second, "fresh"), Some("fresh"));
    }

    #[tokio::test]
    async fn slow_stale_response_is_discarded() {
        use std::sync::Arc;
        use std::time::Duration;

        let latest = Arc::new(LatestRequest::new());

        let slow = {
            let latest = latest.clone();
            let ticket = latest.begin();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                latest.accept(ticket, "old topic")
            })
        };
        let fast_ticket = latest.begin();
        let fast = latest.accept(fast_ticket, "new topic");

        assert_eq!(fast, Some("new topic"));
        assert_eq!(slow.await.unwrap(), None);
    }
}
