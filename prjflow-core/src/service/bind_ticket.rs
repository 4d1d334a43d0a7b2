//! Pending WeChat bind requests
//!
//! The bind callback carries only the raw ticket in `state`, so the account
//! that asked for the bind is remembered here when its authorization URL is
//! issued. Entries are short-lived and consumed once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::UserId;

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    user_id: UserId,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct PendingBindings {
    entries: Arc<Mutex<HashMap<String, PendingEntry>>>,
    ttl: Duration,
}

impl PendingBindings {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Remember that `user_id` started a bind under `ticket`
    ///
    /// Returns `false`, leaving the entry untouched, when the ticket is still
    /// pending for a different user. The same user may re-register to refresh it.
    pub fn register(&self, ticket: &str, user_id: UserId) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(ticket) {
            if existing.expires_at > now && existing.user_id != user_id {
                debug!(ticket = %ticket, user_id = %user_id, "Bind ticket held by another user");
                return false;
            }
        }
        entries.insert(
            ticket.to_string(),
            PendingEntry {
                user_id,
                expires_at: now + self.ttl,
            },
        );
        debug!(ticket = %ticket, user_id = %user_id, "Bind request registered");
        true
    }

    /// The requesting user, without consuming the entry
    #[must_use]
    pub fn peek(&self, ticket: &str) -> Option<UserId> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(ticket)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.user_id)
    }

    /// Consume the entry; expired entries are dropped along the way
    pub fn take(&self, ticket: &str) -> Option<UserId> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.remove(ticket).map(|entry| entry.user_id)
    }

    /// Remove expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_peek_take() {
        let bindings = PendingBindings::new(Duration::from_secs(60));
        assert!(bindings.register("t-1", UserId(5)));

        assert_eq!(bindings.peek("t-1"), Some(UserId(5)));
        assert_eq!(bindings.peek("t-1"), Some(UserId(5)));
        assert_eq!(bindings.take("t-1"), Some(UserId(5)));
        assert_eq!(bindings.take("t-1"), None);
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_expired_entries_are_invisible() {
        let bindings = PendingBindings::new(Duration::from_millis(10));
        assert!(bindings.register("t-1", UserId(5)));
        std::thread::sleep(Duration::from_millis(25));

        assert_eq!(bindings.peek("t-1"), None);
        assert_eq!(bindings.purge_expired(), 1);
        assert_eq!(bindings.take("t-1"), None);
    }

    #[test]
    fn test_pending_ticket_is_not_taken_over() {
        let bindings = PendingBindings::new(Duration::from_secs(60));
        assert!(bindings.register("shared", UserId(5)));

        assert!(!bindings.register("shared", UserId(6)));
        assert_eq!(bindings.peek("shared"), Some(UserId(5)));

        // the owner may refresh its own request
        assert!(bindings.register("shared", UserId(5)));
        assert_eq!(bindings.take("shared"), Some(UserId(5)));
    }

    #[test]
    fn test_expired_ticket_can_be_reused() {
        let bindings = PendingBindings::new(Duration::from_millis(10));
        assert!(bindings.register("shared", UserId(5)));
        std::thread::sleep(Duration::from_millis(25));

        assert!(bindings.register("shared", UserId(6)));
        assert_eq!(bindings.peek("shared"), Some(UserId(6)));
    }
}
