use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{NotificationKind, NotificationMessage};

/// Identifies one subscription among those sharing a ticket
pub type SubscriptionId = u64;

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<NotificationMessage>,
    created_at: Instant,
}

/// In-process pub/sub registry keyed by sign-in ticket
///
/// Delivery is at-most-once: a message published while nobody listens on the
/// ticket is dropped, never queued. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct TicketHub {
    tickets: Arc<DashMap<String, Vec<Subscriber>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for TicketHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketHub")
            .field("tickets", &self.tickets.len())
            .finish()
    }
}

impl TicketHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a ticket
    ///
    /// Several subscriptions may share a ticket; each gets its own channel.
    /// Dropping the returned handle unsubscribes.
    #[must_use]
    pub fn subscribe(&self, ticket: &str) -> TicketSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        self.tickets
            .entry(ticket.to_string())
            .or_default()
            .push(Subscriber {
                id,
                sender: tx,
                created_at: Instant::now(),
            });

        debug!(ticket = %ticket, subscription_id = id, "Ticket subscribed");

        TicketSubscription {
            id,
            ticket: ticket.to_string(),
            receiver: rx,
            hub: self.clone(),
        }
    }

    /// Remove one subscription; unknown ids are ignored
    pub fn unsubscribe(&self, ticket: &str, id: SubscriptionId) {
        let emptied = match self.tickets.get_mut(ticket) {
            Some(mut subscribers) => {
                subscribers.retain(|s| s.id != id);
                subscribers.is_empty()
            }
            None => return,
        };

        if emptied {
            self.tickets.remove_if(ticket, |_, subscribers| subscribers.is_empty());
            debug!(ticket = %ticket, "Ticket has no more subscribers, removed");
        }
    }

    /// Deliver a message to every current subscriber of `ticket`
    ///
    /// Never blocks and never fails. Returns how many subscribers got it;
    /// zero is a normal outcome. An empty ticket is a no-op.
    pub fn publish(
        &self,
        ticket: &str,
        kind: NotificationKind,
        payload: Option<Value>,
        text: impl Into<String>,
    ) -> usize {
        if ticket.is_empty() {
            return 0;
        }

        let message = NotificationMessage {
            ticket: ticket.to_string(),
            kind,
            payload,
            text: text.into(),
        };

        let (sent_count, emptied) = match self.tickets.get_mut(ticket) {
            Some(mut subscribers) => {
                let mut sent = 0;
                subscribers.retain(|subscriber| match subscriber.sender.send(message.clone()) {
                    Ok(()) => {
                        sent += 1;
                        true
                    }
                    Err(_) => {
                        warn!(
                            ticket = %ticket,
                            subscription_id = subscriber.id,
                            "Subscriber channel closed, dropping subscription"
                        );
                        false
                    }
                });
                (sent, subscribers.is_empty())
            }
            None => (0, false),
        };

        if emptied {
            self.tickets.remove_if(ticket, |_, subscribers| subscribers.is_empty());
        }

        debug!(
            ticket = %ticket,
            kind = ?kind,
            sent_count = sent_count,
            "Notification published"
        );

        sent_count
    }

    /// Drop subscriptions older than `max_age` or whose receiver is gone
    ///
    /// Returns the number of subscriptions removed.
    pub fn prune_expired(&self, max_age: Duration) -> usize {
        let mut removed = 0;
        self.tickets.retain(|_, subscribers| {
            let before = subscribers.len();
            subscribers.retain(|s| s.created_at.elapsed() < max_age && !s.sender.is_closed());
            removed += before - subscribers.len();
            !subscribers.is_empty()
        });

        if removed > 0 {
            info!(removed = removed, "Pruned stale ticket subscriptions");
        }
        removed
    }

    /// Periodically prune stale subscriptions until the task is aborted
    #[must_use]
    pub fn start_sweeper(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let hub = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                hub.prune_expired(max_age);
            }
        })
    }

    #[must_use]
    pub fn subscriber_count(&self, ticket: &str) -> usize {
        self.tickets.get(ticket).map_or(0, |subscribers| subscribers.len())
    }

    /// Number of tickets with at least one subscriber
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }
}

/// Receiving end of a ticket subscription
#[derive(Debug)]
pub struct TicketSubscription {
    id: SubscriptionId,
    ticket: String,
    receiver: mpsc::UnboundedReceiver<NotificationMessage>,
    hub: TicketHub,
}

impl TicketSubscription {
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn ticket(&self) -> &str {
        &self.ticket
    }

    /// Wait for the next message; `None` once the hub dropped this subscription
    pub async fn recv(&mut self) -> Option<NotificationMessage> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for TicketSubscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.ticket, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_and_publish() {
        let hub = TicketHub::new();
        let mut sub = hub.subscribe("t-1");
        assert_eq!(hub.subscriber_count("t-1"), 1);

        let sent = hub.publish("t-1", NotificationKind::Success, Some(json!({"ok": true})), "done");
        assert_eq!(sent, 1);

        let received = sub.recv().await.unwrap();
        assert_eq!(received.ticket, "t-1");
        assert_eq!(received.kind, NotificationKind::Success);
        assert_eq!(received.payload, Some(json!({"ok": true})));
        assert_eq!(received.text, "done");
    }

    #[tokio::test]
    async fn test_publish_is_isolated_per_ticket() {
        let hub = TicketHub::new();
        let mut sub_a = hub.subscribe("A");
        let mut sub_b = hub.subscribe("B");

        assert_eq!(hub.publish("A", NotificationKind::Info, None, "for A"), 1);

        let received = tokio::time::timeout(Duration::from_millis(100), sub_a.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.text, "for A");

        let other = tokio::time::timeout(Duration::from_millis(100), sub_b.recv()).await;
        assert!(other.is_err(), "B must not receive messages for A");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = TicketHub::new();
        assert_eq!(hub.publish("nobody", NotificationKind::Error, None, "lost"), 0);
        assert_eq!(hub.publish("", NotificationKind::Info, None, "ignored"), 0);
        assert_eq!(hub.ticket_count(), 0);

        // nothing is queued for a late subscriber
        let mut late = hub.subscribe("nobody");
        let pending = tokio::time::timeout(Duration::from_millis(50), late.recv()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let hub = TicketHub::new();
        let sub = hub.subscribe("t-1");
        let id = sub.id();

        hub.unsubscribe("t-1", id);
        hub.unsubscribe("t-1", id);
        hub.unsubscribe("missing", 99);
        assert_eq!(hub.ticket_count(), 0);

        // drop after explicit unsubscribe is harmless
        drop(sub);
        assert_eq!(hub.subscriber_count("t-1"), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let hub = TicketHub::new();
        let first = hub.subscribe("t-1");
        let _second = hub.subscribe("t-1");
        assert_eq!(hub.subscriber_count("t-1"), 2);

        first.unsubscribe();
        assert_eq!(hub.subscriber_count("t-1"), 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_same_ticket() {
        let hub = TicketHub::new();
        let mut first = hub.subscribe("shared");
        let mut second = hub.subscribe("shared");

        assert_eq!(hub.publish("shared", NotificationKind::Info, None, "hello"), 2);
        assert_eq!(first.recv().await.unwrap().text, "hello");
        assert_eq!(second.recv().await.unwrap().text, "hello");
    }

    #[tokio::test]
    async fn test_messages_keep_publish_order() {
        let hub = TicketHub::new();
        let mut sub = hub.subscribe("t-1");

        hub.publish("t-1", NotificationKind::Info, None, "scanned");
        hub.publish("t-1", NotificationKind::Info, None, "fetching");
        hub.publish("t-1", NotificationKind::Success, None, "done");

        let texts: Vec<String> = [
            sub.recv().await.unwrap(),
            sub.recv().await.unwrap(),
            sub.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|m| m.text)
        .collect();
        assert_eq!(texts, ["scanned", "fetching", "done"]);
    }

    #[tokio::test]
    async fn test_prune_expired() {
        let hub = TicketHub::new();
        let mut old = hub.subscribe("old");
        std::thread::sleep(Duration::from_millis(30));
        let _fresh = hub.subscribe("fresh");

        let removed = hub.prune_expired(Duration::from_millis(20));
        assert_eq!(removed, 1);
        assert_eq!(hub.subscriber_count("old"), 0);
        assert_eq!(hub.subscriber_count("fresh"), 1);

        // the pruned receiver sees the channel close
        assert!(old.recv().await.is_none());
    }
}
