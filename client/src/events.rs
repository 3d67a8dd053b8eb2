//! In-process publish/subscribe bus
//!
//! Lets independent parts of the client react to cross-cutting changes
//! ("balance changed", "cart changed") without sharing a parent. Dispatch is
//! synchronous: `publish` returns once every handler has run.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Event handler. Identity (for `unsubscribe`) is the `Arc` allocation.
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Well-known event names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    CartChanged,
    BalanceChanged,
    OrderCreated,
    ProductAddedToCart,
    Custom(String),
}

impl EventName {
    pub fn as_str(&self) -> &str {
        match self {
            EventName::CartChanged => "cart-changed",
            EventName::BalanceChanged => "balance-changed",
            EventName::OrderCreated => "order-created",
            EventName::ProductAddedToCart => "product-added-to-cart",
            EventName::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
struct Subscription {
    id: u64,
    handler: Handler,
    once: bool,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventName, Vec<Subscription>>>,
}

/// Event bus handle. Clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`. Handlers run in registration order.
    pub fn subscribe(&self, event: EventName, handler: Handler) {
        self.add(event, handler, false);
    }

    /// Register `handler` so that it runs on the next publish of `event` only.
    pub fn subscribe_once(&self, event: EventName, handler: Handler) {
        self.add(event, handler, true);
    }

    /// Remove `handler` from `event`. Unknown handlers are ignored.
    pub fn unsubscribe(&self, event: &EventName, handler: &Handler) {
        let mut handlers = self.inner.handlers.lock();
        if let Some(subs) = handlers.get_mut(event) {
            if let Some(pos) = subs.iter().position(|s| Arc::ptr_eq(&s.handler, handler)) {
                subs.remove(pos);
            }
            if subs.is_empty() {
                handlers.remove(event);
            }
        }
    }

    /// Invoke every handler registered for `event` with `args`.
    ///
    /// A panicking handler is logged and skipped; the rest still run.
    pub fn publish(&self, event: &EventName, args: &[Value]) {
        let snapshot: Vec<Subscription> = match self.inner.handlers.lock().get(event) {
            Some(subs) => subs.clone(),
            None => return,
        };

        for sub in snapshot {
            if sub.once && !self.take(event, sub.id) {
                // Already consumed by a nested publish.
                continue;
            }
            let handler = &sub.handler;
            if catch_unwind(AssertUnwindSafe(|| handler(args))).is_err() {
                tracing::error!(event = %event, "Event handler panicked");
            }
        }
    }

    /// Number of handlers currently registered for `event`.
    pub fn subscriber_count(&self, event: &EventName) -> usize {
        self.inner
            .handlers
            .lock()
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn add(&self, event: EventName, handler: Handler, once: bool) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .entry(event)
            .or_default()
            .push(Subscription { id, handler, once });
    }

    /// Remove a one-shot subscription; returns false if it was already gone.
    fn take(&self, event: &EventName, id: u64) -> bool {
        let mut handlers = self.inner.handlers.lock();
        let Some(subs) = handlers.get_mut(event) else {
            return false;
        };
        let Some(pos) = subs.iter().position(|s| s.id == id) else {
            return false;
        };
        subs.remove(pos);
        if subs.is_empty() {
            handlers.remove(event);
        }
        true
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.inner.handlers.lock();
        let counts: HashMap<&str, usize> = handlers
            .iter()
            .map(|(name, subs)| (name.as_str(), subs.len()))
            .collect();
        f.debug_struct("EventBus").field("handlers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, Handler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Handler = Arc::new(move |args: &[Value]| {
            sink.lock().push(args.first().cloned().unwrap_or(Value::Null));
        });
        (seen, handler)
    }

    #[test]
    fn publish_reaches_subscriber_once_with_args() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe(EventName::BalanceChanged, handler);

        bus.publish(&EventName::BalanceChanged, &[json!(42.5)]);

        assert_eq!(*seen.lock(), vec![json!(42.5)]);
    }

    #[test]
    fn unsubscribed_handler_is_not_called() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe(EventName::CartChanged, handler.clone());
        bus.unsubscribe(&EventName::CartChanged, &handler);

        bus.publish(&EventName::CartChanged, &[json!(1)]);

        assert!(seen.lock().is_empty());
        assert_eq!(bus.subscriber_count(&EventName::CartChanged), 0);
    }

    #[test]
    fn unsubscribe_unknown_handler_is_noop() {
        let bus = EventBus::new();
        let (_seen, handler) = recorder();
        let (_other, stranger) = recorder();
        bus.subscribe(EventName::CartChanged, handler);

        bus.unsubscribe(&EventName::CartChanged, &stranger);
        bus.unsubscribe(&EventName::OrderCreated, &stranger);

        assert_eq!(bus.subscriber_count(&EventName::CartChanged), 1);
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish(&EventName::OrderCreated, &[json!("o-1")]);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            bus.subscribe(
                EventName::CartChanged,
                Arc::new(move |_: &[Value]| order.lock().push(i)),
            );
        }

        bus.publish(&EventName::CartChanged, &[]);

        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn once_handler_fires_a_single_time() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe_once(EventName::OrderCreated, handler);

        bus.publish(&EventName::OrderCreated, &[json!("a")]);
        bus.publish(&EventName::OrderCreated, &[json!("b")]);

        assert_eq!(*seen.lock(), vec![json!("a")]);
        assert_eq!(bus.subscriber_count(&EventName::OrderCreated), 0);
    }

    #[test]
    fn once_handler_can_be_unsubscribed_before_firing() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe_once(EventName::OrderCreated, handler.clone());
        bus.unsubscribe(&EventName::OrderCreated, &handler);

        bus.publish(&EventName::OrderCreated, &[json!("a")]);

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn panicking_handler_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe(
            EventName::BalanceChanged,
            Arc::new(|_: &[Value]| panic!("boom")),
        );
        bus.subscribe(EventName::BalanceChanged, handler);

        bus.publish(&EventName::BalanceChanged, &[json!(10)]);

        assert_eq!(*seen.lock(), vec![json!(10)]);
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_publish() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicU64::new(0));
        let slot: Arc<Mutex<Option<Handler>>> = Arc::new(Mutex::new(None));

        let handler: Handler = {
            let bus = bus.clone();
            let calls = calls.clone();
            let slot = slot.clone();
            Arc::new(move |_: &[Value]| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = slot.lock().clone() {
                    bus.unsubscribe(&EventName::CartChanged, &me);
                }
            })
        };
        *slot.lock() = Some(handler.clone());
        bus.subscribe(EventName::CartChanged, handler);

        bus.publish(&EventName::CartChanged, &[]);
        bus.publish(&EventName::CartChanged, &[]);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_event_names_are_distinct() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        bus.subscribe(EventName::Custom("wishlist-changed".into()), handler);

        bus.publish(&EventName::CartChanged, &[json!(1)]);
        bus.publish(&EventName::Custom("wishlist-changed".into()), &[json!(2)]);

        assert_eq!(*seen.lock(), vec![json!(2)]);
    }
}
