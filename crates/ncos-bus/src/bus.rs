//! Channel-keyed publish/subscribe registry.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::audit::{AuditEntry, AuditLog, DEFAULT_AUDIT_CAPACITY};
use crate::clock::now_millis;
use crate::error::BusError;
use crate::event::{channels, ErrorReport, Event, KernelEvent};

type Handler = Rc<dyn Fn(&Event)>;

/// Resource bounds for a bus instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusLimits {
    /// Maximum live subscriptions across all channels
    pub max_subscribers: usize,
    /// Number of published events kept for diagnostics
    pub history: usize,
    /// Audit ring buffer capacity
    pub audit_capacity: usize,
}

impl Default for BusLimits {
    fn default() -> Self {
        Self {
            max_subscribers: 50,
            history: 20,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

struct Subscriber {
    id: u64,
    handler: Handler,
}

struct BusInner {
    /// Exact channel names and `prefix*` patterns
    channels: HashMap<String, Vec<Subscriber>>,
    subscriber_count: usize,
    next_id: u64,
    limits: BusLimits,
    history: VecDeque<Event>,
    audit: AuditLog,
    /// Live [`PublishHold`] guards
    holds: usize,
    /// Publications queued while held
    deferred: VecDeque<(String, KernelEvent)>,
}

impl BusInner {
    fn matching_handlers(&self, channel: &str) -> Vec<Handler> {
        self.channels
            .iter()
            .filter(|(key, _)| channel_matches(key, channel))
            .flat_map(|(_, subs)| subs.iter().map(|s| Rc::clone(&s.handler)))
            .collect()
    }

    fn remove(&mut self, channel: &str, id: u64) -> bool {
        let Some(subs) = self.channels.get_mut(channel) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            self.channels.remove(channel);
        }
        if removed {
            self.subscriber_count -= 1;
        }
        removed
    }
}

fn channel_matches(key: &str, channel: &str) -> bool {
    match key.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => key == channel,
    }
}

/// Handle to the kernel event bus.
///
/// Cloning the handle shares the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<RefCell<BusInner>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with default limits.
    pub fn new() -> Self {
        Self::with_limits(BusLimits::default())
    }

    /// Create a bus with explicit limits.
    pub fn with_limits(limits: BusLimits) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusInner {
                channels: HashMap::new(),
                subscriber_count: 0,
                next_id: 1,
                limits,
                history: VecDeque::new(),
                audit: AuditLog::new(limits.audit_capacity),
                holds: 0,
                deferred: VecDeque::new(),
            })),
        }
    }

    /// Subscribe to a channel.
    ///
    /// A channel ending in `*` subscribes to every channel with that prefix
    /// (`err:*` receives all error channels).
    pub fn subscribe<F>(&self, channel: &str, handler: F) -> Result<Subscription, BusError>
    where
        F: Fn(&Event) + 'static,
    {
        if channel.is_empty() || channel == "*" {
            return Err(BusError::InvalidChannel(channel.to_string()));
        }

        let mut inner = self.inner.borrow_mut();
        if inner.subscriber_count >= inner.limits.max_subscribers {
            log::warn!(
                target: "bus",
                "subscriber limit {} reached, rejecting {}",
                inner.limits.max_subscribers,
                channel
            );
            return Err(BusError::SubscriberLimit {
                limit: inner.limits.max_subscribers,
            });
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .push(Subscriber {
                id,
                handler: Rc::new(handler),
            });
        inner.subscriber_count += 1;

        Ok(Subscription {
            bus: Rc::downgrade(&self.inner),
            channel: channel.to_string(),
            id,
        })
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Handlers run after the registry borrow is released, so a handler
    /// may publish or subscribe. While a [`PublishHold`] is alive the event
    /// is queued instead and delivered when the last hold drops.
    ///
    /// A panicking handler is skipped and reported as a fatal error on
    /// `err:kernel`. Panics while delivering an error are only logged.
    pub fn publish(&self, channel: &str, payload: KernelEvent) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.holds > 0 {
                inner.deferred.push_back((channel.to_string(), payload));
                return;
            }
        }

        let event = Event {
            channel: channel.to_string(),
            payload,
            timestamp: now_millis(),
        };

        if channels::is_error(channel) {
            log::error!(target: "bus", "[{}] {:?}", channel, event.payload);
        } else if channels::is_logged(channel) {
            log::info!(target: "bus", "[{}] {:?}", channel, event.payload);
        }

        let handlers = {
            let mut inner = self.inner.borrow_mut();
            inner.history.push_front(event.clone());
            while inner.history.len() > inner.limits.history {
                inner.history.pop_back();
            }
            inner.matching_handlers(channel)
        };

        for handler in handlers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                let message = format!(
                    "handler for {} panicked: {}",
                    channel,
                    panic_message(&*panic)
                );
                if channels::is_error(channel) || channel == channels::SYS_ERROR {
                    log::error!(target: "bus", "{}", message);
                } else {
                    self.publish(
                        channels::ERR_KERNEL,
                        KernelEvent::Error(ErrorReport::fatal("bus", message)),
                    );
                }
            }
        }
    }

    /// Queue publications until the returned guard drops.
    ///
    /// Lets a caller finish a state change, and release its own borrows,
    /// before any handler observes it. Holds nest.
    pub fn hold(&self) -> PublishHold {
        self.inner.borrow_mut().holds += 1;
        PublishHold { bus: self.clone() }
    }

    fn release(&self) {
        let held = {
            let mut inner = self.inner.borrow_mut();
            inner.holds -= 1;
            inner.holds > 0
        };
        if held {
            return;
        }
        loop {
            let next = self.inner.borrow_mut().deferred.pop_front();
            let Some((channel, payload)) = next else {
                break;
            };
            self.publish(&channel, payload);
        }
    }

    /// Recently published events, newest first.
    pub fn history(&self) -> Vec<Event> {
        self.inner.borrow().history.iter().cloned().collect()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscriber_count
    }

    /// Record an audit entry and publish it on `sys:audit`.
    pub fn record_audit(&self, entry: AuditEntry) {
        self.inner.borrow_mut().audit.push(entry.clone());
        self.publish(channels::SYS_AUDIT, KernelEvent::Audit(entry));
    }

    /// Up to `limit` audit entries, newest first.
    pub fn audit_entries(&self, limit: usize) -> Vec<AuditEntry> {
        self.inner.borrow().audit.entries(limit)
    }

    pub fn clear_audit(&self) {
        self.inner.borrow_mut().audit.clear();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Guard returned by [`EventBus::hold`].
#[must_use = "publications are released when the hold drops"]
pub struct PublishHold {
    bus: EventBus,
}

impl Drop for PublishHold {
    fn drop(&mut self) {
        self.bus.release();
    }
}

/// Unsubscribe handle returned by [`EventBus::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<RefCell<BusInner>>,
    channel: String,
    id: u64,
}

impl Subscription {
    /// Channel (or pattern) this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Remove the handler. Returns false if the bus is gone.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => inner.borrow_mut().remove(&self.channel, self.id),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditOutcome;
    use std::cell::Cell;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_publish_reaches_subscriber() {
        init_logs();
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        bus.subscribe(channels::WIN_OPEN, move |_| h.set(h.get() + 1))
            .unwrap();

        bus.publish(
            channels::WIN_OPEN,
            KernelEvent::WindowOpened {
                window_id: "calc".to_string(),
                kind: "calc".to_string(),
            },
        );
        bus.publish(channels::WIN_CLOSE, KernelEvent::WindowClosed {
            window_id: "calc".to_string(),
        });

        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = bus.subscribe(channels::SYS_BOOT, move |_| h.set(h.get() + 1)).unwrap();
        assert_eq!(bus.subscriber_count(), 1);

        assert!(sub.unsubscribe());
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(channels::SYS_BOOT, KernelEvent::Boot);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_subscriber_limit() {
        let bus = EventBus::with_limits(BusLimits {
            max_subscribers: 2,
            ..Default::default()
        });
        bus.subscribe("a", |_| {}).unwrap();
        bus.subscribe("b", |_| {}).unwrap();

        let err = bus.subscribe("c", |_| {}).unwrap_err();
        assert_eq!(err, BusError::SubscriberLimit { limit: 2 });
    }

    #[test]
    fn test_prefix_subscription() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        bus.subscribe(channels::ERR_ANY, move |ev| s.borrow_mut().push(ev.channel.clone()))
            .unwrap();

        bus.publish(channels::ERR_STORAGE, KernelEvent::Custom(serde_json::Value::Null));
        bus.publish(channels::ERR_APP, KernelEvent::Custom(serde_json::Value::Null));
        bus.publish(channels::SYS_BOOT, KernelEvent::Boot);

        assert_eq!(*seen.borrow(), vec!["err:storage", "err:app"]);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        init_logs();
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        bus.subscribe("fs:change", |_| panic!("handler bug")).unwrap();
        let h = Rc::clone(&hits);
        bus.subscribe("fs:change", move |_| h.set(h.get() + 1)).unwrap();

        bus.publish("fs:change", KernelEvent::Custom(serde_json::Value::Null));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_handler_panic_is_reported_as_fatal() {
        init_logs();
        let bus = EventBus::new();
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&reports);
        bus.subscribe(channels::ERR_KERNEL, move |ev| {
            if let KernelEvent::Error(report) = &ev.payload {
                sink.borrow_mut().push(report.clone());
            }
        })
        .unwrap();
        bus.subscribe(channels::WIN_FOCUS, |_| panic!("focus handler bug"))
            .unwrap();

        bus.publish(channels::WIN_FOCUS, KernelEvent::Boot);

        let reports = reports.borrow();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].fatal);
        assert_eq!(reports[0].source, "bus");
        assert!(reports[0].message.contains("focus handler bug"));
    }

    #[test]
    fn test_panic_on_error_channel_is_not_reported_again() {
        init_logs();
        let bus = EventBus::new();
        let deliveries = Rc::new(Cell::new(0));
        let d = Rc::clone(&deliveries);
        bus.subscribe(channels::ERR_ANY, move |_| {
            d.set(d.get() + 1);
            panic!("error handler bug");
        })
        .unwrap();

        bus.publish(channels::SYS_BOOT, KernelEvent::Boot);
        bus.subscribe(channels::SYS_BOOT, |_| panic!("boot handler bug"))
            .unwrap();
        bus.publish(channels::SYS_BOOT, KernelEvent::Boot);

        // One report for the boot handler; its own panic stops there.
        assert_eq!(deliveries.get(), 1);
        assert_eq!(bus.history()[0].channel, channels::ERR_KERNEL);
    }

    #[test]
    fn test_hold_defers_until_last_guard_drops() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        bus.subscribe("fs:*", move |ev| s.borrow_mut().push(ev.channel.clone()))
            .unwrap();

        let outer = bus.hold();
        bus.publish("fs:change", KernelEvent::Boot);
        {
            let _inner = bus.hold();
            bus.publish("fs:mount", KernelEvent::Boot);
        }
        bus.record_audit(AuditEntry::new("vfs.mount", "vfs", "usb", AuditOutcome::Info));
        assert!(seen.borrow().is_empty());
        assert!(bus.history().is_empty());
        assert_eq!(bus.audit_entries(10).len(), 1);

        drop(outer);
        assert_eq!(*seen.borrow(), vec!["fs:change", "fs:mount"]);
        assert_eq!(bus.history()[0].channel, channels::SYS_AUDIT);
    }

    #[test]
    fn test_handler_may_publish() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        bus.subscribe("a", move |_| inner_bus.publish("b", KernelEvent::Boot))
            .unwrap();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        bus.subscribe("b", move |_| h.set(h.get() + 1)).unwrap();

        bus.publish("a", KernelEvent::Boot);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_history_bounded() {
        let bus = EventBus::with_limits(BusLimits {
            history: 3,
            ..Default::default()
        });
        for n in 0..5u32 {
            bus.publish("space:change", KernelEvent::SpaceChanged { space_id: n });
        }

        let history = bus.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].payload, KernelEvent::SpaceChanged { space_id: 4 });
    }

    #[test]
    fn test_audit_is_recorded_and_published() {
        let bus = EventBus::new();
        let audits = Rc::new(Cell::new(0));
        let a = Rc::clone(&audits);
        bus.subscribe(channels::SYS_AUDIT, move |_| a.set(a.get() + 1)).unwrap();

        bus.record_audit(AuditEntry::new(
            "permission.resolve",
            "textpad",
            "files:write",
            AuditOutcome::Allow,
        ));

        assert_eq!(audits.get(), 1);
        let entries = bus.audit_entries(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].app_id, "textpad");

        bus.clear_audit();
        assert!(bus.audit_entries(10).is_empty());
    }

    #[test]
    fn test_invalid_channel() {
        let bus = EventBus::new();
        assert!(matches!(
            bus.subscribe("", |_| {}),
            Err(BusError::InvalidChannel(_))
        ));
    }
}
