//! Events emitted on successful appends for subscribers.

use soulfra_types::{AccountId, LedgerEntry};

/// Ledger-level events that observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug)]
pub enum LedgerEvent {
    /// An entry was appended. Carries the full entry so subscribers never
    /// need a read-back.
    EntryAppended(LedgerEntry),
    /// An account was created on first contact.
    AccountCreated { account_id: AccountId },
    /// An account was marked inactive.
    AccountDeactivated { account_id: AccountId },
}

/// Synchronous fan-out event bus for ledger events.
///
/// Listeners are invoked inline on the appending task while the per-account
/// lock is still held; keep handlers fast to avoid stalling the append path.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&LedgerEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&LedgerEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &LedgerEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new();

        let c1 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        }));

        bus.emit(&LedgerEvent::AccountCreated {
            account_id: AccountId::ZERO,
        });
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn emit_with_no_listeners_is_noop() {
        let bus = EventBus::new();
        bus.emit(&LedgerEvent::AccountDeactivated {
            account_id: AccountId::ZERO,
        });
    }
}
