//! Local listener table for a single channel.
//!
//! Pure bookkeeping plus failure-isolated invocation. Nothing here touches
//! the transport; the owning emitter decides when to refresh subscriptions.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, warn};

use crate::message::types::Event;

use super::subscription::Interest;

/// Reserved listener key that receives every event and keeps the channel
/// subscribed on its own.
pub const CATCH_ALL: &str = "**";

/// Result returned by a listener callback.
pub type ListenerResult = anyhow::Result<()>;

/// A shared listener callback. Identity (for removal) is the `Arc` pointer.
pub type Listener = Arc<dyn Fn(&Event) -> ListenerResult + Send + Sync>;

/// Wraps a closure into a [`Listener`].
pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&Event) -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(callback)
}

#[derive(Clone)]
struct Registration {
    callback: Listener,
    once: bool,
}

/// Listeners due for one delivery.
pub(crate) struct Delivery {
    /// Callbacks in invocation order.
    pub callbacks: Vec<Listener>,
    /// Whether a `once` registration was consumed.
    pub consumed_once: bool,
}

/// Event name → ordered callbacks, plus the any-listener list.
#[derive(Default)]
pub struct ListenerTable {
    events: HashMap<String, Vec<Registration>>,
    any: Vec<Listener>,
}

impl std::fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerTable")
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .field("any", &self.any.len())
            .finish()
    }
}

impl ListenerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `event`.
    pub fn add(&mut self, event: &str, callback: Listener, once: bool) {
        self.events
            .entry(event.to_string())
            .or_default()
            .push(Registration { callback, once });
    }

    /// Removes the first registration of `callback` under `event`.
    pub fn remove(&mut self, event: &str, callback: &Listener) -> bool {
        let Some(registrations) = self.events.get_mut(event) else {
            return false;
        };
        let Some(index) = registrations
            .iter()
            .position(|r| Arc::ptr_eq(&r.callback, callback))
        else {
            return false;
        };
        registrations.remove(index);
        if registrations.is_empty() {
            self.events.remove(event);
        }
        true
    }

    /// Removes every listener for `event`, or every listener of any kind
    /// when `event` is `None`.
    pub fn remove_all(&mut self, event: Option<&str>) {
        match event {
            Some(event) => {
                self.events.remove(event);
            }
            None => {
                self.events.clear();
                self.any.clear();
            }
        }
    }

    /// Appends an any-listener.
    pub fn add_any(&mut self, callback: Listener) {
        self.any.push(callback);
    }

    /// Removes the first registration of an any-listener.
    pub fn remove_any(&mut self, callback: &Listener) -> bool {
        match self.any.iter().position(|l| Arc::ptr_eq(l, callback)) {
            Some(index) => {
                self.any.remove(index);
                true
            }
            None => false,
        }
    }

    /// Listeners registered for `event`, in registration order.
    pub fn listeners(&self, event: &str) -> Vec<Listener> {
        self.events
            .get(event)
            .map(|regs| regs.iter().map(|r| r.callback.clone()).collect())
            .unwrap_or_default()
    }

    /// Any-listeners, in registration order.
    pub fn listeners_any(&self) -> Vec<Listener> {
        self.any.clone()
    }

    /// Listener counts used for subscription decisions.
    pub fn interest(&self) -> Interest {
        let catch_all = self.events.get(CATCH_ALL).map_or(0, Vec::len);
        let total: usize = self.events.values().map(Vec::len).sum();
        Interest {
            specific: total - catch_all,
            any: self.any.len(),
            catch_all,
        }
    }

    /// Collects the callbacks for one delivery of `event` and drops any
    /// `once` registrations among them.
    ///
    /// Order: listeners for the event, then catch-all, then any-listeners.
    pub(crate) fn take_for_delivery(&mut self, event: &str) -> Delivery {
        let mut callbacks = Vec::new();
        let mut consumed_once = false;

        let keys = if event == CATCH_ALL {
            vec![CATCH_ALL]
        } else {
            vec![event, CATCH_ALL]
        };

        for key in keys {
            let Some(registrations) = self.events.get_mut(key) else {
                continue;
            };
            callbacks.extend(registrations.iter().map(|r| r.callback.clone()));
            let before = registrations.len();
            registrations.retain(|r| !r.once);
            if registrations.len() != before {
                consumed_once = true;
            }
            if registrations.is_empty() {
                self.events.remove(key);
            }
        }

        callbacks.extend(self.any.iter().cloned());

        Delivery {
            callbacks,
            consumed_once,
        }
    }
}

/// Invokes each callback in turn. A listener that returns an error or
/// panics is logged and skipped; the rest still run.
///
/// Returns the number of listeners invoked.
pub(crate) fn invoke_isolated(callbacks: &[Listener], event: &Event) -> usize {
    for callback in callbacks {
        match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(
                    channel = %event.channel,
                    event = %event.event,
                    error = %e,
                    "Listener failed"
                );
            }
            Err(payload) => {
                error!(
                    channel = %event.channel,
                    event = %event.event,
                    panic = %panic_message(payload.as_ref()),
                    "Listener panicked"
                );
            }
        }
    }
    callbacks.len()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
