//! Ordered callback lists shared by the store and the managers.
//!
//! Notification iterates over a snapshot of the registered listeners, so a
//! callback may add or remove listeners (including itself) while a batch is
//! running: removed listeners are skipped for the rest of the batch, added
//! ones are first called by the next batch.

use crate::id::ListenerKey;
use slotmap::SlotMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

struct Entry<T> {
    /// Registration order; notification sorts by it.
    seq: u64,
    active: Cell<bool>,
    callback: Box<dyn Fn(&T)>,
}

struct Registry<T> {
    entries: SlotMap<ListenerKey, Rc<Entry<T>>>,
    next_seq: u64,
}

/// A list of `Fn(&T)` callbacks invoked in registration order.
pub struct ListenerList<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T> Clone for ListenerList<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for ListenerList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ListenerList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.registry.borrow().entries.len())
            .finish()
    }
}

impl<T: 'static> ListenerList<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                entries: SlotMap::with_key(),
                next_seq: 0,
            })),
        }
    }

    /// Register a callback. The returned handle removes it again; dropping
    /// the handle leaves the callback registered.
    pub fn add(&self, callback: impl Fn(&T) + 'static) -> Unsubscribe {
        let mut registry = self.registry.borrow_mut();
        let seq = registry.next_seq;
        registry.next_seq += 1;
        let entry = Rc::new(Entry {
            seq,
            active: Cell::new(true),
            callback: Box::new(callback),
        });
        let key = registry.entries.insert(Rc::clone(&entry));
        let weak = Rc::downgrade(&self.registry);
        Unsubscribe::new(move || {
            entry.active.set(false);
            if let Some(registry) = weak.upgrade() {
                registry.borrow_mut().entries.remove(key);
            }
        })
    }

    /// Call every active listener with `value`, in registration order.
    pub fn notify(&self, value: &T) {
        let batch: Vec<Rc<Entry<T>>> = {
            let registry = self.registry.borrow();
            let mut batch: Vec<Rc<Entry<T>>> = registry.entries.values().cloned().collect();
            batch.sort_by_key(|e| e.seq);
            batch
        };
        for entry in batch {
            if entry.active.get() {
                (entry.callback)(value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every listener. Listeners still pending in a running batch
    /// are skipped.
    pub fn clear(&self) {
        let drained: Vec<Rc<Entry<T>>> = {
            let mut registry = self.registry.borrow_mut();
            registry.entries.drain().map(|(_, e)| e).collect()
        };
        for entry in drained {
            entry.active.set(false);
        }
    }
}

// ---------------------------------------------------------------------------
// Unsubscribe
// ---------------------------------------------------------------------------

/// Handle returned by every `subscribe`/`on_*` call.
pub struct Unsubscribe {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Unsubscribe {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle that does nothing, for listeners that were never registered.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Remove the listener. Safe to call from inside a notification.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}
