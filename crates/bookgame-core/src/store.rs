//! The observable state container.
//!
//! A [`Store`] holds one immutable snapshot behind an `Rc`. Updates run a
//! recipe against a cloned draft; only a recipe that completes replaces the
//! snapshot, so listeners never see a half-applied change. A recipe that
//! fails (by returning `Err` or by panicking) leaves the previous snapshot
//! in place and the failure reaches the caller untouched.
//!
//! # Notification order
//!
//! After each committed update:
//! 1. whole-state listeners, in subscription order;
//! 2. property listeners whose property changed, in subscription order.
//!
//! `Store` is a cheap handle: clones share the same snapshot and listeners.

use crate::listeners::{ListenerList, Unsubscribe};
use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

/// Per-field equality used by [`Store::subscribe_to_property`].
pub trait Properties {
    type Key: Copy + fmt::Debug + 'static;

    /// Whether the property named by `key` is equal in both snapshots.
    fn property_eq(&self, other: &Self, key: Self::Key) -> bool;
}

/// Old and new snapshot of one committed update.
pub struct Transition<S> {
    pub previous: Rc<S>,
    pub current: Rc<S>,
}

struct Inner<S> {
    current: RefCell<Rc<S>>,
    revision: Cell<u64>,
    state_listeners: ListenerList<Rc<S>>,
    property_listeners: ListenerList<Transition<S>>,
}

pub struct Store<S> {
    inner: Rc<Inner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("revision", &self.inner.revision.get())
            .field("state", &self.inner.current.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: Clone + 'static> Store<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Rc::new(Inner {
                current: RefCell::new(Rc::new(initial)),
                revision: Cell::new(0),
                state_listeners: ListenerList::new(),
                property_listeners: ListenerList::new(),
            }),
        }
    }

    /// The current snapshot.
    pub fn state(&self) -> Rc<S> {
        Rc::clone(&self.inner.current.borrow())
    }

    /// Number of committed updates since creation.
    pub fn revision(&self) -> u64 {
        self.inner.revision.get()
    }

    /// Apply an infallible recipe and notify listeners.
    pub fn update(&self, recipe: impl FnOnce(&mut S)) {
        let result: Result<(), Infallible> = self.try_update(|draft| {
            recipe(draft);
            Ok(())
        });
        match result {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Apply a fallible recipe. On `Err` the draft is discarded, nothing is
    /// notified, and the error is returned.
    pub fn try_update<E>(&self, recipe: impl FnOnce(&mut S) -> Result<(), E>) -> Result<(), E> {
        let previous = self.state();
        let mut draft = S::clone(&previous);
        recipe(&mut draft)?;

        let current = Rc::new(draft);
        *self.inner.current.borrow_mut() = Rc::clone(&current);
        self.inner.revision.set(self.inner.revision.get() + 1);

        self.inner.state_listeners.notify(&current);
        self.inner
            .property_listeners
            .notify(&Transition { previous, current });
        Ok(())
    }

    /// Register a whole-state listener. It is called once right away with
    /// the current snapshot, then after every committed update.
    pub fn subscribe(&self, callback: impl Fn(&S) + 'static) -> Unsubscribe {
        let callback = Rc::new(callback);
        let registered = Rc::clone(&callback);
        let handle = self
            .inner
            .state_listeners
            .add(move |state: &Rc<S>| (*registered)(&**state));
        (*callback)(&*self.state());
        handle
    }

    /// Register a listener on a derived value. It fires only when
    /// `selector` yields a different value for the new snapshot.
    pub fn select<T: PartialEq + 'static>(
        &self,
        selector: impl Fn(&S) -> T + 'static,
        callback: impl Fn(&T, &S) + 'static,
    ) -> Unsubscribe {
        self.inner
            .property_listeners
            .add(move |transition: &Transition<S>| {
                let next = selector(&*transition.current);
                if selector(&*transition.previous) != next {
                    callback(&next, &*transition.current);
                }
            })
    }
}

impl<S: Clone + Properties + 'static> Store<S> {
    /// Register a listener for one top-level property. It does not fire on
    /// updates that leave the property equal.
    pub fn subscribe_to_property(
        &self,
        key: S::Key,
        callback: impl Fn(&S) + 'static,
    ) -> Unsubscribe {
        self.inner
            .property_listeners
            .add(move |transition: &Transition<S>| {
                if !transition.previous.property_eq(&*transition.current, key) {
                    callback(&*transition.current);
                }
            })
    }
}
