//! The error and notification channel.
//!
//! Conditions that block the user are written into the shared `error` slot
//! of [`GameState`] together with an optional recovery action, and are
//! queued as notifications for the presentation layer. Recoverable
//! conditions are only logged.
//!
//! The notification queue is bounded: when the host does not drain it, the
//! oldest notification is dropped to make room.

use crate::error::AppError;
use crate::event::{AppEvent, EventBus};
use crate::state::{ErrorInfo, GameState, RemediationAction};
use crate::store::Store;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ErrorChannel {
    store: Store<GameState>,
    events: EventBus,
    notifications: Rc<RefCell<VecDeque<ErrorInfo>>>,
    capacity: usize,
}

impl ErrorChannel {
    /// `capacity` is clamped to at least one notification.
    pub fn new(store: Store<GameState>, events: EventBus, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            events,
            notifications: Rc::new(RefCell::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Surface a blocking error: fill the error slot, queue one
    /// notification and emit [`AppEvent::ErrorRaised`].
    pub fn raise(&self, error: &AppError, action: Option<RemediationAction>) -> ErrorInfo {
        tracing::error!(kind = ?error.kind(), "{error}");
        let info = ErrorInfo {
            action,
            ..error.to_info()
        };
        let slot = info.clone();
        self.store.update(move |s| s.error = Some(slot));
        {
            let mut queue = self.notifications.borrow_mut();
            if queue.len() == self.capacity {
                if let Some(dropped) = queue.pop_front() {
                    tracing::warn!(kind = ?dropped.kind, "notification queue full, dropping oldest");
                }
            }
            queue.push_back(info.clone());
        }
        self.events.emit(AppEvent::ErrorRaised { info: info.clone() });
        info
    }

    /// Record a recoverable condition. Nothing reaches the user.
    pub fn log(&self, error: &AppError) {
        tracing::warn!(kind = ?error.kind(), "{error}");
    }

    /// Clear the error slot. Returns the error that was shown, if any.
    pub fn dismiss(&self) -> Option<ErrorInfo> {
        let shown = self.store.state().error.clone()?;
        self.store.update(|s| s.error = None);
        Some(shown)
    }

    pub fn current(&self) -> Option<ErrorInfo> {
        self.store.state().error.clone()
    }

    pub fn pending_notifications(&self) -> usize {
        self.notifications.borrow().len()
    }

    /// Take every queued notification, oldest first.
    pub fn drain_notifications(&self) -> Vec<ErrorInfo> {
        self.notifications.borrow_mut().drain(..).collect()
    }
}
