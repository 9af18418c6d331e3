//! Bridges tracking engine found/lost signals into `tracked_targets`.
//!
//! Raw signals are debounced per target index. Only the settled signal
//! reaches the store, and only for indices of the active chapter.

use crate::clock::Millis;
use crate::context::Context;
use crate::debounce::Debouncer;
use crate::error::AppError;
use crate::event::{AppEvent, TargetDescriptor};
use crate::id::TargetIndex;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSignal {
    Found,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Signal {
    kind: TargetSignal,
    timestamp: Millis,
}

#[derive(Debug, Clone)]
pub struct TargetBridge {
    ctx: Context,
    timers: Rc<RefCell<Debouncer<TargetIndex, Signal>>>,
}

impl TargetBridge {
    pub fn new(ctx: Context) -> Self {
        let window = ctx.config.target_debounce_ms;
        Self {
            ctx,
            timers: Rc::new(RefCell::new(Debouncer::new(window))),
        }
    }

    pub fn found(&self, index: TargetIndex, now: Millis) {
        self.signal(index, TargetSignal::Found, now);
    }

    pub fn lost(&self, index: TargetIndex, now: Millis) {
        self.signal(index, TargetSignal::Lost, now);
    }

    pub fn signal(&self, index: TargetIndex, kind: TargetSignal, now: Millis) {
        tracing::trace!(%index, ?kind, now, "target signal");
        self.timers.borrow_mut().schedule(
            index,
            Signal {
                kind,
                timestamp: now,
            },
            now,
        );
    }

    /// Apply every signal whose window has elapsed by `now`. Returns how
    /// many changed `tracked_targets`.
    pub fn advance(&self, now: Millis) -> usize {
        let due = self.timers.borrow_mut().fire_due(now);
        due.into_iter()
            .filter(|(index, signal)| self.apply(*index, *signal))
            .count()
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().pending_len()
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.timers.borrow().next_due()
    }

    /// Drop every pending timer.
    pub fn reset(&self) {
        let dropped = self.timers.borrow().pending_len();
        if dropped > 0 {
            tracing::debug!(dropped, "clearing target timers");
        }
        self.timers.borrow_mut().clear();
    }

    fn apply(&self, index: TargetIndex, signal: Signal) -> bool {
        match signal.kind {
            TargetSignal::Found => self.apply_found(index, signal.timestamp),
            TargetSignal::Lost => self.apply_lost(index, signal.timestamp),
        }
    }

    fn apply_found(&self, index: TargetIndex, timestamp: Millis) -> bool {
        let state = self.ctx.state();
        let Some(chapter) = state.current_chapter_data() else {
            self.ctx.errors.log(&AppError::EntityNotFound {
                detail: format!("target {index} found with no active chapter"),
            });
            return false;
        };
        let Some(target) = chapter.target(index) else {
            self.ctx.errors.log(&AppError::EntityNotFound {
                detail: format!("target {index} is not part of chapter '{}'", chapter.id),
            });
            return false;
        };
        if state.tracked_targets.contains(index) {
            return false;
        }

        let descriptor = TargetDescriptor {
            index,
            chapter: chapter.id.clone(),
            target_id: target.id.clone(),
            title: target.title.clone(),
            description: target.description.clone(),
            entity: target.entity.as_ref().map(|e| e.kind),
        };
        self.ctx.store.update(|s| {
            s.tracked_targets.insert(index);
        });
        tracing::debug!(%index, target = %descriptor.target_id, "target found");
        self.ctx.emit(AppEvent::TargetFound {
            target: descriptor,
            timestamp,
        });
        true
    }

    fn apply_lost(&self, index: TargetIndex, timestamp: Millis) -> bool {
        if !self.ctx.state().tracked_targets.contains(index) {
            return false;
        }
        self.ctx.store.update(|s| {
            s.tracked_targets.remove(index);
        });
        tracing::debug!(%index, "target lost");
        self.ctx.emit(AppEvent::TargetLost { index, timestamp });
        true
    }
}
