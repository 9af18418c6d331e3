//! Typed domain events with buffered delivery.
//!
//! Managers and bridges [`emit`](EventBus::emit) events while they mutate
//! state; the events are queued and handed to listeners in emission order
//! when the owner calls [`deliver`](EventBus::deliver). Listeners never run
//! in the middle of a manager operation.
//!
//! Every delivered event is also kept in a fixed-capacity ring buffer so
//! hosts can inspect recent history.

use crate::clock::Millis;
use crate::content::EntityKind;
use crate::id::{ChapterId, ResourceId, StepId, SwitchTicket, TargetIndex};
use crate::listeners::{ListenerList, Unsubscribe};
use crate::state::{CameraPermission, ErrorInfo, Mode, ResourceKind, Route};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// What a presentation layer needs to show a detected target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub index: TargetIndex,
    pub chapter: ChapterId,
    pub target_id: String,
    pub title: String,
    pub description: String,
    pub entity: Option<EntityKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    // -- Camera --
    CameraPermissionChanged {
        from: CameraPermission,
        to: CameraPermission,
    },

    // -- Tracking --
    TargetFound {
        target: TargetDescriptor,
        timestamp: Millis,
    },
    TargetLost {
        index: TargetIndex,
        timestamp: Millis,
    },

    // -- Tutorial --
    TutorialStepChanged {
        step: StepId,
    },
    TutorialCompleted {
        last_step: StepId,
    },

    // -- Chapters --
    ChapterSwitchStarted {
        chapter: ChapterId,
        ticket: SwitchTicket,
    },
    ChapterLoaded {
        chapter: ChapterId,
    },
    ChapterFailed {
        chapter: ChapterId,
        message: String,
    },

    // -- Navigation --
    RouteChanged {
        route: Option<Route>,
    },
    ModeChanged {
        from: Mode,
        to: Mode,
    },

    // -- Scene resources --
    ResourceLoaded {
        kind: ResourceKind,
        id: ResourceId,
    },
    ResourceFailed {
        kind: ResourceKind,
        id: ResourceId,
        message: String,
    },

    // -- Errors --
    ErrorRaised {
        info: ErrorInfo,
    },
}

/// Discriminant tag for event types, used for subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CameraPermissionChanged,
    TargetFound,
    TargetLost,
    TutorialStepChanged,
    TutorialCompleted,
    ChapterSwitchStarted,
    ChapterLoaded,
    ChapterFailed,
    RouteChanged,
    ModeChanged,
    ResourceLoaded,
    ResourceFailed,
    ErrorRaised,
}

const EVENT_KIND_COUNT: usize = 13;

impl AppEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AppEvent::CameraPermissionChanged { .. } => EventKind::CameraPermissionChanged,
            AppEvent::TargetFound { .. } => EventKind::TargetFound,
            AppEvent::TargetLost { .. } => EventKind::TargetLost,
            AppEvent::TutorialStepChanged { .. } => EventKind::TutorialStepChanged,
            AppEvent::TutorialCompleted { .. } => EventKind::TutorialCompleted,
            AppEvent::ChapterSwitchStarted { .. } => EventKind::ChapterSwitchStarted,
            AppEvent::ChapterLoaded { .. } => EventKind::ChapterLoaded,
            AppEvent::ChapterFailed { .. } => EventKind::ChapterFailed,
            AppEvent::RouteChanged { .. } => EventKind::RouteChanged,
            AppEvent::ModeChanged { .. } => EventKind::ModeChanged,
            AppEvent::ResourceLoaded { .. } => EventKind::ResourceLoaded,
            AppEvent::ResourceFailed { .. } => EventKind::ResourceFailed,
            AppEvent::ErrorRaised { .. } => EventKind::ErrorRaised,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventHistory
// ---------------------------------------------------------------------------

/// Recently delivered events, oldest first. When full, the oldest event is
/// dropped.
#[derive(Debug)]
pub struct EventHistory {
    events: VecDeque<AppEvent>,
    capacity: usize,
    total_written: u64,
}

impl EventHistory {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: AppEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity as u64)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &AppEvent> {
        self.events.iter()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

struct Queues {
    pending: VecDeque<AppEvent>,
    history: EventHistory,
}

/// Shared event bus handle. Clones refer to the same queues and listeners.
#[derive(Clone)]
pub struct EventBus {
    queues: Rc<RefCell<Queues>>,
    by_kind: Rc<[ListenerList<AppEvent>; EVENT_KIND_COUNT]>,
    any: ListenerList<AppEvent>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.queues.borrow();
        f.debug_struct("EventBus")
            .field("pending", &queues.pending.len())
            .field("history", &queues.history.len())
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    /// Create a bus that remembers up to `history_capacity` delivered events.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            queues: Rc::new(RefCell::new(Queues {
                pending: VecDeque::new(),
                history: EventHistory::new(history_capacity),
            })),
            by_kind: Rc::new(std::array::from_fn(|_| ListenerList::new())),
            any: ListenerList::new(),
        }
    }

    /// Queue an event for the next [`deliver`](Self::deliver).
    pub fn emit(&self, event: AppEvent) {
        self.queues.borrow_mut().pending.push_back(event);
    }

    /// Listen to one event kind.
    pub fn on(&self, kind: EventKind, listener: impl Fn(&AppEvent) + 'static) -> Unsubscribe {
        self.by_kind[kind.index()].add(listener)
    }

    /// Listen to every event. Called after the kind-specific listeners.
    pub fn on_any(&self, listener: impl Fn(&AppEvent) + 'static) -> Unsubscribe {
        self.any.add(listener)
    }

    /// Hand every queued event to its listeners, oldest first. Events
    /// emitted by listeners are delivered in the same call, after the ones
    /// already queued. Returns the number of events delivered.
    pub fn deliver(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.queues.borrow_mut().pending.pop_front();
            let Some(event) = next else {
                break;
            };
            self.by_kind[event.kind().index()].notify(&event);
            self.any.notify(&event);
            self.queues.borrow_mut().history.push(event);
            delivered += 1;
        }
        delivered
    }

    pub fn pending_count(&self) -> usize {
        self.queues.borrow().pending.len()
    }

    /// Queued events, oldest first, without delivering them.
    pub fn pending(&self) -> Vec<AppEvent> {
        self.queues.borrow().pending.iter().cloned().collect()
    }

    /// Copy of the delivered-event history, oldest first.
    pub fn history(&self) -> Vec<AppEvent> {
        self.queues.borrow().history.iter().cloned().collect()
    }

    pub fn total_delivered(&self) -> u64 {
        self.queues.borrow().history.total_written()
    }

    /// Drop queued events and history. Listeners stay.
    pub fn clear_all(&self) {
        let mut queues = self.queues.borrow_mut();
        let capacity = queues.history.capacity();
        queues.pending.clear();
        queues.history = EventHistory::new(capacity);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
