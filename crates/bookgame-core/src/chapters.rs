//! Chapter switching and the chapter cache.
//!
//! A switch is a two-phase operation. [`ChapterManager::switch_chapter`]
//! resets the chapter's state, marks it loading and asks the scene to
//! rebuild, handing out a [`SwitchTicket`]. The host later reports the
//! outcome with [`ChapterManager::complete_switch`]. Only the latest ticket
//! may commit; the outcome of a superseded switch is discarded.

use crate::command_queue::SceneCommand;
use crate::content::ChapterData;
use crate::context::Context;
use crate::error::AppError;
use crate::event::AppEvent;
use crate::id::{ChapterId, SwitchTicket};
use crate::listeners::{ListenerList, Unsubscribe};
use crate::state::{ChapterResource, LoadStatus, LoadableResource, RecoveryAction, RemediationAction};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// What happened to a reported switch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The outcome belonged to the latest switch and was written to state.
    Committed,
    /// A later switch superseded this one; nothing changed.
    Stale,
}

#[derive(Debug, Clone)]
struct InFlight {
    ticket: SwitchTicket,
    chapter: ChapterId,
}

#[derive(Debug, Clone)]
pub struct ChapterManager {
    ctx: Context,
    next_ticket: Rc<Cell<u64>>,
    in_flight: Rc<RefCell<Option<InFlight>>>,
    teardown: ListenerList<ChapterId>,
}

impl ChapterManager {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            next_ticket: Rc::new(Cell::new(1)),
            in_flight: Rc::new(RefCell::new(None)),
            teardown: ListenerList::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn current_chapter(&self) -> Option<ChapterResource> {
        self.ctx.state().current_chapter().cloned()
    }

    pub fn cached_chapter(&self, id: &ChapterId) -> Option<ChapterResource> {
        self.ctx.state().chapters.get(id).cloned()
    }

    pub fn chapters_in_order(&self) -> Vec<&ChapterData> {
        self.ctx.content.chapters_in_order()
    }

    /// The chapter after the current one by `order`.
    pub fn next_chapter(&self) -> Option<ChapterId> {
        self.neighbour(1)
    }

    pub fn previous_chapter(&self) -> Option<ChapterId> {
        self.neighbour(-1)
    }

    /// Ticket of the switch waiting for completion.
    pub fn in_flight(&self) -> Option<SwitchTicket> {
        self.in_flight.borrow().as_ref().map(|f| f.ticket)
    }

    fn neighbour(&self, step: isize) -> Option<ChapterId> {
        let current = self.ctx.state().current_chapter.clone()?;
        let order = self.chapters_in_order();
        let at = order.iter().position(|c| c.id == current)?;
        let target = at.checked_add_signed(step)?;
        order.get(target).map(|c| c.id.clone())
    }

    // -----------------------------------------------------------------------
    // Switching
    // -----------------------------------------------------------------------

    /// Register a hook run before a switch touches state. Bridges use it to
    /// drop timers and scene elements that belong to the old chapter.
    pub fn on_teardown(&self, hook: impl Fn(&ChapterId) + 'static) -> Unsubscribe {
        self.teardown.add(hook)
    }

    /// Start switching to `id`. Unknown ids leave state untouched.
    pub fn switch_chapter(&self, id: &ChapterId) -> Result<SwitchTicket, AppError> {
        let Some(data) = self.ctx.content.chapter(id) else {
            let err = AppError::ChapterSwitchFailed {
                chapter: id.clone(),
                reason: "no such chapter".to_string(),
            };
            self.ctx.errors.log(&err);
            return Err(err);
        };

        let ticket = SwitchTicket(self.next_ticket.get());
        self.next_ticket.set(ticket.0 + 1);
        if let Some(previous) = self.in_flight.borrow().as_ref() {
            tracing::debug!(
                superseded = previous.ticket.0,
                chapter = %previous.chapter,
                "switch superseded"
            );
        }

        self.teardown.notify(id);

        let chapter = Rc::new(data.clone());
        let resources: Vec<_> = data.assets().map(|(_, asset)| asset.id.clone()).collect();
        let entities: Vec<_> = data.entity_targets().map(|(t, _)| t.entity_id()).collect();
        let chapter_id = id.clone();
        self.ctx.store.update(move |s| {
            s.tracked_targets.clear();
            for asset in resources {
                s.assets.insert(asset, LoadableResource::default());
            }
            for entity in entities {
                s.entities.insert(entity, LoadableResource::default());
            }
            let entry = s
                .chapters
                .entry(chapter_id.clone())
                .or_insert_with(|| ChapterResource {
                    data: chapter,
                    resource: LoadableResource::default(),
                });
            entry.resource.reset();
            entry.resource.begin_loading();
            s.current_chapter = Some(chapter_id);
            s.loading = LoadStatus::Loading;
        });

        *self.in_flight.borrow_mut() = Some(InFlight {
            ticket,
            chapter: id.clone(),
        });
        self.ctx.command(SceneCommand::RebuildScene {
            chapter: id.clone(),
            mind_src: data.mind_src.clone(),
            ticket,
        });
        tracing::info!(chapter = %id, ticket = ticket.0, "switching chapter");
        self.ctx.emit(AppEvent::ChapterSwitchStarted {
            chapter: id.clone(),
            ticket,
        });
        Ok(ticket)
    }

    /// Switch again to the current chapter.
    pub fn retry(&self) -> Result<SwitchTicket, AppError> {
        let current = self
            .ctx
            .state()
            .current_chapter
            .clone()
            .unwrap_or_else(|| self.ctx.content.initial_chapter_id.clone());
        self.switch_chapter(&current)
    }

    /// Report the scene rebuild outcome for `ticket`.
    pub fn complete_switch(
        &self,
        ticket: SwitchTicket,
        result: Result<(), String>,
    ) -> SwitchOutcome {
        let chapter = {
            let mut in_flight = self.in_flight.borrow_mut();
            match in_flight.as_ref() {
                Some(f) if f.ticket == ticket => {}
                _ => {
                    tracing::debug!(ticket = ticket.0, "discarding stale switch outcome");
                    return SwitchOutcome::Stale;
                }
            }
            match in_flight.take() {
                Some(f) => f.chapter,
                None => return SwitchOutcome::Stale,
            }
        };

        if self.ctx.state().current_chapter.as_ref() != Some(&chapter) {
            tracing::debug!(%chapter, "current chapter moved on, discarding outcome");
            return SwitchOutcome::Stale;
        }

        match result {
            Ok(()) => {
                let id = chapter.clone();
                self.ctx.store.update(move |s| {
                    if let Some(entry) = s.chapters.get_mut(&id) {
                        entry.resource.mark_loaded();
                    }
                    s.loading = LoadStatus::Loaded;
                });
                tracing::info!(%chapter, "chapter loaded");
                self.ctx.emit(AppEvent::ChapterLoaded { chapter });
            }
            Err(reason) => {
                let err = AppError::ChapterSwitchFailed {
                    chapter: chapter.clone(),
                    reason,
                };
                let info = err.to_info();
                let id = chapter.clone();
                self.ctx.store.update(move |s| {
                    if let Some(entry) = s.chapters.get_mut(&id) {
                        entry.resource.mark_failed(info);
                    }
                    s.loading = LoadStatus::Error;
                });
                self.ctx.emit(AppEvent::ChapterFailed {
                    chapter: chapter.clone(),
                    message: err.to_string(),
                });
                self.ctx.errors.raise(
                    &err,
                    Some(RemediationAction {
                        label: "Retry".to_string(),
                        action: RecoveryAction::Retry { chapter },
                    }),
                );
            }
        }
        SwitchOutcome::Committed
    }
}
