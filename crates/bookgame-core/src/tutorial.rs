//! The tutorial: a singly linked chain of steps.
//!
//! The entry step is the only step no other step points at. Content that
//! breaks this (a cycle, or several chains) is logged and the first
//! authored step is used instead.

use crate::content::TutorialStep;
use crate::context::Context;
use crate::error::AppError;
use crate::event::AppEvent;
use crate::id::StepId;
use crate::listeners::{ListenerList, Unsubscribe};
use std::collections::BTreeSet;

/// Tutorial progress handed to step listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorialSnapshot {
    pub step: StepId,
    pub complete: bool,
    /// Zero-based position of `step` in the chain.
    pub position: usize,
    pub total: usize,
}

/// Find the step that is nobody's `next`.
pub fn find_entry_step(steps: &[TutorialStep]) -> Result<StepId, AppError> {
    let targets: BTreeSet<&StepId> = steps.iter().filter_map(|s| s.next.as_ref()).collect();
    let mut entries = steps.iter().filter(|s| !targets.contains(&s.id));
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry.id.clone()),
        (None, _) => Err(AppError::ConfigurationInvalid {
            detail: "tutorial has no entry step".to_string(),
        }),
        (Some(first), Some(second)) => Err(AppError::ConfigurationInvalid {
            detail: format!(
                "tutorial has several entry steps ('{}', '{}')",
                first.id, second.id
            ),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct TutorialManager {
    ctx: Context,
    entry: Option<StepId>,
    listeners: ListenerList<(StepId, TutorialSnapshot)>,
}

impl TutorialManager {
    /// Resolve the entry step and seed it into the store.
    pub fn new(ctx: Context) -> Self {
        let steps = &ctx.content.tutorial;
        let entry = match find_entry_step(steps) {
            Ok(entry) => Some(entry),
            Err(_) if steps.is_empty() => None,
            Err(err) => {
                ctx.errors.log(&err);
                steps.first().map(|s| s.id.clone())
            }
        };

        if let Some(entry) = &entry {
            if ctx.state().current_tutorial_step_id.is_none() {
                let seed = entry.clone();
                ctx.store
                    .update(move |s| s.current_tutorial_step_id = Some(seed));
            }
        }

        Self {
            ctx,
            entry,
            listeners: ListenerList::new(),
        }
    }

    pub fn entry_step(&self) -> Option<&StepId> {
        self.entry.as_ref()
    }

    pub fn current_step(&self) -> Option<&TutorialStep> {
        let id = self.ctx.state().current_tutorial_step_id.clone()?;
        self.step(&id)
    }

    pub fn is_complete(&self) -> bool {
        self.ctx.state().tutorial_complete
    }

    pub fn snapshot(&self) -> Option<TutorialSnapshot> {
        let state = self.ctx.state();
        let step = state.current_tutorial_step_id.clone()?;
        let order = self.steps_in_order();
        Some(TutorialSnapshot {
            position: order.iter().position(|s| s.id == step).unwrap_or(0),
            total: order.len(),
            complete: state.tutorial_complete,
            step,
        })
    }

    /// Steps from the entry following `next`. Stops at the first repeat.
    pub fn steps_in_order(&self) -> Vec<&TutorialStep> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cursor = self.entry.clone();
        while let Some(id) = cursor {
            if !seen.insert(id.clone()) {
                break;
            }
            let Some(step) = self.step(&id) else {
                break;
            };
            order.push(step);
            cursor = step.next.clone();
        }
        order
    }

    /// Advance to the next step. At the terminal step the tutorial is
    /// marked complete instead and `false` is returned.
    pub fn next(&self) -> bool {
        let Some(current) = self.current_step() else {
            return false;
        };
        match &current.next {
            Some(next) if self.step(next).is_some() => {
                let next = next.clone();
                self.go_to(next);
                true
            }
            dangling => {
                if let Some(missing) = dangling {
                    self.ctx.errors.log(&AppError::ConfigurationInvalid {
                        detail: format!("step '{}' points at unknown step '{missing}'", current.id),
                    });
                }
                let last_step = current.id.clone();
                self.complete(last_step);
                false
            }
        }
    }

    /// Go back to the step whose `next` is the current one.
    pub fn previous(&self) -> bool {
        let Some(current) = self.ctx.state().current_tutorial_step_id.clone() else {
            return false;
        };
        let previous = self
            .ctx
            .content
            .tutorial
            .iter()
            .find(|s| s.next.as_ref() == Some(&current))
            .map(|s| s.id.clone());
        match previous {
            Some(id) => {
                self.go_to(id);
                true
            }
            None => false,
        }
    }

    /// Jump straight to `id`. Unknown ids are logged and ignored.
    pub fn navigate_to_step(&self, id: &StepId) -> bool {
        if self.step(id).is_none() {
            self.ctx.errors.log(&AppError::ConfigurationInvalid {
                detail: format!("unknown tutorial step '{id}'"),
            });
            return false;
        }
        if self.ctx.state().current_tutorial_step_id.as_ref() == Some(id) {
            return false;
        }
        self.go_to(id.clone());
        true
    }

    /// Rewind to the entry step and clear completion.
    pub fn restart(&self) -> bool {
        let Some(entry) = self.entry.clone() else {
            return false;
        };
        let seed = entry.clone();
        self.ctx.store.update(move |s| {
            s.current_tutorial_step_id = Some(seed);
            s.tutorial_complete = false;
        });
        self.announce(entry);
        true
    }

    /// Listen to step transitions. The listener is called right away with
    /// the current step.
    pub fn on_step_change(
        &self,
        listener: impl Fn(&(StepId, TutorialSnapshot)) + 'static,
    ) -> Unsubscribe {
        if let Some(snapshot) = self.snapshot() {
            listener(&(snapshot.step.clone(), snapshot));
        }
        self.listeners.add(listener)
    }

    pub fn teardown(&self) {
        self.listeners.clear();
    }

    fn step(&self, id: &StepId) -> Option<&TutorialStep> {
        self.ctx.content.tutorial.iter().find(|s| &s.id == id)
    }

    fn go_to(&self, id: StepId) {
        let next = id.clone();
        self.ctx
            .store
            .update(move |s| s.current_tutorial_step_id = Some(next));
        self.announce(id);
    }

    fn complete(&self, last_step: StepId) {
        if self.is_complete() {
            return;
        }
        self.ctx.store.update(|s| s.tutorial_complete = true);
        tracing::info!(step = %last_step, "tutorial complete");
        self.ctx.emit(AppEvent::TutorialCompleted {
            last_step: last_step.clone(),
        });
        if let Some(snapshot) = self.snapshot() {
            self.listeners.notify(&(last_step, snapshot));
        }
    }

    fn announce(&self, step: StepId) {
        tracing::debug!(%step, "tutorial step");
        self.ctx.emit(AppEvent::TutorialStepChanged { step: step.clone() });
        if let Some(snapshot) = self.snapshot() {
            self.listeners.notify(&(step, snapshot));
        }
    }
}
