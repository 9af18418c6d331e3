//! Outgoing commands for the AR engine.
//!
//! Managers never touch the scene directly. They queue [`SceneCommand`]s,
//! and the host drains the queue after each call into the core and applies
//! the commands to its engine in submission order.

use crate::clock::Millis;
use crate::content::{AssetType, EntityKind};
use crate::id::{ChapterId, ResourceId, SwitchTicket, TargetIndex};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// A single imperative instruction for the scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneCommand {
    /// Resume rendering and tracking.
    Play,
    /// Pause rendering and tracking.
    Pause,
    /// Enter immersive mode.
    EnterVr,
    /// Leave immersive mode.
    ExitVr,
    /// Tear down the current scene and build one for `chapter`. The host
    /// answers with `ChapterSceneReady` or `ChapterSceneFailed` carrying
    /// the same ticket.
    RebuildScene {
        chapter: ChapterId,
        mind_src: String,
        ticket: SwitchTicket,
    },
    /// Add an asset element to the scene's asset container.
    AttachAsset {
        id: ResourceId,
        asset_type: AssetType,
        src: String,
    },
    DetachAsset { id: ResourceId },
    /// Add an entity element anchored to a target.
    AttachEntity {
        id: ResourceId,
        target: TargetIndex,
        kind: EntityKind,
        assets: Vec<ResourceId>,
    },
    DetachEntity { id: ResourceId },
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting for the host, with optional history for debugging.
#[derive(Debug)]
pub struct CommandQueue {
    pending: Vec<SceneCommand>,
    /// Drained commands: (time drained, command).
    history: Vec<(Millis, SceneCommand)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    /// Create a queue with no history tracking.
    pub fn new() -> Self {
        Self::with_max_history(0)
    }

    /// Create a queue that retains up to `max_history` drained commands.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: Vec::new(),
            max_history,
        }
    }

    pub fn push(&mut self, command: SceneCommand) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = SceneCommand>) {
        self.pending.extend(commands);
    }

    /// Drain all pending commands in submission order, recording them in
    /// history under `now`.
    pub fn drain(&mut self, now: Millis) -> Vec<SceneCommand> {
        let commands: Vec<SceneCommand> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            self.history
                .extend(commands.iter().cloned().map(|cmd| (now, cmd)));
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    /// Queued commands, without draining them.
    pub fn pending(&self) -> &[SceneCommand] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(Millis, SceneCommand)] {
        &self.history
    }
}

// ===========================================================================
// Tests
// ===========================================================================
