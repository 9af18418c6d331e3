//! A stand-in AR scene that acknowledges commands the way a real engine
//! would, for headless runs and tests.

use crate::app::{App, EngineEvent};
use crate::command_queue::SceneCommand;
use crate::id::{ChapterId, ResourceId};
use std::collections::BTreeSet;

/// Upper bound on command/event round trips in one [`SimulatedScene::settle`].
const MAX_ROUNDS: usize = 64;

#[derive(Debug, Clone)]
pub struct SimulatedScene {
    failing_resources: BTreeSet<ResourceId>,
    failing_chapters: BTreeSet<ChapterId>,
    assets: BTreeSet<ResourceId>,
    entities: BTreeSet<ResourceId>,
    playing: bool,
    vr: bool,
    applied: usize,
}

impl Default for SimulatedScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedScene {
    pub fn new() -> Self {
        Self {
            failing_resources: BTreeSet::new(),
            failing_chapters: BTreeSet::new(),
            assets: BTreeSet::new(),
            entities: BTreeSet::new(),
            playing: true,
            vr: false,
            applied: 0,
        }
    }

    /// Report a load error for this asset or entity.
    pub fn fail_resource(mut self, id: impl Into<ResourceId>) -> Self {
        self.failing_resources.insert(id.into());
        self
    }

    /// Fail every scene rebuild for this chapter.
    pub fn fail_chapter(mut self, id: impl Into<ChapterId>) -> Self {
        self.failing_chapters.insert(id.into());
        self
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_vr(&self) -> bool {
        self.vr
    }

    pub fn attached_assets(&self) -> &BTreeSet<ResourceId> {
        &self.assets
    }

    pub fn attached_entities(&self) -> &BTreeSet<ResourceId> {
        &self.entities
    }

    /// Total commands applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Apply commands and return the events the engine would report.
    pub fn apply(&mut self, commands: &[SceneCommand]) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for command in commands {
            self.applied += 1;
            match command {
                SceneCommand::Play => self.playing = true,
                SceneCommand::Pause => self.playing = false,
                SceneCommand::EnterVr => self.vr = true,
                SceneCommand::ExitVr => self.vr = false,
                SceneCommand::RebuildScene {
                    chapter, ticket, ..
                } => {
                    self.assets.clear();
                    self.entities.clear();
                    if self.failing_chapters.contains(chapter) {
                        events.push(EngineEvent::ChapterSceneFailed {
                            ticket: *ticket,
                            reason: format!("could not build scene for '{chapter}'"),
                        });
                    } else {
                        events.push(EngineEvent::SceneLoaded);
                        events.push(EngineEvent::ChapterSceneReady { ticket: *ticket });
                    }
                }
                SceneCommand::AttachAsset { id, src, .. } => {
                    self.assets.insert(id.clone());
                    events.push(if self.failing_resources.contains(id) {
                        EngineEvent::AssetFailed {
                            id: id.clone(),
                            reason: format!("failed to fetch {src}"),
                        }
                    } else {
                        EngineEvent::AssetLoaded { id: id.clone() }
                    });
                }
                SceneCommand::DetachAsset { id } => {
                    self.assets.remove(id);
                }
                SceneCommand::AttachEntity { id, .. } => {
                    self.entities.insert(id.clone());
                    events.push(if self.failing_resources.contains(id) {
                        EngineEvent::EntityFailed {
                            id: id.clone(),
                            reason: "element error".to_string(),
                        }
                    } else {
                        EngineEvent::EntityLoaded { id: id.clone() }
                    });
                }
                SceneCommand::DetachEntity { id } => {
                    self.entities.remove(id);
                }
            }
        }
        events
    }

    /// Exchange commands and events with `app` until it has nothing left to
    /// say, then deliver its domain events. Returns the rounds taken.
    pub fn settle(&mut self, app: &mut App) -> usize {
        let mut rounds = 0;
        while rounds < MAX_ROUNDS {
            let commands = app.drain_commands();
            if commands.is_empty() {
                break;
            }
            rounds += 1;
            for event in self.apply(&commands) {
                app.handle(event);
            }
            app.deliver_events();
        }
        if rounds == MAX_ROUNDS {
            tracing::warn!(rounds, "scene did not settle");
        }
        app.deliver_events();
        rounds
    }
}
