//! Bridges scene asset and entity elements into the resource maps.
//!
//! When the scene reports it has loaded, the bridge registers every asset
//! (or entity) of the active chapter as `Loading` and queues the command
//! that attaches its element. The engine then reports each element's load
//! or error. A registration pass requested before the scene is ready is
//! deferred until [`ResourceBridge::scene_loaded`].

use crate::command_queue::SceneCommand;
use crate::content::ChapterData;
use crate::context::Context;
use crate::error::AppError;
use crate::event::AppEvent;
use crate::id::ResourceId;
use crate::state::{LoadStatus, ResourceKind};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Clears the in-progress flag when a registration pass ends.
struct PassGuard<'a>(&'a Cell<bool>);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Debug, Clone)]
pub struct ResourceBridge {
    ctx: Context,
    kind: ResourceKind,
    scene_ready: Rc<Cell<bool>>,
    registering: Rc<Cell<bool>>,
    deferred: Rc<Cell<bool>>,
    attached: Rc<RefCell<BTreeSet<ResourceId>>>,
}

impl ResourceBridge {
    pub fn new(ctx: Context, kind: ResourceKind) -> Self {
        Self {
            ctx,
            kind,
            scene_ready: Rc::new(Cell::new(false)),
            registering: Rc::new(Cell::new(false)),
            deferred: Rc::new(Cell::new(false)),
            attached: Rc::new(RefCell::new(BTreeSet::new())),
        }
    }

    pub fn assets(ctx: Context) -> Self {
        Self::new(ctx, ResourceKind::Asset)
    }

    pub fn entities(ctx: Context) -> Self {
        Self::new(ctx, ResourceKind::Entity)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.get()
    }

    pub fn attached(&self) -> Vec<ResourceId> {
        self.attached.borrow().iter().cloned().collect()
    }

    /// The scene and its asset container exist. Runs any deferred pass.
    pub fn scene_loaded(&self) -> usize {
        self.scene_ready.set(true);
        self.deferred.set(false);
        self.register_scene()
    }

    /// Register and attach every resource of the active chapter that is
    /// not attached yet. Returns the number registered.
    pub fn register_scene(&self) -> usize {
        if self.registering.get() {
            tracing::debug!(kind = %self.kind, "registration already in progress");
            return 0;
        }
        if !self.scene_ready.get() {
            tracing::debug!(kind = %self.kind, "scene not ready, deferring registration");
            self.deferred.set(true);
            return 0;
        }
        self.registering.set(true);
        let _pass = PassGuard(&self.registering);

        let state = self.ctx.state();
        let Some(chapter) = state.current_chapter_data() else {
            return 0;
        };
        let fresh: Vec<(ResourceId, SceneCommand)> = {
            let attached = self.attached.borrow();
            discover(self.kind, chapter)
                .into_iter()
                .filter(|(id, _)| !attached.contains(id))
                .collect()
        };
        if fresh.is_empty() {
            return 0;
        }

        let kind = self.kind;
        let ids: Vec<ResourceId> = fresh.iter().map(|(id, _)| id.clone()).collect();
        self.attached.borrow_mut().extend(ids.iter().cloned());
        self.ctx.store.update(move |s| {
            let map = s.resources_mut(kind);
            for id in ids {
                map.entry(id).or_default().begin_loading();
            }
        });

        let count = fresh.len();
        self.ctx
            .commands
            .borrow_mut()
            .push_batch(fresh.into_iter().map(|(_, command)| command));
        tracing::debug!(kind = %self.kind, count, chapter = %chapter.id, "registered scene resources");
        count
    }

    /// The engine finished loading `id`.
    pub fn loaded(&self, id: &ResourceId) -> bool {
        if !self.is_loading(id) {
            return false;
        }
        let kind = self.kind;
        let key = id.clone();
        self.ctx.store.update(move |s| {
            if let Some(resource) = s.resources_mut(kind).get_mut(&key) {
                resource.mark_loaded();
            }
        });
        tracing::trace!(kind = %self.kind, %id, "resource loaded");
        self.ctx.emit(AppEvent::ResourceLoaded {
            kind: self.kind,
            id: id.clone(),
        });
        true
    }

    /// The engine failed to load `id`.
    pub fn failed(&self, id: &ResourceId, reason: &str) -> bool {
        if !self.is_loading(id) {
            return false;
        }
        let err = AppError::ResourceLoadFailed {
            kind: self.kind,
            id: id.clone(),
            reason: reason.to_string(),
        };
        let info = err.to_info();
        let kind = self.kind;
        let key = id.clone();
        self.ctx.store.update(move |s| {
            if let Some(resource) = s.resources_mut(kind).get_mut(&key) {
                resource.mark_failed(info);
            }
        });
        self.ctx.errors.log(&err);
        self.ctx.emit(AppEvent::ResourceFailed {
            kind: self.kind,
            id: id.clone(),
            message: err.to_string(),
        });
        true
    }

    /// Detach every element this bridge attached and forget the scene.
    pub fn release(&self) -> usize {
        self.scene_ready.set(false);
        self.deferred.set(false);
        let attached = std::mem::take(&mut *self.attached.borrow_mut());
        let count = attached.len();
        let kind = self.kind;
        self.ctx
            .commands
            .borrow_mut()
            .push_batch(attached.into_iter().map(|id| match kind {
                ResourceKind::Asset => SceneCommand::DetachAsset { id },
                ResourceKind::Entity => SceneCommand::DetachEntity { id },
            }));
        if count > 0 {
            tracing::debug!(kind = %self.kind, count, "released scene resources");
        }
        count
    }

    /// Reports only count for elements attached since the last scene load.
    fn is_loading(&self, id: &ResourceId) -> bool {
        let attached = self.attached.borrow().contains(id);
        match self.ctx.state().resources(self.kind).get(id).map(|r| r.status) {
            Some(_) if !attached => {
                tracing::debug!(kind = %self.kind, %id, "ignoring report for detached element");
                false
            }
            Some(LoadStatus::Loading) => true,
            Some(status) => {
                tracing::trace!(kind = %self.kind, %id, ?status, "ignoring late load report");
                false
            }
            None => {
                self.ctx.errors.log(&AppError::EntityNotFound {
                    detail: format!("{} '{id}' is not registered", self.kind),
                });
                false
            }
        }
    }
}

/// Resources of `kind` declared by `chapter`, each with its attach command.
fn discover(kind: ResourceKind, chapter: &ChapterData) -> Vec<(ResourceId, SceneCommand)> {
    match kind {
        ResourceKind::Asset => {
            let mut seen = BTreeSet::new();
            chapter
                .assets()
                .filter(|(_, asset)| seen.insert(asset.id.clone()))
                .map(|(_, asset)| {
                    (
                        asset.id.clone(),
                        SceneCommand::AttachAsset {
                            id: asset.id.clone(),
                            asset_type: asset.asset_type,
                            src: asset.src.clone(),
                        },
                    )
                })
                .collect()
        }
        ResourceKind::Entity => chapter
            .entity_targets()
            .map(|(target, entity)| {
                let id = target.entity_id();
                (
                    id.clone(),
                    SceneCommand::AttachEntity {
                        id,
                        target: target.mindar_target_index,
                        kind: entity.kind,
                        assets: entity.assets.iter().map(|a| a.id.clone()).collect(),
                    },
                )
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::ChapterManager;
    use crate::config::AppConfig;
    use crate::id::ChapterId;
    use crate::test_utils::sample_content;

    fn setup(kind: ResourceKind) -> (ResourceBridge, Context) {
        let ctx = Context::new(sample_content(), AppConfig::default());
        ChapterManager::new(ctx.clone())
            .switch_chapter(&ChapterId::from("c1"))
            .unwrap();
        let _ = ctx.commands.borrow_mut().drain(0);
        (ResourceBridge::new(ctx.clone(), kind), ctx)
    }

    fn status(ctx: &Context, kind: ResourceKind, id: &str) -> Option<LoadStatus> {
        ctx.state()
            .resources(kind)
            .get(&ResourceId::from(id))
            .map(|r| r.status)
    }

    #[test]
    fn defers_until_scene_loaded() {
        let (assets, ctx) = setup(ResourceKind::Asset);
        assert_eq!(assets.register_scene(), 0);
        assert!(assets.is_deferred());
        assert_eq!(status(&ctx, ResourceKind::Asset, "robot-model"), Some(LoadStatus::Initial));

        assert_eq!(assets.scene_loaded(), 2);
        assert!(!assets.is_deferred());
        assert_eq!(status(&ctx, ResourceKind::Asset, "robot-model"), Some(LoadStatus::Loading));
        assert!(ctx
            .commands
            .borrow()
            .pending()
            .iter()
            .all(|c| matches!(c, SceneCommand::AttachAsset { .. })));
    }

    #[test]
    fn registration_is_idempotent() {
        let (assets, ctx) = setup(ResourceKind::Asset);
        assets.scene_loaded();
        let revision = ctx.store.revision();
        assert_eq!(assets.register_scene(), 0);
        assert_eq!(assets.scene_loaded(), 0);
        assert_eq!(ctx.store.revision(), revision);
        assert_eq!(ctx.commands.borrow().pending_count(), 2);
    }

    #[test]
    fn reentrant_pass_is_blocked() {
        let (assets, ctx) = setup(ResourceKind::Asset);
        let inner = assets.clone();
        let nested = Rc::new(Cell::new(None));
        let n = nested.clone();
        let _ = ctx.store.select(
            |s| s.assets.clone(),
            move |_, _| {
                if n.get().is_none() {
                    n.set(Some(inner.register_scene()));
                }
            },
        );

        assert_eq!(assets.scene_loaded(), 2);
        assert_eq!(nested.get(), Some(0));
        assert_eq!(ctx.commands.borrow().pending_count(), 2);
    }

    #[test]
    fn load_and_error_reports() {
        let (assets, ctx) = setup(ResourceKind::Asset);
        assets.scene_loaded();

        assert!(assets.loaded(&ResourceId::from("robot-model")));
        assert!(assets.failed(&ResourceId::from("intro-video"), "404"));

        assert_eq!(status(&ctx, ResourceKind::Asset, "robot-model"), Some(LoadStatus::Loaded));
        let failed = ctx.state().assets[&ResourceId::from("intro-video")].clone();
        assert_eq!(failed.status, LoadStatus::Error);
        assert!(failed.error.unwrap().message.contains("404"));
        assert!(ctx.state().error.is_none(), "resource failures are not blocking");
    }

    #[test]
    fn status_never_regresses() {
        let (assets, ctx) = setup(ResourceKind::Asset);
        assets.scene_loaded();
        let id = ResourceId::from("robot-model");
        assets.loaded(&id);
        assert!(!assets.failed(&id, "late error"));
        assert!(!assets.loaded(&id));
        assert_eq!(status(&ctx, ResourceKind::Asset, "robot-model"), Some(LoadStatus::Loaded));
    }

    #[test]
    fn unknown_resource_is_logged() {
        let (assets, ctx) = setup(ResourceKind::Asset);
        assets.scene_loaded();
        let revision = ctx.store.revision();
        assert!(!assets.loaded(&ResourceId::from("ghost")));
        assert_eq!(ctx.store.revision(), revision);
    }

    #[test]
    fn entities_attach_to_their_target() {
        let (entities, ctx) = setup(ResourceKind::Entity);
        assert_eq!(entities.scene_loaded(), 2);
        let commands = ctx.commands.borrow().pending().to_vec();
        assert!(commands.contains(&SceneCommand::AttachEntity {
            id: ResourceId::from("t1"),
            target: crate::id::TargetIndex(0),
            kind: crate::content::EntityKind::Model,
            assets: vec![ResourceId::from("robot-model")],
        }));
        assert_eq!(status(&ctx, ResourceKind::Entity, "t1"), Some(LoadStatus::Loading));
    }

    #[test]
    fn release_detaches_everything() {
        let (assets, ctx) = setup(ResourceKind::Asset);
        assets.scene_loaded();
        let _ = ctx.commands.borrow_mut().drain(0);

        assert_eq!(assets.release(), 2);
        assert!(assets.attached().is_empty());
        assert_eq!(ctx.commands.borrow().pending_count(), 2);
        assert!(ctx
            .commands
            .borrow()
            .pending()
            .iter()
            .all(|c| matches!(c, SceneCommand::DetachAsset { .. })));

        assert_eq!(assets.register_scene(), 0, "scene must load again");
        assert!(assets.is_deferred());
    }

    #[test]
    fn report_after_release_is_ignored() {
        let (assets, ctx) = setup(ResourceKind::Asset);
        assets.scene_loaded();
        assets.release();
        let revision = ctx.store.revision();

        assert!(!assets.loaded(&ResourceId::from("intro-video")));
        assert!(!assets.failed(&ResourceId::from("robot-model"), "gone"));
        assert_eq!(ctx.store.revision(), revision);
        assert_eq!(status(&ctx, ResourceKind::Asset, "intro-video"), Some(LoadStatus::Loading));
    }
}
