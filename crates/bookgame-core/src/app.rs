//! The composed application core.
//!
//! [`App`] owns the store and wires every manager and bridge to it. The
//! host drives it with three calls: [`App::handle`] for engine events,
//! [`App::advance`] for the passage of time, and [`App::drain_commands`] to
//! collect the scene commands it must apply. Domain events are delivered to
//! listeners by [`App::deliver_events`].

use crate::camera::{CameraManager, CameraPlatform, PlatformPermission};
use crate::chapters::{ChapterManager, SwitchOutcome};
use crate::clock::{Clock, Millis};
use crate::command_queue::SceneCommand;
use crate::config::AppConfig;
use crate::content::Content;
use crate::context::Context;
use crate::error::AppError;
use crate::event::{AppEvent, EventKind};
use crate::id::{ChapterId, ResourceId, SwitchTicket, TargetIndex};
use crate::listeners::Unsubscribe;
use crate::mode::{ModeEvent, ModeManager};
use crate::qr::{chapter_code_url, parse_chapter_code};
use crate::resources::ResourceBridge;
use crate::router::RouterManager;
use crate::state::{ErrorInfo, GameState, Mode, Page, RecoveryAction, RouteParam};
use crate::store::Store;
use crate::targets::TargetBridge;
use crate::tutorial::TutorialManager;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Engine events
// ---------------------------------------------------------------------------

/// Everything the AR engine and platform report to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The scene element and its asset container exist.
    SceneLoaded,
    ChapterSceneReady {
        ticket: SwitchTicket,
    },
    ChapterSceneFailed {
        ticket: SwitchTicket,
        reason: String,
    },
    TargetFound {
        index: TargetIndex,
        timestamp: Millis,
    },
    TargetLost {
        index: TargetIndex,
        timestamp: Millis,
    },
    AssetLoaded {
        id: ResourceId,
    },
    AssetFailed {
        id: ResourceId,
        reason: String,
    },
    EntityLoaded {
        id: ResourceId,
    },
    EntityFailed {
        id: ResourceId,
        reason: String,
    },
    PermissionChanged {
        permission: PlatformPermission,
    },
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    ctx: Context,
    clock: Clock,
    modes: ModeManager,
    camera: CameraManager,
    router: RouterManager,
    tutorial: TutorialManager,
    chapters: ChapterManager,
    targets: TargetBridge,
    assets: ResourceBridge,
    entities: ResourceBridge,
    teardown_hook: Option<Unsubscribe>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("now", &self.clock.now())
            .field("revision", &self.ctx.store.revision())
            .field("mode", &self.modes.current())
            .finish_non_exhaustive()
    }
}

impl App {
    /// Build the core for `content`. Content without chapters, or whose
    /// initial chapter does not exist, cannot be shown at all.
    pub fn new(
        content: Content,
        config: AppConfig,
        platform: Box<dyn CameraPlatform>,
    ) -> Result<Self, AppError> {
        if content.chapters.is_empty() {
            return Err(AppError::ConfigurationInvalid {
                detail: "content has no chapters".to_string(),
            });
        }
        if content.chapter(&content.initial_chapter_id).is_none() {
            return Err(AppError::ConfigurationInvalid {
                detail: format!(
                    "initial chapter '{}' does not exist",
                    content.initial_chapter_id
                ),
            });
        }

        let ctx = Context::new(content, config);
        let modes = ModeManager::new(ctx.clone());
        let camera = CameraManager::new(ctx.clone(), platform);
        let router = RouterManager::new(ctx.clone(), modes.clone());
        let tutorial = TutorialManager::new(ctx.clone());
        let chapters = ChapterManager::new(ctx.clone());
        let targets = TargetBridge::new(ctx.clone());
        let assets = ResourceBridge::assets(ctx.clone());
        let entities = ResourceBridge::entities(ctx.clone());

        let teardown_hook = {
            let (targets, assets, entities) = (targets.clone(), assets.clone(), entities.clone());
            chapters.on_teardown(move |next| {
                tracing::debug!(%next, "tearing down scene");
                targets.reset();
                assets.release();
                entities.release();
            })
        };

        tracing::info!(
            chapters = ctx.content.chapters.len(),
            version = %ctx.content.version.version,
            "core ready"
        );
        Ok(Self {
            ctx,
            clock: Clock::new(),
            modes,
            camera,
            router,
            tutorial,
            chapters,
            targets,
            assets,
            entities,
            teardown_hook: Some(teardown_hook),
        })
    }

    /// Resolve camera access, open the tutorial if it has not been
    /// finished, and switch to the initial chapter.
    pub fn start(&mut self) -> Result<SwitchTicket, AppError> {
        self.camera.check_permission();
        if self.tutorial.entry_step().is_some() && !self.tutorial.is_complete() {
            self.router.navigate(Page::Tutorial, None);
        }
        let initial = self.ctx.content.initial_chapter_id.clone();
        self.switch_chapter(&initial)
    }

    // -----------------------------------------------------------------------
    // Host input
    // -----------------------------------------------------------------------

    pub fn handle(&mut self, event: EngineEvent) {
        tracing::trace!(?event, "engine event");
        match event {
            EngineEvent::SceneLoaded => {
                self.assets.scene_loaded();
                self.entities.scene_loaded();
            }
            EngineEvent::ChapterSceneReady { ticket } => {
                self.complete_switch(ticket, Ok(()));
            }
            EngineEvent::ChapterSceneFailed { ticket, reason } => {
                self.complete_switch(ticket, Err(reason));
            }
            EngineEvent::TargetFound { index, timestamp } => {
                self.advance(timestamp);
                self.targets.found(index, self.clock.now());
            }
            EngineEvent::TargetLost { index, timestamp } => {
                self.advance(timestamp);
                self.targets.lost(index, self.clock.now());
            }
            EngineEvent::AssetLoaded { id } => {
                self.assets.loaded(&id);
            }
            EngineEvent::AssetFailed { id, reason } => {
                self.assets.failed(&id, &reason);
            }
            EngineEvent::EntityLoaded { id } => {
                self.entities.loaded(&id);
            }
            EngineEvent::EntityFailed { id, reason } => {
                self.entities.failed(&id, &reason);
            }
            EngineEvent::PermissionChanged { permission } => {
                self.camera.platform_permission_changed(permission);
            }
        }
    }

    /// Move the clock to `now` and fire due target timers. Returns the
    /// number of changes applied to `tracked_targets`.
    pub fn advance(&mut self, now: Millis) -> usize {
        self.clock.advance_to(now);
        self.targets.advance(self.clock.now())
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    fn complete_switch(&self, ticket: SwitchTicket, result: Result<(), String>) {
        if self.chapters.complete_switch(ticket, result) == SwitchOutcome::Stale {
            tracing::debug!(ticket = ticket.0, "ignored outcome of superseded switch");
        }
    }

    // -----------------------------------------------------------------------
    // User intents
    // -----------------------------------------------------------------------

    pub fn switch_chapter(&self, id: &ChapterId) -> Result<SwitchTicket, AppError> {
        self.chapters.switch_chapter(id)
    }

    pub fn dispatch_mode(&self, event: ModeEvent) -> Mode {
        self.modes.dispatch(event)
    }

    /// Handle a decoded QR payload. A valid chapter code ends QR mode and
    /// switches chapter; anything else is logged and ignored.
    pub fn scan_qr(&self, text: &str) -> Option<SwitchTicket> {
        let expected = self
            .ctx
            .config
            .check_content_version
            .then_some(self.ctx.content.version.version.as_str());
        let Some(code) = parse_chapter_code(text, expected) else {
            tracing::info!("ignoring unrecognised QR code");
            return None;
        };
        self.modes.dispatch(ModeEvent::StopQrScan);
        self.chapters.switch_chapter(&code.chapter).ok()
    }

    /// URL to print into the QR code of `chapter`.
    pub fn chapter_url(&self, chapter: &ChapterId) -> Result<String, AppError> {
        chapter_code_url(
            &self.ctx.config.qr_origin,
            chapter,
            &self.ctx.content.version.version,
        )
        .map(String::from)
        .map_err(|err| AppError::ConfigurationInvalid {
            detail: format!("qr_origin '{}': {err}", self.ctx.config.qr_origin),
        })
    }

    /// Carry out the action attached to an error.
    pub fn run_remediation(&self, action: &RecoveryAction) -> Result<(), AppError> {
        tracing::info!(?action, "running remediation");
        match action {
            RecoveryAction::Retry { chapter } => {
                self.ctx.errors.dismiss();
                self.switch_chapter(chapter)?;
            }
            RecoveryAction::ShowPermissionHelp { browser } => {
                self.router.navigate(
                    Page::CameraHelp,
                    Some(RouteParam::new("browser", browser.slug())),
                );
            }
            RecoveryAction::Dismiss => {
                self.ctx.errors.dismiss();
            }
            RecoveryAction::Reload => {
                self.ctx.errors.dismiss();
                self.router.close();
                let initial = self.ctx.content.initial_chapter_id.clone();
                self.switch_chapter(&initial)?;
            }
        }
        Ok(())
    }

    pub fn dismiss_error(&self) -> Option<ErrorInfo> {
        self.ctx.errors.dismiss()
    }

    // -----------------------------------------------------------------------
    // Host output
    // -----------------------------------------------------------------------

    /// Scene commands queued since the last drain, in submission order.
    pub fn drain_commands(&self) -> Vec<SceneCommand> {
        self.ctx.commands.borrow_mut().drain(self.clock.now())
    }

    /// Recently drained commands with the time they were drained, oldest
    /// first. Empty unless `command_history` is set.
    pub fn command_history(&self) -> Vec<(Millis, SceneCommand)> {
        self.ctx.commands.borrow().history().to_vec()
    }

    /// Deliver queued domain events to their listeners.
    pub fn deliver_events(&self) -> usize {
        self.ctx.events.deliver()
    }

    pub fn on_event(&self, kind: EventKind, listener: impl Fn(&AppEvent) + 'static) -> Unsubscribe {
        self.ctx.events.on(kind, listener)
    }

    pub fn on_any_event(&self, listener: impl Fn(&AppEvent) + 'static) -> Unsubscribe {
        self.ctx.events.on_any(listener)
    }

    /// Error notifications queued since the last call.
    pub fn drain_notifications(&self) -> Vec<ErrorInfo> {
        self.ctx.errors.drain_notifications()
    }

    /// Release scene elements, timers and listeners.
    pub fn shutdown(&mut self) {
        if let Some(hook) = self.teardown_hook.take() {
            hook.unsubscribe();
        }
        self.targets.reset();
        self.assets.release();
        self.entities.release();
        self.camera.teardown();
        self.tutorial.teardown();
        tracing::info!("core shut down");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn store(&self) -> &Store<GameState> {
        &self.ctx.store
    }

    pub fn state(&self) -> std::rc::Rc<GameState> {
        self.ctx.state()
    }

    pub fn content(&self) -> &Content {
        &self.ctx.content
    }

    pub fn config(&self) -> &AppConfig {
        &self.ctx.config
    }

    pub fn camera(&self) -> &CameraManager {
        &self.camera
    }

    pub fn router(&self) -> &RouterManager {
        &self.router
    }

    pub fn tutorial(&self) -> &TutorialManager {
        &self.tutorial
    }

    pub fn chapters(&self) -> &ChapterManager {
        &self.chapters
    }

    pub fn modes(&self) -> &ModeManager {
        &self.modes
    }

    pub fn targets(&self) -> &TargetBridge {
        &self.targets
    }

    pub fn assets(&self) -> &ResourceBridge {
        &self.assets
    }

    pub fn entities(&self) -> &ResourceBridge {
        &self.entities
    }

    pub fn events(&self) -> &crate::event::EventBus {
        &self.ctx.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::simulate::SimulatedScene;
    use crate::state::{CameraPermission, LoadStatus};
    use crate::test_utils::{FakeCamera, sample_content};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn app() -> App {
        App::new(sample_content(), AppConfig::default(), Box::new(FakeCamera::granting())).unwrap()
    }

    #[test]
    fn rejects_content_without_chapters() {
        let mut content = sample_content();
        content.chapters.clear();
        let err = App::new(content, AppConfig::default(), Box::new(FakeCamera::granting()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationInvalid);
    }

    #[test]
    fn rejects_unknown_initial_chapter() {
        let mut content = sample_content();
        content.initial_chapter_id = ChapterId::from("nope");
        assert!(App::new(content, AppConfig::default(), Box::new(FakeCamera::granting())).is_err());
    }

    #[test]
    fn start_opens_tutorial_and_loads_initial_chapter() {
        let mut app = app();
        let mut scene = SimulatedScene::new();
        app.start().unwrap();
        scene.settle(&mut app);

        let state = app.state();
        assert_eq!(state.camera_permission, CameraPermission::Granted);
        assert_eq!(state.current_route.as_ref().map(|r| r.page), Some(Page::Tutorial));
        assert_eq!(state.current_chapter, Some(ChapterId::from("c1")));
        assert_eq!(state.loading, LoadStatus::Loaded);
        assert!(state.assets.values().all(|a| a.status == LoadStatus::Loaded));
        assert!(state.entities.values().all(|e| e.status == LoadStatus::Loaded));
    }

    #[test]
    fn switching_chapter_detaches_previous_scene() {
        let mut app = app();
        let mut scene = SimulatedScene::new();
        app.start().unwrap();
        scene.settle(&mut app);
        assert!(!scene.attached_assets().is_empty());

        app.switch_chapter(&ChapterId::from("c2")).unwrap();
        let commands = app.drain_commands();
        assert!(matches!(commands.first(), Some(SceneCommand::DetachAsset { .. })));
        assert!(matches!(commands.last(), Some(SceneCommand::RebuildScene { .. })));
    }

    #[test]
    fn qr_scan_switches_chapter_and_leaves_qr_mode() {
        let mut app = app();
        app.start().unwrap();
        app.dispatch_mode(ModeEvent::StartQrScan);

        let ticket = app.scan_qr("https://x/?code=c-chapter2&osct=1.0.0");

        assert!(ticket.is_some());
        let state = app.state();
        assert_eq!(state.mode, Mode::Default);
        assert_eq!(state.current_chapter, Some(ChapterId::from("chapter2")));
    }

    #[test]
    fn bad_qr_keeps_scanning() {
        let mut app = app();
        app.start().unwrap();
        app.dispatch_mode(ModeEvent::StartQrScan);
        assert!(app.scan_qr("https://x/?code=chapter2").is_none());
        assert_eq!(app.state().mode, Mode::Qr);
    }

    #[test]
    fn retry_remediation_reloads_chapter() {
        let mut app = app();
        let mut scene = SimulatedScene::new().fail_chapter("c1");
        app.start().unwrap();
        scene.settle(&mut app);

        let error = app.state().error.clone().unwrap();
        let action = error.action.unwrap().action;
        scene = SimulatedScene::new();
        app.run_remediation(&action).unwrap();
        scene.settle(&mut app);

        let state = app.state();
        assert!(state.error.is_none());
        assert_eq!(state.loading, LoadStatus::Loaded);
    }

    #[test]
    fn permission_help_navigates_with_browser() {
        let app = App::new(
            sample_content(),
            AppConfig::default(),
            Box::new(FakeCamera::denying()),
        )
        .unwrap();
        app.camera().request_access();
        let action = app.state().error.clone().unwrap().action.unwrap().action;

        app.run_remediation(&action).unwrap();

        let route = app.state().current_route.clone().unwrap();
        assert_eq!(route.page, Page::CameraHelp);
        assert_eq!(route.param.unwrap().value, "chrome");
        assert!(app.state().error.is_some(), "denial stays visible");
    }

    #[test]
    fn command_history_follows_config() {
        let mut quiet = app();
        quiet.start().unwrap();
        let _ = quiet.drain_commands();
        assert!(quiet.command_history().is_empty());

        let config = AppConfig {
            command_history: 2,
            ..AppConfig::default()
        };
        let mut app =
            App::new(sample_content(), config, Box::new(FakeCamera::granting())).unwrap();
        app.start().unwrap();
        app.handle(EngineEvent::SceneLoaded);
        app.advance(30);
        let drained = app.drain_commands();
        assert!(drained.len() > 2);

        let history = app.command_history();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|(at, _)| *at == 30));
        assert_eq!(history[1].1, drained[drained.len() - 1]);
    }

    #[test]
    fn events_reach_listeners_on_delivery() {
        let mut app = app();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _ = app.on_event(EventKind::ChapterLoaded, move |e| s.borrow_mut().push(e.clone()));

        let mut scene = SimulatedScene::new();
        app.start().unwrap();
        scene.settle(&mut app);

        assert_eq!(
            *seen.borrow(),
            vec![AppEvent::ChapterLoaded {
                chapter: ChapterId::from("c1")
            }]
        );
    }

    #[test]
    fn chapter_url_uses_content_version() {
        let app = app();
        let url = app.chapter_url(&ChapterId::from("c2")).unwrap();
        assert_eq!(url, "https://book.local/?code=c-c2&osct=1.0.0");
    }

    #[test]
    fn engine_events_round_trip_through_json() {
        let event: EngineEvent =
            serde_json::from_str(r#"{"event":"target_found","index":0,"timestamp":120}"#).unwrap();
        assert_eq!(
            event,
            EngineEvent::TargetFound {
                index: TargetIndex(0),
                timestamp: 120
            }
        );
    }

    #[test]
    fn load_report_from_torn_down_scene_is_dropped() {
        let mut app = app();
        app.start().unwrap();
        app.handle(EngineEvent::SceneLoaded);
        let video = ResourceId::from("intro-video");
        assert_eq!(app.state().assets[&video].status, LoadStatus::Loading);

        app.switch_chapter(&ChapterId::from("c2")).unwrap();
        app.handle(EngineEvent::AssetLoaded { id: video.clone() });

        assert_eq!(app.state().current_chapter, Some(ChapterId::from("c2")));
        assert_ne!(app.state().assets[&video].status, LoadStatus::Loaded);
    }

    #[test]
    fn shutdown_releases_scene() {
        let mut app = app();
        let mut scene = SimulatedScene::new();
        app.start().unwrap();
        scene.settle(&mut app);
        app.shutdown();
        let commands = app.drain_commands();
        assert!(commands
            .iter()
            .all(|c| matches!(c, SceneCommand::DetachAsset { .. } | SceneCommand::DetachEntity { .. })));
        assert!(!commands.is_empty());
    }
}
