//! Scripted sessions: a list of user intents and engine signals replayed
//! against the core with a simulated scene answering its commands.

use anyhow::{Context as _, Result};
use bookgame_core::app::{App, EngineEvent};
use bookgame_core::camera::{CameraError, CameraPlatform, CameraStream, PlatformPermission};
use bookgame_core::clock::Millis;
use bookgame_core::command_queue::SceneCommand;
use bookgame_core::config::AppConfig;
use bookgame_core::content::Content;
use bookgame_core::id::{ChapterId, StepId, TargetIndex};
use bookgame_core::mode::ModeEvent;
use bookgame_core::simulate::SimulatedScene;
use bookgame_core::state::{Browser, GameState};
use serde::Deserialize;
use std::path::Path;

/// One line of a session script.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Move the clock forward to `to` milliseconds.
    Advance { to: Millis },
    Found { index: u32, at: Millis },
    Lost { index: u32, at: Millis },
    Switch { chapter: ChapterId },
    Scan { text: String },
    Mode { event: ModeEvent },
    Navigate {
        page: String,
        #[serde(default)]
        param: Option<(String, String)>,
    },
    Close,
    TutorialNext,
    TutorialPrevious,
    TutorialGoto { id: StepId },
    /// Run the action attached to the current error, if any.
    Remediate,
    Dismiss,
    /// Forward a raw engine event.
    Engine { event: EngineEvent },
}

pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing script {}", path.display()))
}

/// Knobs for the simulated platform.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub deny_camera: bool,
    pub fail_chapters: Vec<ChapterId>,
    pub fail_resources: Vec<String>,
}

/// Camera that answers the probe without a prompt.
struct HeadlessCamera {
    allow: bool,
    next_stream: u64,
}

impl CameraPlatform for HeadlessCamera {
    fn query_permission(&mut self) -> Option<Result<PlatformPermission, CameraError>> {
        None
    }

    fn acquire(&mut self) -> Result<CameraStream, CameraError> {
        if !self.allow {
            return Err(CameraError::NotAllowed("denied by --deny-camera".to_string()));
        }
        self.next_stream += 1;
        Ok(CameraStream {
            id: self.next_stream,
        })
    }

    fn release(&mut self, stream: CameraStream) {
        tracing::trace!(stream = stream.id, "released probe stream");
    }

    fn browser(&self) -> Browser {
        Browser::Other
    }
}

/// Outcome of one replay.
#[derive(Debug)]
pub struct Report {
    pub state: GameState,
    pub events_delivered: u64,
    pub commands_applied: usize,
    pub notifications: usize,
    /// Last drained commands, as kept by `command_history`.
    pub recent_commands: Vec<(Millis, SceneCommand)>,
}

impl Session {
    fn scene(&self) -> SimulatedScene {
        let scene = self
            .fail_chapters
            .iter()
            .cloned()
            .fold(SimulatedScene::new(), SimulatedScene::fail_chapter);
        self.fail_resources
            .iter()
            .map(String::as_str)
            .fold(scene, SimulatedScene::fail_resource)
    }

    /// Start the core, replay `steps`, and settle everything.
    pub fn run(&self, content: &Content, config: &AppConfig, steps: &[Step]) -> Result<Report> {
        let camera = HeadlessCamera {
            allow: !self.deny_camera,
            next_stream: 0,
        };
        let mut app = App::new(content.clone(), config.clone(), Box::new(camera))?;
        let mut scene = self.scene();
        let mut notifications = 0;

        app.start()?;
        scene.settle(&mut app);

        for (n, step) in steps.iter().enumerate() {
            tracing::debug!(n, ?step, "script step");
            apply(&mut app, step)?;
            scene.settle(&mut app);
            notifications += app.drain_notifications().len();
        }

        let horizon = app.now() + config.target_debounce_ms;
        app.advance(horizon);
        scene.settle(&mut app);
        notifications += app.drain_notifications().len();

        Ok(Report {
            state: (*app.state()).clone(),
            events_delivered: app.events().total_delivered(),
            commands_applied: scene.applied(),
            notifications,
            recent_commands: app.command_history(),
        })
    }
}

fn apply(app: &mut App, step: &Step) -> Result<()> {
    match step {
        Step::Advance { to } => {
            app.advance(*to);
        }
        Step::Found { index, at } => app.handle(EngineEvent::TargetFound {
            index: TargetIndex(*index),
            timestamp: *at,
        }),
        Step::Lost { index, at } => app.handle(EngineEvent::TargetLost {
            index: TargetIndex(*index),
            timestamp: *at,
        }),
        Step::Switch { chapter } => {
            if let Err(err) = app.switch_chapter(chapter) {
                tracing::warn!(%err, "switch rejected");
            }
        }
        Step::Scan { text } => {
            if app.scan_qr(text).is_none() {
                tracing::info!(%text, "scan did not start a switch");
            }
        }
        Step::Mode { event } => {
            app.dispatch_mode(*event);
        }
        Step::Navigate { page, param } => {
            let param = param
                .as_ref()
                .map(|(k, v)| bookgame_core::state::RouteParam::new(k.clone(), v.clone()));
            app.router().navigate(page.as_str(), param);
        }
        Step::Close => {
            app.router().close();
        }
        Step::TutorialNext => {
            app.tutorial().next();
        }
        Step::TutorialPrevious => {
            app.tutorial().previous();
        }
        Step::TutorialGoto { id } => {
            app.tutorial().navigate_to_step(id);
        }
        Step::Remediate => {
            let action = app
                .state()
                .error
                .as_ref()
                .and_then(|e| e.action.clone());
            match action {
                Some(action) => app.run_remediation(&action.action)?,
                None => tracing::info!("nothing to remediate"),
            }
        }
        Step::Dismiss => {
            app.dismiss_error();
        }
        Step::Engine { event } => app.handle(event.clone()),
    }
    Ok(())
}
