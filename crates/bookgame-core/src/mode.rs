//! Interaction mode transitions.
//!
//! [`Mode::next`] is total: every mode accepts every [`ModeEvent`], and
//! events that make no sense in a mode leave it unchanged. The
//! [`ModeManager`] applies a transition to the store and queues the scene
//! commands it implies.

use crate::command_queue::SceneCommand;
use crate::context::Context;
use crate::event::AppEvent;
use crate::state::Mode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeEvent {
    EnterVr,
    ExitVr,
    StartQrScan,
    StopQrScan,
    /// The host went to the background.
    Suspend,
    Resume,
}

impl ModeEvent {
    pub const ALL: [ModeEvent; 6] = [
        ModeEvent::EnterVr,
        ModeEvent::ExitVr,
        ModeEvent::StartQrScan,
        ModeEvent::StopQrScan,
        ModeEvent::Suspend,
        ModeEvent::Resume,
    ];
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Default, Mode::Vr, Mode::Qr, Mode::Idle];

    /// The mode after `event`.
    pub fn next(self, event: ModeEvent) -> Mode {
        use ModeEvent as E;
        match (self, event) {
            (Mode::Idle, E::Resume) => Mode::Default,
            (Mode::Idle, _) => Mode::Idle,
            (_, E::Suspend) => Mode::Idle,
            (_, E::EnterVr) => Mode::Vr,
            (_, E::StartQrScan) => Mode::Qr,
            (Mode::Vr, E::ExitVr) => Mode::Default,
            (Mode::Qr, E::StopQrScan) => Mode::Default,
            (mode, _) => mode,
        }
    }

    /// Whether the scene renders and tracks in this mode.
    pub fn is_playing(self) -> bool {
        matches!(self, Mode::Default | Mode::Vr)
    }
}

/// Scene commands needed to go from `from` to `to`, in order.
pub fn transition_commands(from: Mode, to: Mode) -> Vec<SceneCommand> {
    let mut commands = Vec::new();
    if from == to {
        return commands;
    }
    if from == Mode::Vr {
        commands.push(SceneCommand::ExitVr);
    }
    match (from.is_playing(), to.is_playing()) {
        (true, false) => commands.push(SceneCommand::Pause),
        (false, true) => commands.push(SceneCommand::Play),
        _ => {}
    }
    if to == Mode::Vr {
        commands.push(SceneCommand::EnterVr);
    }
    commands
}

#[derive(Debug, Clone)]
pub struct ModeManager {
    ctx: Context,
}

impl ModeManager {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn current(&self) -> Mode {
        self.ctx.state().mode
    }

    /// Apply `event`. Returns the resulting mode. Entering QR mode closes
    /// any open page overlay.
    pub fn dispatch(&self, event: ModeEvent) -> Mode {
        let from = self.current();
        let to = from.next(event);
        if from == to {
            tracing::trace!(?event, mode = ?from, "mode event ignored");
            return from;
        }

        let closes_route = to == Mode::Qr && self.ctx.state().current_route.is_some();
        self.ctx.store.update(|s| {
            s.mode = to;
            if to == Mode::Qr {
                s.current_route = None;
            }
        });
        self.ctx
            .commands
            .borrow_mut()
            .push_batch(transition_commands(from, to));

        tracing::debug!(?event, ?from, ?to, "mode changed");
        self.ctx.emit(AppEvent::ModeChanged { from, to });
        if closes_route {
            self.ctx.emit(AppEvent::RouteChanged { route: None });
        }
        to
    }
}
