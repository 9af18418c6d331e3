//! Bookgame Core -- application state for an AR book companion.
//!
//! The crate owns one observable [`GameState`](state::GameState) snapshot
//! and the managers that change it. The AR engine, the camera platform and
//! the presentation layer stay outside: they talk to the core through
//! engine events, scene commands, a camera trait and store subscriptions.
//!
//! # Host Loop
//!
//! Everything runs on one thread. A host typically repeats:
//!
//! 1. **Input** -- Forward engine events with [`app::App::handle`].
//! 2. **Time** -- Report the clock with [`app::App::advance`] so debounced
//!    target signals can settle.
//! 3. **Output** -- Apply [`app::App::drain_commands`] to the scene.
//! 4. **Events** -- Hand domain events to listeners with
//!    [`app::App::deliver_events`].
//!
//! Store subscribers are called synchronously inside each update; domain
//! event listeners only run during step 4.
//!
//! # Key Types
//!
//! - [`store::Store`] -- Copy-and-replace state container with whole-state
//!   and per-property subscriptions.
//! - [`app::App`] -- Composition root wiring every manager to one store.
//! - [`chapters::ChapterManager`] -- Ticketed chapter switching.
//! - [`targets::TargetBridge`] -- Debounced found/lost tracking.
//! - [`resources::ResourceBridge`] -- Asset and entity load lifecycle.
//! - [`camera::CameraManager`] -- Camera permission state machine.
//! - [`event::EventBus`] -- Typed domain events with buffered delivery.

pub mod app;
pub mod camera;
pub mod chapters;
pub mod clock;
pub mod command_queue;
pub mod config;
pub mod content;
pub mod context;
pub mod debounce;
pub mod error;
pub mod event;
pub mod id;
pub mod listeners;
pub mod mode;
pub mod notify;
pub mod qr;
pub mod resources;
pub mod router;
pub mod simulate;
pub mod state;
pub mod store;
pub mod targets;
pub mod tutorial;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
