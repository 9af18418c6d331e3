//! Shared handles injected into every manager and bridge.

use crate::command_queue::{CommandQueue, SceneCommand};
use crate::config::AppConfig;
use crate::content::Content;
use crate::event::{AppEvent, EventBus};
use crate::notify::ErrorChannel;
use crate::state::{ChapterResource, GameState, LoadableResource};
use crate::store::Store;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Everything a manager needs to read content, change state and talk to the
/// outside world. Cloning is cheap and every clone shares the same store,
/// bus and queue.
#[derive(Debug, Clone)]
pub struct Context {
    pub store: Store<GameState>,
    pub events: EventBus,
    pub errors: ErrorChannel,
    pub commands: Rc<RefCell<CommandQueue>>,
    pub content: Rc<Content>,
    pub config: Rc<AppConfig>,
}

impl Context {
    /// Build the shared handles and seed the store from `content`.
    pub fn new(content: Content, config: AppConfig) -> Self {
        let store = Store::new(seed_state(&content));
        let events = EventBus::new(config.event_history);
        let errors = ErrorChannel::new(store.clone(), events.clone(), config.notification_capacity);
        let commands = CommandQueue::with_max_history(config.command_history);
        Self {
            store,
            events,
            errors,
            commands: Rc::new(RefCell::new(commands)),
            content: Rc::new(content),
            config: Rc::new(config),
        }
    }

    pub fn state(&self) -> Rc<GameState> {
        self.store.state()
    }

    pub fn emit(&self, event: AppEvent) {
        self.events.emit(event);
    }

    pub fn command(&self, command: SceneCommand) {
        tracing::trace!(?command, "queue scene command");
        self.commands.borrow_mut().push(command);
    }
}

/// The initial snapshot: every chapter cached with status `Initial`, no
/// route, nothing tracked.
pub fn seed_state(content: &Content) -> GameState {
    let chapters: BTreeMap<_, _> = content
        .chapters
        .iter()
        .map(|chapter| {
            (
                chapter.id.clone(),
                ChapterResource {
                    data: Rc::new(chapter.clone()),
                    resource: LoadableResource::default(),
                },
            )
        })
        .collect();
    GameState {
        chapters,
        ..GameState::default()
    }
}
