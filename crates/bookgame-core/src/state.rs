//! The root application snapshot and the value types it is made of.
//!
//! A [`GameState`] is owned by the [`Store`](crate::store::Store) and is only
//! ever replaced wholesale by an update recipe. Everything here is plain
//! data: cloning a snapshot is the draft mechanism.

use crate::content::ChapterData;
use crate::error::ErrorKind;
use crate::id::{ChapterId, ResourceId, StepId, TargetIndex};
use crate::store::Properties;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Top-level interaction mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// AR camera view with targets being tracked.
    #[default]
    Default,
    /// Immersive view of the active scene.
    Vr,
    /// Scanning a chapter QR code. Page overlays are suspended.
    Qr,
    /// Scene paused, e.g. while the app is in the background.
    Idle,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// Overlay pages shown above the AR scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Page {
    Tutorial,
    Chapters,
    Chapter,
    About,
    CameraHelp,
    Error,
    NotFound,
}

impl Page {
    pub const ALL: [Page; 7] = [
        Page::Tutorial,
        Page::Chapters,
        Page::Chapter,
        Page::About,
        Page::CameraHelp,
        Page::Error,
        Page::NotFound,
    ];

    /// URL slug of the page.
    pub fn slug(self) -> &'static str {
        match self {
            Page::Tutorial => "tutorial",
            Page::Chapters => "chapters",
            Page::Chapter => "chapter",
            Page::About => "about",
            Page::CameraHelp => "camera-help",
            Page::Error => "error",
            Page::NotFound => "not-found",
        }
    }

    /// Resolve a slug, ignoring surrounding slashes and ASCII case.
    pub fn from_slug(slug: &str) -> Option<Page> {
        let slug = slug.trim().trim_matches('/');
        Page::ALL
            .into_iter()
            .find(|p| p.slug().eq_ignore_ascii_case(slug))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteParam {
    pub key: String,
    pub value: String,
}

impl RouteParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An overlay page plus an optional parameter. Two routes are the same
/// route when page and parameter key/value all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub page: Page,
    pub param: Option<RouteParam>,
}

impl Route {
    pub fn new(page: Page) -> Self {
        Self { page, param: None }
    }

    pub fn with_param(page: Page, param: RouteParam) -> Self {
        Self {
            page,
            param: Some(param),
        }
    }
}

// ---------------------------------------------------------------------------
// Loadable resources
// ---------------------------------------------------------------------------

/// Lifecycle status shared by assets, entities, chapters and the global
/// readiness gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadStatus {
    #[default]
    Initial,
    Loading,
    Loaded,
    Error,
}

impl LoadStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, LoadStatus::Loaded | LoadStatus::Error)
    }
}

/// Status envelope for anything loaded asynchronously. Status only moves
/// forward; [`reset`](LoadableResource::reset) is reserved for chapter switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadableResource {
    pub status: LoadStatus,
    pub error: Option<ErrorInfo>,
}

impl LoadableResource {
    /// INITIAL -> LOADING. Returns `false` for any other starting status.
    pub fn begin_loading(&mut self) -> bool {
        if self.status != LoadStatus::Initial {
            return false;
        }
        self.status = LoadStatus::Loading;
        true
    }

    /// LOADING -> LOADED. Returns `false` for any other starting status.
    pub fn mark_loaded(&mut self) -> bool {
        if self.status != LoadStatus::Loading {
            return false;
        }
        self.status = LoadStatus::Loaded;
        self.error = None;
        true
    }

    /// LOADING -> ERROR. Returns `false` for any other starting status.
    pub fn mark_failed(&mut self, error: ErrorInfo) -> bool {
        if self.status != LoadStatus::Loading {
            return false;
        }
        self.status = LoadStatus::Error;
        self.error = Some(error);
        true
    }

    pub fn reset(&mut self) {
        self.status = LoadStatus::Initial;
        self.error = None;
    }
}

/// Which of the two resource maps a resource lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Asset,
    Entity,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Asset => f.write_str("asset"),
            ResourceKind::Entity => f.write_str("entity"),
        }
    }
}

/// Cached chapter content plus its load status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterResource {
    pub data: Rc<ChapterData>,
    pub resource: LoadableResource,
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraPermission {
    #[default]
    Unknown,
    Prompt,
    Granted,
    Denied,
}

// ---------------------------------------------------------------------------
// Errors shown to the user
// ---------------------------------------------------------------------------

/// Browser family, used to pick camera remediation instructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Browser {
    Chrome,
    Safari,
    Firefox,
    Edge,
    #[default]
    Other,
}

/// What happens when the user activates a remediation action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryAction {
    /// Re-issue the chapter switch that failed.
    Retry { chapter: ChapterId },
    /// Open the camera help page for this browser.
    ShowPermissionHelp { browser: Browser },
    /// Clear the error slot.
    Dismiss,
    /// Start over; nothing else can fix the condition.
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub label: String,
    pub action: RecoveryAction,
}

/// An error as the presentation layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub action: Option<RemediationAction>,
}

// ---------------------------------------------------------------------------
// Tracked targets
// ---------------------------------------------------------------------------

/// Target indices currently detected, in detection order, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackedTargets(Vec<TargetIndex>);

impl TrackedTargets {
    /// Append `index` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, index: TargetIndex) -> bool {
        if self.contains(index) {
            return false;
        }
        self.0.push(index);
        true
    }

    /// Returns whether `index` was present.
    pub fn remove(&mut self, index: TargetIndex) -> bool {
        let before = self.0.len();
        self.0.retain(|i| *i != index);
        self.0.len() != before
    }

    pub fn contains(&self, index: TargetIndex) -> bool {
        self.0.contains(&index)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[TargetIndex] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = TargetIndex> + '_ {
        self.0.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// The single root snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameState {
    pub mode: Mode,
    pub current_route: Option<Route>,
    pub current_chapter: Option<ChapterId>,
    pub chapters: BTreeMap<ChapterId, ChapterResource>,
    pub tracked_targets: TrackedTargets,
    pub camera_permission: CameraPermission,
    pub current_tutorial_step_id: Option<StepId>,
    pub tutorial_complete: bool,
    pub assets: BTreeMap<ResourceId, LoadableResource>,
    pub entities: BTreeMap<ResourceId, LoadableResource>,
    pub loading: LoadStatus,
    pub error: Option<ErrorInfo>,
}

impl GameState {
    /// The active chapter's cache entry.
    pub fn current_chapter(&self) -> Option<&ChapterResource> {
        self.chapters.get(self.current_chapter.as_ref()?)
    }

    pub fn current_chapter_data(&self) -> Option<&ChapterData> {
        self.current_chapter().map(|c| c.data.as_ref())
    }

    pub fn resources(&self, kind: ResourceKind) -> &BTreeMap<ResourceId, LoadableResource> {
        match kind {
            ResourceKind::Asset => &self.assets,
            ResourceKind::Entity => &self.entities,
        }
    }

    pub fn resources_mut(
        &mut self,
        kind: ResourceKind,
    ) -> &mut BTreeMap<ResourceId, LoadableResource> {
        match kind {
            ResourceKind::Asset => &mut self.assets,
            ResourceKind::Entity => &mut self.entities,
        }
    }
}

/// Top-level fields of [`GameState`] that can be observed individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStateKey {
    Mode,
    CurrentRoute,
    CurrentChapter,
    Chapters,
    TrackedTargets,
    CameraPermission,
    CurrentTutorialStepId,
    TutorialComplete,
    Assets,
    Entities,
    Loading,
    Error,
}

impl Properties for GameState {
    type Key = GameStateKey;

    fn property_eq(&self, other: &Self, key: GameStateKey) -> bool {
        match key {
            GameStateKey::Mode => self.mode == other.mode,
            GameStateKey::CurrentRoute => self.current_route == other.current_route,
            GameStateKey::CurrentChapter => self.current_chapter == other.current_chapter,
            GameStateKey::Chapters => self.chapters == other.chapters,
            GameStateKey::TrackedTargets => self.tracked_targets == other.tracked_targets,
            GameStateKey::CameraPermission => self.camera_permission == other.camera_permission,
            GameStateKey::CurrentTutorialStepId => {
                self.current_tutorial_step_id == other.current_tutorial_step_id
            }
            GameStateKey::TutorialComplete => self.tutorial_complete == other.tutorial_complete,
            GameStateKey::Assets => self.assets == other.assets,
            GameStateKey::Entities => self.entities == other.entities,
            GameStateKey::Loading => self.loading == other.loading,
            GameStateKey::Error => self.error == other.error,
        }
    }
}
