//! Fixtures shared by unit and integration tests.

use crate::camera::{CameraError, CameraPlatform, CameraStream, PlatformPermission};
use crate::content::{
    AssetData, AssetType, ChapterData, Content, ContentVersion, EntityData, EntityKind,
    TargetData, TutorialStep,
};
use crate::id::{ChapterId, ResourceId, StepId, TargetIndex};
use crate::state::Browser;
use std::cell::Cell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

pub fn asset(id: &str, asset_type: AssetType, src: &str) -> AssetData {
    AssetData {
        id: ResourceId::from(id),
        asset_type,
        src: src.to_string(),
    }
}

pub fn target(id: &str, index: u32, entity: Option<EntityData>) -> TargetData {
    TargetData {
        id: id.to_string(),
        mindar_target_index: TargetIndex(index),
        title: format!("Target {id}"),
        description: String::new(),
        entity,
    }
}

pub fn chapter(id: &str, order: u32, title: &str, targets: Vec<TargetData>) -> ChapterData {
    ChapterData {
        id: ChapterId::from(id),
        order,
        first_page: order * 10 + 1,
        last_page: order * 10 + 10,
        title: title.to_string(),
        mind_src: format!("targets/{id}.mind"),
        targets,
    }
}

pub fn step(id: &str, next: Option<&str>) -> TutorialStep {
    TutorialStep {
        id: StepId::from(id),
        title: id.to_string(),
        description: String::new(),
        illustration: String::new(),
        next: next.map(StepId::from),
    }
}

/// Content with just chapter `c1` holding target `t1` at index 0.
pub fn single_chapter_content() -> Content {
    Content {
        version: ContentVersion {
            version: "1.0.0".to_string(),
            timestamp: "2024-05-01T10:00:00Z".to_string(),
        },
        initial_chapter_id: ChapterId::from("c1"),
        chapters: vec![chapter("c1", 0, "Chapter One", vec![target("t1", 0, None)])],
        tutorial: Vec::new(),
    }
}

/// Three chapters and a three-step tutorial.
///
/// - `c1`: `t1` (index 0, model using `robot-model`) and `t2` (index 1,
///   video using `intro-video`)
/// - `c2`: `t3` (index 0, basic) and `t4` (index 1, no entity)
/// - `chapter2`: `t5` (index 0, link using `shop-link`)
pub fn sample_content() -> Content {
    let model = EntityData {
        kind: EntityKind::Model,
        assets: vec![asset("robot-model", AssetType::Glb, "models/robot.glb")],
    };
    let video = EntityData {
        kind: EntityKind::Video,
        assets: vec![asset("intro-video", AssetType::Video, "video/intro.mp4")],
    };
    let basic = EntityData {
        kind: EntityKind::Basic,
        assets: Vec::new(),
    };
    let link = EntityData {
        kind: EntityKind::Link,
        assets: vec![asset("shop-link", AssetType::Link, "https://shop.local")],
    };

    Content {
        version: ContentVersion {
            version: "1.0.0".to_string(),
            timestamp: "2024-05-01T10:00:00Z".to_string(),
        },
        initial_chapter_id: ChapterId::from("c1"),
        chapters: vec![
            chapter(
                "c1",
                0,
                "Arrival",
                vec![target("t1", 0, Some(model)), target("t2", 1, Some(video))],
            ),
            chapter(
                "c2",
                1,
                "The Workshop",
                vec![target("t3", 0, Some(basic)), target("t4", 1, None)],
            ),
            chapter("chapter2", 2, "Epilogue", vec![target("t5", 0, Some(link))]),
        ],
        tutorial: vec![
            step("welcome", Some("scan")),
            step("scan", Some("finish")),
            step("finish", None),
        ],
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Counters shared between a [`FakeCamera`] and the test that built it.
#[derive(Debug, Clone, Default)]
pub struct CameraProbe {
    acquired: Rc<Cell<u32>>,
    released: Rc<Cell<u32>>,
}

impl CameraProbe {
    pub fn acquired(&self) -> u32 {
        self.acquired.get()
    }

    pub fn released(&self) -> u32 {
        self.released.get()
    }
}

#[derive(Debug, Clone)]
pub struct FakeCamera {
    query: Option<Result<PlatformPermission, CameraError>>,
    acquire: Result<(), CameraError>,
    browser: Browser,
    probe: CameraProbe,
}

impl FakeCamera {
    /// No query capability; acquiring succeeds.
    pub fn granting() -> Self {
        Self {
            query: None,
            acquire: Ok(()),
            browser: Browser::Chrome,
            probe: CameraProbe::default(),
        }
    }

    /// No query capability; acquiring is refused.
    pub fn denying() -> Self {
        Self {
            acquire: Err(CameraError::NotAllowed("user dismissed prompt".to_string())),
            ..Self::granting()
        }
    }

    pub fn with_query(mut self, answer: Result<PlatformPermission, CameraError>) -> Self {
        self.query = Some(answer);
        self
    }

    pub fn with_browser(mut self, browser: Browser) -> Self {
        self.browser = browser;
        self
    }

    pub fn probe(&self) -> CameraProbe {
        self.probe.clone()
    }
}

impl CameraPlatform for FakeCamera {
    fn query_permission(&mut self) -> Option<Result<PlatformPermission, CameraError>> {
        self.query.clone()
    }

    fn acquire(&mut self) -> Result<CameraStream, CameraError> {
        self.acquire.clone()?;
        let count = self.probe.acquired.get() + 1;
        self.probe.acquired.set(count);
        Ok(CameraStream { id: count.into() })
    }

    fn release(&mut self, _stream: CameraStream) {
        self.probe.released.set(self.probe.released.get() + 1);
    }

    fn browser(&self) -> Browser {
        self.browser
    }
}
