//! Immutable book content: chapters, targets, entities, assets and the
//! tutorial chain.
//!
//! The content document is produced by an external build step and read
//! once at startup. Field names follow the document's camelCase keys.

use crate::id::{ChapterId, ResourceId, StepId, TargetIndex};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// The whole content document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub version: ContentVersion,
    pub initial_chapter_id: ChapterId,
    pub chapters: Vec<ChapterData>,
    #[serde(default)]
    pub tutorial: Vec<TutorialStep>,
}

/// Build stamp of the content document. `version` is also the `osct`
/// value printed into chapter QR codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVersion {
    pub version: String,
    pub timestamp: String,
}

/// One chapter of the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterData {
    pub id: ChapterId,
    pub order: u32,
    pub first_page: u32,
    pub last_page: u32,
    pub title: String,
    /// Compiled image-target file the tracking engine loads for this chapter.
    pub mind_src: String,
    #[serde(default)]
    pub targets: Vec<TargetData>,
}

/// A trackable image region of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetData {
    pub id: String,
    pub mindar_target_index: TargetIndex,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub entity: Option<EntityData>,
}

/// Virtual content bound to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityData {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default)]
    pub assets: Vec<AssetData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Model,
    Video,
    Link,
    Basic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetData {
    pub id: ResourceId,
    pub asset_type: AssetType,
    pub src: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Gltf,
    Glb,
    Video,
    Audio,
    Link,
}

/// One step of the onboarding tutorial. Steps form a singly linked chain
/// through `next`; the step without `next` is the last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialStep {
    pub id: StepId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub illustration: String,
    #[serde(default)]
    pub next: Option<StepId>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Content {
    /// Look up a chapter by id.
    pub fn chapter(&self, id: &ChapterId) -> Option<&ChapterData> {
        self.chapters.iter().find(|c| &c.id == id)
    }

    /// Chapters sorted by their `order` field (ties keep authored order).
    pub fn chapters_in_order(&self) -> Vec<&ChapterData> {
        let mut chapters: Vec<&ChapterData> = self.chapters.iter().collect();
        chapters.sort_by_key(|c| c.order);
        chapters
    }
}

impl ChapterData {
    /// The target tracked in the given engine slot, if this chapter has one.
    pub fn target(&self, index: TargetIndex) -> Option<&TargetData> {
        self.targets
            .iter()
            .find(|t| t.mindar_target_index == index)
    }

    pub fn has_target(&self, index: TargetIndex) -> bool {
        self.target(index).is_some()
    }

    /// Every asset referenced by this chapter's entities, in authored order.
    pub fn assets(&self) -> impl Iterator<Item = (&TargetData, &AssetData)> {
        self.targets.iter().flat_map(|t| {
            t.entity
                .iter()
                .flat_map(move |e| e.assets.iter().map(move |a| (t, a)))
        })
    }

    /// Targets that carry an entity.
    pub fn entity_targets(&self) -> impl Iterator<Item = (&TargetData, &EntityData)> {
        self.targets
            .iter()
            .filter_map(|t| t.entity.as_ref().map(|e| (t, e)))
    }

    /// Human-readable page span, e.g. `"12-18"` or `"7"`.
    pub fn page_range(&self) -> String {
        if self.first_page == self.last_page {
            self.first_page.to_string()
        } else {
            format!("{}-{}", self.first_page, self.last_page)
        }
    }
}

impl TargetData {
    /// Entities are keyed by the id of the target they belong to.
    pub fn entity_id(&self) -> ResourceId {
        ResourceId(self.id.clone())
    }
}
