//! Cross-reference checks for a parsed content document.

use bookgame_core::content::Content;
use bookgame_core::id::{ChapterId, ResourceId, StepId, TargetIndex};
use bookgame_core::tutorial::find_entry_step;
use std::collections::{BTreeMap, BTreeSet};

/// One problem found in the content document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentIssue {
    #[error("content has no chapters")]
    NoChapters,

    #[error("initialChapterId '{0}' does not name a chapter")]
    UnknownInitialChapter(ChapterId),

    #[error("chapter id '{0}' is used more than once")]
    DuplicateChapter(ChapterId),

    #[error("chapter '{chapter}' uses target index {index} more than once")]
    DuplicateTargetIndex { chapter: ChapterId, index: TargetIndex },

    #[error("asset '{id}' is declared with different sources ('{first}', '{second}')")]
    ConflictingAsset {
        id: ResourceId,
        first: String,
        second: String,
    },

    #[error("tutorial step id '{0}' is used more than once")]
    DuplicateStep(StepId),

    #[error("tutorial step '{step}' points at unknown step '{next}'")]
    UnknownNextStep { step: StepId, next: StepId },

    /// The steps do not form one chain. The first authored step is used.
    #[error("tutorial chain is ambiguous: {0}")]
    AmbiguousTutorial(String),

    /// A chapter without targets cannot show anything.
    #[error("chapter '{0}' has no targets")]
    EmptyChapter(ChapterId),
}

impl ContentIssue {
    /// Whether the document must be rejected.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ContentIssue::AmbiguousTutorial(_) | ContentIssue::EmptyChapter(_)
        )
    }
}

/// Every issue in `content`, in document order.
pub fn validate_content(content: &Content) -> Vec<ContentIssue> {
    let mut issues = Vec::new();
    check_chapters(content, &mut issues);
    check_tutorial(content, &mut issues);
    issues
}

fn check_chapters(content: &Content, issues: &mut Vec<ContentIssue>) {
    if content.chapters.is_empty() {
        issues.push(ContentIssue::NoChapters);
        return;
    }
    if content.chapter(&content.initial_chapter_id).is_none() {
        issues.push(ContentIssue::UnknownInitialChapter(
            content.initial_chapter_id.clone(),
        ));
    }

    let mut chapter_ids = BTreeSet::new();
    let mut asset_sources: BTreeMap<&ResourceId, &str> = BTreeMap::new();
    for chapter in &content.chapters {
        if !chapter_ids.insert(&chapter.id) {
            issues.push(ContentIssue::DuplicateChapter(chapter.id.clone()));
        }
        if chapter.targets.is_empty() {
            issues.push(ContentIssue::EmptyChapter(chapter.id.clone()));
        }

        let mut indices = BTreeSet::new();
        for target in &chapter.targets {
            if !indices.insert(target.mindar_target_index) {
                issues.push(ContentIssue::DuplicateTargetIndex {
                    chapter: chapter.id.clone(),
                    index: target.mindar_target_index,
                });
            }
        }

        for (_, asset) in chapter.assets() {
            match asset_sources.get(&asset.id) {
                Some(first) if *first != asset.src => {
                    issues.push(ContentIssue::ConflictingAsset {
                        id: asset.id.clone(),
                        first: first.to_string(),
                        second: asset.src.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    asset_sources.insert(&asset.id, &asset.src);
                }
            }
        }
    }
}

fn check_tutorial(content: &Content, issues: &mut Vec<ContentIssue>) {
    let steps = &content.tutorial;
    if steps.is_empty() {
        return;
    }

    let mut ids = BTreeSet::new();
    for step in steps {
        if !ids.insert(&step.id) {
            issues.push(ContentIssue::DuplicateStep(step.id.clone()));
        }
    }
    for step in steps {
        if let Some(next) = &step.next {
            if !ids.contains(next) {
                issues.push(ContentIssue::UnknownNextStep {
                    step: step.id.clone(),
                    next: next.clone(),
                });
            }
        }
    }
    if let Err(err) = find_entry_step(steps) {
        issues.push(ContentIssue::AmbiguousTutorial(err.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookgame_core::content::AssetType;
    use bookgame_core::test_utils::{asset, sample_content, step, target};

    #[test]
    fn sample_content_is_clean() {
        assert_eq!(validate_content(&sample_content()), Vec::new());
    }

    #[test]
    fn no_chapters() {
        let mut content = sample_content();
        content.chapters.clear();
        let issues = validate_content(&content);
        assert_eq!(issues[0], ContentIssue::NoChapters);
        assert!(issues[0].is_fatal());
    }

    #[test]
    fn duplicate_chapter_and_unknown_initial() {
        let mut content = sample_content();
        content.chapters[1].id = ChapterId::from("c1");
        content.initial_chapter_id = ChapterId::from("c7");
        let issues = validate_content(&content);
        assert!(issues.contains(&ContentIssue::DuplicateChapter(ChapterId::from("c1"))));
        assert!(issues.contains(&ContentIssue::UnknownInitialChapter(ChapterId::from("c7"))));
    }

    #[test]
    fn duplicate_target_index() {
        let mut content = sample_content();
        content.chapters[0].targets.push(target("t9", 1, None));
        assert_eq!(
            validate_content(&content),
            vec![ContentIssue::DuplicateTargetIndex {
                chapter: ChapterId::from("c1"),
                index: TargetIndex(1),
            }]
        );
    }

    #[test]
    fn same_asset_with_two_sources() {
        let mut content = sample_content();
        let entity = content.chapters[2].targets[0].entity.as_mut().unwrap();
        entity.assets.push(asset("robot-model", AssetType::Glb, "models/other.glb"));
        let issues = validate_content(&content);
        assert!(matches!(
            issues.as_slice(),
            [ContentIssue::ConflictingAsset { first, .. }] if first == "models/robot.glb"
        ));
    }

    #[test]
    fn tutorial_problems() {
        let mut content = sample_content();
        content.tutorial.push(step("welcome", Some("nowhere")));
        let issues = validate_content(&content);
        assert!(issues.contains(&ContentIssue::DuplicateStep(StepId::from("welcome"))));
        assert!(issues.contains(&ContentIssue::UnknownNextStep {
            step: StepId::from("welcome"),
            next: StepId::from("nowhere"),
        }));
    }

    #[test]
    fn warnings_are_not_fatal() {
        let mut content = sample_content();
        content.chapters[1].targets.clear();
        content.tutorial.push(step("extra", None));
        let issues = validate_content(&content);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| !i.is_fatal()));
    }
}
