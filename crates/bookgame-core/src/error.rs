use crate::id::{ChapterId, ResourceId};
use crate::state::{ErrorInfo, ResourceKind};
use serde::{Deserialize, Serialize};

/// Errors surfaced by the managers and bridges.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// The camera could not be acquired or access was refused.
    #[error("camera access denied: {reason}")]
    PermissionDenied { reason: String },

    /// An asset or entity failed to load in the scene.
    #[error("{kind} '{id}' failed to load: {reason}")]
    ResourceLoadFailed {
        kind: ResourceKind,
        id: ResourceId,
        reason: String,
    },

    /// A target or entity is missing from the active scene.
    #[error("not found in scene: {detail}")]
    EntityNotFound { detail: String },

    /// A navigation request named a page that does not exist.
    #[error("no route for '{path}'")]
    RouteNotFound { path: String },

    /// Content or settings are malformed.
    #[error("invalid configuration: {detail}")]
    ConfigurationInvalid { detail: String },

    /// A chapter could not be switched to.
    #[error("could not switch to chapter '{chapter}': {reason}")]
    ChapterSwitchFailed { chapter: ChapterId, reason: String },
}

/// Discriminant of [`AppError`], carried in [`ErrorInfo`] so presentation
/// never has to inspect messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    PermissionDenied,
    ResourceLoadFailed,
    EntityNotFound,
    RouteNotFound,
    ConfigurationInvalid,
    ChapterSwitchFailed,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            AppError::ResourceLoadFailed { .. } => ErrorKind::ResourceLoadFailed,
            AppError::EntityNotFound { .. } => ErrorKind::EntityNotFound,
            AppError::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            AppError::ConfigurationInvalid { .. } => ErrorKind::ConfigurationInvalid,
            AppError::ChapterSwitchFailed { .. } => ErrorKind::ChapterSwitchFailed,
        }
    }

    /// The user-facing payload for this error, without a recovery action.
    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo {
            kind: self.kind(),
            message: self.to_string(),
            action: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = AppError::RouteNotFound {
            path: "nowhere".into(),
        };
        assert_eq!(err.kind(), ErrorKind::RouteNotFound);

        let err = AppError::ChapterSwitchFailed {
            chapter: ChapterId::from("c9"),
            reason: "unknown chapter".into(),
        };
        assert_eq!(err.kind(), ErrorKind::ChapterSwitchFailed);
    }

    #[test]
    fn info_carries_display_message() {
        let err = AppError::ResourceLoadFailed {
            kind: ResourceKind::Asset,
            id: ResourceId::from("fox-glb"),
            reason: "404".into(),
        };
        let info = err.to_info();
        assert_eq!(info.kind, ErrorKind::ResourceLoadFailed);
        assert_eq!(info.message, "asset 'fox-glb' failed to load: 404");
        assert!(info.action.is_none());
    }
}
