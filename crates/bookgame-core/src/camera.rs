//! Camera permission state machine.
//!
//! States are [`CameraPermission`] values. The platform is reached through
//! the [`CameraPlatform`] trait; its prompt is the only place the host may
//! block, so the trait calls return once the user has answered.

use crate::context::Context;
use crate::error::AppError;
use crate::event::AppEvent;
use crate::listeners::{ListenerList, Unsubscribe};
use crate::state::{Browser, CameraPermission, RecoveryAction, RemediationAction};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Platform seam
// ---------------------------------------------------------------------------

/// Answer of the platform permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformPermission {
    Granted,
    Denied,
    Prompt,
}

impl From<PlatformPermission> for CameraPermission {
    fn from(p: PlatformPermission) -> Self {
        match p {
            PlatformPermission::Granted => CameraPermission::Granted,
            PlatformPermission::Denied => CameraPermission::Denied,
            PlatformPermission::Prompt => CameraPermission::Prompt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("permission refused: {0}")]
    NotAllowed(String),
    #[error("no camera device found")]
    NotFound,
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// An acquired camera stream. Only used to probe availability.
#[derive(Debug, PartialEq, Eq)]
pub struct CameraStream {
    pub id: u64,
}

pub trait CameraPlatform {
    /// Query the current permission without prompting. `None` when the
    /// platform has no query capability.
    fn query_permission(&mut self) -> Option<Result<PlatformPermission, CameraError>>;

    /// Acquire the camera, prompting the user if needed.
    fn acquire(&mut self) -> Result<CameraStream, CameraError>;

    fn release(&mut self, stream: CameraStream);

    fn browser(&self) -> Browser;
}

// ---------------------------------------------------------------------------
// Remediation
// ---------------------------------------------------------------------------

/// Browser-specific instructions for re-enabling the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionHelp {
    pub browser: Browser,
    pub steps: &'static [&'static str],
}

impl Browser {
    pub fn slug(self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Safari => "safari",
            Browser::Firefox => "firefox",
            Browser::Edge => "edge",
            Browser::Other => "other",
        }
    }
}

pub fn remediation_for(browser: Browser) -> PermissionHelp {
    let steps: &'static [&'static str] = match browser {
        Browser::Chrome => &[
            "Tap the lock icon next to the address bar.",
            "Open Permissions and set Camera to Allow.",
            "Reload the page.",
        ],
        Browser::Safari => &[
            "Open Settings > Safari > Camera.",
            "Choose Allow or Ask.",
            "Return to the page and reload it.",
        ],
        Browser::Firefox => &[
            "Tap the camera icon in the address bar.",
            "Remove the blocked permission.",
            "Reload the page and allow camera access.",
        ],
        Browser::Edge => &[
            "Open Settings > Site permissions > Camera.",
            "Remove this site from the Block list.",
            "Reload the page.",
        ],
        Browser::Other => &[
            "Open your browser's site settings.",
            "Allow camera access for this site.",
            "Reload the page.",
        ],
    };
    PermissionHelp { browser, steps }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionChange {
    pub from: CameraPermission,
    pub to: CameraPermission,
}

#[derive(Clone)]
pub struct CameraManager {
    ctx: Context,
    platform: Rc<RefCell<Box<dyn CameraPlatform>>>,
    listeners: ListenerList<PermissionChange>,
}

impl std::fmt::Debug for CameraManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraManager")
            .field("permission", &self.permission())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl CameraManager {
    pub fn new(ctx: Context, platform: Box<dyn CameraPlatform>) -> Self {
        Self {
            ctx,
            platform: Rc::new(RefCell::new(platform)),
            listeners: ListenerList::new(),
        }
    }

    pub fn permission(&self) -> CameraPermission {
        self.ctx.state().camera_permission
    }

    pub fn browser(&self) -> Browser {
        self.platform.borrow().browser()
    }

    /// Resolve the permission through the platform query, or through a
    /// probing access request when no query is available or the user has
    /// not answered yet. Always ends in `Granted` or `Denied`.
    pub fn check_permission(&self) -> CameraPermission {
        let answer = self.platform.borrow_mut().query_permission();
        match answer {
            Some(Ok(PlatformPermission::Prompt)) => self.request_access(),
            Some(Ok(permission)) => {
                self.set_permission(permission.into(), "blocked in browser settings")
            }
            Some(Err(err)) => {
                tracing::warn!(%err, "permission query failed, probing instead");
                self.request_access()
            }
            None => self.request_access(),
        }
    }

    /// Probe the camera: acquire it and release the stream right away.
    pub fn request_access(&self) -> CameraPermission {
        self.set_permission(CameraPermission::Prompt, "");
        let acquired = self.platform.borrow_mut().acquire();
        match acquired {
            Ok(stream) => {
                self.platform.borrow_mut().release(stream);
                self.set_permission(CameraPermission::Granted, "")
            }
            Err(err) => self.set_permission(CameraPermission::Denied, &err.to_string()),
        }
    }

    /// A long-lived platform subscription reported a change, e.g. the user
    /// revoked access in the browser settings.
    pub fn platform_permission_changed(&self, permission: PlatformPermission) -> CameraPermission {
        self.set_permission(permission.into(), "revoked in browser settings")
    }

    /// Listen to every permission transition.
    pub fn on_permission_change(
        &self,
        listener: impl Fn(&PermissionChange) + 'static,
    ) -> Unsubscribe {
        self.listeners.add(listener)
    }

    /// Release listeners.
    pub fn teardown(&self) {
        self.listeners.clear();
    }

    fn set_permission(&self, to: CameraPermission, reason: &str) -> CameraPermission {
        let from = self.permission();
        if from == to {
            return to;
        }
        self.ctx.store.update(|s| s.camera_permission = to);
        tracing::info!(?from, ?to, "camera permission changed");

        let change = PermissionChange { from, to };
        self.listeners.notify(&change);
        self.ctx.emit(AppEvent::CameraPermissionChanged { from, to });

        if to == CameraPermission::Denied {
            let browser = self.browser();
            let action = RemediationAction {
                label: "How to enable the camera".to_string(),
                action: RecoveryAction::ShowPermissionHelp { browser },
            };
            self.ctx.errors.raise(
                &AppError::PermissionDenied {
                    reason: reason.to_string(),
                },
                Some(action),
            );
        }
        to
    }
}
