//! Runtime settings.
//!
//! Every field has a default, so a settings file only needs the values it
//! changes. Loading from disk lives in `bookgame-data`.

use crate::clock::Millis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Quiet period before a target found/lost event takes effect. Tracking
    /// jitter is engine specific, so this is tuned per engine.
    pub target_debounce_ms: Millis,
    /// Number of delivered events kept for inspection.
    pub event_history: usize,
    /// Number of drained scene commands kept for inspection. 0 disables it.
    pub command_history: usize,
    /// Undrained error notifications kept before the oldest is dropped.
    pub notification_capacity: usize,
    /// Log a warning when a scanned QR code was printed for another content
    /// version.
    pub check_content_version: bool,
    /// Origin used when generating chapter QR URLs.
    pub qr_origin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_debounce_ms: 50,
            event_history: 256,
            command_history: 0,
            notification_capacity: 32,
            check_content_version: true,
            qr_origin: "https://book.local".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.target_debounce_ms, 50);
        assert!(config.check_content_version);
        assert_eq!(config.notification_capacity, 32);
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{ "target_debounce_ms": 120 }"#).unwrap();
        assert_eq!(config.target_debounce_ms, 120);
        assert_eq!(config.event_history, 256);
        assert_eq!(config.qr_origin, "https://book.local");
    }
}
