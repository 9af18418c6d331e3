//! Reads the content document and the runtime settings from disk.
//!
//! Provides format detection (RON/JSON/TOML) by extension, file discovery by
//! base name, and the two entry points [`load_content`] and
//! [`load_settings`].

use crate::validate::{ContentIssue, validate_content};
use bookgame_core::config::AppConfig;
use bookgame_core::content::Content;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Base name of the content document inside a book directory.
pub const CONTENT_FILE: &str = "content";
/// Base name of the optional settings file.
pub const SETTINGS_FILE: &str = "settings";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The document parsed but its cross references do not hold.
    #[error("invalid content in {file}: {}", join_issues(.issues))]
    Invalid {
        file: PathBuf,
        issues: Vec<ContentIssue>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_issues(issues: &[ContentIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`. More than one
/// match is an error.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let text = std::fs::read_to_string(path)?;
    deserialize_str(&text, format, path)
}

/// Deserialize `text` as `format`. `origin` only names the source in errors.
pub fn deserialize_str<T: DeserializeOwned>(
    text: &str,
    format: Format,
    origin: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(text).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string())),
    }
}

// ===========================================================================
// Entry points
// ===========================================================================

/// Load and validate the content document at `path`. Fatal issues fail the
/// load; the rest are logged.
pub fn load_content(path: &Path) -> Result<Content, DataLoadError> {
    let content: Content = deserialize_file(path)?;
    check_content(content, path)
}

/// Validate an already parsed document, attributing issues to `origin`.
pub fn check_content(content: Content, origin: &Path) -> Result<Content, DataLoadError> {
    let (fatal, warnings): (Vec<_>, Vec<_>) = validate_content(&content)
        .into_iter()
        .partition(ContentIssue::is_fatal);

    for issue in &warnings {
        tracing::warn!(file = %origin.display(), "{issue}");
    }
    if !fatal.is_empty() {
        return Err(DataLoadError::Invalid {
            file: origin.to_path_buf(),
            issues: fatal,
        });
    }

    tracing::info!(
        file = %origin.display(),
        version = %content.version.version,
        chapters = content.chapters.len(),
        steps = content.tutorial.len(),
        "content loaded"
    );
    Ok(content)
}

/// Load `settings.{ron,toml,json}` from `dir`, or defaults when absent.
pub fn load_settings(dir: &Path) -> Result<AppConfig, DataLoadError> {
    match find_data_file(dir, SETTINGS_FILE)? {
        Some(path) => {
            let config: AppConfig = deserialize_file(&path)?;
            tracing::info!(file = %path.display(), ?config, "settings loaded");
            Ok(config)
        }
        None => {
            tracing::info!(dir = %dir.display(), "no settings file, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// A book directory: its content document and settings.
#[derive(Debug, Clone)]
pub struct BookData {
    pub content: Content,
    pub config: AppConfig,
}

/// Load `content.*` (required) and `settings.*` (optional) from `dir`.
pub fn load_book(dir: &Path) -> Result<BookData, DataLoadError> {
    let content = load_content(&require_data_file(dir, CONTENT_FILE)?)?;
    let config = load_settings(dir)?;
    Ok(BookData { content, config })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "bookgame_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const CONTENT_JSON: &str = r#"{
        "version": { "version": "1.0.0", "timestamp": "2024-05-01T10:00:00Z" },
        "initialChapterId": "c1",
        "chapters": [
            { "id": "c1", "order": 0, "firstPage": 1, "lastPage": 4, "title": "One",
              "mindSrc": "c1.mind",
              "targets": [ { "id": "t1", "mindarTargetIndex": 0, "title": "Cover" } ] }
        ],
        "tutorial": [ { "id": "welcome", "title": "Welcome" } ]
    }"#;

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_known_formats() {
        assert_eq!(detect_format(Path::new("content.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("content.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("content.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        for name in ["content.yaml", "content"] {
            assert!(matches!(
                detect_format(Path::new(name)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_missing_and_found() {
        let dir = make_test_dir("find");
        assert_eq!(find_data_file(&dir, "settings").unwrap(), None);
        fs::write(dir.join("settings.toml"), "").unwrap();
        assert_eq!(
            find_data_file(&dir, "settings").unwrap(),
            Some(dir.join("settings.toml"))
        );
        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("conflict");
        fs::write(dir.join("settings.ron"), "()").unwrap();
        fs::write(dir.join("settings.json"), "{}").unwrap();
        assert!(matches!(
            find_data_file(&dir, "settings"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require");
        let err = require_data_file(&dir, CONTENT_FILE).unwrap_err();
        assert!(err.to_string().contains("'content' not found"));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    #[test]
    fn load_content_json() {
        let dir = make_test_dir("content_json");
        let path = dir.join("content.json");
        fs::write(&path, CONTENT_JSON).unwrap();

        let content = load_content(&path).unwrap();
        assert_eq!(content.chapters[0].targets[0].id, "t1");
        assert_eq!(content.tutorial.len(), 1);

        cleanup(&dir);
    }

    #[test]
    fn load_content_ron() {
        let dir = make_test_dir("content_ron");
        let path = dir.join("content.ron");
        fs::write(
            &path,
            r#"(
                version: (version: "2.0.0", timestamp: "2024-06-01T00:00:00Z"),
                initialChapterId: "c1",
                chapters: [
                    (id: "c1", order: 0, firstPage: 1, lastPage: 2, title: "One",
                     mindSrc: "c1.mind", targets: []),
                ],
            )"#,
        )
        .unwrap();

        let content = load_content(&path).unwrap();
        assert_eq!(content.version.version, "2.0.0");
        assert!(content.tutorial.is_empty());

        cleanup(&dir);
    }

    #[test]
    fn invalid_content_lists_issues() {
        let dir = make_test_dir("content_invalid");
        let path = dir.join("content.json");
        fs::write(&path, CONTENT_JSON.replace(r#""initialChapterId": "c1""#, r#""initialChapterId": "c9""#))
            .unwrap();

        let err = load_content(&path).unwrap_err();
        let DataLoadError::Invalid { issues, .. } = &err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert_eq!(issues.len(), 1);
        assert!(err.to_string().contains("c9"));

        cleanup(&dir);
    }

    #[test]
    fn malformed_content_is_parse_error() {
        let dir = make_test_dir("content_parse");
        let path = dir.join("content.json");
        fs::write(&path, r#"{ "chapters": 3 }"#).unwrap();
        assert!(matches!(load_content(&path), Err(DataLoadError::Parse { .. })));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    #[test]
    fn settings_default_when_absent() {
        let dir = make_test_dir("settings_absent");
        assert_eq!(load_settings(&dir).unwrap(), AppConfig::default());
        cleanup(&dir);
    }

    #[test]
    fn settings_toml_overrides() {
        let dir = make_test_dir("settings_toml");
        fs::write(
            dir.join("settings.toml"),
            "target_debounce_ms = 80\nqr_origin = \"https://book.example\"\n",
        )
        .unwrap();

        let config = load_settings(&dir).unwrap();
        assert_eq!(config.target_debounce_ms, 80);
        assert_eq!(config.qr_origin, "https://book.example");
        assert_eq!(config.event_history, AppConfig::default().event_history);

        cleanup(&dir);
    }

    #[test]
    fn load_book_reads_both_files() {
        let dir = make_test_dir("book");
        fs::write(dir.join("content.json"), CONTENT_JSON).unwrap();
        fs::write(dir.join("settings.ron"), "(check_content_version: false)").unwrap();

        let book = load_book(&dir).unwrap();
        assert_eq!(book.content.initial_chapter_id.as_str(), "c1");
        assert!(!book.config.check_content_version);

        cleanup(&dir);
    }
}
