//! Chapter QR codes.
//!
//! Printed codes carry a URL of the form
//! `<origin>/?code=c-<chapterId>&osct=<content version>`. Anything that does
//! not match is rejected without an error; a version mismatch is only
//! logged since older prints should keep working.

use crate::id::ChapterId;
use url::Url;

const CODE_PARAM: &str = "code";
const VERSION_PARAM: &str = "osct";
const CHAPTER_PREFIX: &str = "c-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterCode {
    pub chapter: ChapterId,
    /// Content version the code was printed for, if present.
    pub version: Option<String>,
}

/// Parse a decoded QR payload.
pub fn parse_chapter_code(text: &str, expected_version: Option<&str>) -> Option<ChapterCode> {
    let url = match Url::parse(text.trim()) {
        Ok(url) => url,
        Err(err) => {
            tracing::debug!(%err, "QR payload is not a URL");
            return None;
        }
    };

    let mut code = None;
    let mut version = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            CODE_PARAM if code.is_none() => code = Some(value.into_owned()),
            VERSION_PARAM if version.is_none() => version = Some(value.into_owned()),
            _ => {}
        }
    }

    let Some(code) = code else {
        tracing::debug!(%url, "QR URL has no chapter code");
        return None;
    };
    let chapter = match code.strip_prefix(CHAPTER_PREFIX) {
        Some(id) if !id.trim().is_empty() => ChapterId::from(id.trim()),
        _ => {
            tracing::debug!(code, "QR chapter code is malformed");
            return None;
        }
    };

    if let (Some(expected), Some(found)) = (expected_version, version.as_deref()) {
        if expected != found {
            tracing::warn!(expected, found, %chapter, "QR code printed for another content version");
        }
    }

    Some(ChapterCode { chapter, version })
}

/// Build the URL printed into a chapter's QR code.
pub fn chapter_code_url(
    origin: &str,
    chapter: &ChapterId,
    version: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(origin)?;
    url.set_path("/");
    url.query_pairs_mut()
        .clear()
        .append_pair(CODE_PARAM, &format!("{CHAPTER_PREFIX}{chapter}"))
        .append_pair(VERSION_PARAM, version);
    Ok(url)
}
