//! On-disk naming: `<root>/window-<id>/<domain>/<category>/<filename>`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

const MAX_NAME_LEN: usize = 100;

/// Folder a response body is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Html,
    Json,
    Images,
    Js,
    Css,
    Others,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::Images => "images",
            Self::Js => "js",
            Self::Css => "css",
            Self::Others => "others",
        }
    }

    /// Categories whose bodies are text and may be reformatted.
    pub fn is_textual(&self) -> bool {
        !matches!(self, Self::Images | Self::Others)
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace anything outside `[A-Za-z0-9-_.]` with `_`, after trimming slashes.
/// Over-long names keep a prefix plus a short hash of the full name.
pub fn sanitize_segment(s: &str) -> String {
    let cleaned: String = s
        .trim_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // ".." and "." must never become path components.
    let cleaned = if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    };
    if cleaned.len() <= MAX_NAME_LEN {
        return cleaned;
    }
    let digest = Sha256::digest(cleaned.as_bytes());
    let hash = format!("{:x}", digest);
    format!("{}-{}", &cleaned[..MAX_NAME_LEN - 10], &hash[..8])
}

/// Host of the URL, sanitized; `unknown-host` for URLs without one.
pub fn domain_for_url(url: &Url) -> String {
    match url.host_str() {
        Some(host) if !host.is_empty() => sanitize_segment(host),
        _ => "unknown-host".to_string(),
    }
}

/// Last path segment of the URL; `index.html` for the root path.
pub fn filename_for_url(url: &Url) -> String {
    let last = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("");
    if last.is_empty() {
        "index.html".to_string()
    } else {
        sanitize_segment(last)
    }
}

/// Extension of a filename, lowercased, without the dot.
pub fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_filename_for_url() {
        assert_eq!(filename_for_url(&url("https://example.com/")), "index.html");
        assert_eq!(filename_for_url(&url("https://example.com")), "index.html");
        assert_eq!(filename_for_url(&url("https://example.com/static/app.js?v=3")), "app.js");
        assert_eq!(filename_for_url(&url("https://example.com/api/items/")), "items");
        assert_eq!(filename_for_url(&url("https://example.com/a%20b.css")), "a_20b.css");
    }

    #[test]
    fn test_domain_for_url() {
        assert_eq!(domain_for_url(&url("https://api.example.com:8443/x")), "api.example.com");
        assert_eq!(domain_for_url(&url("data:text/plain,hi")), "unknown-host");
    }

    #[test]
    fn test_long_names_are_hashed() {
        let long = "x".repeat(300);
        let name = sanitize_segment(&long);
        assert_eq!(name.len(), MAX_NAME_LEN - 1);
        assert!(name.starts_with("xxxx"));
        assert_ne!(sanitize_segment(&format!("{}y", long)), name);
    }

    #[test]
    fn test_dot_segments_are_neutralized() {
        assert_eq!(sanitize_segment(".."), "__");
        assert_eq!(sanitize_segment("."), "_");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("logo.PNG").as_deref(), Some("png"));
        assert_eq!(extension("index.html").as_deref(), Some("html"));
        assert_eq!(extension("items"), None);
        assert_eq!(extension(".hidden"), None);
    }
}
