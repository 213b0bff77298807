use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of a browser window; captures are partitioned by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl WindowId {
    pub fn dir_name(&self) -> String {
        format!("window-{}", self.0)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Verbose,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Map a console API type or log entry level onto the four capture levels.
    pub fn from_protocol(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "verbose" | "debug" | "trace" => Self::Verbose,
            "warning" | "warn" => Self::Warning,
            "error" | "assert" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verbose => "verbose",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub index: u64,
    pub timestamp: i64,
    pub level: LogLevel,
    pub message: String,
    pub source: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub index: u64,
    pub timestamp: i64,
    pub correlation_id: String,
    pub url: String,
    pub domain: String,
    /// Path plus query string.
    pub path: String,
    pub method: String,
    pub resource_type: String,
    /// Request Content-Type when present, otherwise the resource type.
    pub mime_type: String,
    pub post_data_size: u64,
}

pub type Headers = serde_json::Map<String, serde_json::Value>;

/// Everything known about one request. Filled in across several protocol
/// events; fields for events that never arrived stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetail {
    pub correlation_id: String,
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub request_headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data_file: Option<PathBuf>,
    #[serde(default)]
    pub post_data_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<Headers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_is_binary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_data_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl RequestDetail {
    pub fn is_complete(&self) -> bool {
        self.response_body_size.is_some()
    }
}

/// One page of an ordered sequence. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub data: Vec<T>,
}

impl<T: Clone> Page<T> {
    pub fn slice<'a, I>(items: I, page: usize, page_size: usize) -> Self
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let all: Vec<&T> = items.into_iter().collect();
        let total = all.len();
        let start = (page - 1).saturating_mul(page_size);
        let data = all
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();
        Self {
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size),
            data,
        }
    }
}
