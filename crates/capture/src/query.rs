//! Read-only accessors over captured windows.
//!
//! Logs, request summaries and the URL queue are served from memory and
//! therefore only cover the current epoch. Request details prefer the
//! sidecar on disk and fall back to memory.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wincap_core::config::QueryConfig;
use wincap_core::{Error, LogEntry, LogLevel, Page, RequestDetail, RequestSummary, Result, WindowId};

use crate::registry::CaptureRegistry;

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Case-insensitive substring of the message.
    pub keyword: Option<String>,
    pub level: Option<LogLevel>,
}

impl LogFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(level) = self.level {
            if entry.level != level {
                return false;
            }
        }
        match &self.keyword {
            Some(k) => contains_ignore_case(&entry.message, k),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    /// Case-insensitive substring of the URL or the inline request body.
    pub keyword: Option<String>,
    /// Substring of the request's mime type, e.g. `json` or `Script`.
    pub doc_type: Option<String>,
    /// Case-insensitive regex over the URL.
    pub url_pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailSource {
    Sidecar,
    Memory,
}

/// A request detail together with where it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub index: u64,
    pub epoch: u64,
    pub source: DetailSource,
    pub detail: RequestDetail,
}

/// URL matcher: a regex when the pattern compiles, a plain substring
/// otherwise.
enum UrlMatcher {
    Regex(Regex),
    Substring(String),
}

impl UrlMatcher {
    fn new(pattern: &str) -> Self {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => UrlMatcher::Regex(re),
            Err(_) => UrlMatcher::Substring(pattern.to_lowercase()),
        }
    }

    fn is_match(&self, url: &str) -> bool {
        match self {
            UrlMatcher::Regex(re) => re.is_match(url),
            UrlMatcher::Substring(s) => url.to_lowercase().contains(s.as_str()),
        }
    }
}

pub struct CaptureQuery {
    registry: Arc<CaptureRegistry>,
    settings: QueryConfig,
}

impl CaptureQuery {
    pub fn new(registry: Arc<CaptureRegistry>, settings: QueryConfig) -> Self {
        Self { registry, settings }
    }

    fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.default_page_size)
            .clamp(1, self.settings.max_page_size.max(1))
    }

    pub async fn get_logs(&self, window: WindowId, page: usize, page_size: Option<usize>) -> Result<Page<LogEntry>> {
        self.get_logs_filtered(window, &LogFilter::default(), page, page_size)
            .await
    }

    pub async fn get_logs_filtered(
        &self,
        window: WindowId,
        filter: &LogFilter,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Page<LogEntry>> {
        let state = self.registry.correlator(window).await?.state();
        let state = state.lock().await;
        Ok(Page::slice(
            state.logs().iter().filter(|e| filter.matches(e)),
            page,
            self.page_size(page_size),
        ))
    }

    pub async fn get_requests(
        &self,
        window: WindowId,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Page<RequestSummary>> {
        let state = self.registry.correlator(window).await?.state();
        let state = state.lock().await;
        Ok(Page::slice(state.requests(), page, self.page_size(page_size)))
    }

    pub async fn filter_requests(
        &self,
        window: WindowId,
        filter: &RequestFilter,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Page<RequestSummary>> {
        let matcher = filter.url_pattern.as_deref().map(UrlMatcher::new);
        let state = self.registry.correlator(window).await?.state();
        let state = state.lock().await;

        let matched = state.requests().iter().filter(|summary| {
            if let Some(m) = &matcher {
                if !m.is_match(&summary.url) {
                    return false;
                }
            }
            if let Some(doc_type) = &filter.doc_type {
                if !contains_ignore_case(&summary.mime_type, doc_type) {
                    return false;
                }
            }
            match &filter.keyword {
                Some(k) => {
                    contains_ignore_case(&summary.url, k)
                        || state
                            .detail(summary.index)
                            .and_then(|d| d.post_data.as_deref())
                            .is_some_and(|body| contains_ignore_case(body, k))
                }
                None => true,
            }
        });
        Ok(Page::slice(matched, page, self.page_size(page_size)))
    }

    /// The window's distinct request URLs in first-seen order.
    pub async fn get_request_urls(
        &self,
        window: WindowId,
        url_pattern: Option<&str>,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<Page<String>> {
        let matcher = url_pattern.map(UrlMatcher::new);
        let state = self.registry.correlator(window).await?.state();
        let state = state.lock().await;
        Ok(Page::slice(
            state
                .urls()
                .iter()
                .filter(|url| matcher.as_ref().map_or(true, |m| m.is_match(url))),
            page,
            self.page_size(page_size),
        ))
    }

    /// Sidecar on disk first, then the current epoch's memory.
    pub async fn get_request_detail(&self, window: WindowId, index: u64) -> Result<RequestRecord> {
        if let Some(record) = self.registry.store().find_sidecar_by_index(window, index)? {
            return Ok(RequestRecord {
                index,
                epoch: record.epoch,
                source: DetailSource::Sidecar,
                detail: record.detail,
            });
        }

        let state = self.registry.correlator(window).await?.state();
        let state = state.lock().await;
        state
            .detail(index)
            .map(|detail| RequestRecord {
                index,
                epoch: state.epoch(),
                source: DetailSource::Memory,
                detail: detail.clone(),
            })
            .ok_or_else(|| Error::NotFound(format!("request {} in window {}", index, window)))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::EventCorrelator;
    use crate::testing::{finished, registry, request, response, FakeSession};
    use tempfile::TempDir;
    use wincap_browser::events::ConsoleMessage;

    const WINDOW: WindowId = WindowId(1);

    async fn setup(dir: &TempDir, session: FakeSession) -> (CaptureQuery, Arc<EventCorrelator>) {
        let registry = Arc::new(registry(dir));
        let correlator = registry.open_window(WINDOW, Arc::new(session)).await;
        let query = CaptureQuery::new(
            registry,
            QueryConfig {
                default_page_size: 2,
                max_page_size: 3,
            },
        );
        (query, correlator)
    }

    async fn log(correlator: &EventCorrelator, level: LogLevel, message: &str) {
        correlator
            .on_console_message(ConsoleMessage {
                level,
                message: message.to_string(),
                source: Default::default(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_logs_pagination() {
        let dir = TempDir::new().unwrap();
        let (query, correlator) = setup(&dir, FakeSession::new()).await;
        for i in 0..5 {
            log(&correlator, LogLevel::Info, &format!("line {}", i)).await;
        }

        let first = query.get_logs(WINDOW, 1, None).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.page_size, 2);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.data[0].index, 1);

        let last = query.get_logs(WINDOW, 3, None).await.unwrap();
        assert_eq!(last.data.len(), 1);
        assert_eq!(last.data[0].message, "line 4");

        let clamped = query.get_logs(WINDOW, 0, Some(100)).await.unwrap();
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.page_size, 3);

        let beyond = query.get_logs(WINDOW, 9, None).await.unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[tokio::test]
    async fn test_get_logs_filtered() {
        let dir = TempDir::new().unwrap();
        let (query, correlator) = setup(&dir, FakeSession::new()).await;
        log(&correlator, LogLevel::Info, "Loaded config").await;
        log(&correlator, LogLevel::Error, "Failed to load CONFIG").await;
        log(&correlator, LogLevel::Error, "Uncaught TypeError").await;

        let filter = LogFilter {
            keyword: Some("config".into()),
            level: Some(LogLevel::Error),
        };
        let page = query.get_logs_filtered(WINDOW, &filter, 1, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].index, 2);
    }

    #[tokio::test]
    async fn test_reset_empties_queries() {
        let dir = TempDir::new().unwrap();
        let (query, correlator) = setup(&dir, FakeSession::new()).await;
        log(&correlator, LogLevel::Info, "before").await;
        correlator.handle(request("r1", "https://example.com/", None)).await;

        correlator.reset().await;
        assert_eq!(query.get_logs(WINDOW, 1, None).await.unwrap().total, 0);
        assert_eq!(query.get_requests(WINDOW, 1, None).await.unwrap().total, 0);

        correlator.handle(request("r2", "https://example.com/next", None)).await;
        let page = query.get_requests(WINDOW, 1, None).await.unwrap();
        assert_eq!(page.data[0].index, 1);
    }

    #[tokio::test]
    async fn test_filter_requests() {
        let dir = TempDir::new().unwrap();
        let (query, correlator) = setup(&dir, FakeSession::new()).await;
        correlator.handle(request("r1", "https://example.com/", None)).await;
        correlator
            .handle(request("r2", "https://api.example.com/login", Some("{\"user\":\"alice\"}".into())))
            .await;
        correlator.handle(request("r3", "https://cdn.example.com/app.js", None)).await;

        let by_body = RequestFilter {
            keyword: Some("ALICE".into()),
            ..Default::default()
        };
        let page = query.filter_requests(WINDOW, &by_body, 1, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].correlation_id, "r2");

        let by_type = RequestFilter {
            doc_type: Some("json".into()),
            ..Default::default()
        };
        assert_eq!(query.filter_requests(WINDOW, &by_type, 1, None).await.unwrap().total, 1);

        let by_regex = RequestFilter {
            url_pattern: Some(r"^https://(api|cdn)\.".into()),
            ..Default::default()
        };
        assert_eq!(query.filter_requests(WINDOW, &by_regex, 1, None).await.unwrap().total, 2);

        let broken = RequestFilter {
            url_pattern: Some("app.js(".into()),
            ..Default::default()
        };
        assert_eq!(query.filter_requests(WINDOW, &broken, 1, None).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_request_urls_are_distinct() {
        let dir = TempDir::new().unwrap();
        let (query, correlator) = setup(&dir, FakeSession::new()).await;
        correlator.handle(request("r1", "https://example.com/", None)).await;
        correlator.handle(request("r2", "https://example.com/", None)).await;
        correlator.handle(request("r3", "https://example.com/app.js", None)).await;

        let all = query.get_request_urls(WINDOW, None, 1, Some(10)).await.unwrap();
        assert_eq!(all.data, vec!["https://example.com/", "https://example.com/app.js"]);
        let scripts = query.get_request_urls(WINDOW, Some(r"\.JS$"), 1, None).await.unwrap();
        assert_eq!(scripts.total, 1);
    }

    #[tokio::test]
    async fn test_detail_survives_reset() {
        let dir = TempDir::new().unwrap();
        let session = FakeSession::new().with_body("r1", "<p>ok</p>", false);
        let (query, correlator) = setup(&dir, session).await;
        correlator.handle(request("r1", "https://example.com/", None)).await;
        correlator.handle(response("r1", "text/html")).await;
        correlator.handle(finished("r1")).await;
        correlator.flush().await;

        let before = query.get_request_detail(WINDOW, 1).await.unwrap();
        assert_eq!(before.source, DetailSource::Sidecar);
        correlator.reset().await;
        let after = query.get_request_detail(WINDOW, 1).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(after.detail.response_body.as_deref(), Some("<p>ok</p>\n"));
        assert_eq!(after.detail.response_body_size, Some(10));
    }

    #[tokio::test]
    async fn test_partial_detail_from_memory() {
        let dir = TempDir::new().unwrap();
        let (query, correlator) = setup(&dir, FakeSession::new()).await;
        correlator.handle(request("r1", "https://example.com/pending", None)).await;
        correlator.handle(response("r1", "text/html")).await;

        let record = query.get_request_detail(WINDOW, 1).await.unwrap();
        assert_eq!(record.source, DetailSource::Memory);
        assert_eq!(record.detail.status, Some(200));
        assert!(record.detail.response_body_size.is_none());

        correlator.reset().await;
        let err = query.get_request_detail(WINDOW, 1).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
