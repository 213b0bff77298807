//! Page target discovery through the browser's `/json/list` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use wincap_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTarget {
    pub id: String,
    pub title: String,
    pub url: String,
    pub web_socket_debugger_url: String,
}

/// Keep only debuggable `page` targets from a `/json/list` payload.
pub fn page_targets(targets: &[Value]) -> Vec<PageTarget> {
    targets
        .iter()
        .filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .filter_map(|t| {
            Some(PageTarget {
                id: t.get("id").and_then(|v| v.as_str())?.to_string(),
                title: t.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                url: t.get("url").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                web_socket_debugger_url: t
                    .get("webSocketDebuggerUrl")
                    .and_then(|v| v.as_str())?
                    .to_string(),
            })
        })
        .collect()
}

/// List page targets on a local debugging port.
pub async fn list_page_targets(port: u16) -> Result<Vec<PageTarget>> {
    let url = format!("http://127.0.0.1:{}/json/list", port);
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| Error::Connection(format!("GET {} failed: {}", url, e)))?;
    let targets: Vec<Value> = resp
        .json()
        .await
        .map_err(|e| Error::Connection(format!("Invalid /json/list response: {}", e)))?;
    Ok(page_targets(&targets))
}

/// Resolve the WebSocket URL of a page target, the first page when
/// `target_id` is `None`. Polls a few times since a freshly opened page may
/// not be listed yet.
pub async fn page_ws_url(port: u16, target_id: Option<&str>, attempts: u32) -> Result<String> {
    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        let targets = match list_page_targets(port).await {
            Ok(t) => t,
            Err(e) => {
                debug!(attempt, error = %e, "Page target discovery failed");
                continue;
            }
        };

        let found = match target_id {
            Some(id) => targets.into_iter().find(|t| t.id == id),
            None => targets.into_iter().next(),
        };
        if let Some(target) = found {
            return Ok(target.web_socket_debugger_url);
        }
    }

    Err(match target_id {
        Some(id) => Error::NotFound(format!(
            "No WebSocket URL found for target '{}' on port {}",
            id, port
        )),
        None => Error::NotFound(format!("No page target found on port {}", port)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_targets_filters_non_pages() {
        let list = vec![
            json!({"id": "A", "type": "page", "title": "Example", "url": "https://example.com/", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/A"}),
            json!({"id": "B", "type": "service_worker", "url": "https://example.com/sw.js", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/B"}),
            json!({"id": "C", "type": "page", "url": "about:blank"}),
        ];
        let pages = page_targets(&list);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].id, "A");
        assert_eq!(pages[0].title, "Example");
    }
}
