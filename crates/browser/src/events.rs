//! Typed views of the protocol events the capture pipeline consumes.

use serde_json::Value;
use wincap_core::{Headers, LogLevel, SourceLocation};

pub const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
pub const RESPONSE_RECEIVED: &str = "Network.responseReceived";
pub const LOADING_FINISHED: &str = "Network.loadingFinished";
pub const LOADING_FAILED: &str = "Network.loadingFailed";
pub const CONSOLE_API_CALLED: &str = "Runtime.consoleAPICalled";
pub const LOG_ENTRY_ADDED: &str = "Log.entryAdded";
pub const FRAME_STARTED_LOADING: &str = "Page.frameStartedLoading";
pub const INSPECTOR_DETACHED: &str = "Inspector.detached";
pub const TARGET_DESTROYED: &str = "Target.targetDestroyed";

/// Every method the capture pipeline subscribes to.
pub const CAPTURE_EVENTS: [&str; 9] = [
    REQUEST_WILL_BE_SENT,
    RESPONSE_RECEIVED,
    LOADING_FINISHED,
    LOADING_FAILED,
    CONSOLE_API_CALLED,
    LOG_ENTRY_ADDED,
    FRAME_STARTED_LOADING,
    INSPECTOR_DETACHED,
    TARGET_DESTROYED,
];

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSent {
    pub correlation_id: String,
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub post_data: Option<String>,
    pub resource_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseReceived {
    pub correlation_id: String,
    pub mime_type: Option<String>,
    pub headers: Headers,
    pub status: Option<u16>,
    pub status_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadingFinished {
    pub correlation_id: String,
    pub encoded_data_length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadingFailed {
    pub correlation_id: String,
    pub error_text: String,
    pub canceled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleMessage {
    pub level: LogLevel,
    pub message: String,
    pub source: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    RequestSent(RequestSent),
    ResponseReceived(ResponseReceived),
    LoadingFinished(LoadingFinished),
    LoadingFailed(LoadingFailed),
    ConsoleMessage(ConsoleMessage),
    NavigationStarted { frame_id: String },
    WindowClosed { reason: String },
}

impl ProtocolEvent {
    /// Decode a raw event. Unknown methods and params missing required
    /// fields yield `None`.
    pub fn from_cdp(method: &str, params: &Value) -> Option<Self> {
        match method {
            REQUEST_WILL_BE_SENT => {
                let request = params.get("request")?;
                Some(Self::RequestSent(RequestSent {
                    correlation_id: str_field(params, "requestId")?,
                    url: str_field(request, "url")?,
                    method: str_field(request, "method").unwrap_or_else(|| "GET".into()),
                    headers: headers_field(request, "headers"),
                    post_data: str_field(request, "postData"),
                    resource_type: str_field(params, "type"),
                }))
            }
            RESPONSE_RECEIVED => {
                let response = params.get("response")?;
                Some(Self::ResponseReceived(ResponseReceived {
                    correlation_id: str_field(params, "requestId")?,
                    mime_type: str_field(response, "mimeType"),
                    headers: headers_field(response, "headers"),
                    status: response
                        .get("status")
                        .and_then(|v| v.as_f64())
                        .map(|s| s as u16),
                    status_text: str_field(response, "statusText").filter(|s| !s.is_empty()),
                }))
            }
            LOADING_FINISHED => Some(Self::LoadingFinished(LoadingFinished {
                correlation_id: str_field(params, "requestId")?,
                encoded_data_length: params
                    .get("encodedDataLength")
                    .and_then(|v| v.as_f64())
                    .map(|n| n as u64),
            })),
            LOADING_FAILED => Some(Self::LoadingFailed(LoadingFailed {
                correlation_id: str_field(params, "requestId")?,
                error_text: str_field(params, "errorText").unwrap_or_default(),
                canceled: params
                    .get("canceled")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            })),
            CONSOLE_API_CALLED => Some(Self::ConsoleMessage(console_api_message(params))),
            LOG_ENTRY_ADDED => {
                let entry = params.get("entry")?;
                Some(Self::ConsoleMessage(ConsoleMessage {
                    level: LogLevel::from_protocol(
                        entry.get("level").and_then(|v| v.as_str()).unwrap_or("info"),
                    ),
                    message: str_field(entry, "text").unwrap_or_default(),
                    source: SourceLocation {
                        url: str_field(entry, "url"),
                        line: u32_field(entry, "lineNumber"),
                        column: None,
                    },
                }))
            }
            FRAME_STARTED_LOADING => Some(Self::NavigationStarted {
                frame_id: str_field(params, "frameId")?,
            }),
            INSPECTOR_DETACHED => Some(Self::WindowClosed {
                reason: str_field(params, "reason").unwrap_or_default(),
            }),
            TARGET_DESTROYED => {
                str_field(params, "targetId")?;
                Some(Self::WindowClosed {
                    reason: "target_destroyed".into(),
                })
            }
            _ => None,
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn u32_field(value: &Value, key: &str) -> Option<u32> {
    value.get(key).and_then(|v| v.as_u64()).map(|n| n as u32)
}

fn headers_field(value: &Value, key: &str) -> Headers {
    value
        .get(key)
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default()
}

fn console_api_message(params: &Value) -> ConsoleMessage {
    let level = LogLevel::from_protocol(
        params.get("type").and_then(|v| v.as_str()).unwrap_or("log"),
    );
    let message = params
        .get("args")
        .and_then(|v| v.as_array())
        .map(|args| {
            args.iter()
                .map(render_remote_object)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    let frame = params.pointer("/stackTrace/callFrames/0");
    let source = SourceLocation {
        url: frame
            .and_then(|f| str_field(f, "url"))
            .filter(|u| !u.is_empty()),
        line: frame.and_then(|f| u32_field(f, "lineNumber")),
        column: frame.and_then(|f| u32_field(f, "columnNumber")),
    };
    ConsoleMessage {
        level,
        message,
        source,
    }
}

/// Render one console argument the way a devtools console would print it.
fn render_remote_object(arg: &Value) -> String {
    match arg.get("value") {
        Some(Value::String(s)) => s.clone(),
        Some(v) if !v.is_null() => v.to_string(),
        _ => arg
            .get("unserializableValue")
            .or_else(|| arg.get("description"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                arg.get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("undefined")
                    .to_string()
            }),
    }
}
