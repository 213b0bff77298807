//! Response body classification and normalisation before storage.

use base64::Engine;
use wincap_core::{Error, Result};
use wincap_storage::layout::extension;
use wincap_storage::{Body, ContentCategory};

use crate::pretty;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "svg", "webp", "ico"];

/// Pick the folder for a body. The mime type is checked first, then the
/// file extension, in html, json, images, js, css order.
pub fn classify(mime_type: Option<&str>, filename: &str) -> ContentCategory {
    let mime = mime_type.unwrap_or("").to_ascii_lowercase();
    let ext = extension(filename).unwrap_or_default();

    if mime.contains("text/html") {
        ContentCategory::Html
    } else if mime.contains("json") || ext == "json" {
        ContentCategory::Json
    } else if mime.starts_with("image/") || IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        ContentCategory::Images
    } else if mime.contains("javascript") || mime.contains("ecmascript") || ext == "js" || ext == "mjs" {
        ContentCategory::Js
    } else if mime.contains("css") || ext == "css" {
        ContentCategory::Css
    } else {
        ContentCategory::Others
    }
}

/// Turn a `Network.getResponseBody` result into what gets written: base64
/// payloads are decoded to bytes, text is reformatted for its category.
/// Text that does not parse is kept as received.
pub fn prepare_body(raw: &str, base64_encoded: bool, category: ContentCategory, pretty: bool) -> Result<Body> {
    if base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(raw.as_bytes())
            .map_err(|e| Error::Validation(format!("response body is not valid base64: {}", e)))?;
        return Ok(Body::Binary(bytes));
    }
    if !pretty || !category.is_textual() {
        return Ok(Body::Text(raw.to_string()));
    }
    Ok(Body::Text(prettify(raw, category)))
}

fn prettify(raw: &str, category: ContentCategory) -> String {
    if category == ContentCategory::Json {
        return match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string()),
            Err(_) => raw.to_string(),
        };
    }
    let normalized = raw.replace("\r\n", "\n");
    let formatted = match category {
        ContentCategory::Html => pretty::html(&normalized),
        ContentCategory::Css => pretty::css(&normalized),
        ContentCategory::Js => pretty::js(&normalized),
        _ => None,
    };
    formatted.unwrap_or(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_mime() {
        assert_eq!(classify(Some("text/html; charset=utf-8"), "index.html"), ContentCategory::Html);
        assert_eq!(classify(Some("application/json"), "items"), ContentCategory::Json);
        assert_eq!(classify(Some("application/problem+json"), "err"), ContentCategory::Json);
        assert_eq!(classify(Some("image/webp"), "photo"), ContentCategory::Images);
        assert_eq!(classify(Some("text/javascript"), "bundle"), ContentCategory::Js);
        assert_eq!(classify(Some("text/css"), "site"), ContentCategory::Css);
        assert_eq!(classify(Some("font/woff2"), "font.woff2"), ContentCategory::Others);
    }

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify(None, "data.json"), ContentCategory::Json);
        assert_eq!(classify(Some("application/octet-stream"), "logo.PNG"), ContentCategory::Images);
        assert_eq!(classify(Some("text/plain"), "app.js"), ContentCategory::Js);
        assert_eq!(classify(None, "theme.css"), ContentCategory::Css);
        assert_eq!(classify(None, "readme"), ContentCategory::Others);
    }

    #[test]
    fn test_json_is_pretty_printed() {
        let body = prepare_body("{\"a\":1,\"b\":[1,2]}", false, ContentCategory::Json, true).unwrap();
        let Body::Text(text) = body else { panic!("expected text") };
        assert!(text.contains("\n  \"a\": 1"));
    }

    #[test]
    fn test_malformed_json_kept_verbatim() {
        let body = prepare_body("{not json", false, ContentCategory::Json, true).unwrap();
        assert_eq!(body, Body::Text("{not json".into()));
    }

    #[test]
    fn test_base64_decoded_to_binary() {
        let body = prepare_body("iVBORw==", true, ContentCategory::Images, true).unwrap();
        assert_eq!(body, Body::Binary(vec![0x89, b'P', b'N', b'G']));
        assert!(prepare_body("!!!", true, ContentCategory::Images, true).is_err());
    }

    #[test]
    fn test_pretty_disabled() {
        let body = prepare_body("{\"a\":1}", false, ContentCategory::Json, false).unwrap();
        assert_eq!(body, Body::Text("{\"a\":1}".into()));
    }

    #[test]
    fn test_markup_styles_and_scripts_are_pretty_printed() {
        let Body::Text(css) = prepare_body("a{color:red;margin:0}", false, ContentCategory::Css, true).unwrap() else {
            panic!("expected text")
        };
        assert!(css.contains("  color: red;\n"));

        let Body::Text(html) = prepare_body("<div><p>hi</p></div>", false, ContentCategory::Html, true).unwrap() else {
            panic!("expected text")
        };
        assert_eq!(html, "<div>\n  <p>hi</p>\n</div>\n");

        let Body::Text(js) = prepare_body("if(a){b();}else{c();}", false, ContentCategory::Js, true).unwrap() else {
            panic!("expected text")
        };
        assert!(js.lines().count() > 1);
    }

    #[test]
    fn test_unparseable_text_kept_with_normalised_newlines() {
        let body = prepare_body("plain\r\nwords", false, ContentCategory::Html, true).unwrap();
        assert_eq!(body, Body::Text("plain\nwords".into()));
    }
}
