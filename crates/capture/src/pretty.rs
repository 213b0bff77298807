//! Formatters for captured text bodies. Each returns `None` when the input
//! cannot be parsed, and the caller keeps the body as received.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use scraper::{ElementRef, Html, Node};
use std::fmt::Write;

const INDENT: &str = "  ";

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose contents are written back untouched.
const VERBATIM_ELEMENTS: [&str; 4] = ["script", "style", "pre", "textarea"];

/// Re-indent an HTML document or fragment, one element per line.
pub fn html(raw: &str) -> Option<String> {
    if !raw.trim_start().starts_with('<') {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    let mut out = String::with_capacity(raw.len() + raw.len() / 4);

    if lower.contains("<html") || lower.trim_start().starts_with("<!doctype") {
        let document = Html::parse_document(raw);
        for child in document.tree.root().children() {
            if let Node::Doctype(doctype) = child.value() {
                let _ = writeln!(out, "<!DOCTYPE {}>", doctype.name());
            }
        }
        write_element(document.root_element(), 0, &mut out);
    } else {
        let fragment = Html::parse_fragment(raw);
        write_children(fragment.root_element(), 0, &mut out);
    }

    if out.trim().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn write_element(element: ElementRef, depth: usize, out: &mut String) {
    let name = element.value().name();
    push_indent(out, depth);
    out.push('<');
    out.push_str(name);
    for (key, value) in element.value().attrs() {
        let _ = write!(out, " {}=\"{}\"", key, escape_attr(value));
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        out.push('\n');
        return;
    }

    if VERBATIM_ELEMENTS.contains(&name) {
        let raw_text = name == "script" || name == "style";
        for child in element.children() {
            match child.value() {
                Node::Text(text) if raw_text => out.push_str(text),
                Node::Text(text) => out.push_str(&escape_text(text)),
                _ => {
                    if let Some(nested) = ElementRef::wrap(child) {
                        out.push_str(&nested.html());
                    }
                }
            }
        }
        let _ = writeln!(out, "</{}>", name);
        return;
    }

    let significant: Vec<_> = element
        .children()
        .filter(|c| !matches!(c.value(), Node::Text(t) if t.trim().is_empty()))
        .collect();
    match significant.as_slice() {
        [] => {
            let _ = writeln!(out, "</{}>", name);
        }
        [only] if matches!(only.value(), Node::Text(_)) => {
            if let Node::Text(text) = only.value() {
                out.push_str(&escape_text(text.trim()));
            }
            let _ = writeln!(out, "</{}>", name);
        }
        _ => {
            out.push('\n');
            write_children(element, depth + 1, out);
            push_indent(out, depth);
            let _ = writeln!(out, "</{}>", name);
        }
    }
}

fn write_children(element: ElementRef, depth: usize, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    push_indent(out, depth);
                    out.push_str(&escape_text(text));
                    out.push('\n');
                }
            }
            Node::Comment(comment) => {
                push_indent(out, depth);
                let _ = writeln!(out, "<!--{}-->", &**comment);
            }
            Node::Element(_) => {
                if let Some(nested) = ElementRef::wrap(child) {
                    write_element(nested, depth, out);
                }
            }
            _ => {}
        }
    }
}

fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Print a stylesheet one declaration per line.
pub fn css(raw: &str) -> Option<String> {
    let sheet = StyleSheet::parse(raw, ParserOptions::default()).ok()?;
    let printed = sheet.to_css(PrinterOptions::default()).ok()?;
    Some(printed.code)
}

/// Token-based re-indentation of a script, tolerant of partial input.
pub fn js(raw: &str) -> Option<String> {
    let (pretty, _) = prettify_js::prettyprint(raw);
    if pretty.trim().is_empty() && !raw.trim().is_empty() {
        None
    } else {
        Some(pretty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_document_is_indented() {
        let out = html("<!doctype html><html><head><title>T</title></head><body><div><p>a &amp; b</p><br></div></body></html>").unwrap();
        assert!(out.starts_with("<!DOCTYPE html>\n<html>\n"));
        assert!(out.contains("\n    <title>T</title>\n"));
        assert!(out.contains("\n    <div>\n      <p>a &amp; b</p>\n      <br>\n    </div>\n"));
        assert!(out.ends_with("</html>\n"));
    }

    #[test]
    fn test_html_fragment_keeps_scripts_verbatim() {
        let out = html("<ul><li class=\"x\">one</li><li>two</li></ul><script>if (a < b) { go(); }</script>").unwrap();
        assert_eq!(
            out,
            "<ul>\n  <li class=\"x\">one</li>\n  <li>two</li>\n</ul>\n<script>if (a < b) { go(); }</script>\n"
        );
    }

    #[test]
    fn test_html_rejects_plain_text() {
        assert_eq!(html("just words"), None);
    }

    #[test]
    fn test_css_is_expanded() {
        let out = css("a{color:red;margin:0}").unwrap();
        assert!(out.contains("a {\n"));
        assert!(out.contains("  color: red;\n"));
        assert!(out.lines().count() > 1);
    }

    #[test]
    fn test_js_is_expanded() {
        let out = js("function add(a,b){return a+b;}").unwrap();
        assert!(out.lines().count() > 1);
        assert!(out.contains("return"));
    }
}
