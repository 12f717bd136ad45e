//! Suspicious-request detection and input sanitization rules.
//!
//! # Design Decisions
//! - Detection runs over one lowercase string built from URL, User-Agent, Referer
//!   and the JSON rendering of all headers, so a hit in any of them counts
//! - Sanitization rules apply in a fixed order; each is a global, case-insensitive replace
//! - Only strings change; numbers, booleans and nulls pass through untouched

use std::borrow::Cow;

use axum::http::{header, HeaderMap, Uri};
use regex::{Regex, RegexSet};
use serde_json::{Map, Value};

const SUSPICIOUS: [&str; 7] = [
    r"(?i)sql",
    r"(?i)union.*select",
    r"(?i)script.*>",
    r"(?i)javascript:",
    r"(?i)<.*iframe",
    r"(?i)document\.cookie",
    r"(?i)eval\(",
];

const SANITIZE: [(&str, &str); 4] = [
    (r"(?i)<script", "&lt;script"),
    (r"(?i)</script>", "&lt;/script&gt;"),
    (r"(?i)javascript:", "removed:"),
    (r"(?i)on\w+\s*=", "removed="),
];

/// Compiled detection and sanitization rules.
pub struct RequestInspector {
    suspicious: RegexSet,
    rules: Vec<(Regex, &'static str)>,
}

impl RequestInspector {
    pub fn new() -> Result<Self, regex::Error> {
        let suspicious = RegexSet::new(SUSPICIOUS)?;
        let rules = SANITIZE
            .iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, *replacement)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { suspicious, rules })
    }

    /// True when any suspicious pattern matches the request's URL or headers.
    pub fn is_suspicious(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        self.suspicious.is_match(&inspection_text(uri, headers))
    }

    /// Apply every rule, in order, to one string.
    pub fn sanitize_str<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(input);
        for (regex, replacement) in &self.rules {
            if regex.is_match(&out) {
                out = Cow::Owned(regex.replace_all(&out, *replacement).into_owned());
            }
        }
        out
    }

    /// Sanitize every string inside a JSON value, recursively.
    ///
    /// Returns whether anything was rewritten.
    pub fn sanitize_value(&self, value: &mut Value) -> bool {
        match value {
            Value::String(s) => {
                let replaced = match self.sanitize_str(s) {
                    Cow::Owned(clean) => Some(clean),
                    Cow::Borrowed(_) => None,
                };
                match replaced {
                    Some(clean) => {
                        *s = clean;
                        true
                    }
                    None => false,
                }
            }
            Value::Array(items) => items
                .iter_mut()
                .fold(false, |changed, v| self.sanitize_value(v) | changed),
            Value::Object(map) => map
                .values_mut()
                .fold(false, |changed, v| self.sanitize_value(v) | changed),
            _ => false,
        }
    }

    /// Sanitize the values of an urlencoded query string.
    ///
    /// Returns `None` when nothing changed so the URI can be left alone.
    pub fn sanitize_query(&self, query: &str) -> Option<String> {
        let mut changed = false;
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| {
                let clean = self.sanitize_str(&v);
                if matches!(clean, Cow::Owned(_)) {
                    changed = true;
                }
                (k.into_owned(), clean.into_owned())
            })
            .collect();

        changed.then(|| {
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish()
        })
    }
}

/// Lowercased `url user-agent referer {headers-json}`.
fn inspection_text(uri: &Uri, headers: &HeaderMap) -> String {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    };

    let mut rendered = Map::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match rendered.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            _ => {
                rendered.insert(name.as_str().to_string(), Value::String(value));
            }
        }
    }

    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let rendered = Value::Object(rendered).to_string();

    [
        url,
        header_str(header::USER_AGENT),
        header_str(header::REFERER),
        rendered.as_str(),
    ]
    .join(" ")
    .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn inspector() -> RequestInspector {
        RequestInspector::new().unwrap()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn detects_patterns_in_url_and_headers() {
        let inspector = inspector();
        let uri: Uri = "/api/todos?q=1%20UNION%20SELECT".parse().unwrap();
        assert!(inspector.is_suspicious(&uri, &HeaderMap::new()));

        let uri: Uri = "/api/todos?q=union+select".parse().unwrap();
        assert!(inspector.is_suspicious(&uri, &HeaderMap::new()));

        let clean: Uri = "/api/todos?page=2".parse().unwrap();
        assert!(!inspector.is_suspicious(&clean, &headers(&[("user-agent", "curl/8.0")])));
        assert!(inspector.is_suspicious(&clean, &headers(&[("user-agent", "sqlmap/1.7")])));
        assert!(inspector.is_suspicious(
            &clean,
            &headers(&[("x-note", "eval(document.cookie)")])
        ));
    }

    #[test]
    fn sanitization_rules_apply_in_order() {
        let inspector = inspector();
        assert_eq!(
            inspector.sanitize_str("<SCRIPT>alert(1)</script>"),
            "&lt;script>alert(1)&lt;/script&gt;"
        );
        assert_eq!(inspector.sanitize_str("JavaScript:void(0)"), "removed:void(0)");
        assert_eq!(
            inspector.sanitize_str("<img onerror = x>"),
            "<img removed= x>"
        );
    }

    #[test]
    fn clean_input_is_untouched() {
        let inspector = inspector();
        let text = "buy milk & eggs <tomorrow>";
        assert!(matches!(inspector.sanitize_str(text), Cow::Borrowed(_)));
        assert_eq!(inspector.sanitize_str(text), text);
        assert!(inspector.sanitize_query("filter=active&page=2").is_none());
    }

    #[test]
    fn sanitizing_twice_changes_nothing_more() {
        let inspector = inspector();
        for input in [
            "buy milk",
            "<script>alert(1)</script>",
            "<b onclick=go()>bold</b>",
            "<img ONERROR = x>",
            "javascript:void(0)",
            "<SCRIPT>JavaScript:steal()</ScRiPt>",
            "button=ok&onload=run",
        ] {
            let once = inspector.sanitize_str(input).into_owned();
            let twice = inspector.sanitize_str(&once);
            assert_eq!(twice, once, "input: {}", input);
        }
    }

    #[test]
    fn sanitizes_nested_json_strings_only() {
        let inspector = inspector();
        let mut value = json!({
            "text": "<script>x</script>",
            "tags": ["ok", "javascript:alert(1)"],
            "meta": {"n": 3, "flag": true, "inner": {"html": "<b onclick=go()>"}}
        });
        assert!(inspector.sanitize_value(&mut value));
        assert_eq!(
            value,
            json!({
                "text": "&lt;script>x&lt;/script&gt;",
                "tags": ["ok", "removed:alert(1)"],
                "meta": {"n": 3, "flag": true, "inner": {"html": "<b removed=go()>"}}
            })
        );
    }

    #[test]
    fn sanitizes_query_values() {
        let inspector = inspector();
        let query = inspector
            .sanitize_query("filter=all&q=%3Cscript%3E")
            .unwrap();
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(pairs[1], ("q".to_string(), "&lt;script>".to_string()));
    }
}
