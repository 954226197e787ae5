//! Input payload fixtures
//!
//! `DANGEROUS_SAMPLES` pairs each payload with the label of the first
//! built-in signature it trips, so sanitizer tests can assert both the
//! rejection and its diagnostics.

use serde_json::{json, Value};

/// Payloads that must be rejected, with the expected signature label
pub const DANGEROUS_SAMPLES: &[(&str, &str)] = &[
    ("<script>alert(1)</script>", "script-tag"),
    ("<IFRAME src=//evil.example>", "iframe-tag"),
    ("<object data=x>", "object-tag"),
    ("<embed src=evil.swf>", "embed-tag"),
    ("<link rel=stylesheet href=//evil.example/x.css>", "link-tag"),
    ("JavaScript:alert(document.cookie)", "javascript-uri"),
    ("vbscript:msgbox(1)", "vbscript-uri"),
    ("<img src=x onerror=alert(1)>", "event-handler"),
    ("<meta http-equiv=refresh>", "meta-tag"),
    ("data:text/html;base64,PHNjcmlwdD4=", "data-uri-html"),
    ("&#x3C;img&#x3E;", "html-entity"),
    ("\\u003cimg\\u003e", "unicode-escape"),
    ("width: expression(alert(1))", "css-expression"),
    ("@import url(//evil.example/x.css)", "css-import"),
    ("<!-- hidden -->", "html-comment"),
];

/// Strings that must pass every built-in signature
pub const BENIGN_SAMPLES: &[&str] = &[
    "Alice",
    "alice@example.com",
    "O'Brien",
    "Tom & Jerry",
    "5 < 6 and 7 > 3",
    "https://example.com/path?q=1&page=2",
    "Scripts are fun to write",
    "Ships in 3-5 days",
];

/// The benign payload `{"name": "Alice", "tags": ["a", "b"]}`
pub fn simple_profile() -> Value {
    json!({ "name": "Alice", "tags": ["a", "b"] })
}

/// A registration-style payload with `value` placed at
/// `input.profile.links[1]`
pub fn nested_with(value: &str) -> Value {
    json!({
        "input": {
            "email": "alice@example.com",
            "age": 34,
            "newsletter": true,
            "referrer": null,
            "profile": {
                "displayName": "Alice",
                "links": ["https://example.com", value]
            }
        }
    })
}

/// An array nested `depth` levels deep around a single string leaf
pub fn deeply_nested(depth: usize) -> Value {
    (0..depth).fold(json!("leaf"), |inner, _| Value::Array(vec![inner]))
}
