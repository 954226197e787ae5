//! Dangerous-content screening for untrusted variables
//!
//! The sanitizer walks a JSON value depth-first and rejects the whole payload
//! on the first string matching a denylist signature, reporting the path to
//! the offending value (`variables.input.links[1]`). Non-string scalars and
//! nulls pass the built-in scan.
//!
//! The denylist is a heuristic second line of defence against markup and
//! script injection. It does not replace escaping at the point where a value
//! is rendered, and it will reject some harmless input (for instance any
//! text containing `&#38;`).

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::RegexSet;
use serde_json::Value;
use tracing::{debug, warn};
use turnstile_shared_config::InputValidationSettings;

use crate::error::{GuardError, GuardResult};

/// Label reported when a payload nests deeper than the configured limit
pub const MAX_DEPTH_LABEL: &str = "max-depth";

/// Built-in signatures, checked in this order
const BUILTIN_SIGNATURES: &[(&str, &str)] = &[
    ("script-tag", r"(?i)<script"),
    ("iframe-tag", r"(?i)<iframe"),
    ("object-tag", r"(?i)<object"),
    ("embed-tag", r"(?i)<embed"),
    ("link-tag", r"(?i)<link"),
    ("javascript-uri", r"(?i)javascript:"),
    ("vbscript-uri", r"(?i)vbscript:"),
    ("event-handler", r"(?i)on\w+\s*="),
    ("meta-tag", r"(?i)<meta"),
    ("data-uri-html", r"(?i)data:text/html"),
    ("svg-onload", r"(?i)<svg.*onload"),
    ("html-entity", r"(?i)&#x?[0-9a-f]+;"),
    ("unicode-escape", r"(?i)\\u[0-9a-f]{4}"),
    ("css-expression", r"(?i)expression\s*\("),
    ("css-import", r"(?i)@import"),
    ("html-comment", r"<!--|-->"),
];

static DEFAULT_SIGNATURES: Lazy<SignatureSet> = Lazy::new(|| {
    SignatureSet::new(BUILTIN_SIGNATURES.iter().copied())
        .expect("built-in signature patterns compile")
});

/// An ordered, labelled set of content signatures compiled into one
/// [`RegexSet`]
#[derive(Debug, Clone)]
pub struct SignatureSet {
    patterns: RegexSet,
    labels: Vec<String>,
}

impl SignatureSet {
    /// Compile `(label, pattern)` pairs; earlier pairs win when several match
    pub fn new<I, L, P>(signatures: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (L, P)>,
        L: Into<String>,
        P: AsRef<str>,
    {
        let (labels, patterns): (Vec<String>, Vec<P>) = signatures
            .into_iter()
            .map(|(label, pattern)| (label.into(), pattern))
            .unzip();

        Ok(Self {
            patterns: RegexSet::new(patterns)?,
            labels,
        })
    }

    /// Label of the first signature `text` matches
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.patterns
            .matches(text)
            .iter()
            .next()
            .map(|index| self.labels[index].as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for SignatureSet {
    fn default() -> Self {
        DEFAULT_SIGNATURES.clone()
    }
}

/// Extra check run on every scalar after the built-in scan; `Err(label)`
/// rejects the payload at that path
pub type CustomValidator = Arc<dyn Fn(&Value, &str) -> Result<(), String> + Send + Sync>;

/// Recursive denylist scanner
#[derive(Clone)]
pub struct InputSanitizer {
    signatures: SignatureSet,
    settings: InputValidationSettings,
    custom: Option<CustomValidator>,
}

impl fmt::Debug for InputSanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSanitizer")
            .field("signatures", &self.signatures.len())
            .field("settings", &self.settings)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl Default for InputSanitizer {
    fn default() -> Self {
        Self::new(InputValidationSettings::default())
    }
}

impl InputSanitizer {
    /// Sanitizer with the built-in signatures
    pub fn new(settings: InputValidationSettings) -> Self {
        Self {
            signatures: SignatureSet::default(),
            settings,
            custom: None,
        }
    }

    /// Replace the signature set
    pub fn with_signatures(mut self, signatures: SignatureSet) -> Self {
        self.signatures = signatures;
        self
    }

    /// Install a check that runs on every scalar after the built-in scan
    pub fn with_custom_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value, &str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(validator));
        self
    }

    pub fn settings(&self) -> &InputValidationSettings {
        &self.settings
    }

    /// Scan `value`, reporting offending paths relative to `path`
    pub fn scan(&self, value: &Value, path: &str) -> GuardResult<()> {
        self.scan_at(value, path, 0)
    }

    fn scan_at(&self, value: &Value, path: &str, depth: usize) -> GuardResult<()> {
        if depth > self.settings.max_depth {
            return Err(rejection(path, MAX_DEPTH_LABEL));
        }

        match value {
            Value::Null => Ok(()),
            Value::String(text) => {
                if let Some(label) = self.signatures.first_match(text) {
                    return Err(rejection(path, label));
                }
                self.run_custom(value, path)
            }
            Value::Bool(_) | Value::Number(_) => self.run_custom(value, path),
            Value::Array(items) => items.iter().enumerate().try_for_each(|(index, item)| {
                self.scan_at(item, &format!("{}[{}]", path, index), depth + 1)
            }),
            Value::Object(fields) => fields.iter().try_for_each(|(key, item)| {
                self.scan_at(item, &join_path(path, key), depth + 1)
            }),
        }
    }

    fn run_custom(&self, value: &Value, path: &str) -> GuardResult<()> {
        match &self.custom {
            Some(custom) => custom(value, path).map_err(|label| rejection(path, &label)),
            None => Ok(()),
        }
    }

    /// Screen a request's variables
    ///
    /// Skipped entirely when validation is disabled or the operation is
    /// excluded. Each top-level variable not excluded by name is scanned at
    /// `variables.<name>`.
    pub fn validate_variables(&self, operation_name: Option<&str>, variables: &Value) -> GuardResult<()> {
        if !self.settings.enabled {
            return Ok(());
        }

        if let Some(operation) = operation_name.filter(|name| {
            self.settings.skip_operations.iter().any(|skip| skip.as_str() == *name)
        }) {
            debug!(operation = %operation, "Input validation skipped for operation");
            return Ok(());
        }

        let result = match variables {
            Value::Object(fields) => fields
                .iter()
                .filter(|(name, _)| !self.settings.skip_fields.contains(*name))
                .try_for_each(|(name, value)| self.scan(value, &join_path("variables", name))),
            other => self.scan(other, "variables"),
        };

        if let Err(GuardError::DangerousInput { path, signature }) = &result {
            if self.settings.log_errors {
                warn!(
                    operation = operation_name.unwrap_or_default(),
                    path = %path,
                    signature = %signature,
                    "Input validation rejected request"
                );
            }
        }
        result
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn rejection(path: &str, label: &str) -> GuardError {
    GuardError::DangerousInput {
        path: path.to_string(),
        signature: label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn sanitizer() -> InputSanitizer {
        InputSanitizer::default()
    }

    #[test]
    fn test_script_rejected_with_exact_path() {
        let payload = json!({ "input": { "bio": ["ok", "<script>alert(1)</script>"] } });

        let err = sanitizer().scan(&payload, "variables").unwrap_err();

        assert_matches!(err, GuardError::DangerousInput { ref path, ref signature } => {
            assert_eq!(path, "variables.input.bio[1]");
            assert_eq!(signature, "script-tag");
        });
    }

    #[test]
    fn test_simple_profile_passes() {
        let payload = json!({ "name": "Alice", "tags": ["a", "b"] });
        assert!(sanitizer().scan(&payload, "").is_ok());
    }

    #[test]
    fn test_paths_without_prefix() {
        let payload = json!({ "name": "<iframe>" });
        assert_matches!(
            sanitizer().scan(&payload, ""),
            Err(GuardError::DangerousInput { ref path, .. }) if path == "name"
        );
    }

    #[test]
    fn test_non_string_scalars_pass() {
        let payload = json!({ "age": 3, "active": true, "note": null });
        assert!(sanitizer().scan(&payload, "variables").is_ok());
    }

    #[test]
    fn test_map_keys_are_not_scanned() {
        let payload = json!({ "<script>": "fine" });
        assert!(sanitizer().scan(&payload, "variables").is_ok());
    }

    #[test]
    fn test_first_signature_wins() {
        let set = SignatureSet::default();
        assert_eq!(set.first_match("<script onload=x>"), Some("script-tag"));
        assert_eq!(set.first_match("<svg/onload"), Some("svg-onload"));
        assert_eq!(set.first_match("plain text"), None);
    }

    #[test]
    fn test_custom_signature_set() {
        let set = SignatureSet::new([("sql-comment", "--"), ("union", "(?i)union\\s+select")]).unwrap();
        let sanitizer = sanitizer().with_signatures(set);

        assert!(sanitizer.scan(&json!("<script>"), "v").is_ok());
        assert_matches!(
            sanitizer.scan(&json!("1 UNION  SELECT"), "v"),
            Err(GuardError::DangerousInput { ref signature, .. }) if signature == "union"
        );
    }

    #[test]
    fn test_invalid_signature_pattern() {
        assert!(SignatureSet::new([("broken", "(")]).is_err());
    }

    #[test]
    fn test_custom_validator_runs_on_scalars() {
        let sanitizer = sanitizer().with_custom_validator(|value, _path| match value {
            Value::Number(n) if n.as_i64().is_some_and(|n| n < 0) => Err("negative".to_string()),
            _ => Ok(()),
        });

        let err = sanitizer
            .scan(&json!({ "items": [{ "qty": 2 }, { "qty": -1 }] }), "variables")
            .unwrap_err();

        assert_matches!(err, GuardError::DangerousInput { ref path, ref signature } => {
            assert_eq!(path, "variables.items[1].qty");
            assert_eq!(signature, "negative");
        });
    }

    #[test]
    fn test_builtin_scan_precedes_custom_validator() {
        let sanitizer = sanitizer().with_custom_validator(|_, _| Err("custom".to_string()));
        assert_matches!(
            sanitizer.scan(&json!("<embed>"), "v"),
            Err(GuardError::DangerousInput { ref signature, .. }) if signature == "embed-tag"
        );
    }

    #[test]
    fn test_depth_limit() {
        let settings = InputValidationSettings {
            max_depth: 2,
            ..Default::default()
        };
        let sanitizer = InputSanitizer::new(settings);

        assert!(sanitizer.scan(&json!([["ok"]]), "v").is_ok());
        assert_matches!(
            sanitizer.scan(&json!([[["deep"]]]), "v"),
            Err(GuardError::DangerousInput { ref path, ref signature }) if path == "v[0][0][0]" && signature == MAX_DEPTH_LABEL
        );
    }

    #[test]
    fn test_validate_variables_skips_fields_and_operations() {
        let settings = InputValidationSettings {
            skip_operations: vec!["UpdateTemplate".to_string()],
            skip_fields: vec!["html".to_string()],
            ..Default::default()
        };
        let sanitizer = InputSanitizer::new(settings);
        let variables = json!({ "html": "<script>ok()</script>", "title": "Hello" });

        assert!(sanitizer.validate_variables(Some("Save"), &variables).is_ok());

        let dirty = json!({ "title": "<script>x()</script>" });
        assert!(sanitizer.validate_variables(Some("UpdateTemplate"), &dirty).is_ok());
        assert_matches!(
            sanitizer.validate_variables(Some("Save"), &dirty),
            Err(GuardError::DangerousInput { ref path, .. }) if path == "variables.title"
        );
        assert!(sanitizer.validate_variables(None, &dirty).is_err());
    }

    #[test]
    fn test_disabled_validation_passes_everything() {
        let settings = InputValidationSettings {
            enabled: false,
            ..Default::default()
        };
        let sanitizer = InputSanitizer::new(settings);
        assert!(sanitizer
            .validate_variables(None, &json!({ "x": "<script>" }))
            .is_ok());
    }
}
