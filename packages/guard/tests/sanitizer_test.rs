//! Integration tests for input screening
//!
//! Runs the shared dangerous/benign corpus through the built-in signatures
//! and checks the reported paths on realistic variable payloads.

use assert_matches::assert_matches;
use rstest::rstest;
use serde_json::{json, Value};
use turnstile_guard::{GuardError, InputSanitizer};
use turnstile_shared_config::InputValidationSettings;
use turnstile_test_utils::payloads::{
    deeply_nested, nested_with, simple_profile, BENIGN_SAMPLES, DANGEROUS_SAMPLES,
};

#[test]
fn test_every_dangerous_sample_is_rejected_with_its_label() {
    let sanitizer = InputSanitizer::default();

    for (payload, label) in DANGEROUS_SAMPLES {
        let err = sanitizer
            .scan(&Value::String(payload.to_string()), "variables.text")
            .expect_err(payload);
        assert_matches!(err, GuardError::DangerousInput { ref path, ref signature } => {
            assert_eq!(path, "variables.text");
            assert_eq!(signature, label, "payload {:?}", payload);
        });
    }
}

#[test]
fn test_benign_samples_pass() {
    let sanitizer = InputSanitizer::default();

    for sample in BENIGN_SAMPLES {
        assert!(
            sanitizer.scan(&json!(sample), "variables.text").is_ok(),
            "{:?} should pass",
            sample
        );
    }
}

#[test]
fn test_simple_profile_passes() {
    let sanitizer = InputSanitizer::default();
    assert!(sanitizer
        .validate_variables(Some("UpdateProfile"), &json!({ "profile": simple_profile() }))
        .is_ok());
}

#[rstest]
#[case("<script>alert(1)</script>", "script-tag")]
#[case("javascript:void(0)", "javascript-uri")]
#[case("<a onclick = steal()>", "event-handler")]
#[case("<!-- x -->", "html-comment")]
fn test_nested_rejection_reports_exact_path(#[case] payload: &str, #[case] label: &str) {
    let sanitizer = InputSanitizer::default();

    let err = sanitizer
        .validate_variables(Some("Register"), &nested_with(payload))
        .unwrap_err();

    assert_matches!(err, GuardError::DangerousInput { ref path, ref signature } => {
        assert_eq!(path, "variables.input.profile.links[1]");
        assert_eq!(signature, label);
    });
}

#[test]
fn test_nested_benign_payload_passes() {
    let sanitizer = InputSanitizer::default();
    assert!(sanitizer
        .validate_variables(Some("Register"), &nested_with("https://alice.example"))
        .is_ok());
}

#[rstest]
#[case(8, true)]
#[case(9, false)]
fn test_depth_limit(#[case] depth: usize, #[case] accepted: bool) {
    let sanitizer = InputSanitizer::new(InputValidationSettings {
        max_depth: 8,
        ..Default::default()
    });

    let result = sanitizer.scan(&deeply_nested(depth), "v");

    if accepted {
        assert!(result.is_ok());
    } else {
        assert_matches!(result, Err(GuardError::DangerousInput { ref signature, .. }) if signature == "max-depth");
    }
}

#[test]
fn test_default_depth_limit_rejects_pathological_payload() {
    let sanitizer = InputSanitizer::default();
    assert!(sanitizer.scan(&deeply_nested(64), "v").is_ok());
    assert!(sanitizer.scan(&deeply_nested(65), "v").is_err());
}

#[test_log::test]
fn test_rejections_are_logged_when_enabled() {
    let sanitizer = InputSanitizer::new(InputValidationSettings {
        log_errors: true,
        ..Default::default()
    });

    assert!(sanitizer
        .validate_variables(Some("Register"), &json!({ "bio": "<embed src=x>" }))
        .is_err());
}

#[test]
fn test_skip_field_only_applies_at_top_level() {
    let sanitizer = InputSanitizer::new(InputValidationSettings {
        skip_fields: vec!["html".to_string()],
        ..Default::default()
    });

    assert!(sanitizer
        .validate_variables(None, &json!({ "html": "<iframe>" }))
        .is_ok());
    assert_matches!(
        sanitizer.validate_variables(None, &json!({ "input": { "html": "<iframe>" } })),
        Err(GuardError::DangerousInput { ref path, .. }) if path == "variables.input.html"
    );
}

#[test]
fn test_custom_validator_sees_paths() {
    let sanitizer = InputSanitizer::default().with_custom_validator(|value, path| {
        if path.ends_with(".email") && !value.as_str().is_some_and(|s| s.contains('@')) {
            Err("invalid-email".to_string())
        } else {
            Ok(())
        }
    });

    assert!(sanitizer
        .validate_variables(None, &nested_with("https://alice.example"))
        .is_ok());
    assert_matches!(
        sanitizer.validate_variables(None, &json!({ "input": { "email": "nope" } })),
        Err(GuardError::DangerousInput { ref path, ref signature })
            if path == "variables.input.email" && signature == "invalid-email"
    );
}
