//! Property-based tests using proptest
//!
//! These tests generate random inputs to exercise edge cases in URL
//! resolution and result classification.

use proptest::prelude::*;

use dirprobe::classifier::{ResultClassifier, Verdict};
use dirprobe::config::ScanConfig;
use dirprobe::probe::ProbeOutcome;
use dirprobe::resolver::TargetResolver;

fn candidate_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        // Plain path segments
        r"[a-zA-Z0-9_\-]{1,20}",
        // Nested paths with extensions
        (r"[a-z]{1,8}", r"[a-z]{1,8}", r"[a-z]{2,4}")
            .prop_map(|(dir, name, ext)| format!("{dir}/{name}.{ext}")),
        // Leading slashes and whitespace
        r"/{0,3}[a-z]{1,10}\s{0,2}",
        // Traversal and scheme-looking input
        prop_oneof![
            Just("../../etc/passwd".to_string()),
            Just("..%2f..%2fsecret".to_string()),
            Just("http://evil.example/x".to_string()),
            Just("//evil.example/x".to_string()),
            Just("".to_string()),
            Just("   ".to_string()),
        ],
        // Arbitrary printable junk
        r"[ -~]{0,40}",
    ]
}

proptest! {
    #[test]
    fn resolver_never_panics(candidate in candidate_strategy()) {
        let resolver = TargetResolver::new("https://example.com/app").unwrap();
        let _ = resolver.resolve(&candidate);
    }

    #[test]
    fn resolved_urls_stay_on_the_target(candidate in candidate_strategy()) {
        let resolver = TargetResolver::new("https://example.com:8443/app").unwrap();
        if let Ok(url) = resolver.resolve(&candidate) {
            prop_assert_eq!(url.scheme(), "https");
            prop_assert_eq!(url.host_str(), Some("example.com"));
            prop_assert_eq!(url.port_or_known_default(), Some(8443));
            prop_assert!(url.path().starts_with("/app/"));
        }
    }

    #[test]
    fn classification_is_pure_for_successful_outcomes(
        status in 100u16..600,
        length in 0u64..100_000,
        attempt in 1u32..5,
    ) {
        // Without the soft-404 table there is no cross-request state, so the
        // same outcome must always classify the same way
        let config = ScanConfig {
            soft_404_threshold: None,
            retry_ceiling: Some(5),
            ..Default::default()
        };
        let classifier = ResultClassifier::new(&config);
        let outcome = ProbeOutcome {
            status: Some(status),
            content_length: Some(length),
            redirect_location: None,
            elapsed: std::time::Duration::from_millis(1),
            error: None,
        };

        let first = classifier.classify(&outcome, attempt);
        let second = classifier.classify(&outcome, attempt);
        prop_assert_eq!(first, second);
        prop_assert_ne!(first, Verdict::Retry);
    }

    #[test]
    fn excluded_statuses_always_suppress(status in 100u16..600) {
        let config = ScanConfig {
            excluded_status_codes: Some(vec![status]),
            soft_404_threshold: None,
            ..Default::default()
        };
        let classifier = ResultClassifier::new(&config);
        let outcome = ProbeOutcome {
            status: Some(status),
            content_length: Some(10),
            redirect_location: None,
            elapsed: std::time::Duration::from_millis(1),
            error: None,
        };

        prop_assert_eq!(classifier.classify(&outcome, 1), Verdict::Suppress);
    }
}
