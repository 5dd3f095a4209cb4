//! Stable dedup keys correlating the same failure signature across CI runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Run, TestStatus};

/// Which tests contribute identities to a run's dedup key.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    #[default]
    Failing,
    AllTests,
}

/// `report-suite-test-status`, status lowercased.
pub fn test_identity(report: &str, suite: &str, test: &str, status: TestStatus) -> String {
    format!(
        "{report}-{suite}-{test}-{}",
        status.as_str().to_ascii_lowercase()
    )
}

fn identities(run: &Run, keep: impl Fn(TestStatus) -> bool) -> Vec<String> {
    let mut out = Vec::new();
    for report in &run.reports {
        for suite in &report.testsuites {
            for test in suite.tests.iter().filter(|t| keep(t.status)) {
                out.push(test_identity(&report.name, &suite.name, &test.name, test.status));
            }
        }
    }
    out
}

pub fn failing_test_identities(run: &Run) -> Vec<String> {
    identities(run, |s| s == TestStatus::Fail)
}

pub fn all_test_identities(run: &Run) -> Vec<String> {
    identities(run, |_| true)
}

fn digest(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// Dedup key for a set of test identities.
///
/// The identities are sorted first so discovery order never changes the key. No salt or clock
/// input is involved: equal inputs give equal keys across processes.
pub fn dedup_key(service: &str, identities: &[String]) -> String {
    let mut sorted = identities.to_vec();
    sorted.sort();
    digest(&format!("service={service}|{}", sorted.join("\n")))
}

fn normalize_message(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Dedup key for a free-text incident when no structured report exists.
pub fn dedup_key_for_message(service: &str, message: &str) -> String {
    digest(&format!(
        "service={service}|message={}",
        normalize_message(message)
    ))
}

pub fn run_dedup_key(service: &str, run: &Run, scope: DedupScope) -> String {
    let ids = match scope {
        DedupScope::Failing => failing_test_identities(run),
        DedupScope::AllTests => all_test_identities(run),
    };
    dedup_key(service, &ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn key_is_order_independent() {
        assert_eq!(
            dedup_key("svc", &ids(&["b-fail", "a-fail"])),
            dedup_key("svc", &ids(&["a-fail", "b-fail"]))
        );
    }

    #[test]
    fn key_is_sensitive_to_identities_and_service() {
        let base = dedup_key("svc", &ids(&["a-fail", "b-fail"]));
        assert_ne!(base, dedup_key("svc", &ids(&["a-fail", "c-fail"])));
        assert_ne!(base, dedup_key("svc2", &ids(&["a-fail", "b-fail"])));
        assert_ne!(base, dedup_key("svc", &ids(&["a-fail"])));
    }

    #[test]
    fn key_is_fixed_width_hex() {
        let key = dedup_key("svc", &[]);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, dedup_key("svc", &[]));
    }

    #[test]
    fn message_keys_ignore_whitespace_layout() {
        assert_eq!(
            dedup_key_for_message("svc", "  deploy   failed\n on prod "),
            dedup_key_for_message("svc", "deploy failed on prod")
        );
        assert_ne!(
            dedup_key_for_message("svc", "deploy failed"),
            dedup_key_for_message("other", "deploy failed")
        );
    }

    #[test]
    fn identity_uses_lowercase_status() {
        assert_eq!(
            test_identity("web", "login", "rejects bad password", TestStatus::Fail),
            "web-login-rejects bad password-fail"
        );
    }
}
