//! Mapping of runner-native outcome evidence onto [`TestStatus`].
//!
//! Each source format gets an ordered rule table. Rules are evaluated top to bottom and the first
//! matching predicate wins; a case that matches no rule is [`TestStatus::Pass`].

use crate::domain::TestStatus;

pub type StatusRule<E> = (fn(&E) -> bool, TestStatus);

pub fn classify<E>(evidence: &E, rules: &[StatusRule<E>]) -> TestStatus {
    rules
        .iter()
        .find(|(matches, _)| matches(evidence))
        .map(|(_, status)| *status)
        .unwrap_or(TestStatus::Pass)
}

/// Child element names observed under one `<testcase>`, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlCaseEvidence {
    pub children: Vec<String>,
}

fn xml_has_skipped(e: &XmlCaseEvidence) -> bool {
    e.children.iter().any(|c| c == "skipped")
}

fn xml_has_pending(e: &XmlCaseEvidence) -> bool {
    e.children.iter().any(|c| c == "pending")
}

fn xml_has_other_child(e: &XmlCaseEvidence) -> bool {
    e.children
        .iter()
        .any(|c| c != "skipped" && c != "pending")
}

pub const XML_STATUS_RULES: &[StatusRule<XmlCaseEvidence>] = &[
    (xml_has_skipped, TestStatus::Skip),
    (xml_has_pending, TestStatus::Pending),
    (xml_has_other_child, TestStatus::Fail),
];

/// Outcome flags of one Mocha test object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MochaCaseEvidence {
    pub fail: bool,
    pub pending: bool,
}

fn mocha_failed(e: &MochaCaseEvidence) -> bool {
    e.fail
}

fn mocha_pending(e: &MochaCaseEvidence) -> bool {
    e.pending
}

pub const MOCHA_STATUS_RULES: &[StatusRule<MochaCaseEvidence>] = &[
    (mocha_failed, TestStatus::Fail),
    (mocha_pending, TestStatus::Pending),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerfCaseEvidence {
    pub error: bool,
}

fn perf_out_of_range(e: &PerfCaseEvidence) -> bool {
    e.error
}

pub const PERF_STATUS_RULES: &[StatusRule<PerfCaseEvidence>] =
    &[(perf_out_of_range, TestStatus::Fail)];

/// Failure count a generator declared for a container, made usable.
///
/// Negative counts are clamped to zero. Some generators emit `failures = -skipped` for suites
/// where every case was skipped; that shape is always corrected to zero failures.
pub fn corrected_failures(reported_failures: i64, reported_skipped: i64) -> u64 {
    if reported_skipped > 0 && reported_failures + reported_skipped == 0 {
        return 0;
    }
    u64::try_from(reported_failures).unwrap_or(0)
}
