use serde::{Deserialize, Serialize};

/// Canonical outcome of one test case, independent of the runner that produced it.
///
/// Always derived by the classifier from structural evidence (child elements, flags), never
/// copied from a runner-provided status string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Pending,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Skip => "SKIP",
            TestStatus::Pending => "PENDING",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Failure {
    pub text: String,
}

impl Failure {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Test {
    pub name: String,
    pub status: TestStatus,
    /// Seconds.
    pub time: f64,
    pub failures: Vec<Failure>,
}

/// Suite totals are always recomputed from `tests`; see `aggregate::build_suite`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suite {
    pub name: String,
    pub failures: u64,
    pub skipped: u64,
    pub pending: u64,
    pub time: f64,
    pub tests: Vec<Test>,
}

/// Normalized result of one source artifact file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub name: String,
    pub tests: u64,
    pub failures: u64,
    pub skipped: u64,
    pub pending: u64,
    pub time: f64,
    pub testsuites: Vec<Suite>,
}

/// Every test result ingested in a single invocation.
///
/// Invariant: each scalar total equals the sum of the corresponding report totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub tests: u64,
    pub failures: u64,
    pub skipped: u64,
    pub pending: u64,
    pub time: f64,
    pub reports: Vec<Report>,
}

impl Run {
    pub fn passed(&self) -> u64 {
        self.tests
            .saturating_sub(self.failures)
            .saturating_sub(self.skipped)
            .saturating_sub(self.pending)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentCounts {
    pub total: u64,
    pub fail: u64,
    pub success: u64,
    /// Skipped plus pending.
    pub skip: u64,
}

/// Failure summary handed to the reconciler and the issue tracker.
///
/// Recomputed on every invocation from a `Run` (or a free-text message); never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Incident {
    pub dedup_key: String,
    pub title: String,
    pub description: String,
    pub service: String,
    pub source_url: Option<String>,
    pub assignee: Option<String>,
    pub counts: IncidentCounts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueState {
    Open,
    Closed,
}

/// Tracked issue as reported by the external tracker.
///
/// `body` is opaque; the core only checks whether it contains a dedup key.
/// `created_at` is the tracker's RFC3339 timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub id: u64,
    pub number: u64,
    pub url: String,
    pub state: IssueState,
    pub body: String,
    pub created_at: String,
}
