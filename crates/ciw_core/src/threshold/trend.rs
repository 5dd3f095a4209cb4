use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::AnalysisRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendStatus {
    NewFailure,
    Recovered,
    StillFailing,
    Unchanged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendEntry {
    pub run: String,
    pub transaction: String,
    pub metric: String,
    pub previous_value: Option<f64>,
    pub current_value: f64,
    pub delta: Option<f64>,
    pub status: TrendStatus,
}

type Key<'a> = (&'a str, &'a str, &'a str);

fn key(r: &AnalysisRecord) -> Key<'_> {
    (r.run.as_str(), r.transaction.as_str(), r.metric.as_str())
}

/// Compare the current analysis against a previously persisted one.
///
/// Output follows the order of `current`; metrics that only exist in `previous` are dropped.
pub fn compare_analyses(
    previous: &[AnalysisRecord],
    current: &[AnalysisRecord],
) -> Vec<TrendEntry> {
    let prior: BTreeMap<Key<'_>, &AnalysisRecord> =
        previous.iter().map(|r| (key(r), r)).collect();

    current
        .iter()
        .map(|cur| {
            let prev = prior.get(&key(cur)).copied();
            let was_failing = prev.is_some_and(|p| p.error);
            let status = match (was_failing, cur.error) {
                (false, true) => TrendStatus::NewFailure,
                (true, false) => TrendStatus::Recovered,
                (true, true) => TrendStatus::StillFailing,
                (false, false) => TrendStatus::Unchanged,
            };
            TrendEntry {
                run: cur.run.clone(),
                transaction: cur.transaction.clone(),
                metric: cur.metric.clone(),
                previous_value: prev.map(|p| p.run_value),
                current_value: cur.run_value,
                delta: prev.map(|p| cur.run_value - p.run_value),
                status,
            }
        })
        .collect()
}
