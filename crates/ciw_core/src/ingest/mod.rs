//! Format parsers turning raw CI artifacts into the canonical [`Run`].
//!
//! Every artifact is first decoded into one variant of [`ArtifactDocument`]; a pure mapping per
//! variant then produces canonical reports. Anything that fits no variant is a `PARSE_*` error.

use std::path::Path;

use tracing::info;

use crate::aggregate::{aggregate_run, merge_runs};
use crate::domain::Run;
use crate::error::{read_file, AppError};
use crate::threshold::AnalysisRecord;

pub mod junit_xml;
pub mod mocha_json;
pub mod perf_analysis;

pub use junit_xml::{parse_junit_xml, XmlSuiteDocument};
pub use mocha_json::{parse_mocha_json, JsonArtifact, MochaReportDocument};
pub use perf_analysis::perf_analysis_to_run;

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactDocument {
    XmlSuite(XmlSuiteDocument),
    MochaReport(MochaReportDocument),
    PerfAnalysis(Vec<AnalysisRecord>),
}

/// File stem used wherever a generator left a name empty or literally `"null"`.
pub(crate) fn artifact_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn looks_like_analysis_records(value: &serde_json::Value) -> bool {
    value.as_array().is_some_and(|items| {
        items.iter().all(|item| {
            ["run", "transaction", "metric", "comparator", "error"]
                .iter()
                .all(|k| item.get(*k).is_some())
        })
    })
}

fn has_mocha_keys(value: &serde_json::Value) -> bool {
    value.get("stats").is_some() || value.get("results").is_some()
}

/// Decode one artifact into its document variant.
///
/// `Ok(None)` is returned for Mocha-like files missing `stats` or `results`; those are skipped.
pub fn decode_artifact(path: &Path, content: &str) -> Result<Option<ArtifactDocument>, AppError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xml" => junit_xml::read_xml_suite_document(content, path)
            .map(|doc| Some(ArtifactDocument::XmlSuite(doc))),
        "json" => {
            let value: serde_json::Value = serde_json::from_str(content)
                .map_err(|e| AppError::parse("PARSE_JSON_FAILED", path, e))?;
            if mocha_json::is_mocha_shaped(&value) {
                return mocha_json::mocha_document_from_value(value, path)
                    .map(|doc| Some(ArtifactDocument::MochaReport(doc)));
            }
            if has_mocha_keys(&value) {
                info!(path = %path.display(), "skipping JSON artifact without stats and results");
                return Ok(None);
            }
            if looks_like_analysis_records(&value) {
                return serde_json::from_value(value)
                    .map(|records| Some(ArtifactDocument::PerfAnalysis(records)))
                    .map_err(|e| AppError::parse("PARSE_JSON_SCHEMA_MISMATCH", path, e));
            }
            Err(AppError::new(
                "PARSE_UNKNOWN_FORMAT",
                "JSON artifact matches no known report format",
            )
            .with_details(format!("path={}", path.display())))
        }
        _ => Err(AppError::new(
            "PARSE_UNKNOWN_FORMAT",
            "Unsupported test artifact type",
        )
        .with_details(format!("path={}; extension={ext}", path.display()))),
    }
}

/// Map one decoded document onto canonical reports.
pub fn document_to_run(doc: &ArtifactDocument, path: &Path) -> Run {
    match doc {
        ArtifactDocument::XmlSuite(d) => {
            aggregate_run(vec![junit_xml::xml_document_to_report(d.clone(), path)])
        }
        ArtifactDocument::MochaReport(d) => {
            aggregate_run(vec![mocha_json::mocha_document_to_report(d, path)])
        }
        ArtifactDocument::PerfAnalysis(records) => perf_analysis_to_run(records),
    }
}

/// Read, decode and normalize every artifact, merging them into one run.
///
/// The first structurally invalid artifact aborts the whole call.
pub fn parse_artifacts<P: AsRef<Path>>(paths: &[P]) -> Result<Run, AppError> {
    let mut runs = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let content = read_file(path)?;
        if let Some(doc) = decode_artifact(path, &content)? {
            runs.push(document_to_run(&doc, path));
        }
    }
    Ok(merge_runs(runs))
}
