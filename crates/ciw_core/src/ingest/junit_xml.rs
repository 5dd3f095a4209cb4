use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info};

use crate::aggregate::{build_report, build_suite};
use crate::classify::{classify, corrected_failures, XmlCaseEvidence, XML_STATUS_RULES};
use crate::domain::{Failure, Report, Test, TestStatus};
use crate::error::AppError;

use super::artifact_stem;

/// Typed view of a JUnit-style document before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlSuiteDocument {
    /// `name` attribute of a `<testsuites>` wrapper, when present.
    pub name: Option<String>,
    /// Every `<testsuite>` in document order, nested ones flattened.
    pub suites: Vec<XmlSuite>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlSuite {
    pub name: Option<String>,
    pub declared_tests: Option<i64>,
    pub declared_failures: Option<i64>,
    pub declared_skipped: Option<i64>,
    pub cases: Vec<XmlCase>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlCase {
    pub name: String,
    pub time: f64,
    pub children: Vec<XmlCaseChild>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlCaseChild {
    pub element: String,
    pub message: Option<String>,
    pub text: String,
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &str, path: &Path) -> Result<Option<String>, AppError> {
    for a in e.attributes() {
        let a = a.map_err(|err| AppError::parse("PARSE_XML_FAILED", path, err))?;
        if a.key.local_name().as_ref() == key.as_bytes() {
            let v = a
                .unescape_value()
                .map_err(|err| AppError::parse("PARSE_XML_FAILED", path, err))?;
            return Ok(Some(v.trim().to_string()));
        }
    }
    Ok(None)
}

fn attr_i64(e: &BytesStart<'_>, key: &str, path: &Path) -> Result<Option<i64>, AppError> {
    Ok(attr(e, key, path)?.and_then(|v| v.parse::<i64>().ok()))
}

fn attr_seconds(e: &BytesStart<'_>, path: &Path) -> Result<f64, AppError> {
    Ok(attr(e, "time", path)?
        .and_then(|v| v.replace(',', "").parse::<f64>().ok())
        .filter(|t| t.is_finite() && *t >= 0.0)
        .unwrap_or(0.0))
}

fn suite_from(e: &BytesStart<'_>, path: &Path) -> Result<XmlSuite, AppError> {
    Ok(XmlSuite {
        name: attr(e, "name", path)?,
        declared_tests: attr_i64(e, "tests", path)?,
        declared_failures: attr_i64(e, "failures", path)?,
        declared_skipped: attr_i64(e, "skipped", path)?,
        cases: Vec::new(),
    })
}

fn case_from(e: &BytesStart<'_>, path: &Path) -> Result<XmlCase, AppError> {
    Ok(XmlCase {
        name: attr(e, "name", path)?.unwrap_or_default(),
        time: attr_seconds(e, path)?,
        children: Vec::new(),
    })
}

fn child_from(e: &BytesStart<'_>, path: &Path) -> Result<XmlCaseChild, AppError> {
    Ok(XmlCaseChild {
        element: local_name(e),
        message: attr(e, "message", path)?.filter(|m| !m.is_empty()),
        text: String::new(),
    })
}

/// Read a JUnit-style document into its typed form.
///
/// Only structural problems (malformed markup, unexpected root) are errors; odd attribute
/// values are tolerated and cleaned up during normalization.
pub fn read_xml_suite_document(xml: &str, path: &Path) -> Result<XmlSuiteDocument, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = XmlSuiteDocument::default();
    // Indices into `doc.suites` for the currently open `<testsuite>` elements.
    let mut open_suites: Vec<usize> = Vec::new();
    let mut case: Option<XmlCase> = None;
    let mut child: Option<XmlCaseChild> = None;
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| AppError::parse("PARSE_XML_FAILED", path, err))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = local_name(e);
                if depth == 0 {
                    if name != "testsuites" && name != "testsuite" {
                        return Err(AppError::new(
                            "PARSE_XML_UNEXPECTED_ROOT",
                            "XML artifact is not a JUnit-style suite document",
                        )
                        .with_details(format!("path={}; root={name}", path.display())));
                    }
                    saw_root = true;
                }

                if case.is_some() {
                    // Direct children of a testcase are the status evidence; anything nested
                    // deeper only contributes text.
                    if child.is_none() {
                        let c = child_from(e, path)?;
                        if is_empty {
                            if let Some(case) = case.as_mut() {
                                case.children.push(c);
                            }
                        } else {
                            child = Some(c);
                        }
                    }
                } else {
                    match name.as_str() {
                        "testsuites" if depth == 0 => {
                            doc.name = attr(e, "name", path)?;
                        }
                        "testsuite" => {
                            doc.suites.push(suite_from(e, path)?);
                            if !is_empty {
                                open_suites.push(doc.suites.len() - 1);
                            }
                        }
                        "testcase" => {
                            let c = case_from(e, path)?;
                            if is_empty {
                                if let Some(idx) = open_suites.last() {
                                    doc.suites[*idx].cases.push(c);
                                }
                            } else {
                                case = Some(c);
                            }
                        }
                        _ => {}
                    }
                }

                if !is_empty {
                    depth += 1;
                }
            }
            Event::Text(ref t) => {
                if let Some(c) = child.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|err| AppError::parse("PARSE_XML_FAILED", path, err))?;
                    c.text.push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some(c) = child.as_mut() {
                    c.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "testcase" if child.is_none() => {
                        if let Some(c) = case.take() {
                            if let Some(idx) = open_suites.last() {
                                doc.suites[*idx].cases.push(c);
                            }
                        }
                    }
                    "testsuite" if case.is_none() => {
                        open_suites.pop();
                    }
                    _ => {
                        // Closing a direct child of the current testcase.
                        if let Some(c) = child.as_ref() {
                            if c.element == name {
                                if let (Some(c), Some(case)) = (child.take(), case.as_mut()) {
                                    case.children.push(c);
                                }
                            }
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(AppError::new(
            "PARSE_XML_FAILED",
            "XML artifact contains no root element",
        )
        .with_details(format!("path={}", path.display())));
    }
    if depth != 0 {
        return Err(AppError::new("PARSE_XML_FAILED", "XML artifact is truncated")
            .with_details(format!("path={}; open_elements={depth}", path.display())));
    }

    Ok(doc)
}

fn failure_text(child: &XmlCaseChild) -> String {
    let text = child.text.trim();
    match (child.message.as_deref(), text.is_empty()) {
        (Some(m), false) => format!("{m}\n{text}"),
        (Some(m), true) => m.to_string(),
        (None, false) => text.to_string(),
        (None, true) => child.element.clone(),
    }
}

fn normalize_case(case: XmlCase) -> Test {
    let evidence = XmlCaseEvidence {
        children: case.children.iter().map(|c| c.element.clone()).collect(),
    };
    let status = classify(&evidence, XML_STATUS_RULES);
    let failures = if status == TestStatus::Fail {
        case.children
            .iter()
            .filter(|c| c.element != "skipped" && c.element != "pending")
            .map(|c| Failure::new(failure_text(c)))
            .collect()
    } else {
        Vec::new()
    };
    Test {
        name: case.name,
        status,
        time: case.time,
        failures,
    }
}

fn resolved_name(name: Option<String>, fallback: &str) -> String {
    match name {
        Some(n) if !n.is_empty() && n != "null" => n,
        _ => fallback.to_string(),
    }
}

/// Normalize a typed XML document into one canonical report.
pub fn xml_document_to_report(doc: XmlSuiteDocument, path: &Path) -> Report {
    let stem = artifact_stem(path);
    let mut suites = Vec::new();

    for suite in doc.suites {
        let declared = suite.declared_tests.unwrap_or(0);
        if declared <= 0 {
            info!(
                path = %path.display(),
                suite = suite.name.as_deref().unwrap_or(""),
                declared_tests = ?suite.declared_tests,
                "dropping suite container without a positive test count"
            );
            continue;
        }

        let name = resolved_name(suite.name, &stem);
        let tests: Vec<Test> = suite.cases.into_iter().map(normalize_case).collect();
        let normalized = build_suite(name, tests);

        let reported = corrected_failures(
            suite.declared_failures.unwrap_or(0),
            suite.declared_skipped.unwrap_or(0),
        );
        if reported != normalized.failures {
            debug!(
                path = %path.display(),
                suite = %normalized.name,
                reported,
                derived = normalized.failures,
                "declared failure count differs from classified cases"
            );
        }
        suites.push(normalized);
    }

    build_report(resolved_name(doc.name, &stem), suites)
}

pub fn parse_junit_xml(xml: &str, path: &Path) -> Result<Report, AppError> {
    let doc = read_xml_suite_document(xml, path)?;
    Ok(xml_document_to_report(doc, path))
}
