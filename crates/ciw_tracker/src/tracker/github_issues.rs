use std::time::Duration;

use ciw_core::config::TrackerConfig;
use ciw_core::domain::{Incident, Issue, IssueState};
use ciw_core::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::IssueTracker;
use crate::body::{failure_comment, issue_body, success_comment};
use crate::retry::{with_fixed_backoff, AttemptError, RetryPolicy};

const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 50;

/// GitHub-style REST issue tracker. Issues are associated with a service through a label of
/// the same name.
#[derive(Debug, Clone)]
pub struct GithubIssueTracker {
    base_url: String,
    repository: String,
    token: String,
    labels: Vec<String>,
    retry: RetryPolicy,
    agent: ureq::Agent,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubIssue {
    id: u64,
    number: u64,
    html_url: String,
    state: String,
    #[serde(default)]
    body: Option<String>,
    created_at: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    labels: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    assignees: Vec<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct StateRequest<'a> {
    state: &'a str,
}

fn to_issue(raw: GithubIssue) -> Result<Issue, AppError> {
    let state = match raw.state.as_str() {
        "open" => IssueState::Open,
        "closed" => IssueState::Closed,
        other => {
            return Err(
                AppError::new("TRACKER_DECODE_FAILED", "Unknown issue state from tracker")
                    .with_details(format!("number={}; state={other}", raw.number)),
            )
        }
    };
    Ok(Issue {
        id: raw.id,
        number: raw.number,
        url: raw.html_url,
        state,
        body: raw.body.unwrap_or_default(),
        created_at: raw.created_at,
    })
}

fn rate_limited(status: u16, resp: &ureq::Response) -> bool {
    status == 429 || (status == 403 && resp.header("x-ratelimit-remaining") == Some("0"))
}

impl GithubIssueTracker {
    /// Build a client, reading the API token from the configured environment variable.
    pub fn new(config: &TrackerConfig) -> Result<Self, AppError> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            AppError::new("CONFIG_TOKEN_MISSING", "Tracker token is not set")
                .with_details(format!("env={}", config.token_env))
        })?;
        Self::with_token(config, &token)
    }

    pub fn with_token(config: &TrackerConfig, token: &str) -> Result<Self, AppError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "Tracker base URL must be http(s)",
            )
            .with_details(format!("base_url={base_url}")));
        }

        let repository = config.repository.trim().to_string();
        let parts: Vec<&str> = repository.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "Tracker repository must be owner/name",
            )
            .with_details(format!("repository={repository}")));
        }

        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(AppError::new("CONFIG_TOKEN_MISSING", "Tracker token is empty"));
        }

        Ok(Self {
            base_url,
            repository,
            token,
            labels: config.labels.clone(),
            retry: RetryPolicy::fixed(
                config.retry_max_attempts,
                Duration::from_millis(config.retry_delay_ms),
            ),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}{}", self.base_url, self.repository, path)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "ci-incident-watch")
    }

    fn send(
        &self,
        operation: &str,
        method: &str,
        url: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<ureq::Response, AppError> {
        with_fixed_backoff(&self.retry, operation, |attempt| {
            debug!(operation, method, url, attempt, "tracker request");
            let req = query
                .iter()
                .fold(self.request(method, url), |req, (k, v)| req.query(k, v));
            let resp = match &body {
                Some(b) => req.send_json(b.clone()),
                None => req.call(),
            };
            match resp {
                Ok(r) => Ok(r),
                Err(ureq::Error::Status(status, r)) if rate_limited(status, &r) => {
                    Err(AttemptError::RateLimited(format!("status={status}")))
                }
                Err(ureq::Error::Status(status, r)) => {
                    let text = r.into_string().unwrap_or_default();
                    Err(AttemptError::Fatal(
                        AppError::new("TRACKER_REQUEST_FAILED", "Tracker request failed")
                            .with_details(format!(
                                "operation={operation}; status={status}; body={text}"
                            )),
                    ))
                }
                Err(e) => Err(AttemptError::Fatal(
                    AppError::new("TRACKER_UNREACHABLE", "Failed to reach tracker")
                        .with_details(format!("operation={operation}; err={e}"))
                        .with_retryable(true),
                )),
            }
        })
    }

    fn encode<T: Serialize>(operation: &str, v: &T) -> Result<serde_json::Value, AppError> {
        serde_json::to_value(v).map_err(|e| {
            AppError::new("TRACKER_ENCODE_FAILED", "Failed to encode tracker request")
                .with_details(format!("operation={operation}; err={e}"))
        })
    }

    fn comment(&self, issue: &Issue, text: &str) -> Result<(), AppError> {
        let url = self.url(&format!("/issues/{}/comments", issue.number));
        let body = Self::encode("comment", &CommentRequest { body: text })?;
        self.send("comment", "POST", &url, &[], Some(body))?;
        Ok(())
    }

    fn set_state(&self, issue: &Issue, state: &str) -> Result<(), AppError> {
        let url = self.url(&format!("/issues/{}", issue.number));
        let body = Self::encode("set_state", &StateRequest { state })?;
        self.send("set_state", "PATCH", &url, &[], Some(body))?;
        Ok(())
    }
}

impl IssueTracker for GithubIssueTracker {
    fn list_issues(&self, service: &str) -> Result<Vec<Issue>, AppError> {
        let url = self.url("/issues");
        let per_page = PAGE_SIZE.to_string();
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let page_param = page.to_string();
            let query = [
                ("state", "all"),
                ("labels", service),
                ("per_page", per_page.as_str()),
                ("page", page_param.as_str()),
            ];
            let resp = self.send("list_issues", "GET", &url, &query, None)?;
            let batch: Vec<GithubIssue> = resp.into_json().map_err(|e| {
                AppError::new("TRACKER_DECODE_FAILED", "Failed to decode issue list")
                    .with_details(e.to_string())
            })?;
            let len = batch.len();
            for raw in batch.into_iter().filter(|i| i.pull_request.is_none()) {
                out.push(to_issue(raw)?);
            }
            if len < PAGE_SIZE {
                break;
            }
            if page == MAX_PAGES {
                warn!(
                    service,
                    pages = MAX_PAGES,
                    listed = out.len(),
                    "issue listing hit the page cap; older issues were not considered"
                );
            }
        }
        info!(service, count = out.len(), "listed tracked issues");
        Ok(out)
    }

    fn create_issue(&self, incident: &Incident) -> Result<Issue, AppError> {
        let body = issue_body(incident);
        let mut labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        if !labels.contains(&incident.service.as_str()) {
            labels.push(&incident.service);
        }
        let req = CreateIssueRequest {
            title: &incident.title,
            body: &body,
            labels,
            assignees: incident.assignee.as_deref().into_iter().collect(),
        };
        let payload = Self::encode("create_issue", &req)?;
        let resp = self.send(
            "create_issue",
            "POST",
            &self.url("/issues"),
            &[],
            Some(payload),
        )?;
        let raw: GithubIssue = resp.into_json().map_err(|e| {
            AppError::new("TRACKER_DECODE_FAILED", "Failed to decode created issue")
                .with_details(e.to_string())
        })?;
        to_issue(raw)
    }

    fn close_issue(&self, issue: &Issue, incident: &Incident) -> Result<(), AppError> {
        self.comment(issue, &success_comment(incident))?;
        self.set_state(issue, "closed")
    }

    fn reopen_issue(&self, issue: &Issue, incident: &Incident) -> Result<(), AppError> {
        self.comment(issue, &failure_comment(incident))?;
        self.set_state(issue, "open")
    }
}
