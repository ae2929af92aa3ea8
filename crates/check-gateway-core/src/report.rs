//! Validation and sanitization of check-run reports from internal callers.
//!
//! A report arrives as an untyped JSON body. [`ReportPayload::from_json`]
//! validates it field by field in a fixed order and stops at the first
//! failure, so the error a caller sees is deterministic. Title and summary
//! are HTML-escaped once validation has passed.

use github_checks_sdk::{CheckConclusion, CheckRunStatus};
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

const MAX_NAME_CHARS: usize = 100;
const MAX_TITLE_CHARS: usize = 200;
const MAX_SUMMARY_CHARS: usize = 1000;

/// Validated, sanitized check-run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPayload {
    sha: String,
    name: String,
    status: CheckRunStatus,
    conclusion: Option<CheckConclusion>,
    title: String,
    summary: String,
    details_url: String,
}

impl ReportPayload {
    /// Validate a raw JSON body and build a sanitized payload.
    ///
    /// Fields are checked in this order: `sha`, `name`, `status`,
    /// `conclusion`, `title`, `summary`, `details_url`. A value of the wrong
    /// JSON type is rejected the same way as an invalid value.
    pub fn from_json(value: &Value) -> Result<Self, ReportValidationError> {
        let fields = value
            .as_object()
            .ok_or(ReportValidationError::NotAnObject)?;

        let sha = string_field(fields, "sha")
            .filter(|sha| is_commit_sha(sha))
            .ok_or(ReportValidationError::InvalidSha)?;

        let name = string_field(fields, "name")
            .filter(|name| char_len_within(name, MAX_NAME_CHARS))
            .ok_or(ReportValidationError::InvalidName)?;

        let status = string_field(fields, "status")
            .and_then(|status| status.parse::<CheckRunStatus>().ok())
            .ok_or(ReportValidationError::InvalidStatus)?;

        let conclusion = match fields.get("conclusion") {
            None | Some(Value::Null) => None,
            Some(Value::String(conclusion)) => Some(
                conclusion
                    .parse::<CheckConclusion>()
                    .map_err(|_| ReportValidationError::InvalidConclusion)?,
            ),
            Some(_) => return Err(ReportValidationError::InvalidConclusion),
        };

        let title = string_field(fields, "title")
            .filter(|title| char_len_within(title, MAX_TITLE_CHARS))
            .ok_or(ReportValidationError::InvalidTitle)?;

        let summary = string_field(fields, "summary")
            .filter(|summary| char_len_within(summary, MAX_SUMMARY_CHARS))
            .ok_or(ReportValidationError::InvalidSummary)?;

        let details_url = string_field(fields, "details_url")
            .filter(|url| is_absolute_url(url))
            .ok_or(ReportValidationError::InvalidDetailsUrl)?;

        Ok(Self {
            sha: sha.to_string(),
            name: name.to_string(),
            status,
            conclusion,
            title: escape_html(title),
            summary: escape_html(summary),
            details_url: details_url.to_string(),
        })
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> CheckRunStatus {
        self.status
    }

    pub fn conclusion(&self) -> Option<CheckConclusion> {
        self.conclusion
    }

    /// HTML-escaped title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// HTML-escaped summary
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn details_url(&self) -> &str {
        &self.details_url
    }

    /// Whether this report finishes the check run.
    pub fn is_completed(&self) -> bool {
        self.status == CheckRunStatus::Completed
    }
}

/// Report validation failures, in validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReportValidationError {
    #[error("Invalid payload: expected a JSON object")]
    NotAnObject,

    #[error("Invalid SHA: must be 40 character hex string")]
    InvalidSha,

    #[error("Invalid name: must be between 1 and 100 characters")]
    InvalidName,

    #[error("Invalid status: must be one of queued, in_progress, completed")]
    InvalidStatus,

    #[error("Invalid conclusion: must be one of action_required, cancelled, failure, neutral, success, skipped, stale, timed_out")]
    InvalidConclusion,

    #[error("Invalid title: must be between 1 and 200 characters")]
    InvalidTitle,

    #[error("Invalid summary: must be between 1 and 1000 characters")]
    InvalidSummary,

    #[error("Invalid details_url: must be a valid absolute URL")]
    InvalidDetailsUrl,
}

/// Escape the five HTML-significant characters.
///
/// Existing entities are escaped again rather than passed through.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn string_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

fn char_len_within(value: &str, max: usize) -> bool {
    let len = value.chars().count();
    (1..=max).contains(&len)
}

fn is_absolute_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

fn is_commit_sha(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
