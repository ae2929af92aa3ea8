//! Checks API operations.
//!
//! Check runs are listed per commit, created when a check suite is requested
//! and updated as CI progresses. All calls are installation-scoped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, instrument};

use super::InstallationClient;
use crate::error::{ApiError, ValidationError};

const CHECK_RUNS_PAGE_SIZE: usize = 100;

/// Lifecycle status of a check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunStatus {
    Queued,
    InProgress,
    Completed,
}

impl CheckRunStatus {
    /// Every status accepted by the Checks API for writes.
    pub const ALL: [CheckRunStatus; 3] = [Self::Queued, Self::InProgress, Self::Completed];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for CheckRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckRunStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "status".to_string(),
                message: format!("unknown check run status '{}'", s),
            })
    }
}

/// Final conclusion of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    ActionRequired,
    Cancelled,
    Failure,
    Neutral,
    Success,
    Skipped,
    Stale,
    TimedOut,
}

impl CheckConclusion {
    /// Every conclusion accepted by the Checks API.
    pub const ALL: [CheckConclusion; 8] = [
        Self::ActionRequired,
        Self::Cancelled,
        Self::Failure,
        Self::Neutral,
        Self::Success,
        Self::Skipped,
        Self::Stale,
        Self::TimedOut,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActionRequired => "action_required",
            Self::Cancelled => "cancelled",
            Self::Failure => "failure",
            Self::Neutral => "neutral",
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Stale => "stale",
            Self::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for CheckConclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckConclusion {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|conclusion| conclusion.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "conclusion".to_string(),
                message: format!("unknown check run conclusion '{}'", s),
            })
    }
}

/// A check run as returned by GitHub.
///
/// Status and conclusion are kept as strings on reads because GitHub reports
/// values (`waiting`, `pending`, ...) that cannot be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub id: u64,
    pub name: String,
    pub head_sha: String,
    pub status: String,
    pub conclusion: Option<String>,
    #[serde(default)]
    pub details_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Title and summary shown on a check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRunOutput {
    pub title: String,
    pub summary: String,
}

/// Request body for `POST /repos/{owner}/{repo}/check-runs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateCheckRunRequest {
    pub name: String,
    pub head_sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckRunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CheckRunOutput>,
}

impl CreateCheckRunRequest {
    /// A queued check run with no output.
    pub fn queued(name: impl Into<String>, head_sha: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head_sha: head_sha.into(),
            status: Some(CheckRunStatus::Queued),
            details_url: None,
            output: None,
        }
    }
}

/// Request body for `PATCH /repos/{owner}/{repo}/check-runs/{id}`.
///
/// Absent fields are omitted from the JSON body entirely, so GitHub leaves
/// them unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateCheckRunRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckRunStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<CheckConclusion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CheckRunOutput>,
}

#[derive(Debug, Deserialize)]
struct CheckRunList {
    total_count: usize,
    check_runs: Vec<CheckRun>,
}

/// Find the check run whose name matches exactly.
pub fn find_check_run_by_name<'a>(runs: &'a [CheckRun], name: &str) -> Option<&'a CheckRun> {
    runs.iter().find(|run| run.name == name)
}

impl InstallationClient {
    /// List every check run for a commit.
    ///
    /// Follows pagination until `total_count` runs have been collected.
    #[instrument(skip(self), fields(installation_id = %self.installation_id()))]
    pub async fn list_check_runs_for_ref(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Vec<CheckRun>, ApiError> {
        let mut runs = Vec::new();
        let mut page = 1;

        loop {
            let path = format!(
                "repos/{}/{}/commits/{}/check-runs?per_page={}&page={}",
                owner, repo, git_ref, CHECK_RUNS_PAGE_SIZE, page
            );
            let list = self.get(&path).await?.json::<CheckRunList>().await?;

            let received = list.check_runs.len();
            runs.extend(list.check_runs);

            if received == 0 || runs.len() >= list.total_count {
                break;
            }
            page += 1;
        }

        debug!(count = runs.len(), "Listed check runs");
        Ok(runs)
    }

    /// Update an existing check run.
    #[instrument(skip(self, request), fields(installation_id = %self.installation_id()))]
    pub async fn update_check_run(
        &self,
        owner: &str,
        repo: &str,
        check_run_id: u64,
        request: &UpdateCheckRunRequest,
    ) -> Result<CheckRun, ApiError> {
        let path = format!("repos/{}/{}/check-runs/{}", owner, repo, check_run_id);
        let run = self.patch(&path, request).await?.json::<CheckRun>().await?;
        Ok(run)
    }

    /// Create a new check run.
    #[instrument(skip(self, request), fields(installation_id = %self.installation_id(), name = %request.name))]
    pub async fn create_check_run(
        &self,
        owner: &str,
        repo: &str,
        request: &CreateCheckRunRequest,
    ) -> Result<CheckRun, ApiError> {
        let path = format!("repos/{}/{}/check-runs", owner, repo);
        let run = self.post(&path, request).await?.json::<CheckRun>().await?;
        Ok(run)
    }
}

#[cfg(test)]
#[path = "check_run_tests.rs"]
mod tests;
