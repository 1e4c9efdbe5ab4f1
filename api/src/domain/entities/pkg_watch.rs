//! Post-approval watch record
//!
//! A `PkgWatch` follows an approved package through repository creation:
//! the community PR is opened, waits for the CI bot's label, merges, and
//! the package is finally marked imported. `next_action` is the pure
//! decision half of the watch loop; the app layer executes what it returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::software_pkg::SoftwarePkgId;
use crate::error::DomainError;

/// Watch record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    Initialized,
    PrCreated,
    PrMerged,
    Done,
    Exception,
}

impl WatchStatus {
    /// Statuses the watch loop still acts on
    pub const ACTIVE: [WatchStatus; 3] = [
        WatchStatus::Initialized,
        WatchStatus::PrCreated,
        WatchStatus::PrMerged,
    ];

    pub fn is_finished(&self) -> bool {
        matches!(self, WatchStatus::Done | WatchStatus::Exception)
    }
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchStatus::Initialized => write!(f, "initialized"),
            WatchStatus::PrCreated => write!(f, "pr_created"),
            WatchStatus::PrMerged => write!(f, "pr_merged"),
            WatchStatus::Done => write!(f, "done"),
            WatchStatus::Exception => write!(f, "exception"),
        }
    }
}

impl std::str::FromStr for WatchStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialized" => Ok(WatchStatus::Initialized),
            "pr_created" => Ok(WatchStatus::PrCreated),
            "pr_merged" => Ok(WatchStatus::PrMerged),
            "done" => Ok(WatchStatus::Done),
            "exception" => Ok(WatchStatus::Exception),
            _ => Err(DomainError::Validation(format!(
                "unknown watch status: {}",
                s
            ))),
        }
    }
}

/// Reference to the repository-creation PR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub number: i64,
    pub link: String,
}

/// State of a PR on the forge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// Snapshot of a PR as fetched from the forge
#[derive(Debug, Clone)]
pub struct PullRequestState {
    pub state: PrState,
    pub mergeable: bool,
    pub labels: Vec<String>,
    /// Who closed the PR, when known
    pub closed_by: Option<String>,
}

impl PullRequestState {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// What the watch loop should do next for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Open the branch and PR for the package
    CreatePr,
    /// PR has conflicts; bring the branch up to date
    UpdateBranch,
    /// CI labelled the PR as passing
    Merge,
    /// CI labelled the PR as failing
    HandleCiFailure,
    /// PR was merged outside the loop
    MarkMerged,
    /// PR was closed without merging
    MarkClosed { closed_by: Option<String> },
    /// PR merged; finish the package's initialization
    FinishInit,
    /// Nothing to do until the forge changes
    Wait,
}

/// Watch record for one approved package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PkgWatch {
    pub pkg_id: SoftwarePkgId,
    pub status: WatchStatus,
    pub pr: Option<PullRequestRef>,
    pub updated_at: DateTime<Utc>,
}

impl PkgWatch {
    pub fn new(pkg_id: SoftwarePkgId, now: DateTime<Utc>) -> Self {
        Self {
            pkg_id,
            status: WatchStatus::Initialized,
            pr: None,
            updated_at: now,
        }
    }

    /// Only `pr_created` records consult the forge
    pub fn needs_pr_state(&self) -> bool {
        self.status == WatchStatus::PrCreated && self.pr.is_some()
    }

    /// Decide the next step from the record and the freshly fetched PR
    pub fn next_action(
        &self,
        pr: Option<&PullRequestState>,
        success_label: &str,
        failure_label: &str,
    ) -> WatchAction {
        match self.status {
            WatchStatus::Initialized => WatchAction::CreatePr,
            WatchStatus::PrCreated => {
                let Some(pr) = pr else {
                    return WatchAction::Wait;
                };
                match pr.state {
                    PrState::Merged => WatchAction::MarkMerged,
                    // The loop closes CI-failed PRs itself; finish that path
                    // if it was interrupted after the close
                    PrState::Closed if pr.has_label(failure_label) => {
                        WatchAction::HandleCiFailure
                    }
                    PrState::Closed => WatchAction::MarkClosed {
                        closed_by: pr.closed_by.clone(),
                    },
                    PrState::Open if !pr.mergeable => WatchAction::UpdateBranch,
                    PrState::Open if pr.has_label(success_label) => WatchAction::Merge,
                    PrState::Open if pr.has_label(failure_label) => WatchAction::HandleCiFailure,
                    PrState::Open => WatchAction::Wait,
                }
            }
            WatchStatus::PrMerged => WatchAction::FinishInit,
            WatchStatus::Done | WatchStatus::Exception => WatchAction::Wait,
        }
    }

    pub fn pr_created(&mut self, pr: PullRequestRef, now: DateTime<Utc>) {
        self.pr = Some(pr);
        self.status = WatchStatus::PrCreated;
        self.updated_at = now;
    }

    pub fn set_status(&mut self, status: WatchStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}
