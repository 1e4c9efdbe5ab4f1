//! Review and CI policy
//!
//! Tunables for the package state machines. Built once at bootstrap and
//! handed to every service by value; domain code never reads them from
//! the environment itself.

use chrono::Duration;

/// Policy applied to package review, CI and the watch loop
#[derive(Debug, Clone)]
pub struct PkgPolicy {
    /// A running CI run older than this reports `timeout`
    pub ci_timeout: Duration,
    /// How long a waiting CI is left for the event-driven trigger before
    /// the poller may start it
    pub ci_wait_timeout: Duration,
    /// Approvals required (with no outstanding rejection) to approve
    pub min_approvals: usize,
    /// Maximum length of a review comment, in characters
    pub max_comment_len: usize,
    /// Delay between watch loop ticks
    pub watch_interval: std::time::Duration,
    /// PR label the CI bot sets when the import PR builds
    pub ci_success_label: String,
    /// PR label the CI bot sets when the import PR fails
    pub ci_failure_label: String,
}

impl Default for PkgPolicy {
    fn default() -> Self {
        Self {
            ci_timeout: Duration::hours(3),
            ci_wait_timeout: Duration::hours(1),
            min_approvals: 2,
            max_comment_len: 1000,
            watch_interval: std::time::Duration::from_secs(60),
            ci_success_label: "ci_successful".to_string(),
            ci_failure_label: "ci_failed".to_string(),
        }
    }
}
