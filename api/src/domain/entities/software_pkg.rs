//! Software package aggregate
//!
//! A `SoftwarePkg` is one request to import a package into the
//! distribution. It owns its basic info, CI sub-state, check-item reviews,
//! comments and operation log; every mutation goes through a method here
//! that checks all preconditions before changing anything, so an `Err`
//! always means "nothing happened".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::check_item::{
    committer_acceptance_item, common_check_items, sig_acceptance_item, CheckItem,
    CheckItemReview, UserReview,
};
use super::primitives::{
    Account, Description, License, PackageCiStatus, PackageName, PackagePhase, PackagePlatform,
    ReviewComment, Url,
};
use crate::domain::policy::PkgPolicy;
use crate::domain::ports::PkgCi;
use crate::error::DomainError;

/// Unique identifier for a package request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoftwarePkgId(pub Uuid);

impl SoftwarePkgId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SoftwarePkgId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SoftwarePkgId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SoftwarePkgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a review comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final outcome of the review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewResult {
    Approved,
    Rejected,
}

impl std::fmt::Display for ReviewResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewResult::Approved => write!(f, "approved"),
            ReviewResult::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ReviewResult {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approved" => Ok(ReviewResult::Approved),
            "rejected" => Ok(ReviewResult::Rejected),
            _ => Err(DomainError::Validation(format!(
                "unknown review result: {}",
                s
            ))),
        }
    }
}

/// What the importer submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub source_code_url: Url,
    pub license: License,
    pub description: Description,
    pub platform: PackagePlatform,
    /// Sig the package is imported into
    pub sig: String,
    pub reason: Description,
    #[serde(default)]
    pub committers: Vec<Account>,
}

impl Application {
    pub fn validate(&self) -> Result<(), DomainError> {
        let sig = self.sig.trim();
        if sig.is_empty() || sig.len() > 64 || sig.contains(char::is_whitespace) {
            return Err(DomainError::Validation(format!("invalid sig '{}'", self.sig)));
        }
        Ok(())
    }
}

/// Identity and review ledger of a package request
#[derive(Debug, Clone, Serialize)]
pub struct SoftwarePkgBasicInfo {
    pub id: SoftwarePkgId,
    pub importer: Account,
    pub name: PackageName,
    pub phase: PackagePhase,
    pub review_result: Option<ReviewResult>,
    pub applied_at: DateTime<Utc>,
    pub approved_by: Vec<Account>,
    pub rejected_by: Vec<Account>,
    pub application: Application,
    /// Link of the PR that creates the package repository
    pub repo_pr_link: Option<String>,
}

/// CI sub-state; `id == 0` means no run is tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftwarePkgCi {
    pub id: i64,
    pub status: PackageCiStatus,
    pub start_time: DateTime<Utc>,
}

impl SoftwarePkgCi {
    pub fn waiting(now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            status: PackageCiStatus::Waiting,
            start_time: now,
        }
    }

    /// Status as callers should see it. A run that outlived `timeout`
    /// reads as `timeout`, while the stored status stays `running` until
    /// the next explicit CI action rewrites it.
    pub fn status(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> PackageCiStatus {
        if self.status == PackageCiStatus::Running && now >= self.start_time + timeout {
            PackageCiStatus::Timeout
        } else {
            self.status
        }
    }
}

/// A review comment
#[derive(Debug, Clone, Serialize)]
pub struct SoftwarePkgComment {
    pub id: CommentId,
    pub author: Account,
    pub content: ReviewComment,
    pub created_at: DateTime<Utc>,
}

/// Kinds of entries in the operation log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PkgOperation {
    Apply,
    UpdateApplication,
    Review,
    Approve,
    Reject,
    GiveUp,
    Close,
    StartCi,
    RetestCi,
    CiDone,
    InitStarted,
    InitDone,
}

/// One entry of the operation log; `user` is `None` for system actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    pub user: Option<Account>,
    pub action: PkgOperation,
    pub time: DateTime<Utc>,
}

/// Effect of a review action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewChange {
    /// Whether the aggregate changed at all
    pub changed: bool,
    /// Set only on the call that flipped the outcome
    pub decided: Option<ReviewResult>,
}

impl ReviewChange {
    fn unchanged() -> Self {
        Self {
            changed: false,
            decided: None,
        }
    }
}

/// The package aggregate root
#[derive(Debug, Clone, Serialize)]
pub struct SoftwarePkg {
    basic: SoftwarePkgBasicInfo,
    ci: SoftwarePkgCi,
    reviews: Vec<UserReview>,
    comments: Vec<SoftwarePkgComment>,
    logs: Vec<OperationLog>,
}

impl SoftwarePkg {
    /// Create a fresh import request in phase `reviewing`
    pub fn new(
        importer: Account,
        name: PackageName,
        application: Application,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        application.validate()?;

        let mut pkg = Self {
            basic: SoftwarePkgBasicInfo {
                id: SoftwarePkgId::new(),
                importer: importer.clone(),
                name,
                phase: PackagePhase::Reviewing,
                review_result: None,
                applied_at: now,
                approved_by: Vec::new(),
                rejected_by: Vec::new(),
                application,
                repo_pr_link: None,
            },
            ci: SoftwarePkgCi::waiting(now),
            reviews: Vec::new(),
            comments: Vec::new(),
            logs: Vec::new(),
        };
        pkg.log(Some(&importer), PkgOperation::Apply, now);
        Ok(pkg)
    }

    /// Rebuild an aggregate from persisted parts
    pub fn restore(
        basic: SoftwarePkgBasicInfo,
        ci: SoftwarePkgCi,
        reviews: Vec<UserReview>,
        comments: Vec<SoftwarePkgComment>,
        logs: Vec<OperationLog>,
    ) -> Self {
        Self {
            basic,
            ci,
            reviews,
            comments,
            logs,
        }
    }

    pub fn id(&self) -> SoftwarePkgId {
        self.basic.id
    }

    pub fn basic(&self) -> &SoftwarePkgBasicInfo {
        &self.basic
    }

    pub fn ci(&self) -> &SoftwarePkgCi {
        &self.ci
    }

    pub fn reviews(&self) -> &[UserReview] {
        &self.reviews
    }

    pub fn comments(&self) -> &[SoftwarePkgComment] {
        &self.comments
    }

    pub fn logs(&self) -> &[OperationLog] {
        &self.logs
    }

    pub fn phase(&self) -> PackagePhase {
        self.basic.phase
    }

    pub fn is_importer(&self, user: &Account) -> bool {
        self.basic.importer == *user
    }

    fn log(&mut self, user: Option<&Account>, action: PkgOperation, now: DateTime<Utc>) {
        self.logs.push(OperationLog {
            user: user.cloned(),
            action,
            time: now,
        });
    }

    fn ensure_phase(&self, expected: PackagePhase) -> Result<(), DomainError> {
        if self.basic.phase != expected {
            return Err(DomainError::InvalidPhase(format!(
                "package {} is {}, expected {}",
                self.basic.name, self.basic.phase, expected
            )));
        }
        Ok(())
    }

    fn ensure_importer(&self, user: &Account) -> Result<(), DomainError> {
        if !self.is_importer(user) {
            return Err(DomainError::NotImporter(format!(
                "{} is not the importer of {}",
                user, self.basic.name
            )));
        }
        Ok(())
    }

    // ========== Application ==========

    /// Replace the application while still under review. The review starts
    /// over and the CI goes back to waiting.
    pub async fn update_application<C: PkgCi + ?Sized>(
        &mut self,
        user: &Account,
        application: Application,
        ci: &C,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_phase(PackagePhase::Reviewing)?;
        self.ensure_importer(user)?;
        application.validate()?;

        if self.ci.id != 0 {
            ci.clear_ci(self.ci.id).await?;
        }

        self.basic.application = application;
        self.basic.approved_by.clear();
        self.basic.rejected_by.clear();
        self.basic.review_result = None;
        self.reviews.clear();
        self.ci = SoftwarePkgCi::waiting(now);
        self.log(Some(user), PkgOperation::UpdateApplication, now);
        Ok(())
    }

    // ========== Check items ==========

    /// Common items plus sig acceptance and one item per listed committer
    pub fn check_items(&self) -> Vec<CheckItem> {
        let mut items = common_check_items();
        items.push(sig_acceptance_item(&self.basic.application.sig));
        items.extend(
            self.basic
                .application
                .committers
                .iter()
                .map(committer_acceptance_item),
        );
        items
    }

    pub fn check_item_reviews(&self) -> Vec<CheckItemReview> {
        self.check_items()
            .iter()
            .map(|item| CheckItemReview::aggregate(item, &self.reviews))
            .collect()
    }

    /// Record a reviewer's judgments, replacing their previous submission
    pub fn add_review(&mut self, review: UserReview) -> Result<(), DomainError> {
        self.ensure_phase(PackagePhase::Reviewing)?;

        let items = self.check_items();
        if let Some(unknown) = review
            .judgments
            .iter()
            .find(|j| !items.iter().any(|i| i.id == j.item_id))
        {
            return Err(DomainError::Validation(format!(
                "unknown check item '{}'",
                unknown.item_id
            )));
        }
        if review.judgments.is_empty() {
            return Err(DomainError::Validation("review has no judgments".into()));
        }

        let now = review.reviewed_at;
        let account = review.reviewer.account.clone();
        self.reviews
            .retain(|r| r.reviewer.account != review.reviewer.account);
        self.reviews.push(review);
        self.log(Some(&account), PkgOperation::Review, now);
        Ok(())
    }

    // ========== Phase transitions ==========

    /// Record an approval.
    ///
    /// A rejector who approves is moved out of `rejected_by` before the
    /// outcome is re-evaluated. The outcome flips to approved, and the
    /// phase moves to `creating_repo`, once `min_approvals` approvals stand
    /// with no rejection left.
    pub fn approve_by(
        &mut self,
        user: &Account,
        policy: &PkgPolicy,
        now: DateTime<Utc>,
    ) -> Result<ReviewChange, DomainError> {
        self.ensure_phase(PackagePhase::Reviewing)?;

        if self.basic.approved_by.contains(user) {
            return Ok(ReviewChange::unchanged());
        }

        let was_rejector = self.basic.rejected_by.contains(user);
        self.basic.rejected_by.retain(|a| a != user);
        self.basic.approved_by.push(user.clone());
        self.log(Some(user), PkgOperation::Approve, now);

        let decided = if self.basic.approved_by.len() >= policy.min_approvals
            && self.basic.rejected_by.is_empty()
        {
            self.basic.review_result = Some(ReviewResult::Approved);
            self.basic.phase = PackagePhase::CreatingRepo;
            Some(ReviewResult::Approved)
        } else {
            if was_rejector && self.basic.rejected_by.is_empty() {
                self.basic.review_result = None;
            }
            None
        };

        Ok(ReviewChange {
            changed: true,
            decided,
        })
    }

    /// Record a rejection. The first rejection decides the outcome.
    pub fn reject_by(
        &mut self,
        user: &Account,
        now: DateTime<Utc>,
    ) -> Result<ReviewChange, DomainError> {
        self.ensure_phase(PackagePhase::Reviewing)?;

        if self.basic.rejected_by.contains(user) {
            return Ok(ReviewChange::unchanged());
        }

        self.basic.approved_by.retain(|a| a != user);
        self.basic.rejected_by.push(user.clone());
        self.log(Some(user), PkgOperation::Reject, now);

        let decided = if self.basic.review_result.is_none() {
            self.basic.review_result = Some(ReviewResult::Rejected);
            Some(ReviewResult::Rejected)
        } else {
            None
        };

        Ok(ReviewChange {
            changed: true,
            decided,
        })
    }

    /// The importer withdraws the request
    pub fn give_up(&mut self, user: &Account, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_phase(PackagePhase::Reviewing)?;
        self.ensure_importer(user)?;

        self.basic.phase = PackagePhase::Closed;
        self.log(Some(user), PkgOperation::GiveUp, now);
        Ok(())
    }

    /// Administrative close, e.g. when the package already exists upstream
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        match self.basic.phase {
            PackagePhase::Reviewing | PackagePhase::CreatingRepo => {}
            PackagePhase::Imported | PackagePhase::Closed => {
                return Err(DomainError::InvalidPhase(format!(
                    "package {} is already {}",
                    self.basic.name, self.basic.phase
                )));
            }
        }

        self.basic.phase = PackagePhase::Closed;
        self.log(None, PkgOperation::Close, now);
        Ok(())
    }

    /// The repository-creation PR exists. Returns false if the same link was
    /// already recorded.
    pub fn init_started(&mut self, pr_link: &str, now: DateTime<Utc>) -> Result<bool, DomainError> {
        self.ensure_phase(PackagePhase::CreatingRepo)?;

        if self.basic.repo_pr_link.as_deref() == Some(pr_link) {
            return Ok(false);
        }
        self.basic.repo_pr_link = Some(pr_link.to_string());
        self.log(None, PkgOperation::InitStarted, now);
        Ok(true)
    }

    /// The repository exists and the community PR merged
    pub fn init_done(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_phase(PackagePhase::CreatingRepo)?;

        self.basic.phase = PackagePhase::Imported;
        self.log(None, PkgOperation::InitDone, now);
        Ok(())
    }

    // ========== Comments ==========

    /// Append a comment; comments are never edited or removed
    pub fn add_comment(
        &mut self,
        author: &Account,
        content: ReviewComment,
        now: DateTime<Utc>,
    ) -> SoftwarePkgComment {
        let comment = SoftwarePkgComment {
            id: CommentId::new(),
            author: author.clone(),
            content,
            created_at: now,
        };
        self.comments.push(comment.clone());
        comment
    }

    pub fn find_comment(&self, id: &CommentId) -> Option<&SoftwarePkgComment> {
        self.comments.iter().find(|c| c.id == *id)
    }

    // ========== CI ==========

    pub fn ci_status(&self, now: DateTime<Utc>, policy: &PkgPolicy) -> PackageCiStatus {
        self.ci.status(now, policy.ci_timeout)
    }

    /// Trigger the first CI run. Legal only while CI is waiting.
    pub async fn start_ci<C: PkgCi + ?Sized>(
        &mut self,
        ci: &C,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_phase(PackagePhase::Reviewing)?;
        match self.ci.status {
            PackageCiStatus::Waiting => {}
            PackageCiStatus::Running => return Err(DomainError::CiIsRunning),
            PackageCiStatus::Passed => return Err(DomainError::CiIsPassed),
            PackageCiStatus::Failed | PackageCiStatus::Timeout => {
                return Err(DomainError::InvalidPhase(format!(
                    "ci of {} is {}, not waiting",
                    self.basic.name, self.ci.status
                )));
            }
        }

        let run_id = ci.start_new_ci(self).await?;
        self.ci = SoftwarePkgCi {
            id: run_id,
            status: PackageCiStatus::Running,
            start_time: now,
        };
        self.log(None, PkgOperation::StartCi, now);
        Ok(())
    }

    /// Importer asks for a new CI run
    pub async fn retest_ci<C: PkgCi + ?Sized>(
        &mut self,
        user: &Account,
        ci: &C,
        policy: &PkgPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_phase(PackagePhase::Reviewing)?;
        self.ensure_importer(user)?;

        match self.ci_status(now, policy) {
            PackageCiStatus::Running => return Err(DomainError::CiIsRunning),
            PackageCiStatus::Passed => return Err(DomainError::CiIsPassed),
            PackageCiStatus::Waiting | PackageCiStatus::Failed | PackageCiStatus::Timeout => {}
        }

        self.restart_ci(ci, now).await?;
        self.log(Some(user), PkgOperation::RetestCi, now);
        Ok(())
    }

    /// System-initiated retest. A waiting CI is left alone for
    /// `ci_wait_timeout` since the event-driven trigger is expected to
    /// start it; failed runs need the importer to act.
    pub async fn auto_retest_ci<C: PkgCi + ?Sized>(
        &mut self,
        ci: &C,
        policy: &PkgPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_phase(PackagePhase::Reviewing)?;

        match self.ci_status(now, policy) {
            PackageCiStatus::Running => return Err(DomainError::CiIsRunning),
            PackageCiStatus::Passed => return Err(DomainError::CiIsPassed),
            PackageCiStatus::Failed => {
                return Err(DomainError::InvalidPhase(format!(
                    "ci of {} failed, waiting for the importer",
                    self.basic.name
                )));
            }
            PackageCiStatus::Waiting => {
                if now < self.ci.start_time + policy.ci_wait_timeout {
                    return Err(DomainError::CiNotTimeYet);
                }
            }
            PackageCiStatus::Timeout => {}
        }

        self.restart_ci(ci, now).await?;
        self.log(None, PkgOperation::RetestCi, now);
        Ok(())
    }

    async fn restart_ci<C: PkgCi + ?Sized>(
        &mut self,
        ci: &C,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.ci.id != 0 {
            ci.clear_ci(self.ci.id).await?;
        }
        let run_id = ci.start_new_ci(self).await?;
        self.ci = SoftwarePkgCi {
            id: run_id,
            status: PackageCiStatus::Running,
            start_time: now,
        };
        Ok(())
    }

    /// Outcome of run `ci_id`. The run is always cleared; results for a run
    /// that is not the current one are discarded with `CiIsUnmatched`.
    pub async fn ci_done<C: PkgCi + ?Sized>(
        &mut self,
        ci_id: i64,
        success: bool,
        ci: &C,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        ci.clear_ci(ci_id).await?;

        if ci_id != self.ci.id || self.ci.status != PackageCiStatus::Running {
            return Err(DomainError::CiIsUnmatched);
        }

        self.ci.status = if success {
            PackageCiStatus::Passed
        } else {
            PackageCiStatus::Failed
        };
        self.log(None, PkgOperation::CiDone, now);
        Ok(())
    }
}
