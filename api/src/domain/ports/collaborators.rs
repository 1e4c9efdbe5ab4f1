//! Collaborator port traits
//!
//! External systems the package lifecycle delegates to: CI, the forge's
//! package namespace and PR workflow, maintainers, email and comment
//! translation/moderation. Adapters map their own failures to
//! `DomainError::External`.

use async_trait::async_trait;

use crate::domain::entities::{
    Account, Language, PackageName, PullRequestRef, PullRequestState, Role, SoftwarePkg,
};
use crate::error::DomainError;

/// Knows which packages already exist in the distribution
#[async_trait]
pub trait PkgManager: Send + Sync {
    async fn is_pkg_existed(&self, name: &PackageName) -> Result<bool, DomainError>;
}

/// Triggers CI runs for a package
#[async_trait]
pub trait PkgCi: Send + Sync {
    /// Start a run and return its id (never 0)
    async fn start_new_ci(&self, pkg: &SoftwarePkg) -> Result<i64, DomainError>;

    /// Tear down a run. Clearing an already-cleared run is not an error.
    async fn clear_ci(&self, run_id: i64) -> Result<(), DomainError>;
}

/// Drives the repository-creation PR on the forge
#[async_trait]
pub trait PullRequestClient: Send + Sync {
    /// Create the branch and PR for a package. Safe to call again for a
    /// package whose PR already exists; the existing PR is returned.
    async fn create(&self, pkg: &SoftwarePkg) -> Result<PullRequestRef, DomainError>;

    /// Bring the PR branch up to date with its base
    async fn update(&self, pr: &PullRequestRef) -> Result<(), DomainError>;

    async fn merge(&self, number: i64) -> Result<(), DomainError>;

    async fn close(&self, number: i64) -> Result<(), DomainError>;

    async fn get(&self, number: i64) -> Result<PullRequestState, DomainError>;
}

/// Resolves the roles a reviewer holds for a package's sig
#[async_trait]
pub trait MaintainerDirectory: Send + Sync {
    async fn roles_of(&self, account: &Account, sig: &str) -> Result<Vec<Role>, DomainError>;
}

/// Sends notifications to the maintainers' mailbox
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), DomainError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: Language) -> Result<String, DomainError>;
}

/// Screens user-supplied text. Flagged content fails with `Validation`.
#[async_trait]
pub trait ContentModerator: Send + Sync {
    async fn check(&self, text: &str) -> Result<(), DomainError>;
}
