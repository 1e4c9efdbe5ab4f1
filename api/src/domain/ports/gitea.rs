//! Gitea client port trait
//!
//! Defines the subset of the Gitea API the import workflow needs: package
//! repositories, org/team membership, branches, files and pull requests.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::GiteaError;

/// Helper to deserialize null as default (empty vec, etc.)
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Gitea user representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaUser {
    pub id: i64,
    pub login: String,
}

/// Gitea repository representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub default_branch: String,
}

/// Branch info in a PR
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaPRBranch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

/// Gitea label representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaLabel {
    pub id: i64,
    pub name: String,
}

/// Gitea pull request representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaPullRequest {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub html_url: String,
    pub head: GiteaPRBranch,
    pub base: GiteaPRBranch,
    pub merged: bool,
    #[serde(default)]
    pub mergeable: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub labels: Vec<GiteaLabel>,
    pub user: Option<GiteaUser>,
}

/// One entry of an issue/PR timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiteaTimelineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub user: Option<GiteaUser>,
}

/// Port trait for Gitea API operations
#[async_trait]
pub trait GiteaClient: Send + Sync {
    // Organizations and teams

    /// Check if a user is a member of an organization
    async fn is_org_member(&self, org: &str, username: &str) -> Result<bool, GiteaError>;

    /// List members of a named team in an organization (empty if no such team)
    async fn list_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, GiteaError>;

    // Repositories

    /// Get a repository
    async fn get_repo(&self, owner: &str, name: &str) -> Result<GiteaRepo, GiteaError>;

    /// Create or overwrite a file on a branch
    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), GiteaError>;

    // Branches

    /// Create a branch from an existing one
    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        new_branch: &str,
        from_branch: &str,
    ) -> Result<(), GiteaError>;

    /// Delete a branch
    async fn delete_branch(&self, owner: &str, repo: &str, branch: &str)
        -> Result<(), GiteaError>;

    // Pull requests

    /// Create a pull request
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: Option<&str>,
        head: &str,
        base: &str,
    ) -> Result<GiteaPullRequest, GiteaError>;

    /// Get a pull request
    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<GiteaPullRequest, GiteaError>;

    /// List pull requests
    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: Option<&str>,
    ) -> Result<Vec<GiteaPullRequest>, GiteaError>;

    /// Merge the base branch into the PR head
    async fn update_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<(), GiteaError>;

    /// Merge a pull request
    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        merge_style: &str,
    ) -> Result<(), GiteaError>;

    /// Close a pull request
    async fn close_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<(), GiteaError>;

    /// Timeline events of an issue or PR, oldest first
    async fn get_timeline(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<GiteaTimelineEvent>, GiteaError>;
}
