//! Repository-creation PRs on the community repo
//!
//! Each package gets a branch `import/<name>` carrying its descriptor file.
//! The CI bot labels the PR; the watch loop reads it back through `get`.

use std::sync::Arc;

use async_trait::async_trait;

use super::{descriptor_path, pkg_descriptor, RepoCoords};
use crate::domain::entities::{PrState, PullRequestRef, PullRequestState, SoftwarePkg};
use crate::domain::ports::{GiteaClient, GiteaPullRequest, PullRequestClient};
use crate::error::DomainError;

const MERGE_STYLE: &str = "merge";

pub struct GiteaPullRequestClient<G: GiteaClient> {
    gitea: Arc<G>,
    target: RepoCoords,
}

impl<G: GiteaClient> GiteaPullRequestClient<G> {
    pub fn new(gitea: Arc<G>, target: RepoCoords) -> Self {
        Self { gitea, target }
    }

    fn branch_of(pkg: &SoftwarePkg) -> String {
        format!("import/{}", pkg.basic().name)
    }

    async fn find_open(&self, branch: &str) -> Result<Option<GiteaPullRequest>, DomainError> {
        let open = self
            .gitea
            .list_pull_requests(&self.target.owner, &self.target.repo, Some("open"))
            .await?;
        Ok(open.into_iter().find(|pr| pr.head.ref_name == branch))
    }

    /// Login of whoever last closed the PR
    async fn closer_of(&self, number: i64) -> Option<String> {
        match self
            .gitea
            .get_timeline(&self.target.owner, &self.target.repo, number)
            .await
        {
            Ok(events) => events
                .into_iter()
                .rev()
                .find(|e| e.event_type == "close")
                .and_then(|e| e.user.map(|u| u.login)),
            Err(e) => {
                tracing::warn!(pr = number, error = %e, "Failed to read PR timeline");
                None
            }
        }
    }
}

fn pr_ref(pr: &GiteaPullRequest) -> PullRequestRef {
    PullRequestRef {
        number: pr.number,
        link: pr.html_url.clone(),
    }
}

fn pr_body(pkg: &SoftwarePkg) -> String {
    let basic = pkg.basic();
    let app = &basic.application;
    format!(
        "Import `{}` into sig `{}`.\n\n- Source: {}\n- License: {}\n- Importer: {}\n\n{}\n\nReason: {}",
        basic.name,
        app.sig,
        app.source_code_url,
        app.license.as_str(),
        basic.importer,
        app.description.as_str(),
        app.reason.as_str(),
    )
}

#[async_trait]
impl<G: GiteaClient + 'static> PullRequestClient for GiteaPullRequestClient<G> {
    async fn create(&self, pkg: &SoftwarePkg) -> Result<PullRequestRef, DomainError> {
        let branch = Self::branch_of(pkg);
        if let Some(existing) = self.find_open(&branch).await? {
            tracing::debug!(pkg_id = %pkg.id(), pr = existing.number, "Import PR already open");
            return Ok(pr_ref(&existing));
        }

        let RepoCoords { owner, repo, base_branch } = &self.target;
        self.gitea
            .create_branch(owner, repo, &branch, base_branch)
            .await?;
        self.gitea
            .put_file(
                owner,
                repo,
                &branch,
                &descriptor_path(pkg),
                &pkg_descriptor(pkg)?,
                &format!("add package {}", pkg.basic().name),
            )
            .await?;

        let pr = self
            .gitea
            .create_pull_request(
                owner,
                repo,
                &format!("Import package {}", pkg.basic().name),
                Some(&pr_body(pkg)),
                &branch,
                base_branch,
            )
            .await?;

        tracing::info!(pkg_id = %pkg.id(), pr = pr.number, "Opened import PR");
        Ok(pr_ref(&pr))
    }

    async fn update(&self, pr: &PullRequestRef) -> Result<(), DomainError> {
        self.gitea
            .update_pull_request(&self.target.owner, &self.target.repo, pr.number)
            .await?;
        Ok(())
    }

    async fn merge(&self, number: i64) -> Result<(), DomainError> {
        self.gitea
            .merge_pull_request(&self.target.owner, &self.target.repo, number, MERGE_STYLE)
            .await?;
        Ok(())
    }

    async fn close(&self, number: i64) -> Result<(), DomainError> {
        let RepoCoords { owner, repo, .. } = &self.target;
        let pr = self.gitea.get_pull_request(owner, repo, number).await?;
        if pr.state != "closed" {
            self.gitea.close_pull_request(owner, repo, number).await?;
        }

        if let Err(e) = self.gitea.delete_branch(owner, repo, &pr.head.ref_name).await {
            tracing::warn!(pr = number, error = %e, "Failed to delete import branch");
        }
        Ok(())
    }

    async fn get(&self, number: i64) -> Result<PullRequestState, DomainError> {
        let pr = self
            .gitea
            .get_pull_request(&self.target.owner, &self.target.repo, number)
            .await?;

        let (state, closed_by) = if pr.merged {
            (PrState::Merged, None)
        } else if pr.state == "closed" {
            (PrState::Closed, self.closer_of(number).await)
        } else {
            (PrState::Open, None)
        };

        Ok(PullRequestState {
            state,
            mergeable: pr.mergeable,
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
            closed_by,
        })
    }
}
