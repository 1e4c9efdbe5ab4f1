//! CI runs as PRs on the CI repo
//!
//! A run is a throwaway branch plus PR in the CI repo; the CI bot builds
//! it and reports back through the CI webhook quoting the PR number.

use std::sync::Arc;

use async_trait::async_trait;

use super::{descriptor_path, pkg_descriptor, RepoCoords};
use crate::domain::entities::SoftwarePkg;
use crate::domain::ports::{GiteaClient, PkgCi};
use crate::error::DomainError;

pub struct GiteaPkgCi<G: GiteaClient> {
    gitea: Arc<G>,
    target: RepoCoords,
}

impl<G: GiteaClient> GiteaPkgCi<G> {
    pub fn new(gitea: Arc<G>, target: RepoCoords) -> Self {
        Self { gitea, target }
    }
}

#[async_trait]
impl<G: GiteaClient + 'static> PkgCi for GiteaPkgCi<G> {
    async fn start_new_ci(&self, pkg: &SoftwarePkg) -> Result<i64, DomainError> {
        let RepoCoords { owner, repo, base_branch } = &self.target;
        let name = &pkg.basic().name;
        let branch = format!("ci/{}-{:08x}", name, rand::random::<u32>());

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
                &format!("ci for {}", name),
            )
            .await?;

        let pr = self
            .gitea
            .create_pull_request(
                owner,
                repo,
                &format!("CI: {}", name),
                Some(&format!("Package id: {}", pkg.id())),
                &branch,
                base_branch,
            )
            .await?;

        tracing::info!(pkg_id = %pkg.id(), ci_id = pr.number, "Started CI run");
        Ok(pr.number)
    }

    async fn clear_ci(&self, run_id: i64) -> Result<(), DomainError> {
        let RepoCoords { owner, repo, .. } = &self.target;

        let pr = match self.gitea.get_pull_request(owner, repo, run_id).await {
            Ok(pr) => pr,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if pr.state != "closed" {
            match self.gitea.close_pull_request(owner, repo, run_id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }

        if let Err(e) = self.gitea.delete_branch(owner, repo, &pr.head.ref_name).await {
            tracing::warn!(ci_id = run_id, error = %e, "Failed to delete CI branch");
        }
        Ok(())
    }
}
