//! Reviewer roles from forge membership
//!
//! TC members are the members of the TC org. A sig's maintainers are the
//! "Maintainers" team of the org named after the sig.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entities::{Account, Role};
use crate::domain::ports::{GiteaClient, MaintainerDirectory};
use crate::error::DomainError;

const MAINTAINERS_TEAM: &str = "Maintainers";

pub struct GiteaMaintainerDirectory<G: GiteaClient> {
    gitea: Arc<G>,
    tc_org: String,
}

impl<G: GiteaClient> GiteaMaintainerDirectory<G> {
    pub fn new(gitea: Arc<G>, tc_org: impl Into<String>) -> Self {
        Self {
            gitea,
            tc_org: tc_org.into(),
        }
    }
}

#[async_trait]
impl<G: GiteaClient + 'static> MaintainerDirectory for GiteaMaintainerDirectory<G> {
    async fn roles_of(&self, account: &Account, sig: &str) -> Result<Vec<Role>, DomainError> {
        let mut roles = Vec::new();

        if self.gitea.is_org_member(&self.tc_org, account.as_str()).await? {
            roles.push(Role::Tc);
        }

        let maintainers = self.gitea.list_team_members(sig, MAINTAINERS_TEAM).await?;
        if maintainers.iter().any(|m| m == account.as_str()) {
            roles.push(Role::SigMaintainer);
        }

        tracing::debug!(account = %account, sig, ?roles, "Resolved reviewer roles");
        Ok(roles)
    }
}
