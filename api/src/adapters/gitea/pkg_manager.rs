//! Package existence lookup against the package org

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entities::PackageName;
use crate::domain::ports::{GiteaClient, PkgManager};
use crate::error::DomainError;

/// A package exists once its repository exists in the package org
pub struct GiteaPkgManager<G: GiteaClient> {
    gitea: Arc<G>,
    org: String,
}

impl<G: GiteaClient> GiteaPkgManager<G> {
    pub fn new(gitea: Arc<G>, org: impl Into<String>) -> Self {
        Self {
            gitea,
            org: org.into(),
        }
    }
}

#[async_trait]
impl<G: GiteaClient + 'static> PkgManager for GiteaPkgManager<G> {
    async fn is_pkg_existed(&self, name: &PackageName) -> Result<bool, DomainError> {
        match self.gitea.get_repo(&self.org, name.as_str()).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockGiteaClient;

    #[tokio::test]
    async fn existing_repo_means_existing_package() {
        let gitea = Arc::new(MockGiteaClient::new().with_repo("src-pkgs", "python-foo"));
        let manager = GiteaPkgManager::new(gitea, "src-pkgs");

        let foo = PackageName::new("python-foo").unwrap();
        let bar = PackageName::new("python-bar").unwrap();
        assert!(manager.is_pkg_existed(&foo).await.unwrap());
        assert!(!manager.is_pkg_existed(&bar).await.unwrap());
    }

    #[tokio::test]
    async fn outage_is_not_treated_as_absent() {
        let manager = GiteaPkgManager::new(Arc::new(MockGiteaClient::failing()), "src-pkgs");
        let name = PackageName::new("python-foo").unwrap();
        assert!(manager.is_pkg_existed(&name).await.is_err());
    }
}
