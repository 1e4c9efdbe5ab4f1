//! Gitea adapter
//!
//! The Gitea REST client plus the collaborators built on top of it: the
//! import PR workflow, CI runs, package existence and reviewer roles.

pub mod client;
pub mod maintainers;
pub mod pkg_ci;
pub mod pkg_manager;
pub mod pull_request;

pub use client::GiteaClientImpl;
pub use maintainers::GiteaMaintainerDirectory;
pub use pkg_ci::GiteaPkgCi;
pub use pkg_manager::GiteaPkgManager;
pub use pull_request::GiteaPullRequestClient;

use crate::domain::entities::SoftwarePkg;
use crate::error::DomainError;

/// Repository a collaborator opens its PRs against
#[derive(Debug, Clone)]
pub struct RepoCoords {
    pub owner: String,
    pub repo: String,
    pub base_branch: String,
}

impl RepoCoords {
    pub fn new(owner: &str, repo: &str, base_branch: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            base_branch: base_branch.to_string(),
        }
    }
}

fn descriptor_path(pkg: &SoftwarePkg) -> String {
    format!("pkgs/{}.json", pkg.basic().name)
}

/// Descriptor file committed for a package
fn pkg_descriptor(pkg: &SoftwarePkg) -> Result<String, DomainError> {
    let basic = pkg.basic();
    serde_json::to_string_pretty(&serde_json::json!({
        "name": basic.name,
        "importer": basic.importer,
        "sig": basic.application.sig,
        "platform": basic.application.platform.to_string(),
        "source_code": basic.application.source_code_url,
        "license": basic.application.license,
        "description": basic.application.description,
        "committers": basic.application.committers,
    }))
    .map_err(|e| DomainError::Internal(format!("encode descriptor: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_pkg;

    #[test]
    fn descriptor_names_package_and_sig() {
        let pkg = test_pkg("python-foo", "alice");
        let raw = pkg_descriptor(&pkg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["name"], "python-foo");
        assert_eq!(value["sig"], "sig-tools");
        assert_eq!(value["license"], "MIT");
        assert_eq!(descriptor_path(&pkg), "pkgs/python-foo.json");
    }
}
