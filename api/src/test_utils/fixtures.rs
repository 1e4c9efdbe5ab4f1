//! Test fixtures
//!
//! Factory functions for creating test data with sensible defaults.
//! Each fixture function creates a valid entity that can be customized.

use chrono::Utc;

use crate::domain::entities::{
    Account, Application, Description, ItemJudgment, License, PackageName, PackagePlatform,
    PkgWatch, PrState, PullRequestRef, PullRequestState, Reviewer, Role, SoftwarePkg, Url,
    UserReview, WatchStatus,
};
use crate::domain::policy::PkgPolicy;

pub fn account(name: &str) -> Account {
    Account::new(name).unwrap()
}

/// Create a test application with default values
pub fn test_application() -> Application {
    Application {
        source_code_url: Url::new("https://github.com/example/foo").unwrap(),
        license: License::new("MIT").unwrap(),
        description: Description::new("A small example library").unwrap(),
        platform: PackagePlatform::Github,
        sig: "sig-tools".to_string(),
        reason: Description::new("Needed by the build toolchain").unwrap(),
        committers: vec![],
    }
}

/// Create a package in phase `reviewing`
pub fn test_pkg(name: &str, importer: &str) -> SoftwarePkg {
    SoftwarePkg::new(
        account(importer),
        PackageName::new(name).unwrap(),
        test_application(),
        Utc::now(),
    )
    .unwrap()
}

/// Create a package already approved and in phase `creating_repo`
pub fn approved_pkg(name: &str) -> SoftwarePkg {
    let mut pkg = test_pkg(name, "alice");
    let policy = PkgPolicy::default();
    let now = Utc::now();
    pkg.approve_by(&account("bob"), &policy, now).unwrap();
    pkg.approve_by(&account("carol"), &policy, now).unwrap();
    pkg
}

pub fn reviewer(name: &str, roles: &[Role]) -> Reviewer {
    Reviewer {
        account: account(name),
        roles: roles.to_vec(),
    }
}

/// Judgments passing every check item of a package
pub fn passing_judgments(pkg: &SoftwarePkg) -> Vec<ItemJudgment> {
    pkg.check_items()
        .into_iter()
        .map(|item| ItemJudgment {
            item_id: item.id,
            pass: true,
            comment: None,
        })
        .collect()
}

/// A TC + sig maintainer review passing every item
pub fn passing_review(pkg: &SoftwarePkg, name: &str) -> UserReview {
    UserReview {
        reviewer: reviewer(name, &[Role::Tc, Role::SigMaintainer]),
        judgments: passing_judgments(pkg),
        reviewed_at: Utc::now(),
    }
}

/// Watch record with a PR already opened
pub fn test_watch(pkg: &SoftwarePkg, status: WatchStatus, pr_number: i64) -> PkgWatch {
    let mut watch = PkgWatch::new(pkg.id(), Utc::now());
    watch.status = status;
    watch.pr = Some(PullRequestRef {
        number: pr_number,
        link: format!("https://gitea.local/community/pulls/{}", pr_number),
    });
    watch
}

pub fn open_pr_state(labels: &[&str]) -> PullRequestState {
    PullRequestState {
        state: PrState::Open,
        mergeable: true,
        labels: labels.iter().map(|l| l.to_string()).collect(),
        closed_by: None,
    }
}

pub fn merged_pr_state() -> PullRequestState {
    PullRequestState {
        state: PrState::Merged,
        mergeable: false,
        labels: vec![],
        closed_by: None,
    }
}

pub fn closed_pr_state(closed_by: &str) -> PullRequestState {
    PullRequestState {
        state: PrState::Closed,
        mergeable: true,
        labels: vec![],
        closed_by: Some(closed_by.to_string()),
    }
}
