//! Review Service
//!
//! Check-item reviews and the approve/reject decision. Approval requires
//! every check item to have reached a pass consensus; the aggregate then
//! applies the approval policy. Outcome events fire only on the call that
//! flipped the outcome, after the change is persisted.

use std::sync::Arc;

use chrono::Utc;

use crate::app::common::publish_event;
use crate::domain::entities::{
    all_items_passed, Account, CheckItemReview, Consensus, ItemJudgment, PkgWatch, ReviewResult,
    Reviewer, Role, SoftwarePkg, SoftwarePkgId, UserReview,
};
use crate::domain::policy::PkgPolicy;
use crate::domain::ports::{
    EventPublisher, MaintainerDirectory, PkgEvent, PkgWatchRepository, SoftwarePkgRepository,
    Versioned,
};
use crate::error::DomainError;

/// Service for reviewing and deciding on package requests
pub struct ReviewService<R, W, D, E>
where
    R: SoftwarePkgRepository,
    W: PkgWatchRepository,
    D: MaintainerDirectory,
    E: EventPublisher,
{
    pkgs: Arc<R>,
    watches: Arc<W>,
    directory: Arc<D>,
    events: Arc<E>,
    policy: PkgPolicy,
}

impl<R, W, D, E> ReviewService<R, W, D, E>
where
    R: SoftwarePkgRepository,
    W: PkgWatchRepository,
    D: MaintainerDirectory,
    E: EventPublisher,
{
    pub fn new(
        pkgs: Arc<R>,
        watches: Arc<W>,
        directory: Arc<D>,
        events: Arc<E>,
        policy: PkgPolicy,
    ) -> Self {
        Self {
            pkgs,
            watches,
            directory,
            events,
            policy,
        }
    }

    /// Resolve the roles `account` holds for this package
    pub async fn reviewer_for(
        &self,
        pkg: &SoftwarePkg,
        account: &Account,
    ) -> Result<Reviewer, DomainError> {
        let application = &pkg.basic().application;
        let mut roles = self.directory.roles_of(account, &application.sig).await?;
        if application.committers.contains(account) && !roles.contains(&Role::Committer) {
            roles.push(Role::Committer);
        }
        Ok(Reviewer {
            account: account.clone(),
            roles,
        })
    }

    /// Submit check-item judgments, replacing the reviewer's earlier ones
    pub async fn review(
        &self,
        id: &SoftwarePkgId,
        user: &Account,
        judgments: Vec<ItemJudgment>,
    ) -> Result<(), DomainError> {
        let mut pkg = self.pkgs.find(id).await?;
        let reviewer = self.reviewer_for(&pkg, user).await?;

        pkg.add_review(UserReview {
            reviewer,
            judgments,
            reviewed_at: Utc::now(),
        })?;
        self.pkgs.save(pkg).await?;

        tracing::info!(pkg_id = %id, reviewer = %user, "Check items reviewed");
        Ok(())
    }

    /// Consensus view over all check items
    pub async fn check_item_reviews(
        &self,
        id: &SoftwarePkgId,
    ) -> Result<Vec<CheckItemReview>, DomainError> {
        Ok(self.pkgs.find(id).await?.check_item_reviews())
    }

    /// Approve on behalf of `user`. Returns whether anything changed.
    pub async fn approve(&self, id: &SoftwarePkgId, user: &Account) -> Result<bool, DomainError> {
        let pkg = self.pkgs.find(id).await?;
        let reviewer = self.reviewer_for(&pkg, user).await?;
        self.approve_pkg(pkg, &reviewer).await
    }

    /// Reject on behalf of `user`. Returns whether anything changed.
    pub async fn reject(&self, id: &SoftwarePkgId, user: &Account) -> Result<bool, DomainError> {
        let pkg = self.pkgs.find(id).await?;
        let reviewer = self.reviewer_for(&pkg, user).await?;
        self.reject_pkg(pkg, &reviewer).await
    }

    /// Apply an approval to a package read at a known version
    pub async fn approve_pkg(
        &self,
        mut pkg: Versioned<SoftwarePkg>,
        reviewer: &Reviewer,
    ) -> Result<bool, DomainError> {
        ensure_can_decide(reviewer)?;

        let reviews = pkg.check_item_reviews();
        if !all_items_passed(&reviews) {
            let pending: Vec<&str> = reviews
                .iter()
                .filter(|r| r.consensus != Consensus::Pass)
                .map(|r| r.item.id.as_str())
                .collect();
            return Err(DomainError::CheckItemsNotPassed(pending.join(", ")));
        }

        let now = Utc::now();
        let change = pkg.approve_by(&reviewer.account, &self.policy, now)?;
        if !change.changed {
            return Ok(false);
        }

        let snapshot = (*pkg).clone();
        self.pkgs.save(pkg).await?;
        tracing::info!(
            pkg_id = %snapshot.id(),
            reviewer = %reviewer.account,
            approvals = snapshot.basic().approved_by.len(),
            "Package approved by reviewer"
        );

        if change.decided == Some(ReviewResult::Approved) {
            self.start_watch(&snapshot).await?;
            tracing::info!(pkg_id = %snapshot.id(), "Package approved");
            publish_event(self.events.as_ref(), PkgEvent::approved(&snapshot, now)).await;
        }
        Ok(true)
    }

    /// Apply a rejection to a package read at a known version
    pub async fn reject_pkg(
        &self,
        mut pkg: Versioned<SoftwarePkg>,
        reviewer: &Reviewer,
    ) -> Result<bool, DomainError> {
        ensure_can_decide(reviewer)?;

        let now = Utc::now();
        let change = pkg.reject_by(&reviewer.account, now)?;
        if !change.changed {
            return Ok(false);
        }

        let snapshot = (*pkg).clone();
        self.pkgs.save(pkg).await?;
        tracing::info!(
            pkg_id = %snapshot.id(),
            reviewer = %reviewer.account,
            "Package rejected by reviewer"
        );

        if change.decided == Some(ReviewResult::Rejected) {
            publish_event(self.events.as_ref(), PkgEvent::rejected(&snapshot, now)).await;
        }
        Ok(true)
    }

    /// Hand an approved package to the watch loop
    async fn start_watch(&self, pkg: &SoftwarePkg) -> Result<(), DomainError> {
        match self.watches.add(&PkgWatch::new(pkg.id(), Utc::now())).await {
            Ok(()) | Err(DomainError::AlreadyExists(_)) => Ok(()),
            Err(e) => {
                tracing::error!(pkg_id = %pkg.id(), error = %e, "Failed to create watch record");
                Err(e)
            }
        }
    }
}

fn ensure_can_decide(reviewer: &Reviewer) -> Result<(), DomainError> {
    if !reviewer.can_decide() {
        return Err(DomainError::Unauthorized(format!(
            "{} is neither a TC member nor a sig maintainer",
            reviewer.account
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{PackagePhase, WatchStatus};
    use crate::test_utils::{
        account, passing_judgments, passing_review, test_application, test_pkg,
        InMemoryPkgWatchRepository, InMemorySoftwarePkgRepository, MockEventPublisher,
        MockMaintainerDirectory,
    };

    type TestService = ReviewService<
        InMemorySoftwarePkgRepository,
        InMemoryPkgWatchRepository,
        MockMaintainerDirectory,
        MockEventPublisher,
    >;

    struct Harness {
        service: TestService,
        repo: Arc<InMemorySoftwarePkgRepository>,
        watches: Arc<InMemoryPkgWatchRepository>,
        events: Arc<MockEventPublisher>,
    }

    fn directory() -> MockMaintainerDirectory {
        MockMaintainerDirectory::new()
            .with_roles("bob", &[Role::Tc])
            .with_roles("carol", &[Role::SigMaintainer])
            .with_roles("dave", &[Role::Tc])
    }

    fn create_service(
        repo: InMemorySoftwarePkgRepository,
        watches: InMemoryPkgWatchRepository,
    ) -> Harness {
        let repo = Arc::new(repo);
        let watches = Arc::new(watches);
        let events = Arc::new(MockEventPublisher::new());
        let service = ReviewService::new(
            repo.clone(),
            watches.clone(),
            Arc::new(directory()),
            events.clone(),
            PkgPolicy::default(),
        );
        Harness {
            service,
            repo,
            watches,
            events,
        }
    }

    /// A reviewing package whose check items all pass
    fn reviewed_pkg() -> SoftwarePkg {
        let mut pkg = test_pkg("foo", "alice");
        let review = passing_review(&pkg, "carol");
        pkg.add_review(review).unwrap();
        pkg
    }

    // ===== end-to-end scenarios =====

    #[tokio::test]
    async fn two_approvals_approve_and_start_watch() {
        let pkg = reviewed_pkg();
        let id = pkg.id();
        let h = create_service(
            InMemorySoftwarePkgRepository::new().with_pkg(pkg),
            InMemoryPkgWatchRepository::new(),
        );

        assert!(h.service.approve(&id, &account("bob")).await.unwrap());
        let stored = h.repo.get(&id).unwrap();
        assert_eq!(stored.basic().review_result, None);
        assert!(h.events.get_events().is_empty());

        assert!(h.service.approve(&id, &account("carol")).await.unwrap());
        let stored = h.repo.get(&id).unwrap();
        assert_eq!(stored.basic().review_result, Some(ReviewResult::Approved));
        assert_eq!(stored.phase(), PackagePhase::CreatingRepo);
        assert_eq!(h.events.kinds(), vec!["approved"]);
        assert_eq!(
            h.watches.get(&id).unwrap().status,
            WatchStatus::Initialized
        );
    }

    #[tokio::test]
    async fn rejection_after_approval_rejects_immediately() {
        let pkg = reviewed_pkg();
        let id = pkg.id();
        let h = create_service(
            InMemorySoftwarePkgRepository::new().with_pkg(pkg),
            InMemoryPkgWatchRepository::new(),
        );

        h.service.approve(&id, &account("bob")).await.unwrap();
        assert!(h.service.reject(&id, &account("dave")).await.unwrap());

        let stored = h.repo.get(&id).unwrap();
        assert_eq!(stored.basic().review_result, Some(ReviewResult::Rejected));
        assert_eq!(h.events.kinds(), vec!["rejected"]);
        assert!(h.watches.get(&id).is_none());
    }

    // ===== guards =====

    #[tokio::test]
    async fn approval_requires_passed_check_items() {
        let pkg = test_pkg("foo", "alice");
        let id = pkg.id();
        let h = create_service(
            InMemorySoftwarePkgRepository::new().with_pkg(pkg),
            InMemoryPkgWatchRepository::new(),
        );

        let result = h.service.approve(&id, &account("bob")).await;
        assert!(matches!(result, Err(DomainError::CheckItemsNotPassed(_))));
        assert!(h.repo.get(&id).unwrap().basic().approved_by.is_empty());
    }

    #[tokio::test]
    async fn only_tc_or_sig_maintainers_decide() {
        let pkg = reviewed_pkg();
        let id = pkg.id();
        let h = create_service(
            InMemorySoftwarePkgRepository::new().with_pkg(pkg),
            InMemoryPkgWatchRepository::new(),
        );

        let result = h.service.approve(&id, &account("mallory")).await;
        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
        let result = h.service.reject(&id, &account("mallory")).await;
        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn repeated_approval_reports_unchanged_without_saving() {
        let pkg = reviewed_pkg();
        let id = pkg.id();
        let h = create_service(
            InMemorySoftwarePkgRepository::new().with_pkg(pkg),
            InMemoryPkgWatchRepository::new(),
        );

        assert!(h.service.approve(&id, &account("bob")).await.unwrap());
        let saves = h.repo.save_count();
        assert!(!h.service.approve(&id, &account("bob")).await.unwrap());
        assert_eq!(h.repo.save_count(), saves);
    }

    #[tokio::test]
    async fn stale_version_loses() {
        let pkg = reviewed_pkg();
        let id = pkg.id();
        let h = create_service(
            InMemorySoftwarePkgRepository::new().with_pkg(pkg),
            InMemoryPkgWatchRepository::new(),
        );

        let first = h.repo.find(&id).await.unwrap();
        let second = h.repo.find(&id).await.unwrap();
        let bob = h.service.reviewer_for(&first, &account("bob")).await.unwrap();
        let dave = h
            .service
            .reviewer_for(&second, &account("dave"))
            .await
            .unwrap();

        assert!(h.service.approve_pkg(first, &bob).await.unwrap());
        let result = h.service.reject_pkg(second, &dave).await;
        assert!(matches!(result, Err(DomainError::ConcurrentUpdate(_))));
        assert!(h.events.get_events().is_empty());
    }

    #[tokio::test]
    async fn watch_creation_failure_propagates() {
        let pkg = reviewed_pkg();
        let id = pkg.id();
        let h = create_service(
            InMemorySoftwarePkgRepository::new().with_pkg(pkg),
            InMemoryPkgWatchRepository::failing(),
        );

        h.service.approve(&id, &account("bob")).await.unwrap();
        let result = h.service.approve(&id, &account("carol")).await;
        assert!(matches!(result, Err(DomainError::Database(_))));
        assert!(h.events.get_events().is_empty());
    }

    #[tokio::test]
    async fn event_failure_does_not_undo_approval() {
        let pkg = reviewed_pkg();
        let id = pkg.id();
        let repo = Arc::new(InMemorySoftwarePkgRepository::new().with_pkg(pkg));
        let service = ReviewService::new(
            repo.clone(),
            Arc::new(InMemoryPkgWatchRepository::new()),
            Arc::new(directory()),
            Arc::new(MockEventPublisher::failing()),
            PkgPolicy::default(),
        );

        service.approve(&id, &account("bob")).await.unwrap();
        assert!(service.approve(&id, &account("carol")).await.unwrap());
        assert_eq!(
            repo.get(&id).unwrap().basic().review_result,
            Some(ReviewResult::Approved)
        );
    }

    // ===== check-item reviews =====

    #[tokio::test]
    async fn review_resolves_roles_and_updates_consensus() {
        let mut app = test_application();
        app.committers = vec![account("alice")];
        let pkg = SoftwarePkg::new(
            account("alice"),
            crate::domain::entities::PackageName::new("foo").unwrap(),
            app,
            Utc::now(),
        )
        .unwrap();
        let id = pkg.id();
        let judgments = passing_judgments(&pkg);
        let h = create_service(
            InMemorySoftwarePkgRepository::new().with_pkg(pkg),
            InMemoryPkgWatchRepository::new(),
        );

        // A sig maintainer passes everything but cannot speak for the committer
        h.service
            .review(&id, &account("carol"), judgments.clone())
            .await
            .unwrap();
        let reviews = h.service.check_item_reviews(&id).await.unwrap();
        let committer_item = reviews
            .iter()
            .find(|r| r.item.id == "committer:alice")
            .unwrap();
        assert_eq!(committer_item.consensus, Consensus::NoIdea);

        // The listed committer confirms
        h.service
            .review(
                &id,
                &account("alice"),
                vec![ItemJudgment {
                    item_id: "committer:alice".into(),
                    pass: true,
                    comment: None,
                }],
            )
            .await
            .unwrap();
        let reviews = h.service.check_item_reviews(&id).await.unwrap();
        assert!(all_items_passed(&reviews));
    }
}
