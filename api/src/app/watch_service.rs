//! Watch Service
//!
//! Reconciliation loop that takes approved packages through repository
//! creation. Each tick reads the active watch records, fetches the forge
//! state the record needs, asks `PkgWatch::next_action` what to do and
//! executes exactly that step. A record's status is checked before any
//! side effect, so re-observing a state that was already handled is a
//! no-op.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::app::ci_service::CiService;
use crate::app::common::{publish_event, update_with_retry};
use crate::domain::entities::{
    Account, PackagePhase, PkgWatch, ReviewComment, SoftwarePkg, SoftwarePkgId, WatchAction,
    WatchStatus,
};
use crate::domain::policy::PkgPolicy;
use crate::domain::ports::{
    EmailSender, EventPublisher, PkgCi, PkgEvent, PkgFilter, PkgManager, PkgWatchRepository,
    PullRequestClient, SoftwarePkgRepository,
};
use crate::error::DomainError;

/// Author of comments the loop leaves on packages
pub const ROBOT_ACCOUNT: &str = "software-pkg-robot";

/// Service running the post-approval watch loop
pub struct WatchService<R, W, P, M, Ma, E>
where
    R: SoftwarePkgRepository,
    W: PkgWatchRepository,
    P: PullRequestClient,
    M: PkgManager,
    Ma: EmailSender,
    E: EventPublisher,
{
    pkgs: Arc<R>,
    watches: Arc<W>,
    prs: Arc<P>,
    manager: Arc<M>,
    mailer: Arc<Ma>,
    events: Arc<E>,
    policy: PkgPolicy,
}

impl<R, W, P, M, Ma, E> WatchService<R, W, P, M, Ma, E>
where
    R: SoftwarePkgRepository + 'static,
    W: PkgWatchRepository + 'static,
    P: PullRequestClient + 'static,
    M: PkgManager + 'static,
    Ma: EmailSender + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(
        pkgs: Arc<R>,
        watches: Arc<W>,
        prs: Arc<P>,
        manager: Arc<M>,
        mailer: Arc<Ma>,
        events: Arc<E>,
        policy: PkgPolicy,
    ) -> Self {
        Self {
            pkgs,
            watches,
            prs,
            manager,
            mailer,
            events,
            policy,
        }
    }

    /// Run ticks until `shutdown` flips to true. A tick in progress when
    /// the signal arrives finishes first.
    pub async fn run<C>(
        self: Arc<Self>,
        ci: Arc<CiService<R, C>>,
        mut shutdown: watch::Receiver<bool>,
    ) where
        C: PkgCi + 'static,
    {
        let mut interval = tokio::time::interval(self.policy.watch_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.policy.watch_interval.as_secs(),
            "Watch loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Watch tick failed");
                    }
                    if let Err(e) = ci.auto_retest_all().await {
                        tracing::error!(error = %e, "Auto retest sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Watch loop stopped");
    }

    /// One pass over every active watch record. Failures are per record:
    /// they are logged and the record is retried next tick. Returns how
    /// many records took an action.
    pub async fn tick(&self) -> Result<usize, DomainError> {
        self.adopt_orphans().await?;

        let watches = self.watches.find_all(&WatchStatus::ACTIVE).await?;
        let mut acted = 0;
        for watch in watches {
            let pkg_id = watch.pkg_id;
            match self.step(watch).await {
                Ok(WatchAction::Wait) => {}
                Ok(action) => {
                    tracing::debug!(pkg_id = %pkg_id, ?action, "Watch step applied");
                    acted += 1;
                }
                Err(e) => {
                    tracing::warn!(pkg_id = %pkg_id, error = %e, "Watch step failed, retrying next tick");
                }
            }
        }
        Ok(acted)
    }

    /// Give a watch record to every `creating_repo` package that lacks one,
    /// e.g. when the record could not be written at approval time.
    async fn adopt_orphans(&self) -> Result<(), DomainError> {
        let mut page = 1;
        loop {
            let filter = PkgFilter {
                phase: Some(PackagePhase::CreatingRepo),
                page,
                count_per_page: PkgFilter::MAX_PAGE_SIZE,
                ..Default::default()
            };
            let (pkgs, total) = self.pkgs.find_all(&filter).await?;

            for pkg in &pkgs {
                match self.watches.add(&PkgWatch::new(pkg.id(), Utc::now())).await {
                    Ok(()) => tracing::info!(pkg_id = %pkg.id(), "Adopted package without watch record"),
                    Err(DomainError::AlreadyExists(_)) => {}
                    Err(e) => tracing::warn!(pkg_id = %pkg.id(), error = %e, "Failed to adopt package"),
                }
            }

            if page * filter.count_per_page >= total {
                return Ok(());
            }
            page += 1;
        }
    }

    /// Decide and execute the next step for one record
    pub async fn step(&self, mut watch: PkgWatch) -> Result<WatchAction, DomainError> {
        let pr_state = match (&watch.pr, watch.needs_pr_state()) {
            (Some(pr), true) => Some(self.prs.get(pr.number).await?),
            _ => None,
        };
        let action = watch.next_action(
            pr_state.as_ref(),
            &self.policy.ci_success_label,
            &self.policy.ci_failure_label,
        );

        match &action {
            WatchAction::CreatePr => self.create_pr(&mut watch).await?,
            WatchAction::UpdateBranch => {
                if let Some(pr) = &watch.pr {
                    self.prs.update(pr).await?;
                    tracing::info!(pkg_id = %watch.pkg_id, pr = pr.number, "Updated conflicting PR branch");
                }
            }
            WatchAction::Merge => self.merge(&mut watch).await?,
            WatchAction::HandleCiFailure => self.handle_ci_failure(&mut watch).await?,
            WatchAction::MarkMerged => {
                watch.set_status(WatchStatus::PrMerged, Utc::now());
                self.watches.save(&watch).await?;
                tracing::info!(pkg_id = %watch.pkg_id, "PR merged outside the loop");
            }
            WatchAction::MarkClosed { closed_by } => {
                watch.set_status(WatchStatus::Exception, Utc::now());
                self.watches.save(&watch).await?;
                let closer = closed_by.as_deref().unwrap_or("unknown");
                tracing::warn!(pkg_id = %watch.pkg_id, closed_by = closer, "PR closed without merging");
                self.notify_maintainers(
                    &watch.pkg_id,
                    "PR closed without merging",
                    &format!("The import PR was closed by {}.", closer),
                )
                .await;
            }
            WatchAction::FinishInit => self.finish_init(&mut watch).await?,
            WatchAction::Wait => {}
        }
        Ok(action)
    }

    async fn create_pr(&self, watch: &mut PkgWatch) -> Result<(), DomainError> {
        let pkg = self.pkgs.find(&watch.pkg_id).await?.into_inner();
        let pr = self.prs.create(&pkg).await?;

        watch.pr_created(pr.clone(), Utc::now());
        self.watches.save(watch).await?;
        tracing::info!(pkg_id = %watch.pkg_id, pr = pr.number, "Import PR created");

        let signalled = update_with_retry(self.pkgs.as_ref(), &watch.pkg_id, |pkg, now| {
            pkg.init_started(&pr.link, now)
        })
        .await;
        if let Err(e) = signalled {
            tracing::warn!(pkg_id = %watch.pkg_id, error = %e, "Failed to record initialization start");
        }
        Ok(())
    }

    async fn merge(&self, watch: &mut PkgWatch) -> Result<(), DomainError> {
        let Some(pr) = watch.pr.clone() else {
            return Ok(());
        };

        match self.prs.merge(pr.number).await {
            Ok(()) => {
                watch.set_status(WatchStatus::PrMerged, Utc::now());
                self.watches.save(watch).await?;
                tracing::info!(pkg_id = %watch.pkg_id, pr = pr.number, "Import PR merged");
            }
            Err(e) => {
                watch.set_status(WatchStatus::Exception, Utc::now());
                self.watches.save(watch).await?;
                tracing::error!(pkg_id = %watch.pkg_id, pr = pr.number, error = %e, "Failed to merge import PR");
                self.notify_maintainers(
                    &watch.pkg_id,
                    "Failed to merge import PR",
                    &format!("Merging {} failed: {}", pr.link, e),
                )
                .await;
            }
        }
        Ok(())
    }

    /// CI rejected the import PR. A package that already exists upstream
    /// is closed with an explanation; anything else needs a human.
    ///
    /// Every lookup happens before the PR is closed, and the watch record
    /// is saved last. An interrupted run is redone on the next tick and
    /// the steps already taken are skipped.
    async fn handle_ci_failure(&self, watch: &mut PkgWatch) -> Result<(), DomainError> {
        let Some(pr) = watch.pr.clone() else {
            return Ok(());
        };

        let pkg = self.pkgs.find(&watch.pkg_id).await?.into_inner();
        let existed = self.manager.is_pkg_existed(&pkg.basic().name).await?;

        self.prs.close(pr.number).await?;

        if !existed {
            watch.set_status(WatchStatus::Exception, Utc::now());
            self.watches.save(watch).await?;
            tracing::warn!(pkg_id = %watch.pkg_id, pr = pr.number, "CI failed on import PR");
            self.notify_maintainers(
                &watch.pkg_id,
                "CI failed on import PR",
                &format!("CI failed on {}. The PR has been closed.", pr.link),
            )
            .await;
            return Ok(());
        }

        let closed = update_with_retry(self.pkgs.as_ref(), &watch.pkg_id, |pkg, now| {
            if pkg.phase().is_terminal() {
                return Ok(false);
            }
            pkg.close(now)?;
            Ok(true)
        })
        .await?;

        if closed.is_some() {
            self.explain_closure(&pkg).await;
            publish_event(
                self.events.as_ref(),
                PkgEvent::AlreadyExisted {
                    pkg_id: Some(pkg.id()),
                    pkg_name: pkg.basic().name.clone(),
                    importer: pkg.basic().importer.clone(),
                    timestamp: Utc::now(),
                },
            )
            .await;
        }

        watch.set_status(WatchStatus::Done, Utc::now());
        self.watches.save(watch).await?;
        tracing::info!(pkg_id = %watch.pkg_id, "Package already exists upstream, closed");
        Ok(())
    }

    async fn explain_closure(&self, pkg: &SoftwarePkg) {
        let text = format!(
            "The package {} already exists in the distribution, so this request has been closed.",
            pkg.basic().name
        );
        let result = async {
            let author = Account::new(ROBOT_ACCOUNT)?;
            let content = ReviewComment::new(&text, self.policy.max_comment_len)?;
            let mut current = self.pkgs.find(&pkg.id()).await?;
            let comment = current.add_comment(&author, content, Utc::now());
            self.pkgs.add_comment(&pkg.id(), &comment).await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(pkg_id = %pkg.id(), error = %e, "Failed to comment on closed package");
        }
    }

    async fn finish_init(&self, watch: &mut PkgWatch) -> Result<(), DomainError> {
        let current = self.pkgs.find(&watch.pkg_id).await?;
        if current.phase() == PackagePhase::Closed {
            watch.set_status(WatchStatus::Exception, Utc::now());
            self.watches.save(watch).await?;
            tracing::warn!(pkg_id = %watch.pkg_id, "Import PR merged for a closed package");
            let link = watch.pr.as_ref().map(|pr| pr.link.as_str()).unwrap_or("The import PR");
            self.notify_maintainers(
                &watch.pkg_id,
                "Package closed before import finished",
                &format!(
                    "{} was merged, but the package had already been closed and was not marked imported.",
                    link
                ),
            )
            .await;
            return Ok(());
        }

        let finished = update_with_retry(self.pkgs.as_ref(), &watch.pkg_id, |pkg, now| {
            if pkg.phase() == PackagePhase::Imported {
                return Ok(false);
            }
            pkg.init_done(now)?;
            Ok(true)
        })
        .await?;

        watch.set_status(WatchStatus::Done, Utc::now());
        self.watches.save(watch).await?;

        if let Some(pkg) = finished {
            tracing::info!(pkg_id = %pkg.id(), name = %pkg.basic().name, "Package imported");
            publish_event(self.events.as_ref(), PkgEvent::initialized(&pkg, Utc::now())).await;
        }
        Ok(())
    }

    async fn notify_maintainers(&self, pkg_id: &SoftwarePkgId, subject: &str, detail: &str) {
        let name = match self.pkgs.find(pkg_id).await {
            Ok(pkg) => pkg.basic().name.to_string(),
            Err(_) => pkg_id.to_string(),
        };
        let subject = format!("[pkg import] {}: {}", name, subject);
        let body = format!("Package: {}\nId: {}\n\n{}", name, pkg_id, detail);

        if let Err(e) = self.mailer.send(&subject, &body).await {
            tracing::warn!(pkg_id = %pkg_id, error = %e, "Failed to email maintainers");
        }
    }
}
