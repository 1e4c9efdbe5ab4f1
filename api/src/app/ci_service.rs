//! CI Service
//!
//! Starts, retries and completes CI runs for packages under review. The
//! aggregate owns the rules; this service loads it, lets it talk to the
//! CI collaborator and persists the result.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::entities::{Account, PackageCiStatus, PackagePhase, SoftwarePkg, SoftwarePkgId};
use crate::domain::policy::PkgPolicy;
use crate::domain::ports::{PkgCi, PkgFilter, SoftwarePkgRepository, Versioned};
use crate::error::DomainError;

/// Service driving the CI sub-state of packages
pub struct CiService<R, C>
where
    R: SoftwarePkgRepository,
    C: PkgCi,
{
    pkgs: Arc<R>,
    ci: Arc<C>,
    policy: PkgPolicy,
}

impl<R, C> CiService<R, C>
where
    R: SoftwarePkgRepository,
    C: PkgCi,
{
    pub fn new(pkgs: Arc<R>, ci: Arc<C>, policy: PkgPolicy) -> Self {
        Self { pkgs, ci, policy }
    }

    /// The underlying CI collaborator
    pub fn port(&self) -> &C {
        self.ci.as_ref()
    }

    /// Start the first CI run of a package
    pub async fn start(&self, id: &SoftwarePkgId) -> Result<(), DomainError> {
        let mut pkg = self.pkgs.find(id).await?;
        pkg.start_ci(self.ci.as_ref(), Utc::now()).await?;
        self.persist_run(pkg).await?;

        tracing::info!(pkg_id = %id, "Started CI");
        Ok(())
    }

    /// Importer-requested rerun
    pub async fn retest(&self, id: &SoftwarePkgId, user: &Account) -> Result<(), DomainError> {
        let mut pkg = self.pkgs.find(id).await?;
        pkg.retest_ci(user, self.ci.as_ref(), &self.policy, Utc::now())
            .await?;
        self.persist_run(pkg).await?;

        tracing::info!(pkg_id = %id, user = %user, "Restarted CI");
        Ok(())
    }

    /// Record the outcome of run `ci_id`. Results for superseded runs fail
    /// with `CiIsUnmatched` and leave the package untouched.
    pub async fn done(
        &self,
        id: &SoftwarePkgId,
        ci_id: i64,
        success: bool,
    ) -> Result<(), DomainError> {
        let mut pkg = self.pkgs.find(id).await?;
        pkg.ci_done(ci_id, success, self.ci.as_ref(), Utc::now())
            .await?;
        self.pkgs.save(pkg).await?;

        tracing::info!(pkg_id = %id, ci_id, success, "CI finished");
        Ok(())
    }

    /// Retry CI for every reviewing package whose run timed out or whose
    /// waiting window expired. Returns how many runs were started.
    pub async fn auto_retest_all(&self) -> Result<usize, DomainError> {
        let now = Utc::now();
        let mut started = 0;
        let mut page = 1;

        loop {
            let filter = PkgFilter {
                phase: Some(PackagePhase::Reviewing),
                page,
                count_per_page: PkgFilter::MAX_PAGE_SIZE,
                ..Default::default()
            };
            let (pkgs, total) = self.pkgs.find_all(&filter).await?;

            for pkg in pkgs.iter().filter(|p| self.is_retest_candidate(p, now)) {
                match self.auto_retest(&pkg.id()).await {
                    Ok(()) => started += 1,
                    Err(
                        DomainError::CiNotTimeYet
                        | DomainError::CiIsRunning
                        | DomainError::CiIsPassed
                        | DomainError::InvalidPhase(_),
                    ) => {}
                    Err(e) => {
                        tracing::warn!(pkg_id = %pkg.id(), error = %e, "Auto retest failed");
                    }
                }
            }

            if page * filter.count_per_page >= total {
                break;
            }
            page += 1;
        }

        if started > 0 {
            tracing::info!(started, "Auto retest sweep restarted CI runs");
        }
        Ok(started)
    }

    fn is_retest_candidate(&self, pkg: &SoftwarePkg, now: chrono::DateTime<Utc>) -> bool {
        match pkg.ci_status(now, &self.policy) {
            PackageCiStatus::Timeout => true,
            PackageCiStatus::Waiting => now >= pkg.ci().start_time + self.policy.ci_wait_timeout,
            _ => false,
        }
    }

    async fn auto_retest(&self, id: &SoftwarePkgId) -> Result<(), DomainError> {
        let mut pkg = self.pkgs.find(id).await?;
        pkg.auto_retest_ci(self.ci.as_ref(), &self.policy, Utc::now())
            .await?;
        self.persist_run(pkg).await
    }

    /// Save a package that just started a run. If the save loses, the new
    /// run is torn down so it does not linger untracked.
    async fn persist_run(&self, pkg: Versioned<SoftwarePkg>) -> Result<(), DomainError> {
        let run_id = pkg.ci().id;
        if let Err(e) = self.pkgs.save(pkg).await {
            if let Err(clear_err) = self.ci.clear_ci(run_id).await {
                tracing::warn!(run_id, error = %clear_err, "Failed to clear orphaned CI run");
            }
            return Err(e);
        }
        Ok(())
    }
}
