//! Package Service
//!
//! Use cases around a package request itself: apply, read, list, update
//! the application and withdraw it.

use std::sync::Arc;

use chrono::Utc;

use crate::app::ci_service::CiService;
use crate::app::common::publish_event;
use crate::domain::entities::{Account, Application, PackageName, SoftwarePkg, SoftwarePkgId};
use crate::domain::ports::{
    EventPublisher, PkgCi, PkgEvent, PkgFilter, PkgManager, SoftwarePkgRepository,
};
use crate::error::DomainError;

/// A new import request
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub name: PackageName,
    pub application: Application,
}

/// Service for package request lifecycle operations
pub struct PkgService<R, M, C, E>
where
    R: SoftwarePkgRepository,
    M: PkgManager,
    C: PkgCi,
    E: EventPublisher,
{
    pkgs: Arc<R>,
    manager: Arc<M>,
    ci: Arc<CiService<R, C>>,
    events: Arc<E>,
}

impl<R, M, C, E> PkgService<R, M, C, E>
where
    R: SoftwarePkgRepository,
    M: PkgManager,
    C: PkgCi,
    E: EventPublisher,
{
    pub fn new(pkgs: Arc<R>, manager: Arc<M>, ci: Arc<CiService<R, C>>, events: Arc<E>) -> Self {
        Self {
            pkgs,
            manager,
            ci,
            events,
        }
    }

    /// Submit a new import request
    pub async fn apply(
        &self,
        importer: &Account,
        req: ApplyRequest,
    ) -> Result<SoftwarePkgId, DomainError> {
        let now = Utc::now();

        if self.manager.is_pkg_existed(&req.name).await? {
            publish_event(
                self.events.as_ref(),
                PkgEvent::AlreadyExisted {
                    pkg_id: None,
                    pkg_name: req.name.clone(),
                    importer: importer.clone(),
                    timestamp: now,
                },
            )
            .await;
            return Err(DomainError::AlreadyExists(format!(
                "package {} already exists in the distribution",
                req.name
            )));
        }

        let pkg = SoftwarePkg::new(importer.clone(), req.name, req.application, now)?;
        self.pkgs.add(&pkg).await?;

        tracing::info!(
            pkg_id = %pkg.id(),
            name = %pkg.basic().name,
            importer = %importer,
            "Package applied"
        );

        publish_event(self.events.as_ref(), PkgEvent::applied(&pkg, now)).await;
        self.kick_ci(&pkg.id()).await;

        Ok(pkg.id())
    }

    pub async fn get(&self, id: &SoftwarePkgId) -> Result<SoftwarePkg, DomainError> {
        Ok(self.pkgs.find(id).await?.into_inner())
    }

    pub async fn list(&self, filter: PkgFilter) -> Result<(Vec<SoftwarePkg>, u64), DomainError> {
        self.pkgs.find_all(&filter.normalized()).await
    }

    /// Replace the application; the review and CI start over
    pub async fn update_application(
        &self,
        id: &SoftwarePkgId,
        user: &Account,
        application: Application,
    ) -> Result<(), DomainError> {
        let mut pkg = self.pkgs.find(id).await?;
        pkg.update_application(user, application, self.ci_port(), Utc::now())
            .await?;
        self.pkgs.save(pkg).await?;

        tracing::info!(pkg_id = %id, "Application updated");
        self.kick_ci(id).await;
        Ok(())
    }

    /// The importer withdraws the request
    pub async fn abandon(&self, id: &SoftwarePkgId, user: &Account) -> Result<(), DomainError> {
        let mut pkg = self.pkgs.find(id).await?;
        pkg.give_up(user, Utc::now())?;
        self.pkgs.save(pkg).await?;

        tracing::info!(pkg_id = %id, "Package abandoned by importer");
        Ok(())
    }

    fn ci_port(&self) -> &C {
        self.ci.port()
    }

    /// Start CI right away. A failure is not fatal: the auto retest sweep
    /// starts any CI left waiting past its window.
    async fn kick_ci(&self, id: &SoftwarePkgId) {
        if let Err(e) = self.ci.start(id).await {
            tracing::warn!(pkg_id = %id, error = %e, "Initial CI start failed, leaving it to the sweep");
        }
    }
}
