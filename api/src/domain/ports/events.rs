//! Domain event port
//!
//! Package lifecycle events published to downstream consumers. Publishing
//! is best-effort: callers log failures and carry on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{Account, PackageName, SoftwarePkg, SoftwarePkgId};
use crate::error::DomainError;

/// Event types emitted over the package lifecycle
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PkgEvent {
    Applied {
        pkg_id: SoftwarePkgId,
        pkg_name: PackageName,
        importer: Account,
        timestamp: DateTime<Utc>,
    },
    Approved {
        pkg_id: SoftwarePkgId,
        pkg_name: PackageName,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        pkg_id: SoftwarePkgId,
        pkg_name: PackageName,
        timestamp: DateTime<Utc>,
    },
    AlreadyExisted {
        pkg_id: Option<SoftwarePkgId>,
        pkg_name: PackageName,
        importer: Account,
        timestamp: DateTime<Utc>,
    },
    Initialized {
        pkg_id: SoftwarePkgId,
        pkg_name: PackageName,
        repo_pr_link: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl PkgEvent {
    pub fn applied(pkg: &SoftwarePkg, timestamp: DateTime<Utc>) -> Self {
        PkgEvent::Applied {
            pkg_id: pkg.id(),
            pkg_name: pkg.basic().name.clone(),
            importer: pkg.basic().importer.clone(),
            timestamp,
        }
    }

    pub fn approved(pkg: &SoftwarePkg, timestamp: DateTime<Utc>) -> Self {
        PkgEvent::Approved {
            pkg_id: pkg.id(),
            pkg_name: pkg.basic().name.clone(),
            timestamp,
        }
    }

    pub fn rejected(pkg: &SoftwarePkg, timestamp: DateTime<Utc>) -> Self {
        PkgEvent::Rejected {
            pkg_id: pkg.id(),
            pkg_name: pkg.basic().name.clone(),
            timestamp,
        }
    }

    pub fn initialized(pkg: &SoftwarePkg, timestamp: DateTime<Utc>) -> Self {
        PkgEvent::Initialized {
            pkg_id: pkg.id(),
            pkg_name: pkg.basic().name.clone(),
            repo_pr_link: pkg.basic().repo_pr_link.clone(),
            timestamp,
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            PkgEvent::Applied { .. } => "applied",
            PkgEvent::Approved { .. } => "approved",
            PkgEvent::Rejected { .. } => "rejected",
            PkgEvent::AlreadyExisted { .. } => "already_existed",
            PkgEvent::Initialized { .. } => "initialized",
        }
    }
}

/// Port trait for publishing package events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn notify(&self, event: &PkgEvent) -> Result<(), DomainError>;
}
