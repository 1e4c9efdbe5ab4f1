//! PostgreSQL adapter for PkgWatchRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};

use crate::domain::entities::{PkgWatch, PullRequestRef, SoftwarePkgId, WatchStatus};
use crate::domain::ports::PkgWatchRepository;
use crate::entity::pkg_watches;
use crate::error::DomainError;

/// PostgreSQL implementation of PkgWatchRepository
pub struct PostgresPkgWatchRepository {
    db: DatabaseConnection,
}

impl PostgresPkgWatchRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn active_model(watch: &PkgWatch) -> pkg_watches::ActiveModel {
    pkg_watches::ActiveModel {
        pkg_id: Set(watch.pkg_id.0),
        status: Set(watch.status.to_string()),
        pr_number: Set(watch.pr.as_ref().map(|pr| pr.number)),
        pr_link: Set(watch.pr.as_ref().map(|pr| pr.link.clone())),
        updated_at: Set(watch.updated_at.fixed_offset()),
    }
}

#[async_trait]
impl PkgWatchRepository for PostgresPkgWatchRepository {
    async fn add(&self, watch: &PkgWatch) -> Result<(), DomainError> {
        active_model(watch)
            .insert(&self.db)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    DomainError::AlreadyExists(format!("watch for {}", watch.pkg_id))
                }
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    DomainError::NotFound(format!("package {}", watch.pkg_id))
                }
                _ => DomainError::Database(e.to_string()),
            })?;
        Ok(())
    }

    async fn save(&self, watch: &PkgWatch) -> Result<(), DomainError> {
        active_model(watch)
            .update(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_all(&self, statuses: &[WatchStatus]) -> Result<Vec<PkgWatch>, DomainError> {
        let results = pkg_watches::Entity::find()
            .filter(pkg_watches::Column::Status.is_in(statuses.iter().map(|s| s.to_string())))
            .order_by_asc(pkg_watches::Column::UpdatedAt)
            .all(&self.db)
            .await
            .map_err(|e| DomainError::Database(e.to_string()))?;

        results.into_iter().map(TryInto::try_into).collect()
    }
}

/// Convert SeaORM model to domain entity
impl TryFrom<pkg_watches::Model> for PkgWatch {
    type Error = DomainError;

    fn try_from(model: pkg_watches::Model) -> Result<Self, Self::Error> {
        let pr = match (model.pr_number, model.pr_link) {
            (Some(number), Some(link)) => Some(PullRequestRef { number, link }),
            _ => None,
        };
        Ok(PkgWatch {
            pkg_id: SoftwarePkgId(model.pkg_id),
            status: model
                .status
                .parse()
                .map_err(|e| DomainError::Database(format!("corrupt watch status: {}", e)))?,
            pr,
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}
