//! PostgreSQL adapter for SoftwarePkgRepository
//!
//! One row per aggregate with the review ledger, check-item reviews and
//! operation log held in JSONB columns. Saves are conditional on the
//! `version` column; comments live in their own append-only table.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::domain::entities::{
    Account, CommentId, PackageName, SoftwarePkg, SoftwarePkgBasicInfo,
    SoftwarePkgCi, SoftwarePkgComment, SoftwarePkgId,
};
use crate::domain::ports::{PkgFilter, SoftwarePkgRepository, Versioned};
use crate::entity::{software_pkg_comments, software_pkgs};
use crate::error::DomainError;

/// PostgreSQL implementation of SoftwarePkgRepository
pub struct PostgresSoftwarePkgRepository {
    db: DatabaseConnection,
}

impl PostgresSoftwarePkgRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn comments_of(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<SoftwarePkgComment>>, DomainError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = software_pkg_comments::Entity::find()
            .filter(software_pkg_comments::Column::PkgId.is_in(ids.iter().copied()))
            .order_by_asc(software_pkg_comments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut by_pkg: HashMap<Uuid, Vec<SoftwarePkgComment>> = HashMap::new();
        for row in rows {
            let pkg_id = row.pkg_id;
            by_pkg.entry(pkg_id).or_default().push(comment_from_model(row)?);
        }
        Ok(by_pkg)
    }
}

#[async_trait]
impl SoftwarePkgRepository for PostgresSoftwarePkgRepository {
    async fn add(&self, pkg: &SoftwarePkg) -> Result<(), DomainError> {
        let model = active_model(pkg, 1)?;
        model.insert(&self.db).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                DomainError::AlreadyExists(format!("package {}", pkg.basic().name))
            }
            _ => db_err(e),
        })?;
        Ok(())
    }

    async fn find(&self, id: &SoftwarePkgId) -> Result<Versioned<SoftwarePkg>, DomainError> {
        let row = software_pkgs::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::NotFound(format!("package {}", id)))?;

        let mut comments = self.comments_of(&[id.0]).await?;
        let version = row.version;
        let pkg = pkg_from_model(row, comments.remove(&id.0).unwrap_or_default())?;
        Ok(Versioned::loaded(pkg, version))
    }

    async fn save(&self, pkg: Versioned<SoftwarePkg>) -> Result<(), DomainError> {
        let id = pkg.id();
        let expected = pkg.version();
        let mut model = active_model(&pkg, expected + 1)?;
        // Immutable after insert
        model.id = sea_orm::ActiveValue::NotSet;
        model.applied_at = sea_orm::ActiveValue::NotSet;

        let result = software_pkgs::Entity::update_many()
            .set(model)
            .filter(software_pkgs::Column::Id.eq(id.0))
            .filter(software_pkgs::Column::Version.eq(expected))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            let exists = software_pkgs::Entity::find_by_id(id.0)
                .count(&self.db)
                .await
                .map_err(db_err)?
                > 0;
            return Err(if exists {
                DomainError::ConcurrentUpdate(format!("package {} changed since version {}", id, expected))
            } else {
                DomainError::NotFound(format!("package {}", id))
            });
        }
        Ok(())
    }

    async fn find_all(
        &self,
        filter: &PkgFilter,
    ) -> Result<(Vec<SoftwarePkg>, u64), DomainError> {
        let filter = filter.clone().normalized();

        let mut query = software_pkgs::Entity::find();
        if let Some(phase) = filter.phase {
            query = query.filter(software_pkgs::Column::Phase.eq(phase.to_string()));
        }
        if let Some(importer) = &filter.importer {
            query = query.filter(software_pkgs::Column::Importer.eq(importer.as_str()));
        }
        if let Some(platform) = filter.platform {
            query = query.filter(software_pkgs::Column::Platform.eq(platform.to_string()));
        }

        let paginator = query
            .order_by_desc(software_pkgs::Column::AppliedAt)
            .paginate(&self.db, filter.count_per_page);
        let total = paginator.num_items().await.map_err(db_err)?;
        let rows = paginator
            .fetch_page(filter.page - 1)
            .await
            .map_err(db_err)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut comments = self.comments_of(&ids).await?;
        let pkgs = rows
            .into_iter()
            .map(|row| {
                let pkg_comments = comments.remove(&row.id).unwrap_or_default();
                pkg_from_model(row, pkg_comments)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((pkgs, total))
    }

    async fn add_comment(
        &self,
        id: &SoftwarePkgId,
        comment: &SoftwarePkgComment,
    ) -> Result<(), DomainError> {
        software_pkg_comments::ActiveModel {
            id: Set(comment.id.0),
            pkg_id: Set(id.0),
            author: Set(comment.author.to_string()),
            content: Set(comment.content.to_string()),
            created_at: Set(comment.created_at.fixed_offset()),
        }
        .insert(&self.db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                DomainError::NotFound(format!("package {}", id))
            }
            _ => db_err(e),
        })?;

        // Touch the row without moving the version
        software_pkgs::Entity::update_many()
            .col_expr(software_pkgs::Column::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(software_pkgs::Column::Id.eq(id.0))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn db_err(e: DbErr) -> DomainError {
    DomainError::Database(e.to_string())
}

fn corrupt(field: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::Database(format!("corrupt {} column: {}", field, e))
}

fn to_json<T: serde::Serialize>(field: &str, value: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(value).map_err(|e| DomainError::Internal(format!("encode {}: {}", field, e)))
}

fn from_json<T: DeserializeOwned>(field: &str, value: serde_json::Value) -> Result<T, DomainError> {
    serde_json::from_value(value).map_err(|e| corrupt(field, e))
}

fn active_model(pkg: &SoftwarePkg, version: i32) -> Result<software_pkgs::ActiveModel, DomainError> {
    let basic = pkg.basic();
    let ci = pkg.ci();
    Ok(software_pkgs::ActiveModel {
        id: Set(basic.id.0),
        name: Set(basic.name.to_string()),
        importer: Set(basic.importer.to_string()),
        phase: Set(basic.phase.to_string()),
        platform: Set(basic.application.platform.to_string()),
        review_result: Set(basic.review_result.map(|r| r.to_string())),
        applied_at: Set(basic.applied_at.fixed_offset()),
        approved_by: Set(to_json("approved_by", &basic.approved_by)?),
        rejected_by: Set(to_json("rejected_by", &basic.rejected_by)?),
        application: Set(to_json("application", &basic.application)?),
        repo_pr_link: Set(basic.repo_pr_link.clone()),
        ci_id: Set(ci.id),
        ci_status: Set(ci.status.to_string()),
        ci_start_time: Set(ci.start_time.fixed_offset()),
        reviews: Set(to_json("reviews", &pkg.reviews())?),
        logs: Set(to_json("logs", &pkg.logs())?),
        version: Set(version),
        updated_at: Set(Utc::now().fixed_offset()),
    })
}

fn pkg_from_model(
    model: software_pkgs::Model,
    comments: Vec<SoftwarePkgComment>,
) -> Result<SoftwarePkg, DomainError> {
    let basic = SoftwarePkgBasicInfo {
        id: SoftwarePkgId(model.id),
        importer: Account::new(&model.importer).map_err(|e| corrupt("importer", e))?,
        name: PackageName::new(&model.name).map_err(|e| corrupt("name", e))?,
        phase: model.phase.parse().map_err(|e| corrupt("phase", e))?,
        review_result: model
            .review_result
            .map(|r| r.parse())
            .transpose()
            .map_err(|e| corrupt("review_result", e))?,
        applied_at: model.applied_at.with_timezone(&Utc),
        approved_by: from_json("approved_by", model.approved_by)?,
        rejected_by: from_json("rejected_by", model.rejected_by)?,
        application: from_json("application", model.application)?,
        repo_pr_link: model.repo_pr_link,
    };
    let ci = SoftwarePkgCi {
        id: model.ci_id,
        status: model.ci_status.parse().map_err(|e| corrupt("ci_status", e))?,
        start_time: model.ci_start_time.with_timezone(&Utc),
    };

    Ok(SoftwarePkg::restore(
        basic,
        ci,
        from_json("reviews", model.reviews)?,
        comments,
        from_json("logs", model.logs)?,
    ))
}

fn comment_from_model(model: software_pkg_comments::Model) -> Result<SoftwarePkgComment, DomainError> {
    let created_at: DateTime<Utc> = model.created_at.with_timezone(&Utc);
    Ok(SoftwarePkgComment {
        id: CommentId(model.id),
        author: Account::new(&model.author).map_err(|e| corrupt("author", e))?,
        // Length was checked on the way in; reading back must not depend on
        // the current policy
        content: from_json("content", serde_json::Value::String(model.content))?,
        created_at,
    })
}

