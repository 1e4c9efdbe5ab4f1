//! Comment Service
//!
//! Review comments are append-only. They are length checked, screened by
//! the content moderator and stored through the repository's comment
//! path, which never conflicts with concurrent package writes.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::entities::{
    Account, CommentId, Language, ReviewComment, SoftwarePkgComment, SoftwarePkgId,
};
use crate::domain::policy::PkgPolicy;
use crate::domain::ports::{ContentModerator, SoftwarePkgRepository, Translator};
use crate::error::DomainError;

pub struct CommentService<R, Mo, T>
where
    R: SoftwarePkgRepository,
    Mo: ContentModerator,
    T: Translator,
{
    pkgs: Arc<R>,
    moderator: Arc<Mo>,
    translator: Arc<T>,
    policy: PkgPolicy,
}

impl<R, Mo, T> CommentService<R, Mo, T>
where
    R: SoftwarePkgRepository,
    Mo: ContentModerator,
    T: Translator,
{
    pub fn new(pkgs: Arc<R>, moderator: Arc<Mo>, translator: Arc<T>, policy: PkgPolicy) -> Self {
        Self {
            pkgs,
            moderator,
            translator,
            policy,
        }
    }

    pub async fn add_comment(
        &self,
        id: &SoftwarePkgId,
        author: &Account,
        content: &str,
    ) -> Result<SoftwarePkgComment, DomainError> {
        let content = ReviewComment::new(content, self.policy.max_comment_len)?;
        self.moderator.check(content.as_str()).await?;

        let mut pkg = self.pkgs.find(id).await?;
        let comment = pkg.add_comment(author, content, Utc::now());
        self.pkgs.add_comment(id, &comment).await?;

        tracing::debug!(pkg_id = %id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    pub async fn translate_comment(
        &self,
        id: &SoftwarePkgId,
        comment_id: &CommentId,
        language: Language,
    ) -> Result<String, DomainError> {
        let pkg = self.pkgs.find(id).await?;
        let comment = pkg
            .find_comment(comment_id)
            .ok_or_else(|| DomainError::NotFound(format!("comment {}", comment_id)))?;

        self.translator
            .translate(comment.content.as_str(), language)
            .await
    }
}
