//! Helpers shared by the package services

use chrono::{DateTime, Utc};

use crate::domain::entities::{SoftwarePkg, SoftwarePkgId};
use crate::domain::ports::{EventPublisher, PkgEvent, SoftwarePkgRepository};
use crate::error::DomainError;

/// Attempts made by `update_with_retry` before a conflict is surfaced
pub const MAX_CONFLICT_RETRIES: u32 = 3;

/// Publish an event, logging instead of failing. Events are notifications,
/// not part of the state change that triggered them.
pub async fn publish_event<E: EventPublisher + ?Sized>(events: &E, event: PkgEvent) {
    if let Err(e) = events.notify(&event).await {
        tracing::warn!(event = event.kind(), error = %e, "Failed to publish event");
    }
}

/// Read a package, apply `apply` and save it, re-reading on version
/// conflicts. `apply` returns `Ok(false)` when there is nothing to save.
/// Returns the saved state, or `None` if nothing changed.
pub async fn update_with_retry<R, F>(
    repo: &R,
    id: &SoftwarePkgId,
    mut apply: F,
) -> Result<Option<SoftwarePkg>, DomainError>
where
    R: SoftwarePkgRepository + ?Sized,
    F: FnMut(&mut SoftwarePkg, DateTime<Utc>) -> Result<bool, DomainError> + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut pkg = repo.find(id).await?;
        if !apply(&mut *pkg, Utc::now())? {
            return Ok(None);
        }

        let saved = (*pkg).clone();
        match repo.save(pkg).await {
            Ok(()) => return Ok(Some(saved)),
            Err(e) if e.is_concurrent_update() && attempt < MAX_CONFLICT_RETRIES => {
                tracing::debug!(pkg_id = %id, attempt, "Conflict saving package, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}
