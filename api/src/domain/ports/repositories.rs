//! Repository port traits
//!
//! These traits define the interface for data persistence.
//! Implementations are provided by adapters (e.g., PostgreSQL).

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;

use crate::domain::entities::{
    Account, PackagePhase, PackagePlatform, PkgWatch, SoftwarePkg, SoftwarePkgComment,
    SoftwarePkgId, WatchStatus,
};
use crate::error::DomainError;

/// A value read from a repository together with the version it was read at.
///
/// Writes consume the handle, so every save is tied to a preceding read.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    value: T,
    version: i32,
}

impl<T> Versioned<T> {
    /// Handle for a value just read from storage at `version`
    pub(crate) fn loaded(value: T, version: i32) -> Self {
        Self { value, version }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Versioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Versioned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Filter for listing packages
#[derive(Debug, Clone, Default)]
pub struct PkgFilter {
    pub phase: Option<PackagePhase>,
    pub importer: Option<Account>,
    pub platform: Option<PackagePlatform>,
    /// 1-based page number
    pub page: u64,
    pub count_per_page: u64,
}

impl PkgFilter {
    pub const DEFAULT_PAGE_SIZE: u64 = 20;
    pub const MAX_PAGE_SIZE: u64 = 100;

    /// Clamp paging to sane bounds
    pub fn normalized(mut self) -> Self {
        if self.page == 0 {
            self.page = 1;
        }
        if self.count_per_page == 0 {
            self.count_per_page = Self::DEFAULT_PAGE_SIZE;
        }
        self.count_per_page = self.count_per_page.min(Self::MAX_PAGE_SIZE);
        self
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1) * self.count_per_page
    }

    pub fn matches(&self, pkg: &SoftwarePkg) -> bool {
        let basic = pkg.basic();
        self.phase.map_or(true, |p| basic.phase == p)
            && self.importer.as_ref().map_or(true, |a| basic.importer == *a)
            && self
                .platform
                .map_or(true, |p| basic.application.platform == p)
    }
}

/// Repository for the package aggregate
#[async_trait]
pub trait SoftwarePkgRepository: Send + Sync {
    /// Insert a new package. Fails with `AlreadyExists` if the name is taken.
    async fn add(&self, pkg: &SoftwarePkg) -> Result<(), DomainError>;

    /// Find a package with its comments. `NotFound` if absent.
    async fn find(&self, id: &SoftwarePkgId) -> Result<Versioned<SoftwarePkg>, DomainError>;

    /// Save a package read earlier. Fails with `ConcurrentUpdate` if the
    /// stored version moved on. Comments are not written here.
    async fn save(&self, pkg: Versioned<SoftwarePkg>) -> Result<(), DomainError>;

    /// List packages matching a filter, newest first, with the total count
    async fn find_all(&self, filter: &PkgFilter)
        -> Result<(Vec<SoftwarePkg>, u64), DomainError>;

    /// Append a comment to a package
    async fn add_comment(
        &self,
        id: &SoftwarePkgId,
        comment: &SoftwarePkgComment,
    ) -> Result<(), DomainError>;
}

/// Repository for watch records, keyed by package id
#[async_trait]
pub trait PkgWatchRepository: Send + Sync {
    /// Insert a record. `AlreadyExists` if the package is already watched.
    async fn add(&self, watch: &PkgWatch) -> Result<(), DomainError>;

    /// Overwrite a record
    async fn save(&self, watch: &PkgWatch) -> Result<(), DomainError>;

    /// Find all records in any of the given statuses
    async fn find_all(&self, statuses: &[WatchStatus]) -> Result<Vec<PkgWatch>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutating_through_a_handle_keeps_its_read_version() {
        let mut handle = Versioned::loaded(vec![1, 2], 4);
        handle.push(3);

        assert_eq!(handle.version(), 4);
        assert_eq!(handle.into_inner(), vec![1, 2, 3]);
    }
}
