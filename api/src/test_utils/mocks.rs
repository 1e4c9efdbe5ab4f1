//! Mock implementations of port traits
//!
//! These are in-memory implementations that can be configured for testing.
//! They store data in memory and allow tests to verify behavior.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::domain::entities::{
    Account, Language, PackageName, PkgWatch, PullRequestRef, PullRequestState, Role, SoftwarePkg,
    SoftwarePkgComment, SoftwarePkgId, WatchStatus,
};
use crate::domain::ports::{
    ContentModerator, EmailSender, EventPublisher, GiteaClient, GiteaLabel, GiteaPRBranch,
    GiteaPullRequest, GiteaRepo, GiteaTimelineEvent, GiteaUser, MaintainerDirectory, PkgCi,
    PkgEvent, PkgFilter, PkgManager, PkgWatchRepository, PullRequestClient, SoftwarePkgRepository,
    Translator, Versioned,
};
use crate::error::{DomainError, GiteaError};

fn mock_failure(op: &'static str) -> DomainError {
    DomainError::external(op, "Mock failure")
}

// ============================================================================
// In-Memory Software Package Repository
// ============================================================================

#[derive(Default)]
pub struct InMemorySoftwarePkgRepository {
    pkgs: Arc<RwLock<HashMap<SoftwarePkgId, (SoftwarePkg, i32)>>>,
    /// Number of upcoming saves to reject as concurrent updates
    pending_conflicts: Arc<RwLock<u32>>,
    pub saves: Arc<RwLock<u32>>,
}

impl InMemorySoftwarePkgRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with a package for testing
    pub fn with_pkg(self, pkg: SoftwarePkg) -> Self {
        self.pkgs.write().unwrap().insert(pkg.id(), (pkg, 1));
        self
    }

    /// Make the next `n` saves fail with `ConcurrentUpdate`
    pub fn with_conflicts(self, n: u32) -> Self {
        *self.pending_conflicts.write().unwrap() = n;
        self
    }

    /// Current stored state of a package
    pub fn get(&self, id: &SoftwarePkgId) -> Option<SoftwarePkg> {
        self.pkgs.read().unwrap().get(id).map(|(p, _)| p.clone())
    }

    pub fn version_of(&self, id: &SoftwarePkgId) -> Option<i32> {
        self.pkgs.read().unwrap().get(id).map(|(_, v)| *v)
    }

    pub fn save_count(&self) -> u32 {
        *self.saves.read().unwrap()
    }
}

#[async_trait]
impl SoftwarePkgRepository for InMemorySoftwarePkgRepository {
    async fn add(&self, pkg: &SoftwarePkg) -> Result<(), DomainError> {
        let mut pkgs = self.pkgs.write().unwrap();
        if pkgs
            .values()
            .any(|(p, _)| p.basic().name == pkg.basic().name)
        {
            return Err(DomainError::AlreadyExists(format!(
                "package {}",
                pkg.basic().name
            )));
        }
        pkgs.insert(pkg.id(), (pkg.clone(), 1));
        Ok(())
    }

    async fn find(&self, id: &SoftwarePkgId) -> Result<Versioned<SoftwarePkg>, DomainError> {
        let pkgs = self.pkgs.read().unwrap();
        pkgs.get(id)
            .map(|(p, v)| Versioned::loaded(p.clone(), *v))
            .ok_or_else(|| DomainError::NotFound(format!("package {}", id)))
    }

    async fn save(&self, pkg: Versioned<SoftwarePkg>) -> Result<(), DomainError> {
        {
            let mut conflicts = self.pending_conflicts.write().unwrap();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Err(DomainError::ConcurrentUpdate(format!("package {}", pkg.id())));
            }
        }

        let mut pkgs = self.pkgs.write().unwrap();
        let id = pkg.id();
        let (stored, version) = pkgs
            .get(&id)
            .ok_or_else(|| DomainError::NotFound(format!("package {}", id)))?;
        if *version != pkg.version() {
            return Err(DomainError::ConcurrentUpdate(format!("package {}", id)));
        }

        // Comments are append-only and only written through add_comment
        let comments = stored.comments().to_vec();
        let next_version = pkg.version() + 1;
        let incoming = pkg.into_inner();
        let merged = SoftwarePkg::restore(
            incoming.basic().clone(),
            incoming.ci().clone(),
            incoming.reviews().to_vec(),
            comments,
            incoming.logs().to_vec(),
        );
        pkgs.insert(id, (merged, next_version));
        *self.saves.write().unwrap() += 1;
        Ok(())
    }

    async fn find_all(
        &self,
        filter: &PkgFilter,
    ) -> Result<(Vec<SoftwarePkg>, u64), DomainError> {
        let pkgs = self.pkgs.read().unwrap();
        let mut matched: Vec<SoftwarePkg> = pkgs
            .values()
            .filter(|(p, _)| filter.matches(p))
            .map(|(p, _)| p.clone())
            .collect();
        matched.sort_by(|a, b| b.basic().applied_at.cmp(&a.basic().applied_at));

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.count_per_page as usize)
            .collect();
        Ok((page, total))
    }

    async fn add_comment(
        &self,
        id: &SoftwarePkgId,
        comment: &SoftwarePkgComment,
    ) -> Result<(), DomainError> {
        let mut pkgs = self.pkgs.write().unwrap();
        let (stored, version) = pkgs
            .get(id)
            .ok_or_else(|| DomainError::NotFound(format!("package {}", id)))?;
        let mut comments = stored.comments().to_vec();
        comments.push(comment.clone());
        let updated = SoftwarePkg::restore(
            stored.basic().clone(),
            stored.ci().clone(),
            stored.reviews().to_vec(),
            comments,
            stored.logs().to_vec(),
        );
        let version = *version;
        pkgs.insert(*id, (updated, version));
        Ok(())
    }
}

// ============================================================================
// In-Memory Watch Repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryPkgWatchRepository {
    watches: Arc<RwLock<HashMap<SoftwarePkgId, PkgWatch>>>,
    pub should_fail: Arc<RwLock<bool>>,
    pending_save_failures: Arc<RwLock<usize>>,
}

impl InMemoryPkgWatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let repo = Self::default();
        *repo.should_fail.write().unwrap() = true;
        repo
    }

    pub fn with_watch(self, watch: PkgWatch) -> Self {
        self.watches.write().unwrap().insert(watch.pkg_id, watch);
        self
    }

    /// Make the next `n` saves fail
    pub fn failing_saves(self, n: usize) -> Self {
        *self.pending_save_failures.write().unwrap() = n;
        self
    }

    pub fn get(&self, pkg_id: &SoftwarePkgId) -> Option<PkgWatch> {
        self.watches.read().unwrap().get(pkg_id).cloned()
    }
}

#[async_trait]
impl PkgWatchRepository for InMemoryPkgWatchRepository {
    async fn add(&self, watch: &PkgWatch) -> Result<(), DomainError> {
        if *self.should_fail.read().unwrap() {
            return Err(DomainError::Database("Mock failure".to_string()));
        }
        let mut watches = self.watches.write().unwrap();
        if watches.contains_key(&watch.pkg_id) {
            return Err(DomainError::AlreadyExists(format!(
                "watch for {}",
                watch.pkg_id
            )));
        }
        watches.insert(watch.pkg_id, watch.clone());
        Ok(())
    }

    async fn save(&self, watch: &PkgWatch) -> Result<(), DomainError> {
        if *self.should_fail.read().unwrap() {
            return Err(DomainError::Database("Mock failure".to_string()));
        }
        {
            let mut pending = self.pending_save_failures.write().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Err(DomainError::Database("Mock failure".to_string()));
            }
        }
        self.watches
            .write()
            .unwrap()
            .insert(watch.pkg_id, watch.clone());
        Ok(())
    }

    async fn find_all(&self, statuses: &[WatchStatus]) -> Result<Vec<PkgWatch>, DomainError> {
        let watches = self.watches.read().unwrap();
        Ok(watches
            .values()
            .filter(|w| statuses.contains(&w.status))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Mock CI
// ============================================================================

/// A mock CI trigger that hands out sequential run ids
#[derive(Default)]
pub struct MockPkgCi {
    next_id: Arc<RwLock<i64>>,
    started: Arc<RwLock<Vec<SoftwarePkgId>>>,
    cleared: Arc<RwLock<Vec<i64>>>,
    pub should_fail: Arc<RwLock<bool>>,
}

impl MockPkgCi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let ci = Self::default();
        *ci.should_fail.write().unwrap() = true;
        ci
    }

    pub fn started(&self) -> Vec<SoftwarePkgId> {
        self.started.read().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<i64> {
        self.cleared.read().unwrap().clone()
    }
}

#[async_trait]
impl PkgCi for MockPkgCi {
    async fn start_new_ci(&self, pkg: &SoftwarePkg) -> Result<i64, DomainError> {
        if *self.should_fail.read().unwrap() {
            return Err(mock_failure("start_ci"));
        }
        let mut next = self.next_id.write().unwrap();
        *next += 1;
        self.started.write().unwrap().push(pkg.id());
        Ok(*next)
    }

    async fn clear_ci(&self, run_id: i64) -> Result<(), DomainError> {
        if *self.should_fail.read().unwrap() {
            return Err(mock_failure("clear_ci"));
        }
        self.cleared.write().unwrap().push(run_id);
        Ok(())
    }
}

// ============================================================================
// Mock Package Manager
// ============================================================================

#[derive(Default)]
pub struct MockPkgManager {
    existing: Arc<RwLock<HashSet<String>>>,
    pending_failures: Arc<RwLock<usize>>,
}

impl MockPkgManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(self, name: &str) -> Self {
        self.existing.write().unwrap().insert(name.to_string());
        self
    }

    /// Make the next `n` lookups fail
    pub fn failing_times(self, n: usize) -> Self {
        *self.pending_failures.write().unwrap() = n;
        self
    }
}

#[async_trait]
impl PkgManager for MockPkgManager {
    async fn is_pkg_existed(&self, name: &PackageName) -> Result<bool, DomainError> {
        {
            let mut pending = self.pending_failures.write().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Err(mock_failure("is_pkg_existed"));
            }
        }
        Ok(self.existing.read().unwrap().contains(name.as_str()))
    }
}

// ============================================================================
// Mock Pull Request Client
// ============================================================================

/// A mock PR collaborator that records every call
#[derive(Default)]
pub struct MockPullRequestClient {
    states: Arc<RwLock<HashMap<i64, PullRequestState>>>,
    next_number: Arc<RwLock<i64>>,
    pub created: Arc<RwLock<Vec<SoftwarePkgId>>>,
    pub updated: Arc<RwLock<Vec<i64>>>,
    pub merged: Arc<RwLock<Vec<i64>>>,
    pub closed: Arc<RwLock<Vec<i64>>>,
    pub fail_create: Arc<RwLock<bool>>,
    pub fail_merge: Arc<RwLock<bool>>,
}

impl MockPullRequestClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the state the forge reports for a PR
    pub fn with_state(self, number: i64, state: PullRequestState) -> Self {
        self.set_state(number, state);
        self
    }

    pub fn set_state(&self, number: i64, state: PullRequestState) {
        self.states.write().unwrap().insert(number, state);
    }

    pub fn failing_create(self) -> Self {
        *self.fail_create.write().unwrap() = true;
        self
    }

    pub fn failing_merge(self) -> Self {
        *self.fail_merge.write().unwrap() = true;
        self
    }

    pub fn merge_calls(&self) -> Vec<i64> {
        self.merged.read().unwrap().clone()
    }

    pub fn close_calls(&self) -> Vec<i64> {
        self.closed.read().unwrap().clone()
    }
}

#[async_trait]
impl PullRequestClient for MockPullRequestClient {
    async fn create(&self, pkg: &SoftwarePkg) -> Result<PullRequestRef, DomainError> {
        if *self.fail_create.read().unwrap() {
            return Err(mock_failure("create_pr"));
        }
        let mut next = self.next_number.write().unwrap();
        *next += 1;
        self.created.write().unwrap().push(pkg.id());
        Ok(PullRequestRef {
            number: *next,
            link: format!("https://gitea.local/community/pulls/{}", *next),
        })
    }

    async fn update(&self, pr: &PullRequestRef) -> Result<(), DomainError> {
        self.updated.write().unwrap().push(pr.number);
        Ok(())
    }

    async fn merge(&self, number: i64) -> Result<(), DomainError> {
        self.merged.write().unwrap().push(number);
        if *self.fail_merge.read().unwrap() {
            return Err(mock_failure("merge_pr"));
        }
        Ok(())
    }

    async fn close(&self, number: i64) -> Result<(), DomainError> {
        self.closed.write().unwrap().push(number);
        Ok(())
    }

    async fn get(&self, number: i64) -> Result<PullRequestState, DomainError> {
        self.states
            .read()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("pull request {}", number)))
    }
}

// ============================================================================
// Mock Maintainer Directory
// ============================================================================

#[derive(Default)]
pub struct MockMaintainerDirectory {
    roles: Arc<RwLock<HashMap<String, Vec<Role>>>>,
}

impl MockMaintainerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles(self, account: &str, roles: &[Role]) -> Self {
        self.roles
            .write()
            .unwrap()
            .insert(account.to_string(), roles.to_vec());
        self
    }
}

#[async_trait]
impl MaintainerDirectory for MockMaintainerDirectory {
    async fn roles_of(&self, account: &Account, _sig: &str) -> Result<Vec<Role>, DomainError> {
        Ok(self
            .roles
            .read()
            .unwrap()
            .get(account.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Mock Email Sender
// ============================================================================

#[derive(Default)]
pub struct MockEmailSender {
    pub sent: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, subject: &str, body: &str) -> Result<(), DomainError> {
        self.sent
            .write()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

// ============================================================================
// Mock Event Publisher
// ============================================================================

/// A mock publisher that records events
#[derive(Default)]
pub struct MockEventPublisher {
    pub events: Arc<RwLock<Vec<PkgEvent>>>,
    pub should_fail: Arc<RwLock<bool>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let publisher = Self::default();
        *publisher.should_fail.write().unwrap() = true;
        publisher
    }

    pub fn get_events(&self) -> Vec<PkgEvent> {
        self.events.read().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.read().unwrap().iter().map(|e| e.kind()).collect()
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn notify(&self, event: &PkgEvent) -> Result<(), DomainError> {
        if *self.should_fail.read().unwrap() {
            return Err(mock_failure("notify"));
        }
        self.events.write().unwrap().push(event.clone());
        Ok(())
    }
}

// ============================================================================
// Mock Translator and Moderator
// ============================================================================

#[derive(Default)]
pub struct MockTranslator;

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str, target: Language) -> Result<String, DomainError> {
        Ok(format!("[{}] {}", target, text))
    }
}

/// Flags any text containing one of its banned words
#[derive(Default)]
pub struct MockContentModerator {
    banned: Vec<String>,
}

impl MockContentModerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn banning(words: &[&str]) -> Self {
        Self {
            banned: words.iter().map(|w| w.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ContentModerator for MockContentModerator {
    async fn check(&self, text: &str) -> Result<(), DomainError> {
        if self.banned.iter().any(|w| text.contains(w.as_str())) {
            return Err(DomainError::Validation(
                "comment contains sensitive content".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Mock Gitea Client
// ============================================================================

/// Key for identifying a repo (owner, repo)
type RepoKey = (String, String);

/// A mock Gitea client that tracks calls and returns configurable responses
#[derive(Default)]
pub struct MockGiteaClient {
    pub should_fail: Arc<RwLock<bool>>,
    repos: Arc<RwLock<HashSet<RepoKey>>>,
    org_members: Arc<RwLock<HashSet<(String, String)>>>,
    teams: Arc<RwLock<HashMap<(String, String), Vec<String>>>>,
    prs: Arc<RwLock<HashMap<i64, GiteaPullRequest>>>,
    timelines: Arc<RwLock<HashMap<i64, Vec<GiteaTimelineEvent>>>>,
    pub branches_created: Arc<RwLock<Vec<String>>>,
    pub branches_deleted: Arc<RwLock<Vec<String>>>,
    pub files_written: Arc<RwLock<Vec<(String, String)>>>,
    pub closed_prs: Arc<RwLock<Vec<i64>>>,
}

impl MockGiteaClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let client = Self::default();
        *client.should_fail.write().unwrap() = true;
        client
    }

    pub fn with_repo(self, owner: &str, repo: &str) -> Self {
        self.repos
            .write()
            .unwrap()
            .insert((owner.to_string(), repo.to_string()));
        self
    }

    pub fn with_org_member(self, org: &str, username: &str) -> Self {
        self.org_members
            .write()
            .unwrap()
            .insert((org.to_string(), username.to_string()));
        self
    }

    pub fn with_team(self, org: &str, team: &str, members: &[&str]) -> Self {
        self.teams.write().unwrap().insert(
            (org.to_string(), team.to_string()),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    /// Configure a PR to exist
    pub fn with_pr(self, number: i64, state: &str, merged: bool, labels: &[&str]) -> Self {
        self.prs
            .write()
            .unwrap()
            .insert(number, mock_pr(number, state, merged, labels, &format!("pr-{}", number)));
        self
    }

    pub fn with_timeline(self, number: i64, events: &[(&str, &str)]) -> Self {
        self.timelines.write().unwrap().insert(
            number,
            events
                .iter()
                .map(|(kind, user)| GiteaTimelineEvent {
                    event_type: kind.to_string(),
                    user: Some(GiteaUser {
                        id: 1,
                        login: user.to_string(),
                    }),
                })
                .collect(),
        );
        self
    }

    pub fn pr(&self, number: i64) -> Option<GiteaPullRequest> {
        self.prs.read().unwrap().get(&number).cloned()
    }

    fn check_fail(&self) -> Result<(), GiteaError> {
        if *self.should_fail.read().unwrap() {
            return Err(GiteaError::Api {
                status: 500,
                message: "Mock failure".to_string(),
            });
        }
        Ok(())
    }
}

fn mock_pr(number: i64, state: &str, merged: bool, labels: &[&str], head: &str) -> GiteaPullRequest {
    GiteaPullRequest {
        id: number,
        number,
        title: format!("PR #{}", number),
        body: None,
        state: state.to_string(),
        html_url: format!("https://gitea.local/pulls/{}", number),
        head: GiteaPRBranch {
            ref_name: head.to_string(),
            sha: "abc123".to_string(),
        },
        base: GiteaPRBranch {
            ref_name: "main".to_string(),
            sha: "def456".to_string(),
        },
        merged,
        mergeable: true,
        labels: labels
            .iter()
            .enumerate()
            .map(|(i, l)| GiteaLabel {
                id: i as i64,
                name: l.to_string(),
            })
            .collect(),
        user: None,
    }
}

#[async_trait]
impl GiteaClient for MockGiteaClient {
    async fn is_org_member(&self, org: &str, username: &str) -> Result<bool, GiteaError> {
        self.check_fail()?;
        Ok(self
            .org_members
            .read()
            .unwrap()
            .contains(&(org.to_string(), username.to_string())))
    }

    async fn list_team_members(&self, org: &str, team: &str) -> Result<Vec<String>, GiteaError> {
        self.check_fail()?;
        Ok(self
            .teams
            .read()
            .unwrap()
            .get(&(org.to_string(), team.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<GiteaRepo, GiteaError> {
        self.check_fail()?;
        if !self
            .repos
            .read()
            .unwrap()
            .contains(&(owner.to_string(), name.to_string()))
        {
            return Err(GiteaError::RepoNotFound {
                owner: owner.to_string(),
                repo: name.to_string(),
            });
        }
        Ok(GiteaRepo {
            id: 1,
            name: name.to_string(),
            full_name: format!("{}/{}", owner, name),
            html_url: format!("https://gitea.local/{}/{}", owner, name),
            default_branch: "main".to_string(),
        })
    }

    async fn put_file(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
        path: &str,
        _content: &str,
        _message: &str,
    ) -> Result<(), GiteaError> {
        self.check_fail()?;
        self.files_written
            .write()
            .unwrap()
            .push((branch.to_string(), path.to_string()));
        Ok(())
    }

    async fn create_branch(
        &self,
        _owner: &str,
        _repo: &str,
        new_branch: &str,
        _from_branch: &str,
    ) -> Result<(), GiteaError> {
        self.check_fail()?;
        self.branches_created
            .write()
            .unwrap()
            .push(new_branch.to_string());
        Ok(())
    }

    async fn delete_branch(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
    ) -> Result<(), GiteaError> {
        self.check_fail()?;
        self.branches_deleted
            .write()
            .unwrap()
            .push(branch.to_string());
        Ok(())
    }

    async fn create_pull_request(
        &self,
        _owner: &str,
        _repo: &str,
        _title: &str,
        _body: Option<&str>,
        head: &str,
        _base: &str,
    ) -> Result<GiteaPullRequest, GiteaError> {
        self.check_fail()?;
        let mut prs = self.prs.write().unwrap();
        let number = prs.keys().max().copied().unwrap_or(0) + 1;
        let pr = mock_pr(number, "open", false, &[], head);
        prs.insert(number, pr.clone());
        Ok(pr)
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<GiteaPullRequest, GiteaError> {
        self.check_fail()?;
        self.prs
            .read()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or_else(|| GiteaError::PullRequestNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
            })
    }

    async fn list_pull_requests(
        &self,
        _owner: &str,
        _repo: &str,
        state: Option<&str>,
    ) -> Result<Vec<GiteaPullRequest>, GiteaError> {
        self.check_fail()?;
        let prs = self.prs.read().unwrap();
        Ok(prs
            .values()
            .filter(|pr| state.map_or(true, |s| s == "all" || pr.state == s))
            .cloned()
            .collect())
    }

    async fn update_pull_request(
        &self,
        _owner: &str,
        _repo: &str,
        _number: i64,
    ) -> Result<(), GiteaError> {
        self.check_fail()
    }

    async fn merge_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        _merge_style: &str,
    ) -> Result<(), GiteaError> {
        self.check_fail()?;
        let mut prs = self.prs.write().unwrap();
        let pr = prs
            .get_mut(&number)
            .ok_or_else(|| GiteaError::PullRequestNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
            })?;
        pr.merged = true;
        pr.state = "closed".to_string();
        Ok(())
    }

    async fn close_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<(), GiteaError> {
        self.check_fail()?;
        let mut prs = self.prs.write().unwrap();
        let pr = prs
            .get_mut(&number)
            .ok_or_else(|| GiteaError::PullRequestNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number,
            })?;
        pr.state = "closed".to_string();
        self.closed_prs.write().unwrap().push(number);
        Ok(())
    }

    async fn get_timeline(
        &self,
        _owner: &str,
        _repo: &str,
        number: i64,
    ) -> Result<Vec<GiteaTimelineEvent>, GiteaError> {
        self.check_fail()?;
        Ok(self
            .timelines
            .read()
            .unwrap()
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }
}
