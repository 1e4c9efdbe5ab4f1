//! Package request handlers
//!
//! Apply, list, inspect, update and withdraw import requests.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::ApplyRequest;
use crate::domain::entities::{
    Account, Application, Description, License, OperationLog, PackageName, SoftwarePkg,
    SoftwarePkgComment, SoftwarePkgId, Url,
};
use crate::domain::policy::PkgPolicy;
use crate::domain::ports::PkgFilter;
use crate::error::AppError;
use crate::AppState;

/// Application fields as submitted by the importer
#[derive(Debug, Deserialize)]
pub struct ApplicationRequest {
    pub source_code_url: String,
    pub license: String,
    pub description: String,
    pub platform: String,
    pub sig: String,
    pub reason: String,
    #[serde(default)]
    pub committers: Vec<String>,
}

impl ApplicationRequest {
    fn into_application(self) -> Result<Application, AppError> {
        Ok(Application {
            source_code_url: Url::new(&self.source_code_url)?,
            license: License::new(&self.license)?,
            description: Description::new(&self.description)?,
            platform: self.platform.parse()?,
            sig: self.sig,
            reason: Description::new(&self.reason)?,
            committers: self
                .committers
                .iter()
                .map(|c| Account::new(c))
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyPkgRequest {
    pub name: String,
    #[serde(flatten)]
    pub application: ApplicationRequest,
}

#[derive(Debug, Serialize)]
pub struct ApplyPkgResponse {
    pub id: String,
}

/// Query parameters for listing packages
#[derive(Debug, Deserialize)]
pub struct ListPkgsQuery {
    pub phase: Option<String>,
    pub importer: Option<String>,
    pub platform: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_count")]
    pub count_per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_count() -> u64 {
    PkgFilter::DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct CiResponse {
    pub id: i64,
    pub status: String,
    pub start_time: String,
}

#[derive(Debug, Serialize)]
pub struct PkgSummaryResponse {
    pub id: String,
    pub name: String,
    pub importer: String,
    pub phase: String,
    pub platform: String,
    pub sig: String,
    pub ci_status: String,
    pub applied_at: String,
}

#[derive(Debug, Serialize)]
pub struct PkgResponse {
    pub id: String,
    pub name: String,
    pub importer: String,
    pub phase: String,
    pub review_result: Option<String>,
    pub applied_at: String,
    pub application: Application,
    pub approved_by: Vec<Account>,
    pub rejected_by: Vec<Account>,
    pub repo_pr_link: Option<String>,
    pub ci: CiResponse,
    pub comments: Vec<SoftwarePkgComment>,
    pub logs: Vec<OperationLog>,
}

#[derive(Debug, Serialize)]
pub struct PkgListResponse {
    pub total: u64,
    pub pkgs: Vec<PkgSummaryResponse>,
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn summary(pkg: &SoftwarePkg, policy: &PkgPolicy, now: DateTime<Utc>) -> PkgSummaryResponse {
    let basic = pkg.basic();
    PkgSummaryResponse {
        id: basic.id.to_string(),
        name: basic.name.to_string(),
        importer: basic.importer.to_string(),
        phase: basic.phase.to_string(),
        platform: basic.application.platform.to_string(),
        sig: basic.application.sig.clone(),
        ci_status: pkg.ci_status(now, policy).to_string(),
        applied_at: rfc3339(basic.applied_at),
    }
}

pub(crate) fn pkg_response(pkg: SoftwarePkg, policy: &PkgPolicy) -> PkgResponse {
    let now = Utc::now();
    let ci = CiResponse {
        id: pkg.ci().id,
        status: pkg.ci_status(now, policy).to_string(),
        start_time: rfc3339(pkg.ci().start_time),
    };
    let basic = pkg.basic().clone();

    PkgResponse {
        id: basic.id.to_string(),
        name: basic.name.to_string(),
        importer: basic.importer.to_string(),
        phase: basic.phase.to_string(),
        review_result: basic.review_result.map(|r| r.to_string()),
        applied_at: rfc3339(basic.applied_at),
        application: basic.application,
        approved_by: basic.approved_by,
        rejected_by: basic.rejected_by,
        repo_pr_link: basic.repo_pr_link,
        ci,
        comments: pkg.comments().to_vec(),
        logs: pkg.logs().to_vec(),
    }
}

/// POST /v1/softwarepkg
///
/// Submit a new import request.
pub async fn apply_pkg(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Json(req): Json<ApplyPkgRequest>,
) -> Result<(StatusCode, Json<ApplyPkgResponse>), AppError> {
    let request = ApplyRequest {
        name: PackageName::new(&req.name)?,
        application: req.application.into_application()?,
    };

    let id = state.pkg_service.apply(&account, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApplyPkgResponse { id: id.to_string() }),
    ))
}

/// GET /v1/softwarepkg
pub async fn list_pkgs(
    State(state): State<AppState>,
    Query(query): Query<ListPkgsQuery>,
) -> Result<Json<PkgListResponse>, AppError> {
    let filter = PkgFilter {
        phase: query.phase.as_deref().map(str::parse).transpose()?,
        importer: query.importer.as_deref().map(Account::new).transpose()?,
        platform: query.platform.as_deref().map(str::parse).transpose()?,
        page: query.page,
        count_per_page: query.count_per_page,
    };

    let (pkgs, total) = state.pkg_service.list(filter).await?;
    let now = Utc::now();
    let policy = &state.config.policy;

    Ok(Json(PkgListResponse {
        total,
        pkgs: pkgs.iter().map(|p| summary(p, policy, now)).collect(),
    }))
}

/// GET /v1/softwarepkg/:id
pub async fn get_pkg(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PkgResponse>, AppError> {
    let pkg = state.pkg_service.get(&SoftwarePkgId(id)).await?;
    Ok(Json(pkg_response(pkg, &state.config.policy)))
}

/// PUT /v1/softwarepkg/:id
///
/// Resubmit the application. Reviews and CI start over.
pub async fn update_pkg(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplicationRequest>,
) -> Result<StatusCode, AppError> {
    let application = req.into_application()?;
    state
        .pkg_service
        .update_application(&SoftwarePkgId(id), &account, application)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/softwarepkg/:id/review/abandon
pub async fn abandon_pkg(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .pkg_service
        .abandon(&SoftwarePkgId(id), &account)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/softwarepkg/:id/ci/rerun
pub async fn rerun_ci(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .ci_service
        .retest(&SoftwarePkgId(id), &account)
        .await?;
    Ok(StatusCode::ACCEPTED)
}
