//! Package Import API Server
//!
//! Tracks community requests to import software packages through review,
//! CI and repository creation. Uses hexagonal (ports & adapters)
//! architecture for clean separation of concerns.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::Database;
use serde::Serialize;
use tokio::sync::watch;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod app;
mod auth;
mod config;
mod domain;
mod entity;
mod error;
mod handlers;

#[cfg(test)]
mod test_utils;

use adapters::{
    GiteaClientImpl, GiteaMaintainerDirectory, GiteaPkgCi, GiteaPkgManager,
    GiteaPullRequestClient, HttpTranslator, PassThroughModerator, PostgresPkgWatchRepository,
    PostgresSoftwarePkgRepository, Publisher, SmtpEmailSender,
};
use app::{CiService, CommentService, PkgService, ReviewService, WatchService};
use config::Config;

type Pkgs = PostgresSoftwarePkgRepository;
type Watches = PostgresPkgWatchRepository;
type Ci = GiteaPkgCi<GiteaClientImpl>;
type Manager = GiteaPkgManager<GiteaClientImpl>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pkg_service: Arc<PkgService<Pkgs, Manager, Ci, Publisher>>,
    pub ci_service: Arc<CiService<Pkgs, Ci>>,
    pub review_service:
        Arc<ReviewService<Pkgs, Watches, GiteaMaintainerDirectory<GiteaClientImpl>, Publisher>>,
    pub comment_service: Arc<CommentService<Pkgs, PassThroughModerator, HttpTranslator>>,
    pub config: Config,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Resolves on Ctrl-C and tells the watch loop to stop
async fn shutdown_signal(stop: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down...");
    let _ = stop.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pkgimport_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting package import API...");

    // Load configuration
    let config = Config::from_env()?;
    let policy = config.policy.clone();

    // Connect to PostgreSQL
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Create adapters
    let pkg_repo = Arc::new(PostgresSoftwarePkgRepository::new(db.clone()));
    let watch_repo = Arc::new(PostgresPkgWatchRepository::new(db));

    let gitea_client = Arc::new(GiteaClientImpl::new(
        config.gitea_url.clone(),
        config.gitea_admin_token.clone(),
    ));
    let pkg_ci = Arc::new(GiteaPkgCi::new(gitea_client.clone(), config.ci.clone()));
    let manager = Arc::new(GiteaPkgManager::new(
        gitea_client.clone(),
        config.pkg_org.clone(),
    ));
    let directory = Arc::new(GiteaMaintainerDirectory::new(
        gitea_client.clone(),
        config.tc_org.clone(),
    ));
    let prs = Arc::new(GiteaPullRequestClient::new(
        gitea_client.clone(),
        config.community.clone(),
    ));

    let events = Arc::new(Publisher::from_url(config.event_webhook_url.clone()));
    let mailer = Arc::new(
        SmtpEmailSender::new(config.email.as_ref()).context("Invalid email configuration")?,
    );
    let translator = Arc::new(HttpTranslator::new(config.translate_url.clone()));
    let moderator = Arc::new(PassThroughModerator);

    // Create application services
    let ci_service = Arc::new(CiService::new(pkg_repo.clone(), pkg_ci, policy.clone()));

    let pkg_service = Arc::new(PkgService::new(
        pkg_repo.clone(),
        manager.clone(),
        ci_service.clone(),
        events.clone(),
    ));

    let review_service = Arc::new(ReviewService::new(
        pkg_repo.clone(),
        watch_repo.clone(),
        directory,
        events.clone(),
        policy.clone(),
    ));

    let comment_service = Arc::new(CommentService::new(
        pkg_repo.clone(),
        moderator,
        translator,
        policy.clone(),
    ));

    let watch_service = Arc::new(WatchService::new(
        pkg_repo,
        watch_repo,
        prs,
        manager,
        mailer,
        events,
        policy,
    ));

    // Watch loop runs until shutdown
    let (stop_tx, stop_rx) = watch::channel(false);
    let watch_task = tokio::spawn(watch_service.run(ci_service.clone(), stop_rx));

    let state = AppState {
        pkg_service,
        ci_service,
        review_service,
        comment_service,
        config: config.clone(),
    };

    // Rate limiting config for new requests: 2 req/sec sustained, burst of 5
    // Uses PeerIpKeyExtractor to get client IP from socket connection
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(2)
            .burst_size(5)
            .finish()
            .context("Failed to build governor config")?,
    );

    // Rate-limited routes (applying)
    let rate_limited_routes = Router::new()
        .route("/v1/softwarepkg", post(handlers::apply_pkg))
        .layer(GovernorLayer {
            config: governor_config,
        });

    // Routes acting on behalf of an account
    let account_routes = Router::new()
        .route("/v1/softwarepkg/:id", put(handlers::update_pkg))
        .route("/v1/softwarepkg/:id/review", put(handlers::review_pkg))
        .route(
            "/v1/softwarepkg/:id/review/approve",
            put(handlers::approve_pkg),
        )
        .route(
            "/v1/softwarepkg/:id/review/reject",
            put(handlers::reject_pkg),
        )
        .route(
            "/v1/softwarepkg/:id/review/abandon",
            put(handlers::abandon_pkg),
        )
        .route("/v1/softwarepkg/:id/ci/rerun", post(handlers::rerun_ci))
        .route(
            "/v1/softwarepkg/:id/review/comment",
            post(handlers::add_comment),
        )
        .merge(rate_limited_routes)
        .layer(middleware::from_fn(auth::account_middleware));

    // Build router
    let app = Router::new()
        // Health check (no auth)
        .route("/health", get(health))
        // Webhooks (no auth, uses signature verification)
        .route("/webhooks/ci", post(handlers::ci_webhook))
        // Public reads
        .route("/v1/softwarepkg", get(handlers::list_pkgs))
        .route("/v1/softwarepkg/:id", get(handlers::get_pkg))
        .route(
            "/v1/softwarepkg/:id/checkitems",
            get(handlers::list_check_items),
        )
        .route(
            "/v1/softwarepkg/:id/review/comment/:cid/translate",
            post(handlers::translate_comment),
        )
        .merge(account_routes)
        // Middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(stop_tx))
    .await
    .context("Server error")?;

    if let Err(e) = watch_task.await {
        tracing::error!(error = %e, "Watch loop panicked");
    }
    tracing::info!("Stopped");
    Ok(())
}
