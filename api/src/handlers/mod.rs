//! HTTP handlers
//!
//! Axum request handlers for the API endpoints.

pub mod pkgs;
pub mod reviews;
pub mod webhooks;

pub use pkgs::{abandon_pkg, apply_pkg, get_pkg, list_pkgs, rerun_ci, update_pkg};
pub use reviews::{
    add_comment, approve_pkg, list_check_items, reject_pkg, review_pkg, translate_comment,
};
pub use webhooks::ci_webhook;
