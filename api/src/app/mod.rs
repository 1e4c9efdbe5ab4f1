//! Application layer
//!
//! Contains use cases and service orchestration.
//! Services coordinate between domain entities, ports, and external systems.

pub mod ci_service;
pub mod comment_service;
pub mod common;
pub mod pkg_service;
pub mod review_service;
pub mod watch_service;

pub use ci_service::CiService;
pub use comment_service::CommentService;
pub use pkg_service::{ApplyRequest, PkgService};
pub use review_service::ReviewService;
pub use watch_service::WatchService;
