//! PostgreSQL adapters
//!
//! Implementations of repository traits using SeaORM and PostgreSQL.

pub mod pkg_watch_repo;
pub mod software_pkg_repo;


pub use pkg_watch_repo::PostgresPkgWatchRepository;
pub use software_pkg_repo::PostgresSoftwarePkgRepository;
