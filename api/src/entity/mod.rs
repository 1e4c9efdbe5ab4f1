//! SeaORM entities for the package import schema

pub mod pkg_watches;
pub mod software_pkg_comments;
pub mod software_pkgs;
