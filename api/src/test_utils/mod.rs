//! Test utilities
//!
//! Manual mock implementations and test fixtures for unit testing.
//!
//! Why manual mocks instead of mockall?
//! - mockall has lifetime issues with traits containing `&str` parameters
//! - Manual mocks are more explicit and easier to debug
//! - Conflict and failure injection is a plain flag, not an expectation DSL

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
