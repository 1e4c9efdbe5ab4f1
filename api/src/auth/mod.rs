//! Caller identity
//!
//! The gateway in front of the service authenticates users and forwards
//! the account name in `X-Account`.

pub mod account;

pub use account::{account_middleware, ACCOUNT_HEADER};
