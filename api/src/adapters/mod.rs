//! Adapters layer
//!
//! Concrete implementations of the domain ports: PostgreSQL persistence,
//! the Gitea-backed collaborators, email, event delivery and translation.

pub mod email;
pub mod events;
pub mod gitea;
pub mod postgres;
pub mod translation;

pub use email::SmtpEmailSender;
pub use events::Publisher;
pub use gitea::{
    GiteaClientImpl, GiteaMaintainerDirectory, GiteaPkgCi, GiteaPkgManager,
    GiteaPullRequestClient,
};
pub use postgres::{PostgresPkgWatchRepository, PostgresSoftwarePkgRepository};
pub use translation::{HttpTranslator, PassThroughModerator};
