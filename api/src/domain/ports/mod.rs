//! Domain ports (traits)
//!
//! Port traits define interfaces that the domain layer requires.
//! Adapters provide concrete implementations of these traits.

pub mod collaborators;
pub mod events;
pub mod gitea;
pub mod repositories;

pub use collaborators::{
    ContentModerator, EmailSender, MaintainerDirectory, PkgCi, PkgManager, PullRequestClient,
    Translator,
};
pub use events::{EventPublisher, PkgEvent};
pub use gitea::{
    GiteaClient, GiteaLabel, GiteaPRBranch, GiteaPullRequest, GiteaRepo, GiteaTimelineEvent,
    GiteaUser,
};
pub use repositories::{PkgFilter, PkgWatchRepository, SoftwarePkgRepository, Versioned};
