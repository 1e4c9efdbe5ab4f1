//! Domain entities
//!
//! Pure domain models representing core business concepts.
//! These are separate from the SeaORM entities in the `entity` module.

pub mod check_item;
pub mod pkg_watch;
pub mod primitives;
pub mod software_pkg;

pub use check_item::{
    all_items_passed, CheckItem, CheckItemReview, Consensus, ItemJudgment, Reviewer, Role,
    UserReview,
};
pub use pkg_watch::{PkgWatch, PrState, PullRequestRef, PullRequestState, WatchAction, WatchStatus};
pub use primitives::{
    Account, Description, Language, License, PackageCiStatus, PackageName,
    PackagePhase, PackagePlatform, ReviewComment, Url,
};
pub use software_pkg::{
    Application, CommentId, OperationLog, PkgOperation, ReviewChange, ReviewResult, SoftwarePkg,
    SoftwarePkgBasicInfo, SoftwarePkgCi, SoftwarePkgComment, SoftwarePkgId,
};
