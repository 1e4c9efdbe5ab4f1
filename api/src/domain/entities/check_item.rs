//! Check items and reviewer consensus
//!
//! A check item is one reviewable criterion of an import request. Each
//! item names the roles whose judgment is authoritative for it; anyone
//! else may comment on it, but only owners decide its outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::primitives::Account;

/// Role a reviewer holds relative to a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Technical committee member
    Tc,
    /// Maintainer of the sig the package is imported into
    SigMaintainer,
    /// Committer listed in the application
    Committer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Tc => write!(f, "tc"),
            Role::SigMaintainer => write!(f, "sig_maintainer"),
            Role::Committer => write!(f, "committer"),
        }
    }
}

/// A reviewable criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckItem {
    pub id: String,
    pub name: String,
    pub desc: String,
    pub owners: Vec<Role>,
}

impl CheckItem {
    fn new(id: &str, name: &str, desc: &str, owners: &[Role]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
            owners: owners.to_vec(),
        }
    }

    /// Whether any of the given roles is an owner of this item
    pub fn is_owned_by(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.owners.contains(r))
    }
}

pub const SIG_ACCEPTANCE_ITEM: &str = "sig_acceptance";
const COMMITTER_ITEM_PREFIX: &str = "committer:";

/// Items every package is reviewed against
pub fn common_check_items() -> Vec<CheckItem> {
    let owners = [Role::Tc, Role::SigMaintainer];
    vec![
        CheckItem::new(
            "package_name",
            "Package name",
            "The name follows naming rules and does not clash with an existing package",
            &owners,
        ),
        CheckItem::new(
            "license",
            "License",
            "The license is compatible with the distribution",
            &owners,
        ),
        CheckItem::new(
            "source_code",
            "Source code",
            "The upstream source is reachable and buildable",
            &owners,
        ),
        CheckItem::new(
            "description",
            "Description",
            "The description states what the package is and why it is needed",
            &owners,
        ),
        CheckItem::new(
            "upstream",
            "Upstream activity",
            "The upstream project is alive and maintained",
            &owners,
        ),
    ]
}

/// Item asking the target sig to accept maintenance of the package
pub fn sig_acceptance_item(sig: &str) -> CheckItem {
    CheckItem::new(
        SIG_ACCEPTANCE_ITEM,
        "Sig acceptance",
        &format!("Sig '{}' agrees to maintain the package", sig),
        &[Role::SigMaintainer],
    )
}

/// Item asking a listed committer to confirm they will maintain the package
pub fn committer_acceptance_item(committer: &Account) -> CheckItem {
    CheckItem::new(
        &format!("{}{}", COMMITTER_ITEM_PREFIX, committer),
        "Committer acceptance",
        &format!("{} agrees to be a committer of the package", committer),
        &[Role::Committer],
    )
}

/// A reviewer together with the roles they hold for the package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub account: Account,
    pub roles: Vec<Role>,
}

impl Reviewer {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// TC members and sig maintainers are the ones who approve or reject
    pub fn can_decide(&self) -> bool {
        self.has_role(Role::Tc) || self.has_role(Role::SigMaintainer)
    }
}

/// One reviewer's judgment on one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemJudgment {
    pub item_id: String,
    pub pass: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// All judgments one reviewer submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReview {
    pub reviewer: Reviewer,
    pub judgments: Vec<ItemJudgment>,
    pub reviewed_at: DateTime<Utc>,
}

impl UserReview {
    pub fn judgment_of(&self, item_id: &str) -> Option<&ItemJudgment> {
        self.judgments.iter().find(|j| j.item_id == item_id)
    }
}

/// Consensus over all judgments of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Consensus {
    Pass,
    NotPass,
    NoIdea,
}

/// A judgment as shown on the consensus view
#[derive(Debug, Clone, Serialize)]
pub struct RecordedJudgment {
    pub account: Account,
    pub is_owner: bool,
    pub pass: bool,
    pub comment: Option<String>,
}

/// Aggregated reviews of one item
#[derive(Debug, Clone, Serialize)]
pub struct CheckItemReview {
    pub item: CheckItem,
    pub judgments: Vec<RecordedJudgment>,
    pub consensus: Consensus,
}

impl CheckItemReview {
    /// Aggregate every reviewer's judgment on `item`.
    ///
    /// Any owner failing the item vetoes it; otherwise one owner pass is
    /// enough. Judgments from non-owners are recorded but never decide.
    pub fn aggregate(item: &CheckItem, reviews: &[UserReview]) -> Self {
        let judgments: Vec<RecordedJudgment> = reviews
            .iter()
            .filter_map(|r| {
                r.judgment_of(&item.id).map(|j| RecordedJudgment {
                    account: r.reviewer.account.clone(),
                    is_owner: item.is_owned_by(&r.reviewer.roles),
                    pass: j.pass,
                    comment: j.comment.clone(),
                })
            })
            .collect();

        let consensus = if judgments.is_empty() {
            Consensus::NoIdea
        } else if judgments.iter().any(|j| j.is_owner && !j.pass) {
            Consensus::NotPass
        } else if judgments.iter().any(|j| j.is_owner && j.pass) {
            Consensus::Pass
        } else {
            Consensus::NoIdea
        };

        Self {
            item: item.clone(),
            judgments,
            consensus,
        }
    }
}

/// Whether every item reached a pass consensus
pub fn all_items_passed(reviews: &[CheckItemReview]) -> bool {
    reviews.iter().all(|r| r.consensus == Consensus::Pass)
}
