//! Value primitives
//!
//! Immutable, self-validating scalars used by the package aggregate.
//! Construction is the only place validity is checked; once a value
//! exists it is valid, and no primitive exposes a mutator.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

const MAX_ACCOUNT_LEN: usize = 64;
const MAX_PACKAGE_NAME_LEN: usize = 128;
const MAX_URL_LEN: usize = 512;
const MAX_LICENSE_LEN: usize = 128;
const MAX_DESCRIPTION_LEN: usize = 2000;

fn account_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid account regex"))
}

fn package_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]*$").expect("valid package name regex")
    })
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"))
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::Validation(format!("{} is empty", field)));
    }
    if value.chars().count() > max {
        return Err(DomainError::Validation(format!(
            "{} is longer than {} characters",
            field, max
        )));
    }
    Ok(())
}

// ============================================================================
// Account
// ============================================================================

/// A user account name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        check_len("account", raw, MAX_ACCOUNT_LEN)?;
        if !account_regex().is_match(raw) {
            return Err(DomainError::Validation(format!(
                "invalid account '{}'",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Account {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Account> for String {
    fn from(a: Account) -> Self {
        a.0
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// PackageName
// ============================================================================

/// Name of the package being imported
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        check_len("package name", raw, MAX_PACKAGE_NAME_LEN)?;
        if !package_name_regex().is_match(raw) {
            return Err(DomainError::Validation(format!(
                "invalid package name '{}'",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackageName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PackageName> for String {
    fn from(n: PackageName) -> Self {
        n.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Url
// ============================================================================

/// An http(s) URL, e.g. the upstream source of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Url(String);

impl Url {
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        check_len("url", raw, MAX_URL_LEN)?;
        if !url_regex().is_match(raw) {
            return Err(DomainError::Validation(format!("invalid url '{}'", raw)));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Url {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Url> for String {
    fn from(u: Url) -> Self {
        u.0
    }
}

impl std::fmt::Display for Url {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// License / Description
// ============================================================================

/// License identifier declared by the importer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct License(String);

impl License {
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        check_len("license", trimmed, MAX_LICENSE_LEN)?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for License {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<License> for String {
    fn from(l: License) -> Self {
        l.0
    }
}

/// Free text such as the package description or the reason to import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Description(String);

impl Description {
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        check_len("description", trimmed, MAX_DESCRIPTION_LEN)?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Description {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Description> for String {
    fn from(d: Description) -> Self {
        d.0
    }
}

// ============================================================================
// ReviewComment
// ============================================================================

/// Content of a review comment
///
/// The maximum length comes from policy, so deserialized comments are
/// trusted (they were validated when first created).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewComment(String);

impl ReviewComment {
    pub fn new(raw: &str, max_len: usize) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        check_len("review comment", trimmed, max_len)?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReviewComment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Language a comment can be translated into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Chinese,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::English => write!(f, "english"),
            Language::Chinese => write!(f, "chinese"),
        }
    }
}

impl std::str::FromStr for Language {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "chinese" | "zh" => Ok(Language::Chinese),
            _ => Err(DomainError::Validation(format!("unknown language: {}", s))),
        }
    }
}

/// Code hosting platform where the package repository will live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagePlatform {
    Gitee,
    Github,
}

impl std::fmt::Display for PackagePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackagePlatform::Gitee => write!(f, "gitee"),
            PackagePlatform::Github => write!(f, "github"),
        }
    }
}

impl std::str::FromStr for PackagePlatform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gitee" => Ok(PackagePlatform::Gitee),
            "github" => Ok(PackagePlatform::Github),
            _ => Err(DomainError::Validation(format!("unknown platform: {}", s))),
        }
    }
}

/// Status of the package's CI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageCiStatus {
    Waiting,
    Running,
    Passed,
    Failed,
    Timeout,
}

impl std::fmt::Display for PackageCiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageCiStatus::Waiting => write!(f, "waiting"),
            PackageCiStatus::Running => write!(f, "running"),
            PackageCiStatus::Passed => write!(f, "passed"),
            PackageCiStatus::Failed => write!(f, "failed"),
            PackageCiStatus::Timeout => write!(f, "timeout"),
        }
    }
}

impl std::str::FromStr for PackageCiStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(PackageCiStatus::Waiting),
            "running" => Ok(PackageCiStatus::Running),
            "passed" => Ok(PackageCiStatus::Passed),
            "failed" => Ok(PackageCiStatus::Failed),
            "timeout" => Ok(PackageCiStatus::Timeout),
            _ => Err(DomainError::Validation(format!("unknown ci status: {}", s))),
        }
    }
}

/// Lifecycle phase of an import request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagePhase {
    Reviewing,
    CreatingRepo,
    Imported,
    Closed,
}

impl PackagePhase {
    pub fn is_reviewing(&self) -> bool {
        *self == PackagePhase::Reviewing
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            PackagePhase::Imported | PackagePhase::Closed => true,
            PackagePhase::Reviewing | PackagePhase::CreatingRepo => false,
        }
    }
}

impl std::fmt::Display for PackagePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackagePhase::Reviewing => write!(f, "reviewing"),
            PackagePhase::CreatingRepo => write!(f, "creating_repo"),
            PackagePhase::Imported => write!(f, "imported"),
            PackagePhase::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for PackagePhase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reviewing" => Ok(PackagePhase::Reviewing),
            "creating_repo" => Ok(PackagePhase::CreatingRepo),
            "imported" => Ok(PackagePhase::Imported),
            "closed" => Ok(PackagePhase::Closed),
            _ => Err(DomainError::Validation(format!("unknown phase: {}", s))),
        }
    }
}
