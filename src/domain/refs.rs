//! Ref actions, batch plans and per-repository outcomes.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BmrmError, Result};

const REPOSITORY_PATTERN: &str = r"^[A-Za-z0-9._-]+/[A-Za-z0-9._-]+$";

/// A Bitbucket repository in `{owner}/{slug}` form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Parse and validate a repository identifier
    ///
    /// # Examples
    /// ```ignore
    /// let repo = RepositoryId::parse("acme/api")?;
    /// assert_eq!(repo.owner(), "acme");
    /// ```
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let re = Regex::new(REPOSITORY_PATTERN)
            .map_err(|e| BmrmError::config(format!("Invalid repository pattern: {}", e)))?;
        if !re.is_match(trimmed) {
            return Err(BmrmError::config(format!(
                "Invalid repository '{}': expected the form owner/slug",
                value
            )));
        }
        Ok(RepositoryId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Workspace (owner) part
    pub fn owner(&self) -> &str {
        self.0.split_once('/').map(|(owner, _)| owner).unwrap_or("")
    }

    /// Repository slug part
    pub fn slug(&self) -> &str {
        self.0.split_once('/').map(|(_, slug)| slug).unwrap_or("")
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = BmrmError;

    fn try_from(value: String) -> Result<Self> {
        RepositoryId::parse(&value)
    }
}

impl From<RepositoryId> for String {
    fn from(value: RepositoryId) -> Self {
        value.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of git ref addressed by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

impl RefKind {
    /// Path segment under `/refs/`
    pub fn path_segment(&self) -> &'static str {
        match self {
            RefKind::Branch => "branches",
            RefKind::Tag => "tags",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            RefKind::Branch => "branch",
            RefKind::Tag => "tag",
        }
    }
}

/// The four batch actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    CreateBranch,
    DeleteBranch,
    CreateTag,
    DeleteTag,
}

impl ActionKind {
    pub fn ref_kind(&self) -> RefKind {
        match self {
            ActionKind::CreateBranch | ActionKind::DeleteBranch => RefKind::Branch,
            ActionKind::CreateTag | ActionKind::DeleteTag => RefKind::Tag,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, ActionKind::CreateBranch | ActionKind::CreateTag)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.is_create() { "create" } else { "delete" };
        write!(f, "{} {}", self.ref_kind().noun(), verb)
    }
}

/// Action parameters shared by every repository in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefAction {
    pub kind: ActionKind,
    pub ref_name: String,
    /// Branch name or commit hash; required for create actions
    pub source_ref: Option<String>,
}

impl RefAction {
    pub fn create(kind: RefKind, ref_name: impl Into<String>, source_ref: impl Into<String>) -> Self {
        let kind = match kind {
            RefKind::Branch => ActionKind::CreateBranch,
            RefKind::Tag => ActionKind::CreateTag,
        };
        RefAction {
            kind,
            ref_name: ref_name.into(),
            source_ref: Some(source_ref.into()),
        }
    }

    pub fn delete(kind: RefKind, ref_name: impl Into<String>) -> Self {
        let kind = match kind {
            RefKind::Branch => ActionKind::DeleteBranch,
            RefKind::Tag => ActionKind::DeleteTag,
        };
        RefAction {
            kind,
            ref_name: ref_name.into(),
            source_ref: None,
        }
    }

    /// Check create actions carry a non-empty source ref
    pub fn validate(&self) -> Result<()> {
        let has_source = self
            .source_ref
            .as_deref()
            .is_some_and(|source| !source.trim().is_empty());
        if self.kind.is_create() && !has_source {
            return Err(BmrmError::MissingSourceRef {
                action: self.kind.to_string(),
            });
        }
        Ok(())
    }
}

/// One action against one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefActionRequest {
    pub kind: ActionKind,
    pub repository: RepositoryId,
    pub ref_name: String,
    pub source_ref: Option<String>,
}

/// Repositories plus the action to apply to each of them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub repositories: Vec<RepositoryId>,
    pub action: RefAction,
}

impl BatchPlan {
    pub fn new(repositories: Vec<RepositoryId>, action: RefAction) -> Self {
        BatchPlan {
            repositories,
            action,
        }
    }

    /// Per-repository requests in configuration order
    pub fn requests(&self) -> impl Iterator<Item = RefActionRequest> + '_ {
        self.repositories.iter().map(|repository| RefActionRequest {
            kind: self.action.kind,
            repository: repository.clone(),
            ref_name: self.action.ref_name.clone(),
            source_ref: self.action.source_ref.clone(),
        })
    }
}

/// Commit data returned by a successful create call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefDetails {
    pub commit_hash: Option<String>,
    pub commit_author: Option<String>,
    pub commit_link: Option<String>,
    pub tag_link: Option<String>,
}

/// Result of applying an action to a single repository
///
/// Either success details or an error message are present, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefActionOutcome {
    repository: RepositoryId,
    result: std::result::Result<RefDetails, String>,
}

impl RefActionOutcome {
    pub fn success(repository: RepositoryId, details: RefDetails) -> Self {
        RefActionOutcome {
            repository,
            result: Ok(details),
        }
    }

    pub fn failure(repository: RepositoryId, message: impl Into<String>) -> Self {
        RefActionOutcome {
            repository,
            result: Err(message.into()),
        }
    }

    pub fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn details(&self) -> Option<&RefDetails> {
        self.result.as_ref().ok()
    }

    pub fn commit_hash(&self) -> Option<&str> {
        self.details().and_then(|d| d.commit_hash.as_deref())
    }

    pub fn commit_author(&self) -> Option<&str> {
        self.details().and_then(|d| d.commit_author.as_deref())
    }

    pub fn commit_link(&self) -> Option<&str> {
        self.details().and_then(|d| d.commit_link.as_deref())
    }

    pub fn tag_link(&self) -> Option<&str> {
        self.details().and_then(|d| d.tag_link.as_deref())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(s: &str) -> RepositoryId {
        RepositoryId::parse(s).unwrap()
    }

    #[test]
    fn test_repository_parse() {
        let r = repo("acme/api-server");
        assert_eq!(r.owner(), "acme");
        assert_eq!(r.slug(), "api-server");
        assert_eq!(r.to_string(), "acme/api-server");
    }

    #[test]
    fn test_repository_parse_trims() {
        assert_eq!(repo("  acme/web  ").as_str(), "acme/web");
    }

    #[test]
    fn test_repository_parse_invalid() {
        assert!(RepositoryId::parse("acme").is_err());
        assert!(RepositoryId::parse("acme/").is_err());
        assert!(RepositoryId::parse("/web").is_err());
        assert!(RepositoryId::parse("acme/web/extra").is_err());
        assert!(RepositoryId::parse("acme/we b").is_err());
    }

    #[test]
    fn test_action_kind_mapping() {
        assert_eq!(ActionKind::CreateTag.ref_kind(), RefKind::Tag);
        assert_eq!(ActionKind::DeleteBranch.ref_kind(), RefKind::Branch);
        assert!(ActionKind::CreateBranch.is_create());
        assert!(!ActionKind::DeleteTag.is_create());
        assert_eq!(ActionKind::DeleteTag.to_string(), "tag delete");
    }

    #[test]
    fn test_create_requires_source() {
        let mut action = RefAction::create(RefKind::Branch, "feature/x", "main");
        assert!(action.validate().is_ok());
        action.source_ref = Some("  ".to_string());
        assert!(matches!(
            action.validate(),
            Err(BmrmError::MissingSourceRef { .. })
        ));
        assert!(RefAction::delete(RefKind::Tag, "v1.0.0").validate().is_ok());
    }

    #[test]
    fn test_plan_requests_follow_repository_order() {
        let plan = BatchPlan::new(
            vec![repo("org/b"), repo("org/a"), repo("org/c")],
            RefAction::create(RefKind::Tag, "v1.0.0", "main"),
        );
        let names: Vec<String> = plan.requests().map(|r| r.repository.to_string()).collect();
        assert_eq!(names, vec!["org/b", "org/a", "org/c"]);
        assert!(plan
            .requests()
            .all(|r| r.source_ref.as_deref() == Some("main") && r.ref_name == "v1.0.0"));
    }

    #[test]
    fn test_outcome_exclusive_fields() {
        let ok = RefActionOutcome::success(
            repo("org/a"),
            RefDetails {
                commit_hash: Some("abc".to_string()),
                ..RefDetails::default()
            },
        );
        assert!(ok.succeeded());
        assert_eq!(ok.commit_hash(), Some("abc"));
        assert_eq!(ok.error_message(), None);

        let failed = RefActionOutcome::failure(repo("org/b"), "boom");
        assert!(!failed.succeeded());
        assert_eq!(failed.error_message(), Some("boom"));
        assert_eq!(failed.commit_hash(), None);
    }
}
