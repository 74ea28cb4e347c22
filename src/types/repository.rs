//! Repository domain types
//!
//! Summaries come out of the search pages; enriched repositories are summaries that
//! carried a positive commit count back from the commit listing.

use serde::{Deserialize, Serialize};

/// Owner login wrapper for type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Owner(pub String);

impl Owner {
    pub fn new(owner: String) -> Self {
        Self(owner)
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Owner {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Owner {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Repository name wrapper for type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RepositoryName(pub String);

impl RepositoryName {
    pub fn new(repo_name: String) -> Self {
        Self(repo_name)
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RepositoryName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepositoryName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A strongly-typed repository identifier (`owner/name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RepositoryId {
    pub owner: Owner,
    pub repository_name: RepositoryName,
}

impl RepositoryId {
    pub fn new<T1: Into<String>, T2: Into<String>>(owner: T1, name: T2) -> Self {
        Self {
            owner: Owner::new(owner.into()),
            repository_name: RepositoryName::new(name.into()),
        }
    }

    /// Returns the owner part of the repository
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Returns the repository name
    pub fn repo_name(&self) -> &RepositoryName {
        &self.repository_name
    }

    /// Returns the full name (owner/repository_name format)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repository_name)
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository_name)
    }
}

/// A repository as reported by one search page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositorySummary {
    /// Numeric identifier assigned by GitHub
    pub id: u64,
    pub repository_id: RepositoryId,
}

impl RepositorySummary {
    pub fn new<T1: Into<String>, T2: Into<String>>(id: u64, owner: T1, name: T2) -> Self {
        Self {
            id,
            repository_id: RepositoryId::new(owner, name),
        }
    }

    pub fn owner(&self) -> &Owner {
        self.repository_id.owner()
    }

    pub fn name(&self) -> &RepositoryName {
        self.repository_id.repo_name()
    }
}

/// A repository summary together with its commit count.
///
/// The only way to build one is [`EnrichedRepository::new`], which rejects a zero count,
/// so every value in circulation carries a positive count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EnrichedRepository {
    summary: RepositorySummary,
    commit_count: u64,
}

impl EnrichedRepository {
    /// Returns `None` when `commit_count` is zero.
    pub fn new(summary: RepositorySummary, commit_count: u64) -> Option<Self> {
        if commit_count == 0 {
            return None;
        }
        Some(Self {
            summary,
            commit_count,
        })
    }

    pub fn summary(&self) -> &RepositorySummary {
        &self.summary
    }

    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }

    pub fn owner(&self) -> &Owner {
        self.summary.owner()
    }
}
