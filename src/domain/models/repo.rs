//! Code-hosting repository domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::PolicyOverride;
use crate::domain::errors::{DomainError, DomainResult};

/// A repository whose issues are watched for abandoned claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    /// Maintainer overrides of the default reminder policy.
    pub policy: Option<PolicyOverride>,
    pub created_at: DateTime<Utc>,
}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            policy: None,
            created_at,
        }
    }

    /// Parse an `owner/name` slug.
    pub fn parse_slug(slug: &str) -> DomainResult<(String, String)> {
        match slug.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok((owner.to_string(), name.to_string()))
            }
            _ => Err(DomainError::ValidationFailed(format!(
                "expected owner/name, got '{slug}'"
            ))),
        }
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slug() {
        let (owner, name) = Repo::parse_slug("rust-lang/cargo").unwrap();
        assert_eq!(owner, "rust-lang");
        assert_eq!(name, "cargo");
        assert!(Repo::parse_slug("cargo").is_err());
        assert!(Repo::parse_slug("/cargo").is_err());
        assert!(Repo::parse_slug("a/b/c").is_err());
    }

    #[test]
    fn test_slug() {
        let repo = Repo::new("rust-lang", "cargo", Utc::now());
        assert_eq!(repo.slug(), "rust-lang/cargo");
        assert!(repo.policy.is_none());
    }
}
