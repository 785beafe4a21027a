//! Release tag and deploy branch naming
//!
//! Release tags are named `{tenant}/v{MAJOR.MINOR.PATCH}+{build}`. A rollback
//! marker appends `-rollback-{YYYYMMDDHHMMSS}` to the tag it reverts to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::version::AppVersion;

/// Prefix shared by all deploy branches
pub const DEPLOY_BRANCH_PREFIX: &str = "deploy/";

/// Separator between a release tag and its rollback timestamp
const ROLLBACK_SEPARATOR: &str = "-rollback-";

/// An immutable release marker for one tenant build
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseTag {
    pub client_name: String,
    /// `MAJOR.MINOR.PATCH`
    pub version: String,
    pub build_number: u32,
}

impl ReleaseTag {
    pub fn new(client_name: impl Into<String>, version: impl Into<String>, build_number: u32) -> Self {
        Self {
            client_name: client_name.into(),
            version: version.into(),
            build_number,
        }
    }

    /// Builds the tag for a tenant at an app version
    pub fn for_version(client_name: impl Into<String>, version: &AppVersion) -> Self {
        Self::new(client_name, version.semver(), version.build)
    }

    /// Parses a tag name
    ///
    /// Returns `None` for anything that is not exactly
    /// `{client}/v{N.N.N}+{N}`: wrong case (`/V`), a missing `/v`, extra
    /// suffixes (rollback markers included) are all rejected.
    pub fn parse(name: &str) -> Option<Self> {
        let (client_name, rest) = name.split_once("/v")?;
        if client_name.is_empty() || client_name.contains('/') {
            return None;
        }

        let (version, build) = rest.split_once('+')?;
        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() != 3 || !parts.iter().all(|p| is_number(p)) {
            return None;
        }

        if !is_number(build) {
            return None;
        }

        Some(Self {
            client_name: client_name.to_string(),
            version: version.to_string(),
            build_number: build.parse().ok()?,
        })
    }

    /// Annotation message stored with the tag
    pub fn message(&self) -> String {
        format!(
            "Release {} {} (build {})",
            self.client_name, self.version, self.build_number
        )
    }

    /// Name of the rollback marker for a rollback to this tag
    pub fn rollback_tag_name(&self, at: DateTime<Utc>) -> String {
        rollback_tag_name(&self.to_string(), at)
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/v{}+{}", self.client_name, self.version, self.build_number)
    }
}

/// Deploy branch for a tenant
pub fn deploy_branch_name(tenant_id: &str) -> String {
    format!("{}{}", DEPLOY_BRANCH_PREFIX, tenant_id)
}

/// Glob pattern matching every release tag of a tenant
pub fn release_tag_pattern(tenant_id: &str) -> String {
    format!("{}/v*", tenant_id)
}

/// Rollback marker name for any tag
pub fn rollback_tag_name(tag: &str, at: DateTime<Utc>) -> String {
    format!("{}{}{}", tag, ROLLBACK_SEPARATOR, at.format("%Y%m%d%H%M%S"))
}

/// Whether a tag name is a rollback marker
pub fn is_rollback_tag(tag: &str) -> bool {
    tag.contains(ROLLBACK_SEPARATOR)
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_release_tag() {
        let tag = ReleaseTag::new("acme", "1.2.3", 45);
        assert_eq!(tag.to_string(), "acme/v1.2.3+45");
        assert_eq!(tag.message(), "Release acme 1.2.3 (build 45)");

        let from_version = ReleaseTag::for_version("acme", &AppVersion::new(1, 2, 3, 45));
        assert_eq!(from_version, tag);
    }

    #[test]
    fn test_parse_release_tag() {
        let tag = ReleaseTag::parse("acme/v1.2.3+45").unwrap();
        assert_eq!(tag.client_name, "acme");
        assert_eq!(tag.version, "1.2.3");
        assert_eq!(tag.build_number, 45);
    }

    #[test]
    fn test_parse_rejects_near_misses() {
        assert_eq!(ReleaseTag::parse("acme/V1.2.3+45"), None);
        assert_eq!(ReleaseTag::parse("acme-1.2.3+45"), None);
        assert_eq!(ReleaseTag::parse("acme/v1.2+45"), None);
        assert_eq!(ReleaseTag::parse("acme/v1.2.3"), None);
        assert_eq!(ReleaseTag::parse("/v1.2.3+45"), None);
        assert_eq!(ReleaseTag::parse("acme/v1.2.3+45-rollback-20260101120000"), None);
    }

    #[test]
    fn test_rollback_tag_name() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 7).unwrap();
        let tag = ReleaseTag::new("acme", "1.2.3", 45);
        let name = tag.rollback_tag_name(at);
        assert_eq!(name, "acme/v1.2.3+45-rollback-20261018090507");
        assert!(is_rollback_tag(&name));
        assert!(!is_rollback_tag("acme/v1.2.3+45"));
    }

    #[test]
    fn test_branch_and_pattern() {
        assert_eq!(deploy_branch_name("acme"), "deploy/acme");
        assert_eq!(release_tag_pattern("acme"), "acme/v*");
    }
}
