//! App version types
//!
//! The mobile project manifest holds a single `version: MAJOR.MINOR.PATCH+BUILD`
//! line. That line is the only source of truth for the version and build
//! number; everything here reads or rewrites it in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Semantic version plus store build number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

/// Which part of the version to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionBump {
    Build,
    Patch,
    Minor,
    Major,
}

/// How a pipeline run picks its version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStrategy {
    /// Use this exact version
    Explicit(AppVersion),
    /// Bump the manifest version as chosen by the operator
    Bump(VersionBump),
    /// Only increment the build number
    AutoIncrement,
}

impl AppVersion {
    pub fn new(major: u32, minor: u32, patch: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// The `MAJOR.MINOR.PATCH` part without the build number
    pub fn semver(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// Returns the bumped version
    ///
    /// The build number always increases, because stores reject uploads
    /// that reuse one. A component already at `u32::MAX` cannot be bumped.
    pub fn bumped(&self, bump: VersionBump) -> Result<Self> {
        let build = increment(self.build, "build number")?;
        Ok(match bump {
            VersionBump::Build => Self { build, ..*self },
            VersionBump::Patch => Self {
                patch: increment(self.patch, "patch version")?,
                build,
                ..*self
            },
            VersionBump::Minor => Self {
                minor: increment(self.minor, "minor version")?,
                patch: 0,
                build,
                ..*self
            },
            VersionBump::Major => Self::new(increment(self.major, "major version")?, 0, 0, build),
        })
    }

    /// Resolves the next version from the current manifest version
    pub fn resolve(&self, strategy: VersionStrategy) -> Result<Self> {
        match strategy {
            VersionStrategy::Explicit(version) => {
                if version.build <= self.build {
                    return Err(Error::validation(format!(
                        "Build number {} must be greater than the current build number {}",
                        version.build, self.build
                    )));
                }
                Ok(version)
            }
            VersionStrategy::Bump(bump) => self.bumped(bump),
            VersionStrategy::AutoIncrement => self.bumped(VersionBump::Build),
        }
    }
}

fn increment(value: u32, part: &str) -> Result<u32> {
    value
        .checked_add(1)
        .ok_or_else(|| Error::validation(format!("Cannot bump {}: already at {}", part, value)))
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}+{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

impl FromStr for AppVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            Error::validation(format!(
                "Invalid version '{}': expected MAJOR.MINOR.PATCH+BUILD",
                s
            ))
        };

        let (semver, build) = s.trim().split_once('+').ok_or_else(invalid)?;
        let parts: Vec<&str> = semver.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let number = |part: &str| -> Result<u32> {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u32>().map_err(|_| invalid())
        };

        Ok(Self {
            major: number(parts[0])?,
            minor: number(parts[1])?,
            patch: number(parts[2])?,
            build: number(build)?,
        })
    }
}

impl FromStr for VersionBump {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "build" => Ok(VersionBump::Build),
            "patch" => Ok(VersionBump::Patch),
            "minor" => Ok(VersionBump::Minor),
            "major" => Ok(VersionBump::Major),
            other => Err(Error::validation(format!(
                "Unknown version bump '{}': expected build, patch, minor or major",
                other
            ))),
        }
    }
}

/// Reads the version line from manifest contents
pub fn read_manifest_version(contents: &str) -> Result<AppVersion> {
    contents
        .lines()
        .find_map(version_value)
        .ok_or_else(|| Error::validation("Manifest has no top-level 'version:' line"))?
        .parse()
}

/// Rewrites the version value, leaving every other byte untouched
///
/// A trailing comment on the version line is kept.
pub fn replace_manifest_version(contents: &str, version: &AppVersion) -> Result<String> {
    let mut output = String::with_capacity(contents.len());
    let mut replaced = false;

    for line in contents.split_inclusive('\n') {
        if !replaced && version_value(line).is_some() {
            let ending = if line.ends_with("\r\n") {
                "\r\n"
            } else if line.ends_with('\n') {
                "\n"
            } else {
                ""
            };
            let body = &line[..line.len() - ending.len()];
            let comment = match body.find('#') {
                Some(idx) => &body[body[..idx].trim_end().len()..],
                None => "",
            };
            output.push_str(&format!("version: {}{}{}", version, comment, ending));
            replaced = true;
        } else {
            output.push_str(line);
        }
    }

    if !replaced {
        return Err(Error::validation(
            "Manifest has no top-level 'version:' line",
        ));
    }

    Ok(output)
}

/// Value of a top-level `version:` line, without quotes or trailing comment
fn version_value(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("version:")?;
    let value = rest.split('#').next().unwrap_or("").trim();
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    if value.is_empty() { None } else { Some(value) }
}
