//! Version constraints for providers and the provisioning engine
//!
//! Constraints are written in the engine's syntax (`~> 5.0`, `>= 1.5.0,
//! < 2.0.0`, `!= 1.2.1`) and parsed with `semver` when a binding is made.
//! The original text is what gets emitted.

use std::fmt;

use semver::{Version, VersionReq};

use crate::error::{Result, SynthError};

/// A parsed, emit-verbatim version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    raw: String,
    req: VersionReq,
    excluded: Vec<Version>,
}

impl VersionConstraint {
    /// Parse a comma-separated list of constraints
    pub fn parse(raw: &str) -> Result<Self> {
        let mut comparators = Vec::new();
        let mut excluded = Vec::new();

        for part in raw.split(',').map(str::trim) {
            if part.is_empty() {
                return Err(invalid(raw, "empty constraint"));
            }
            if let Some(rest) = part.strip_prefix("~>") {
                comparators.extend(pessimistic(raw, rest.trim())?);
            } else if let Some(rest) = part.strip_prefix("!=") {
                let version = Version::parse(&complete(rest.trim()))
                    .map_err(|e| invalid(raw, &e.to_string()))?;
                excluded.push(version);
            } else if part.starts_with(|c: char| c.is_ascii_digit()) {
                comparators.push(format!("={}", part));
            } else {
                comparators.push(part.to_string());
            }
        }

        let req = if comparators.is_empty() {
            VersionReq::STAR
        } else {
            VersionReq::parse(&comparators.join(", ")).map_err(|e| invalid(raw, &e.to_string()))?
        };

        Ok(Self {
            raw: raw.to_string(),
            req,
            excluded,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version) && !self.excluded.contains(version)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// `~> 1.2` allows 1.x from 1.2; `~> 1.2.3` allows 1.2.x from 1.2.3
fn pessimistic(raw: &str, version: &str) -> Result<Vec<String>> {
    let parts: Vec<u64> = version
        .split('.')
        .map(|p| p.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| invalid(raw, &format!("bad version '{}'", version)))?;

    match parts.as_slice() {
        [major] => Ok(vec![format!(">={}.0.0", major)]),
        [major, minor] => Ok(vec![
            format!(">={}.{}.0", major, minor),
            format!("<{}.0.0", major + 1),
        ]),
        [major, minor, patch] => Ok(vec![
            format!(">={}.{}.{}", major, minor, patch),
            format!("<{}.{}.0", major, minor + 1),
        ]),
        _ => Err(invalid(raw, &format!("bad version '{}'", version))),
    }
}

fn complete(version: &str) -> String {
    match version.split('.').count() {
        1 => format!("{}.0.0", version),
        2 => format!("{}.0", version),
        _ => version.to_string(),
    }
}

fn invalid(raw: &str, reason: &str) -> SynthError {
    SynthError::InvalidVersion(format!("'{}': {}", raw, reason))
}
