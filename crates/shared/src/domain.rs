use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};

use crate::error::VersionError;

/// Package identifier. Equality and hashing ignore case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &str) -> bool {
        self.0.to_lowercase() == other.to_lowercase()
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for PackageId {}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_lowercase().hash(state);
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PackageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Installed or available package version.
///
/// Accepts the loose forms package feeds publish (`2.1`, `1.2.3.4`, `3.0.0-beta1`)
/// and orders them by semantic-version precedence. A fourth numeric component is
/// carried as build metadata. `Display` returns the string the version was parsed
/// from, which is the canonical form used for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageVersion {
    raw: String,
    parsed: Version,
}

impl PackageVersion {
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let raw = raw.trim();
        let invalid = || VersionError::Invalid(raw.to_string());

        let (rest, build) = match raw.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (raw, None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let parts = core
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        if parts.is_empty() || parts.len() > 4 {
            return Err(invalid());
        }

        let component = |idx: usize| parts.get(idx).copied().unwrap_or(0);
        let mut parsed = Version::new(component(0), component(1), component(2));
        if let Some(pre) = pre {
            parsed.pre = Prerelease::new(pre).map_err(|_| invalid())?;
        }

        let revision = parts.get(3).map(|rev| rev.to_string());
        let build = match (revision, build) {
            (Some(rev), Some(build)) => Some(format!("{rev}.{build}")),
            (Some(rev), None) => Some(rev),
            (None, Some(build)) => Some(build.to_string()),
            (None, None) => None,
        };
        if let Some(build) = build {
            parsed.build = BuildMetadata::new(&build).map_err(|_| invalid())?;
        }

        Ok(Self {
            raw: raw.to_string(),
            parsed,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.parsed.pre.is_empty()
    }

    pub fn as_semver(&self) -> &Version {
        &self.parsed
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed
    }
}

impl Eq for PackageVersion {}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parsed.cmp(&other.parsed)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for PackageVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PackageVersion> for String {
    fn from(value: PackageVersion) -> Self {
        value.raw
    }
}

/// Installed package as reported by the package service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: PackageId,
    #[serde(default)]
    pub title: Option<String>,
    pub version: PackageVersion,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_prerelease: bool,
}

/// Entry of the outdated set: an installed package and the newer version known for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedPackage {
    pub id: PackageId,
    pub latest_version: PackageVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub title: Option<String>,
    pub version: PackageVersion,
    pub latest_version: Option<PackageVersion>,
    pub is_pinned: bool,
    pub is_prerelease: bool,
}

impl Package {
    pub fn new(id: impl Into<PackageId>, version: PackageVersion) -> Self {
        Self {
            id: id.into(),
            title: None,
            version,
            latest_version: None,
            is_pinned: false,
            is_prerelease: false,
        }
    }

    /// Title when present, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn can_update(&self) -> bool {
        self.latest_version.is_some()
    }

    /// Whether a bulk update would touch this package.
    pub fn is_update_candidate(&self) -> bool {
        self.can_update() && !self.is_pinned
    }
}

impl From<PackageRecord> for Package {
    fn from(record: PackageRecord) -> Self {
        let is_prerelease = record.is_prerelease || record.version.is_prerelease();
        Self {
            id: record.id,
            title: record.title.filter(|title| !title.trim().is_empty()),
            version: record.version,
            latest_version: None,
            is_pinned: record.is_pinned,
            is_prerelease,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn version(raw: &str) -> PackageVersion {
        raw.parse().expect("valid version")
    }

    #[test]
    fn ids_compare_without_case() {
        assert_eq!(PackageId::new("Git"), PackageId::new("git"));
        let ids: HashSet<_> = [PackageId::new("NodeJS"), PackageId::new("nodejs")]
            .into_iter()
            .collect();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn short_versions_are_padded_but_display_as_given() {
        let short = version("2.1");
        assert_eq!(short, version("2.1.0"));
        assert_eq!(short.to_string(), "2.1");
        assert!(version("2.2") > short);
    }

    #[test]
    fn four_part_versions_order_by_revision() {
        assert!(version("1.2.3.10") > version("1.2.3.9"));
        assert!(version("1.2.4") > version("1.2.3.9"));
    }

    #[test]
    fn prerelease_versions_sort_before_release() {
        let beta = version("3.0.0-beta1");
        assert!(beta.is_prerelease());
        assert!(beta < version("3.0.0"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(PackageVersion::parse("").is_err());
        assert!(PackageVersion::parse("latest").is_err());
        assert!(PackageVersion::parse("1.2.3.4.5").is_err());
    }

    #[test]
    fn record_mapping_keeps_every_field_and_falls_back_to_id() {
        let record = PackageRecord {
            id: PackageId::new("7zip"),
            title: Some("  ".into()),
            version: version("23.1.0-rc"),
            is_pinned: true,
            is_prerelease: false,
        };
        let package = Package::from(record);
        assert_eq!(package.display_name(), "7zip");
        assert!(package.is_pinned);
        assert!(package.is_prerelease);
        assert!(!package.can_update());
    }
}
