use crate::domain::prerelease::{self, PreRelease};
use crate::error::{BmrmError, Result};
use semver::{BuildMetadata, Version};
use std::fmt;

/// Version increment type, named after the npm `semver` release types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseType {
    Major,
    PreMajor,
    Minor,
    PreMinor,
    Patch,
    PrePatch,
    PreRelease,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Major => "major",
            ReleaseType::PreMajor => "premajor",
            ReleaseType::Minor => "minor",
            ReleaseType::PreMinor => "preminor",
            ReleaseType::Patch => "patch",
            ReleaseType::PrePatch => "prepatch",
            ReleaseType::PreRelease => "prerelease",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A release channel offered when picking the next tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseChannel {
    pub release_type: ReleaseType,
    pub label: &'static str,
    pub is_pre_release: bool,
}

/// All channels, in the order they are presented
pub const RELEASE_CHANNELS: [ReleaseChannel; 7] = [
    ReleaseChannel {
        release_type: ReleaseType::Major,
        label: "Major",
        is_pre_release: false,
    },
    ReleaseChannel {
        release_type: ReleaseType::PreMajor,
        label: "Pre-Major",
        is_pre_release: true,
    },
    ReleaseChannel {
        release_type: ReleaseType::Minor,
        label: "Minor",
        is_pre_release: false,
    },
    ReleaseChannel {
        release_type: ReleaseType::PreMinor,
        label: "Pre-Minor",
        is_pre_release: true,
    },
    ReleaseChannel {
        release_type: ReleaseType::Patch,
        label: "Patch",
        is_pre_release: false,
    },
    ReleaseChannel {
        release_type: ReleaseType::PrePatch,
        label: "Pre-Patch",
        is_pre_release: true,
    },
    ReleaseChannel {
        release_type: ReleaseType::PreRelease,
        label: "Pre-Release",
        is_pre_release: true,
    },
];

/// A computed next version for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCandidate {
    pub release_type: ReleaseType,
    pub label: &'static str,
    /// Full tag name, including the configured prefix
    pub version: String,
}

impl VersionCandidate {
    /// Text shown in the selection list, e.g. "Minor (v1.3.0)"
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.label, self.version)
    }
}

/// Largest major, minor or patch accepted, as in npm `semver` (2^53 - 1)
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Remove leading and trailing `v` characters ("v1.2.3", "1.2.3v" -> "1.2.3")
pub fn normalize_version(input: &str) -> &str {
    input.trim().trim_matches('v')
}

/// Parse a version after normalization
///
/// # Returns
/// * `Ok(Version)` - Parsed semantic version
/// * `Err(BmrmError::InvalidVersion)` - If the input is not a semantic version
///   or a field exceeds [`MAX_SAFE_INTEGER`]
pub fn parse_version(input: &str) -> Result<Version> {
    let version =
        Version::parse(normalize_version(input)).map_err(|_| BmrmError::invalid_version(input))?;
    if [version.major, version.minor, version.patch]
        .iter()
        .any(|&field| field > MAX_SAFE_INTEGER)
    {
        return Err(BmrmError::invalid_version(input));
    }
    Ok(version)
}

/// Whether a tag name is a valid semantic version
///
/// An optional single leading `v` is accepted, so "v1.2.3" is valid while
/// "=1.2.3", "release-1.2.3" and "1.2" are not.
pub fn is_valid_semver(tag: &str) -> bool {
    let trimmed = tag.trim();
    let stripped = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(stripped).is_ok()
}

/// Increment a version for a release type
///
/// Release channels bump their field and zero the lower ones. A pre-release
/// version is first "completed" by the matching release channel, so
/// `1.0.0-beta.1` bumps to `1.0.0` for major. Pre-release channels apply
/// `identifier` as the pre-release tag. Build metadata is dropped.
/// A field already at `u64::MAX` yields `BmrmError::InvalidVersion`.
///
/// # Examples
/// ```ignore
/// let v = Version::parse("1.2.3")?;
/// assert_eq!(increment(&v, ReleaseType::Minor, None)?.to_string(), "1.3.0");
/// assert_eq!(increment(&v, ReleaseType::PreMinor, Some("rc"))?.to_string(), "1.3.0-rc.0");
/// ```
pub fn increment(version: &Version, release_type: ReleaseType, identifier: Option<&str>) -> Result<Version> {
    let overflow = || BmrmError::invalid_version(version.to_string());
    let bump = |field: u64| field.checked_add(1).ok_or_else(overflow);

    let mut next = Version::new(version.major, version.minor, version.patch);
    let current_pre = PreRelease::from_semver(&version.pre).map_err(|_| overflow())?;

    let pre = match release_type {
        ReleaseType::Major => {
            if next.minor != 0 || next.patch != 0 || current_pre.is_empty() {
                next.major = bump(next.major)?;
            }
            next.minor = 0;
            next.patch = 0;
            PreRelease::default()
        }
        ReleaseType::Minor => {
            if next.patch != 0 || current_pre.is_empty() {
                next.minor = bump(next.minor)?;
            }
            next.patch = 0;
            PreRelease::default()
        }
        ReleaseType::Patch => {
            if current_pre.is_empty() {
                next.patch = bump(next.patch)?;
            }
            PreRelease::default()
        }
        ReleaseType::PreMajor => {
            next.major = bump(next.major)?;
            next.minor = 0;
            next.patch = 0;
            PreRelease::default().increment(identifier)?
        }
        ReleaseType::PreMinor => {
            next.minor = bump(next.minor)?;
            next.patch = 0;
            PreRelease::default().increment(identifier)?
        }
        ReleaseType::PrePatch => {
            next.patch = bump(next.patch)?;
            PreRelease::default().increment(identifier)?
        }
        ReleaseType::PreRelease => {
            if current_pre.is_empty() {
                next.patch = bump(next.patch)?;
            }
            current_pre.increment(identifier).map_err(|_| overflow())?
        }
    };

    next.pre = pre.to_semver()?;
    next.build = BuildMetadata::EMPTY;
    Ok(next)
}

/// Compute the next version for every release channel
///
/// # Arguments
/// * `current_version` - Current tag or version; surrounding `v`s are ignored
/// * `prerelease_identifier` - Identifier for pre-release channels (e.g. "beta"); empty means none
/// * `version_prefix` - Prepended to every candidate (commonly "v")
///
/// # Returns
/// * `Ok(Vec<VersionCandidate>)` - Seven candidates in channel order
/// * `Err(BmrmError::InvalidVersion)` - If `current_version` is not a semantic version
pub fn compute_candidates(
    current_version: &str,
    prerelease_identifier: Option<&str>,
    version_prefix: &str,
) -> Result<Vec<VersionCandidate>> {
    let current = parse_version(current_version)?;
    let identifier = prerelease_identifier.filter(|id| !id.is_empty());
    if let Some(id) = identifier {
        prerelease::validate_identifier(id)?;
    }

    RELEASE_CHANNELS
        .iter()
        .map(|channel| {
            let channel_identifier = if channel.is_pre_release { identifier } else { None };
            let next = increment(&current, channel.release_type, channel_identifier)?;
            Ok(VersionCandidate {
                release_type: channel.release_type,
                label: channel.label,
                version: format!("{}{}", version_prefix, next),
            })
        })
        .collect()
}
