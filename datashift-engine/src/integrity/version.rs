//! Semantic version differences.

use crate::config::VersionStrategy;
use semver::Version;
use std::fmt;

/// The most significant component by which two versions differ.
///
/// The `Pre*` kinds are used when either version carries a prerelease tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionDiff {
    Major,
    Premajor,
    Minor,
    Preminor,
    Patch,
    Prepatch,
    /// Only the prerelease tags differ.
    Prerelease,
    /// Only the build metadata differs.
    Build,
}

impl VersionDiff {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Premajor => "premajor",
            Self::Minor => "minor",
            Self::Preminor => "preminor",
            Self::Patch => "patch",
            Self::Prepatch => "prepatch",
            Self::Prerelease => "prerelease",
            Self::Build => "build",
        }
    }
}

impl fmt::Display for VersionDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse(version: &str) -> Result<Version, semver::Error> {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);
    Version::parse(trimmed)
}

/// Computes how `a` and `b` differ. `Ok(None)` means they are the same
/// version.
pub fn diff_versions(a: &str, b: &str) -> Result<Option<VersionDiff>, semver::Error> {
    let a = parse(a)?;
    let b = parse(b)?;

    if a == b {
        return Ok(None);
    }

    let prerelease = !a.pre.is_empty() || !b.pre.is_empty();
    let pick = |release: VersionDiff, pre: VersionDiff| if prerelease { pre } else { release };

    let diff = if a.major != b.major {
        pick(VersionDiff::Major, VersionDiff::Premajor)
    } else if a.minor != b.minor {
        pick(VersionDiff::Minor, VersionDiff::Preminor)
    } else if a.patch != b.patch {
        pick(VersionDiff::Patch, VersionDiff::Prepatch)
    } else if a.pre != b.pre {
        VersionDiff::Prerelease
    } else {
        VersionDiff::Build
    };
    Ok(Some(diff))
}

impl VersionStrategy {
    /// Whether this strategy tolerates a difference of kind `diff`.
    ///
    /// Each strategy allows everything the previous one does: `patch`
    /// allows prerelease and build changes, `minor` adds patch changes and
    /// `major` adds minor changes. A major difference is never allowed
    /// unless versions are ignored altogether.
    pub fn allows(&self, diff: VersionDiff) -> bool {
        use VersionDiff::*;
        match self {
            Self::Ignore => true,
            Self::Patch => matches!(diff, Prerelease | Build),
            Self::Minor => matches!(diff, Prerelease | Build | Patch | Prepatch),
            Self::Major => matches!(diff, Prerelease | Build | Patch | Prepatch | Minor | Preminor),
        }
    }
}
