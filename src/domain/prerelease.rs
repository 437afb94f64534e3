//! Pre-release identifier handling for version increments
//!
//! Pre-release components follow semver.org (https://semver.org/#spec-item-9):
//! dot-separated identifiers that are either numeric or alphanumeric-hyphen.
//! Incrementing follows the npm `semver` package rules.

use crate::error::{BmrmError, Result};
use std::fmt;

/// A single dot-separated pre-release identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Numeric identifier, e.g. the `3` in `rc.3`
    Numeric(u64),
    /// Alphanumeric identifier, e.g. `beta`
    AlphaNumeric(String),
}

impl Identifier {
    /// Digit-only parts must fit in a `u64`
    fn parse(part: &str) -> Result<Self> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(Identifier::AlphaNumeric(part.to_string()));
        }
        part.parse::<u64>()
            .map(Identifier::Numeric)
            .map_err(|_| BmrmError::InvalidPrereleaseIdentifier {
                identifier: part.to_string(),
            })
    }

    /// Identifier equality as npm semver compares them
    fn matches(&self, other: &str) -> bool {
        match (self, other.parse::<u64>()) {
            (Identifier::Numeric(n), Ok(m)) => *n == m,
            (Identifier::AlphaNumeric(s), _) => s == other,
            _ => false,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::AlphaNumeric(s) => write!(f, "{}", s),
        }
    }
}

/// Pre-release part of a version, possibly empty
///
/// # Examples
/// - "" -> PreRelease([])
/// - "beta.1" -> PreRelease([AlphaNumeric("beta"), Numeric(1)])
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreRelease {
    identifiers: Vec<Identifier>,
}

impl PreRelease {
    /// Build from a parsed semver pre-release
    ///
    /// Fails when a numeric identifier does not fit in a `u64`.
    pub fn from_semver(pre: &semver::Prerelease) -> Result<Self> {
        if pre.is_empty() {
            return Ok(PreRelease::default());
        }
        let identifiers = pre
            .as_str()
            .split('.')
            .map(Identifier::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(PreRelease { identifiers })
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    /// Increment the pre-release
    ///
    /// - Empty pre-release becomes `0`
    /// - Otherwise the last numeric identifier is incremented, or `0` is
    ///   appended when no identifier is numeric
    /// - With an `identifier`, the result is `{identifier}.0` unless the
    ///   current pre-release already starts with `{identifier}.{number}`
    ///
    /// Fails when the numeric identifier is already `u64::MAX`.
    ///
    /// # Examples
    /// ```ignore
    /// // "" + beta -> "beta.0", "beta.1" + beta -> "beta.2", "alpha.1" + beta -> "beta.0"
    /// ```
    pub fn increment(&self, identifier: Option<&str>) -> Result<Self> {
        let mut identifiers = self.identifiers.clone();

        if identifiers.is_empty() {
            identifiers.push(Identifier::Numeric(0));
        } else {
            let last_numeric = identifiers.iter_mut().rev().find_map(|id| match id {
                Identifier::Numeric(n) => Some(n),
                Identifier::AlphaNumeric(_) => None,
            });
            match last_numeric {
                Some(n) => {
                    *n = n.checked_add(1).ok_or_else(|| BmrmError::InvalidPrereleaseIdentifier {
                        identifier: n.to_string(),
                    })?;
                }
                None => identifiers.push(Identifier::Numeric(0)),
            }
        }

        if let Some(identifier) = identifier {
            let same_channel = identifiers
                .first()
                .is_some_and(|first| first.matches(identifier))
                && matches!(identifiers.get(1), Some(Identifier::Numeric(_)));
            if !same_channel {
                identifiers = vec![
                    Identifier::AlphaNumeric(identifier.to_string()),
                    Identifier::Numeric(0),
                ];
            }
        }

        Ok(PreRelease { identifiers })
    }

    /// Convert back into a validated semver pre-release
    pub fn to_semver(&self) -> Result<semver::Prerelease> {
        let text = self.to_string();
        semver::Prerelease::new(&text)
            .map_err(|_| BmrmError::InvalidPrereleaseIdentifier { identifier: text })
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.identifiers.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// Validate a configured pre-release identifier such as `beta` or `rc`
///
/// Accepts dot-separated alphanumeric-hyphen parts without numeric leading zeros.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let valid = !identifier.is_empty()
        && identifier.split('.').all(|part| {
            !part.is_empty()
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !(part.len() > 1
                    && part.starts_with('0')
                    && part.chars().all(|c| c.is_ascii_digit()))
        });
    if valid {
        Ok(())
    } else {
        Err(BmrmError::InvalidPrereleaseIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pre(s: &str) -> PreRelease {
        PreRelease::from_semver(&semver::Prerelease::new(s).unwrap()).unwrap()
    }

    #[test]
    fn test_from_semver_splits_identifiers() {
        let pr = pre("beta.1");
        assert_eq!(
            pr.identifiers(),
            &[
                Identifier::AlphaNumeric("beta".to_string()),
                Identifier::Numeric(1)
            ]
        );
        assert!(pre("").is_empty());
    }

    #[test]
    fn test_increment_empty_without_identifier() {
        assert_eq!(pre("").increment(None).unwrap().to_string(), "0");
    }

    #[test]
    fn test_increment_empty_with_identifier() {
        assert_eq!(pre("").increment(Some("beta")).unwrap().to_string(), "beta.0");
    }

    #[test]
    fn test_increment_same_channel() {
        assert_eq!(pre("beta.1").increment(Some("beta")).unwrap().to_string(), "beta.2");
        assert_eq!(pre("rc.99").increment(None).unwrap().to_string(), "rc.100");
    }

    #[test]
    fn test_increment_switches_channel() {
        assert_eq!(pre("alpha.3").increment(Some("beta")).unwrap().to_string(), "beta.0");
    }

    #[test]
    fn test_increment_without_numeric_part() {
        assert_eq!(pre("beta").increment(None).unwrap().to_string(), "beta.0");
        assert_eq!(pre("beta").increment(Some("beta")).unwrap().to_string(), "beta.0");
    }

    #[test]
    fn test_increment_last_numeric_only() {
        assert_eq!(pre("1.beta.2").increment(None).unwrap().to_string(), "1.beta.3");
        assert_eq!(pre("alpha.1.x").increment(None).unwrap().to_string(), "alpha.2.x");
    }

    #[test]
    fn test_to_semver_rejects_invalid() {
        let pr = PreRelease::default().increment(Some("not valid")).unwrap();
        assert!(matches!(
            pr.to_semver(),
            Err(BmrmError::InvalidPrereleaseIdentifier { .. })
        ));
    }

    #[test]
    fn test_numeric_identifier_wider_than_u64_rejected() {
        let wide = semver::Prerelease::new("99999999999999999999").unwrap();
        assert!(matches!(
            PreRelease::from_semver(&wide),
            Err(BmrmError::InvalidPrereleaseIdentifier { .. })
        ));
    }

    #[test]
    fn test_increment_at_u64_max_rejected() {
        assert!(pre("rc.18446744073709551615").increment(None).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("beta").is_ok());
        assert!(validate_identifier("rc-1").is_ok());
        assert!(validate_identifier("next.build").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("be ta").is_err());
        assert!(validate_identifier("beta!").is_err());
        assert!(validate_identifier("01").is_err());
    }
}
