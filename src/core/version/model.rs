// ─── Version ───
// `major.minor.patch[.revision]` with a lowest-sorting `INVALID` sentinel.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Build version of an installed or remote artifact.
///
/// Parsing never fails: anything that is not at least three non-negative
/// integer segments becomes [`Version::INVALID`], which sorts below every
/// valid version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    major: i32,
    minor: i32,
    patch: i32,
    revision: Option<i32>,
}

impl Version {
    /// "Unparseable or absent". All fields negative so it sorts lowest.
    pub const INVALID: Version = Version {
        major: -1,
        minor: -1,
        patch: -1,
        revision: None,
    };

    /// Baseline used before any real version is known.
    pub const DEFAULT: Version = Version {
        major: 0,
        minor: 1,
        patch: 0,
        revision: None,
    };

    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major: major as i32,
            minor: minor as i32,
            patch: patch as i32,
            revision: None,
        }
    }

    pub const fn with_revision(self, revision: u16) -> Self {
        Self {
            revision: Some(revision as i32),
            ..self
        }
    }

    /// Parse `major.minor.patch[.revision]`. Segments beyond the fourth are ignored.
    pub fn parse(text: &str) -> Self {
        let parts: Vec<&str> = text.trim().split('.').collect();
        if parts.len() < 3 {
            return Self::INVALID;
        }

        let segment = |raw: &str| raw.trim().parse::<u16>().ok().map(i32::from);

        let (Some(major), Some(minor), Some(patch)) =
            (segment(parts[0]), segment(parts[1]), segment(parts[2]))
        else {
            return Self::INVALID;
        };

        let revision = match parts.get(3) {
            Some(raw) => match segment(raw) {
                Some(value) => Some(value),
                None => return Self::INVALID,
            },
            None => None,
        };

        Self {
            major,
            minor,
            patch,
            revision,
        }
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    pub fn major(&self) -> i32 {
        self.major
    }

    pub fn minor(&self) -> i32 {
        self.minor
    }

    pub fn patch(&self) -> i32 {
        self.patch
    }

    pub fn revision(&self) -> Option<i32> {
        self.revision
    }

    /// Three-way comparison as `-1`, `0` or `1`.
    pub fn compare(&self, other: &Version) -> i32 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// True when `self` is strictly newer than `other`.
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.compare(other) > 0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }

        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.revision, other.revision) {
                (None, None) => Ordering::Equal,
                // A present revision beats an absent one.
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(mine), Some(theirs)) => mine.cmp(&theirs),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(revision) = self.revision {
            write!(f, ".{}", revision)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Version {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_and_four_segments() {
        assert_eq!(Version::parse("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(Version::parse(" 1.2.3.4\n"), Version::new(1, 2, 3).with_revision(4));
        assert_eq!(Version::parse("0.1.0"), Version::DEFAULT);
    }

    #[test]
    fn malformed_text_is_invalid() {
        for raw in ["", "1.2", "a.b.c", "1.2.x", "1.2.3.x", "-1.2.3", "v1.2.3", "70000.0.0"] {
            assert_eq!(Version::parse(raw), Version::INVALID, "input {raw:?}");
            assert!(!Version::parse(raw).is_valid());
        }
    }

    #[test]
    fn text_round_trip_for_valid_versions() {
        for raw in ["0.0.0", "0.1.0", "1.2.3", "10.20.30.40", "3.0.7.0", "65535.1.2"] {
            let parsed = Version::parse(raw);
            assert!(parsed.is_valid());
            assert_eq!(Version::parse(&parsed.to_string()), parsed);
        }
        assert_eq!(Version::parse("01.2.3").to_string(), "1.2.3");
    }

    #[test]
    fn orders_by_decreasing_significance() {
        let ordered = [
            Version::parse("0.9.9.9"),
            Version::parse("1.0.0"),
            Version::parse("1.0.0.0"),
            Version::parse("1.0.0.5"),
            Version::parse("1.0.1"),
            Version::parse("1.1.0"),
            Version::parse("2.0.0"),
        ];

        for (i, a) in ordered.iter().enumerate() {
            for (j, b) in ordered.iter().enumerate() {
                let expected = (i as i32 - j as i32).signum();
                assert_eq!(a.compare(b), expected, "{a} vs {b}");
                assert_eq!(a.compare(b), -b.compare(a));
            }
        }
    }

    #[test]
    fn revision_less_versions_are_equal() {
        let a = Version::parse("1.2.3");
        let b = Version::parse("1.2.3");
        assert_eq!(a.compare(&b), 0);
        assert_eq!(b.compare(&a), 0);
        assert!(!a.is_newer_than(&b));
    }

    #[test]
    fn invalid_sorts_below_every_valid_version() {
        for raw in ["0.0.0", "0.1.0", "5.4.3.2"] {
            let valid = Version::parse(raw);
            assert!(Version::INVALID.compare(&valid) < 0);
            assert!(valid.is_newer_than(&Version::INVALID));
        }
        assert_eq!(Version::INVALID.compare(&Version::INVALID), 0);
    }

    #[test]
    fn default_is_baseline() {
        assert_eq!(Version::default().to_string(), "0.1.0");
        assert!(Version::default().is_valid());
    }

    #[test]
    fn serializes_as_text() {
        let json = serde_json::to_string(&Version::parse("2.1.0.7")).unwrap();
        assert_eq!(json, "\"2.1.0.7\"");
        let back: Version = serde_json::from_str("\"not a version\"").unwrap();
        assert_eq!(back, Version::INVALID);
    }
}
