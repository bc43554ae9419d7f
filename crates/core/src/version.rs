//! Author-controlled template version strings.
//!
//! Versions qualify cover and timeline entry names inside a package, so
//! they must be unambiguous. Only `major.minor` is accepted; anything
//! else is rejected rather than truncated.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)$").expect("valid regex"));

/// A validated `major.minor` template version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateVersion {
    major: u32,
    minor: u32,
}

impl TemplateVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a version string, rejecting anything other than `major.minor`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let caps = VERSION_RE
            .captures(raw)
            .ok_or_else(|| CoreError::InvalidVersion(raw.to_string()))?;
        let major = caps[1]
            .parse()
            .map_err(|_| CoreError::InvalidVersion(raw.to_string()))?;
        let minor = caps[2]
            .parse()
            .map_err(|_| CoreError::InvalidVersion(raw.to_string()))?;
        Ok(Self { major, minor })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// The next minor version (`1.4` -> `1.5`).
    pub fn bump_minor(&self) -> Result<Self, CoreError> {
        let minor = self.minor.checked_add(1).ok_or_else(|| {
            CoreError::InvalidVersion(format!("{self} has no next minor version"))
        })?;
        Ok(Self::new(self.major, minor))
    }
}

impl Default for TemplateVersion {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl fmt::Display for TemplateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for TemplateVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TemplateVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TemplateVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_major_minor() {
        let v = TemplateVersion::parse("1.10").unwrap();
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 10);
        assert_eq!(v.to_string(), "1.10");
    }

    #[test]
    fn rejects_three_components() {
        assert_matches!(
            TemplateVersion::parse("1.2.3"),
            Err(CoreError::InvalidVersion(v)) if v == "1.2.3"
        );
    }

    #[test]
    fn rejects_single_component_and_garbage() {
        for raw in ["1", "", "v1.0", "1.", ".1", "1.0 ", "01.0", "a.b"] {
            assert!(TemplateVersion::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn bump_minor_increments() {
        let v = TemplateVersion::parse("2.9").unwrap();
        assert_eq!(v.bump_minor().unwrap().to_string(), "2.10");
    }

    #[test]
    fn bump_minor_at_limit_is_an_error() {
        let v = TemplateVersion::parse(&format!("1.{}", u32::MAX)).unwrap();
        assert_matches!(v.bump_minor(), Err(CoreError::InvalidVersion(_)));
    }

    #[test]
    fn serde_uses_string_form() {
        let v = TemplateVersion::new(1, 1);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"1.1\"");
        let parsed: TemplateVersion = serde_json::from_str("\"3.0\"").unwrap();
        assert_eq!(parsed, TemplateVersion::new(3, 0));
        assert!(serde_json::from_str::<TemplateVersion>("\"3\"").is_err());
    }
}
