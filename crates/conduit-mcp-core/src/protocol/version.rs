//! Protocol version management.
//!
//! MCP protocol versions are date-coded. The client offers its latest
//! supported version during `initialize` and accepts whatever the server
//! returns; the negotiated value is pinned on the session for the
//! `MCP-Protocol-Version` header.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl ProtocolVersion {
    pub const V2025_03_26: Self = Self {
        year: 2025,
        month: 3,
        day: 26,
    };
    pub const V2025_06_18: Self = Self {
        year: 2025,
        month: 6,
        day: 18,
    };
    pub const V2025_11_25: Self = Self {
        year: 2025,
        month: 11,
        day: 25,
    };

    /// Parse a version string in the format "YYYY-MM-DD".
    pub fn parse(version_str: &str) -> Result<Self, VersionParseError> {
        let parts: Vec<&str> = version_str.split('-').collect();
        if parts.len() != 3 || parts[0].len() != 4 || parts[1].len() != 2 || parts[2].len() != 2 {
            return Err(VersionParseError::InvalidFormat);
        }

        let year = parts[0]
            .parse::<u16>()
            .map_err(|_| VersionParseError::InvalidYear)?;
        let month = parts[1]
            .parse::<u8>()
            .map_err(|_| VersionParseError::InvalidMonth)?;
        let day = parts[2]
            .parse::<u8>()
            .map_err(|_| VersionParseError::InvalidDay)?;

        if month == 0 || month > 12 {
            return Err(VersionParseError::InvalidMonth);
        }
        if day == 0 || day > 31 {
            return Err(VersionParseError::InvalidDay);
        }

        Ok(Self { year, month, day })
    }

    /// The latest version this client speaks, offered at initialize time.
    pub fn latest() -> Self {
        Self::V2025_11_25
    }

    /// All supported versions, ordered oldest to newest.
    pub fn supported_versions() -> Vec<Self> {
        vec![Self::V2025_03_26, Self::V2025_06_18, Self::V2025_11_25]
    }

    pub fn is_supported(&self) -> bool {
        Self::supported_versions().contains(self)
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl From<ProtocolVersion> for String {
    fn from(v: ProtocolVersion) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = VersionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VersionParseError {
    #[error("invalid version format, expected YYYY-MM-DD")]
    InvalidFormat,
    #[error("invalid year component")]
    InvalidYear,
    #[error("invalid month component")]
    InvalidMonth,
    #[error("invalid day component")]
    InvalidDay,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let version = ProtocolVersion::parse("2025-06-18").unwrap();
        assert_eq!(version, ProtocolVersion::V2025_06_18);
        assert_eq!(version.to_string(), "2025-06-18");
    }

    #[test]
    fn parse_rejects_malformed_versions() {
        assert!(ProtocolVersion::parse("latest").is_err());
        assert!(ProtocolVersion::parse("2025-13-01").is_err());
        assert!(ProtocolVersion::parse("2025-06-32").is_err());
        assert!(ProtocolVersion::parse("2025-6-18").is_err());
    }

    #[test]
    fn latest_is_newest_supported() {
        let supported = ProtocolVersion::supported_versions();
        assert_eq!(supported.last().copied().unwrap(), ProtocolVersion::latest());
        assert!(supported.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn serde_uses_wire_string() {
        let v: ProtocolVersion = serde_json::from_value(serde_json::json!("2025-11-25")).unwrap();
        assert_eq!(v, ProtocolVersion::V2025_11_25);
        assert_eq!(
            serde_json::to_value(v).unwrap(),
            serde_json::json!("2025-11-25")
        );
    }
}
