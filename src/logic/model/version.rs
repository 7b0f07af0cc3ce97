//! Model version identifiers (`v<major>.<minor>.<patch>`), ordered numerically.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::logic::error::FraudError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelVersionId {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersionId {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Version installed when no trained model exists yet
    pub const fn bootstrap() -> Self {
        Self::new(0, 1, 0)
    }

    pub fn next_minor(self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// Artifact file name inside the model directory
    pub fn artifact_name(&self) -> String {
        format!("{self}.json")
    }

    pub fn quarantined_name(&self) -> String {
        format!("{self}.quarantined.json")
    }
}

impl fmt::Display for ModelVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ModelVersionId {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FraudError::InvalidInput(format!("model version '{s}' is not v<major>.<minor>.<patch>"));
        let body = s.trim().strip_prefix('v').unwrap_or(s.trim());
        let parts: Vec<&str> = body.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let num = |p: &str| p.parse::<u32>().map_err(|_| invalid());
        Ok(Self::new(num(parts[0])?, num(parts[1])?, num(parts[2])?))
    }
}

impl TryFrom<String> for ModelVersionId {
    type Error = FraudError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelVersionId> for String {
    fn from(id: ModelVersionId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ordering() {
        let v10: ModelVersionId = "v0.10.0".parse().unwrap();
        let v9: ModelVersionId = "v0.9.0".parse().unwrap();
        assert!(v10 > v9);
        assert!(ModelVersionId::new(1, 0, 0) > ModelVersionId::new(0, 99, 99));
        assert!(ModelVersionId::new(0, 2, 10) > ModelVersionId::new(0, 2, 9));
    }

    #[test]
    fn test_parse_and_display() {
        let v: ModelVersionId = "v1.2.3".parse().unwrap();
        assert_eq!(v, ModelVersionId::new(1, 2, 3));
        assert_eq!(v.to_string(), "v1.2.3");
        assert_eq!("0.4.0".parse::<ModelVersionId>().unwrap(), ModelVersionId::new(0, 4, 0));
        assert!("v1.2".parse::<ModelVersionId>().is_err());
        assert!("v1.x.0".parse::<ModelVersionId>().is_err());
        assert!("".parse::<ModelVersionId>().is_err());
    }

    #[test]
    fn test_next_minor_and_names() {
        let v = ModelVersionId::new(0, 9, 3).next_minor();
        assert_eq!(v, ModelVersionId::new(0, 10, 0));
        assert_eq!(v.artifact_name(), "v0.10.0.json");
        assert_eq!(v.quarantined_name(), "v0.10.0.quarantined.json");
    }

    #[test]
    fn test_serde_as_string() {
        let v = ModelVersionId::new(0, 10, 0);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"v0.10.0\"");
        let back: ModelVersionId = serde_json::from_str("\"v0.10.0\"").unwrap();
        assert_eq!(back, v);
        assert!(serde_json::from_str::<ModelVersionId>("\"banana\"").is_err());
    }
}
