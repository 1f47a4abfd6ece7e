//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DiagramId;

/// Which copy wins when a conflict is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Push the local copy over the remote one
    Local,
    /// Replace the local copy with the remote one
    Cloud,
}

impl Resolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" | "remote" => Ok(Self::Cloud),
            other => Err(format!("unknown resolution '{other}' (expected local or cloud)")),
        }
    }
}

/// Recorded sync conflict, open until a resolution is applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Diagram involved in the conflict
    pub diagram_id: DiagramId,
    /// Local copy's timestamp when the conflict was detected
    pub local_updated_at: i64,
    /// Remote copy's timestamp when the conflict was detected
    pub remote_updated_at: i64,
    /// Detection timestamp (unix ms)
    pub detected_at: i64,
    /// Resolution timestamp (unix ms), `None` while open
    pub resolved_at: Option<i64>,
    pub resolution: Option<Resolution>,
}

impl SyncConflict {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_accepts_remote_alias() {
        assert_eq!("cloud".parse::<Resolution>().unwrap(), Resolution::Cloud);
        assert_eq!(" Remote ".parse::<Resolution>().unwrap(), Resolution::Cloud);
        assert_eq!("LOCAL".parse::<Resolution>().unwrap(), Resolution::Local);
        assert!("mine".parse::<Resolution>().is_err());
    }
}
