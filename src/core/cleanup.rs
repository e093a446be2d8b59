use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    None,
    Binary,
    Complete,
}

impl CleanupMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            CleanupMode::None => "none",
            CleanupMode::Binary => "binary",
            CleanupMode::Complete => "complete",
        }
    }

    pub const fn delete_binary(self) -> bool {
        matches!(self, CleanupMode::Binary | CleanupMode::Complete)
    }

    pub const fn delete_product(self) -> bool {
        matches!(self, CleanupMode::Complete)
    }
}

impl fmt::Display for CleanupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(CleanupMode::None),
            "binary" => Ok(CleanupMode::Binary),
            "complete" => Ok(CleanupMode::Complete),
            other => Err(format!(
                "クリーンアップモードが不正です: {other}（none|binary|complete を指定してください）"
            )),
        }
    }
}
