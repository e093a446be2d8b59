use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    #[serde(rename = "B")]
    Busy,
    #[serde(rename = "R")]
    Ready,
    #[serde(rename = "F")]
    Failed,
}

impl ProductStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Busy => "B",
            ProductStatus::Ready => "R",
            ProductStatus::Failed => "F",
        }
    }

    pub const fn is_done(self) -> bool {
        matches!(self, ProductStatus::Ready | ProductStatus::Failed)
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
