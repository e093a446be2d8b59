use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnCounts {
    pub count: u64,
    pub cvss2_ge_seven: u64,
    pub cvss3_ge_seven: u64,
    pub historical: u64,
    pub triaged: u64,
    pub excluded: u64,
    pub minor: u64,
    pub major: u64,
    pub vulnerabilities: u64,
}

impl VulnCounts {
    pub const fn severe(&self) -> u64 {
        self.cvss2_ge_seven + self.cvss3_ge_seven
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub info: u64,
}

impl SeverityCounts {
    pub const fn total(&self) -> u64 {
        self.high + self.medium + self.low + self.info
    }
}
