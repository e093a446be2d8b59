mod cleanup;
mod counts;
mod report;
mod status;

pub use cleanup::CleanupMode;
pub use counts::{SeverityCounts, VulnCounts};
pub use report::ScanReport;
pub use status::ProductStatus;
