pub mod config;
pub mod detection;
pub mod error;
pub mod solver;
pub mod state;

pub use config::DetectorConfig;
pub use detection::{DetectionContext, Issue, NftOwnershipDetector, RuleKind};
pub use error::{DetectorError, Result};
