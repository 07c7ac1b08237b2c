pub mod context;
pub mod issue;
pub mod module;
pub mod rules;

pub use context::DetectionContext;
pub use issue::{Issue, Severity};
pub use module::{NftOwnershipDetector, PluginMetadata, RuleSlot, DEFAULT_RULES, PLUGIN_METADATA};
pub use rules::RuleKind;
