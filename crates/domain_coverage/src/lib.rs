//! Coverage domain
//!
//! Plan coverage rules, their append-only change history, and the resolver
//! that turns a billable item into an insurer/patient split.

pub mod error;
pub mod resolver;
pub mod rule;
pub mod store;

pub use error::CoverageError;
pub use resolver::{CoverageOutcome, CoverageResolver, DataIntegrityWarning, RuleSource};
pub use rule::{CoverageRule, CoverageType};
pub use store::{CoverageRuleStore, RuleEvent, RuleHistoryEntry};
