//! Shared test utilities
//!
//! Builders with defaults, frozen fixtures, and port doubles used across the
//! crate test suites.

pub mod builders;
pub mod fixtures;

pub use builders::TestRuleBuilder;
pub use fixtures::{frozen_now, money, service_date, twenty, window_start, ScriptedGateway};
