//! Claims engine
//!
//! The orchestration surface over the coverage, claims and batch domains.
//! Callers construct a [`ClaimsEngine`] with their collaborator ports and
//! drive the whole coverage-resolution and claims lifecycle through it.

pub mod engine;
pub mod error;

pub use engine::{ChargeInput, ClaimsEngine, EngineConfig};
pub use error::EngineError;
