// Diagnosis API and the engine behind it.

pub mod engine;
pub mod handlers;
pub mod knowledge;
pub mod runs;
pub mod service;
pub mod simulation;

pub use engine::{DiagnosisEngine, RuleBasedEngine};
