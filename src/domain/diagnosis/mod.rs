//! Diagnosis module - the guarded Socratic chat domain.
//!
//! Pure logic only: transcript types, guard-fact derivation, prompt
//! assembly, and checkpoint extraction. All I/O lives in the application
//! and adapter layers.

pub mod checkpoint;
pub mod guards;
pub mod prompt;
mod turn;

pub use checkpoint::{extract, Extraction, Vital};
pub use guards::{DialoguePhase, GuardFacts, DEFAULT_QUESTION_CAP, PERMISSION_PHRASE};
pub use turn::{Turn, TurnRole};
