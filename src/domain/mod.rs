//! Domain module - pure business logic.

pub mod diagnosis;
pub mod foundation;
pub mod intake;
pub mod pricing;
pub mod routine;
