//! Ports module - interfaces to external collaborators.
//!
//! Each port is an `async_trait` boundary between the core and one
//! capability: text generation, semantic product retrieval, and event
//! persistence. Adapters implement these traits; application code depends
//! only on the traits.

mod event_store;
mod generation;
mod product_index;

pub use event_store::{
    format_prompt_context, DiagnosticEvent, EventStore, StoreError,
};
pub use generation::{
    Fragment, FragmentStream, GenerationBackend, GenerationError, GenerationOptions, UnitUsage,
};
pub use product_index::{EmbeddingUsage, IndexError, ProductIndex, ProductMatch, SearchResponse};
