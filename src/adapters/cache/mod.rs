//! Cache adapters - in-process session state.

mod session_cache;

pub use session_cache::{SessionCache, HISTORY_WINDOW};
