//! Product index adapters - librarian retrieval service and in-memory
//! catalog.

mod in_memory;
mod librarian;

pub use in_memory::InMemoryProductIndex;
pub use librarian::{LibrarianConfig, LibrarianIndex};
