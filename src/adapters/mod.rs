//! Adapters - concrete implementations of the ports plus the HTTP surface.

pub mod ai;
pub mod cache;
pub mod http;
pub mod index;
pub mod store;
