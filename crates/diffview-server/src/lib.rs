//! ephemeral content store and the HTTP surface that exposes it.

pub mod http;
pub mod store;

pub use http::{ContentServer, RunningServer, ServeError};
pub use store::{ContentStore, StoredEntry};
