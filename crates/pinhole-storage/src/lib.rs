//! Storage backends for the Pinhole URL shortener.
//!
//! Three interchangeable implementations of the
//! [`Storage`](pinhole_core::Storage) contract (in-memory, file-backed,
//! Postgres), the closed [`Backend`] sum type that selects one at
//! startup, and the asynchronous soft-delete pipeline in [`cleaner`].

pub mod backend;
pub mod cleaner;
pub mod file;
pub mod memory;
pub mod postgres;

pub use backend::{Backend, BackendConfig};
pub use cleaner::{start_cleaner, CleanerHandle, DEFAULT_WORKERS};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;
