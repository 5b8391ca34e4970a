//! Core types and traits for the Pinhole URL shortener storage layer.
//!
//! This crate defines the data model shared by every backend, the
//! [`Storage`] contract all backends implement, and the merge algorithm
//! used by the in-memory and file-backed implementations.

pub mod error;
pub mod merge;
pub mod model;
pub mod storage;
pub mod tag;

pub use error::{Result, StorageError};
pub use model::{ClientRecord, DeleteTask, ShortEntry};
pub use storage::Storage;
pub use tag::Tag;
