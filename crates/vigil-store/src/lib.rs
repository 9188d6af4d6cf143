//! # Vigil Store - External Collaborator Interfaces
//!
//! **Purpose**: Define the storage boundaries the monitoring core depends
//! on, and provide in-memory implementations for tests and local simulation.
//!
//! The three collaborators are external systems; the core only ever:
//!
//! - **Registry**: reads/subscribes to device records, plus the one local,
//!   non-authoritative status-cache write after a completed capture
//! - **Alert log**: appends records and subscribes per device
//! - **Blob store**: puts write-once snapshot payloads and gets them back
//!   by key
//!
//! Append/put operations are assumed atomic at the storage boundary, so no
//! locking beyond each implementation's own interior state is required of
//! callers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// In-memory store implementations
pub mod memory;

/// Store trait definitions
pub mod traits;

pub use memory::{MemoryAlertLog, MemoryBlobStore, MemoryRegistry};
pub use traits::{AlertStore, BlobStore, RegistryStore};
