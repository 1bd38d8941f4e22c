//! Storage abstractions and implementations
//!
//! Layers persist their records through the [`RecordStore`] trait. The bundled
//! [`InMemoryRecordStore`] keeps each tenant in its own partition; other
//! backends plug in by implementing the trait.

pub mod errors;
pub mod memory;
pub mod traits;

pub use errors::{StorageError, StorageResult};
pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
