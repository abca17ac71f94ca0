//! Storage abstraction for index data.
//!
//! All index I/O goes through the [`Storage`] capability interface, which
//! has a local-filesystem flavor ([`FileStorage`]) and an object-bucket
//! flavor ([`ObjectStorage`]) with identical semantics.

pub mod file;
pub mod object;
pub mod traits;

pub use file::FileStorage;
pub use object::ObjectStorage;
pub use traits::{Storage, StorageError, StorageInput, StorageOutput};
