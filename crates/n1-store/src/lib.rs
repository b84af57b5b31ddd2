//! # n1 Store
//!
//! A content-addressed object store built on top of a durable
//! [`KeyedBlobMap`]. Object identity is the SHA-256 digest of the *sealed*
//! form an object is stored in (see `n1-seal`), computed and verified by
//! this crate — a blob map implementation only needs to durably associate
//! text keys with opaque bytes.
//!
//! [`ObjectStore`] keeps a lazily-rebuilt in-memory index mapping digests to
//! the keys they're stored under, swapped in atomically (see the
//! `snapshot` module) so concurrent readers never observe a half-built
//! index.

pub mod blob_map;
pub mod error;
pub mod metadata;
mod object_store;
mod snapshot;

pub use blob_map::{KeyedBlobMap, SqliteBlobMap, CANARY_KEY};
pub use error::{Result, StoreError};
pub use metadata::VaultMetadata;
pub use object_store::{ObjectReader, ObjectStore, ObjectWriter};
