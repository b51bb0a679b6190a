//! Ground: a metadata catalog that records the history of data artifacts as
//! explicit version DAGs.
//!
//! Every logical entity is an [`Item`](version::item::Item) pointing into an
//! immutable history of versions joined by successor edges. The engine in
//! [`version`] only talks to storage through
//! [`PersistenceAdapter`](storage::PersistenceAdapter), so the same model runs
//! on SQLite or in memory. [`Catalog`] wires an adapter and an id source
//! together and owns the transaction boundary.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Transactional facade over the engine.
pub mod catalog;
pub mod entity;
/// Error type shared by the engine and adapters.
pub mod error;
/// Id generation.
pub mod ids;
/// Ids, sentinels and item kinds.
pub mod model;
pub mod storage;
pub mod version;

pub use catalog::{Catalog, CatalogOptions, StorageBackend};
pub use error::{GroundError, Result};
pub use model::{ItemId, ItemKind, SuccessorId, VersionId, ROOT_VERSION_ID};
