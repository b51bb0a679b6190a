//! Backend-agnostic versioning engine.
//!
//! Every function here takes a [`Session`]: the adapter and id source for one
//! unit of work. Sessions never commit; the caller decides the transaction
//! boundary (see [`crate::Catalog::write`]).

/// Version history DAGs and truncation.
pub mod dag;
/// Item rows shared by every kind.
pub mod item;
/// Rich versions: tags, references, structure links.
pub mod rich;
/// Structure versions and conformance checks.
pub mod structure;
/// Successor edges.
pub mod successor;
/// Typed tags and tag search.
pub mod tag;

use crate::error::Result;
use crate::ids::IdGenerator;
use crate::model::{ItemKind, VersionId};
use crate::storage::schema::VERSION;
use crate::storage::{PersistenceAdapter, Value};

/// Collaborators for a single operation.
#[derive(Clone, Copy)]
pub struct Session<'a> {
    /// Physical storage used by every read and write.
    pub db: &'a dyn PersistenceAdapter,
    /// Source of fresh item, version and successor ids.
    pub ids: &'a dyn IdGenerator,
}

impl<'a> Session<'a> {
    /// Borrows both collaborators for one operation.
    pub fn new(db: &'a dyn PersistenceAdapter, ids: &'a dyn IdGenerator) -> Self {
        Self { db, ids }
    }
}

pub(crate) fn insert_base_version(session: Session<'_>, id: VersionId) -> Result<()> {
    session.db.insert(VERSION, &[("id", Value::from(id))])?;
    Ok(())
}

/// Removes every row describing version `id` of an item of `kind`.
///
/// Successor edges are not touched; the DAG owns those.
pub(crate) fn purge_version(session: Session<'_>, kind: ItemKind, id: VersionId) -> Result<()> {
    let key = Value::from(id);
    if let Some((table, version_column, _)) = kind.member_table() {
        session.db.delete(&[(version_column, key.clone())], table)?;
    }
    if kind == ItemKind::Structure {
        structure::delete_attributes(session, id)?;
    }
    session.db.delete(&[("id", key.clone())], kind.version_table())?;
    if kind.has_rich_version() {
        rich::delete(session, id)?;
    }
    session.db.delete(&[("id", key)], VERSION)?;
    Ok(())
}
