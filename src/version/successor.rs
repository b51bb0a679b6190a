use serde::{Deserialize, Serialize};
use tracing::trace;

use super::Session;
use crate::error::{GroundError, Result};
use crate::model::{SuccessorId, VersionId, ROOT_VERSION_ID};
use crate::storage::schema::VERSION_SUCCESSOR;
use crate::storage::{Row, Value};

/// Directed edge `from_id -> to_id` in a version history.
///
/// `from_id == 0` marks `to_id` as a root of the retained history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionSuccessor {
    /// Edge id.
    pub id: SuccessorId,
    /// Parent version, or `0` for a root edge.
    pub from_id: VersionId,
    /// Child version.
    pub to_id: VersionId,
}

impl VersionSuccessor {
    /// Whether the edge starts at the root sentinel.
    pub fn is_root(&self) -> bool {
        self.from_id == ROOT_VERSION_ID
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_u64("id")?,
            from_id: row.get_u64("from_version_id")?,
            to_id: row.get_u64("to_version_id")?,
        })
    }
}

/// Allocates an id for a new `from_id -> to_id` edge and persists it.
pub fn instantiate(
    session: Session<'_>,
    from_id: VersionId,
    to_id: VersionId,
) -> Result<VersionSuccessor> {
    if to_id == ROOT_VERSION_ID {
        return Err(GroundError::sentinel(format!(
            "version {from_id} cannot precede the root sentinel"
        )));
    }
    if from_id == to_id {
        return Err(GroundError::sentinel(format!(
            "version {to_id} cannot succeed itself"
        )));
    }
    let successor = VersionSuccessor {
        id: session.ids.generate_successor_id(),
        from_id,
        to_id,
    };
    session.db.insert(
        VERSION_SUCCESSOR,
        &[
            ("id", Value::from(successor.id)),
            ("from_version_id", Value::from(from_id)),
            ("to_version_id", Value::from(to_id)),
        ],
    )?;
    trace!(
        successor_id = successor.id,
        from_id,
        to_id,
        "ground.successor.inserted"
    );
    Ok(successor)
}

/// Successor edge by id.
pub fn retrieve(session: Session<'_>, id: SuccessorId) -> Result<VersionSuccessor> {
    let rows = session
        .db
        .equality_select(VERSION_SUCCESSOR, &[], &[("id", Value::from(id))])?;
    match rows.first() {
        Some(row) => VersionSuccessor::from_row(row),
        None => Err(GroundError::not_found("VersionSuccessor", id)),
    }
}

/// Every edge pointing at `to_id`, in creation order.
pub fn incoming(session: Session<'_>, to_id: VersionId) -> Result<Vec<VersionSuccessor>> {
    let rows = session.db.equality_select(
        VERSION_SUCCESSOR,
        &[],
        &[("to_version_id", Value::from(to_id))],
    )?;
    let mut edges = rows
        .iter()
        .map(VersionSuccessor::from_row)
        .collect::<Result<Vec<_>>>()?;
    edges.sort_by_key(|edge| edge.id);
    Ok(edges)
}

/// Deletes one successor edge row.
pub fn delete(session: Session<'_>, id: SuccessorId) -> Result<()> {
    session
        .db
        .delete(&[("id", Value::from(id))], VERSION_SUCCESSOR)?;
    Ok(())
}
