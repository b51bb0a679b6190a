//! Concrete item families built on the version engine.

/// Edges between nodes and their version windows.
pub mod edge;
/// Graphs grouping edge versions.
pub mod graph;
/// Lineage edges and graphs over rich versions.
pub mod lineage;
/// Nodes: datasets and other artifacts.
pub mod node;
/// Structures: schemas that constrain tags.
pub mod structure;

use tracing::info;

use crate::error::{GroundError, Result};
use crate::model::{ItemId, ItemKind, VersionId};
use crate::storage::{Column, Row, Value};
use crate::version::rich::{self, NewRichVersion, RichVersion};
use crate::version::{dag, item, Session};

/// Shared path for every rich version kind: validate parents, write the
/// rich version and the kind row, then extend the owner's history.
pub(crate) fn create_rich_version(
    session: Session<'_>,
    kind: ItemKind,
    owner_id: ItemId,
    fields: &NewRichVersion,
    attributes: &[Column<'_>],
    parents: &[VersionId],
) -> Result<RichVersion> {
    item::require_kind(session, owner_id, kind)?;
    let mut history = dag::retrieve(session, owner_id)?;
    item::check_parents(&history, parents)?;

    let id = session.ids.generate_version_id();
    let version = rich::insert(session, id, fields)?;
    let mut columns: Vec<Column<'_>> = vec![
        ("id", Value::from(id)),
        (kind.owner_column(), Value::from(owner_id)),
    ];
    columns.extend(attributes.iter().cloned());
    session.db.insert(kind.version_table(), &columns)?;
    item::link(session, &mut history, id, parents)?;

    info!(
        item_id = owner_id,
        version_id = id,
        kind = kind.as_str(),
        parents = parents.len(),
        "ground.version.created"
    );
    Ok(version)
}

/// Loads the kind-specific row of version `id`.
pub(crate) fn version_row(session: Session<'_>, kind: ItemKind, id: VersionId) -> Result<Row> {
    let rows = session
        .db
        .equality_select(kind.version_table(), &[], &[("id", Value::from(id))])?;
    rows.into_iter()
        .next()
        .ok_or_else(|| GroundError::not_found(kind.version_label(), id))
}

pub(crate) fn insert_members(
    session: Session<'_>,
    kind: ItemKind,
    version_id: VersionId,
    members: &[VersionId],
) -> Result<()> {
    let Some((table, version_column, member_column)) = kind.member_table() else {
        return Ok(());
    };
    for member in members {
        session.db.insert(
            table,
            &[
                (version_column, Value::from(version_id)),
                (member_column, Value::from(*member)),
            ],
        )?;
    }
    Ok(())
}

/// Member edge versions of a graph-like version, ascending.
pub(crate) fn members(
    session: Session<'_>,
    kind: ItemKind,
    version_id: VersionId,
) -> Result<Vec<VersionId>> {
    let Some((table, version_column, member_column)) = kind.member_table() else {
        return Ok(Vec::new());
    };
    let rows = session.db.equality_select(
        table,
        &[member_column],
        &[(version_column, Value::from(version_id))],
    )?;
    let mut ids = rows
        .iter()
        .map(|row| row.get_u64(member_column))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    ids.sort_unstable();
    Ok(ids)
}

/// Fails with NotFound unless every id in `ids` is a version of `kind`.
pub(crate) fn require_versions(
    session: Session<'_>,
    kind: ItemKind,
    ids: &[VersionId],
) -> Result<()> {
    for id in ids {
        version_row(session, kind, *id)?;
    }
    Ok(())
}
