use serde::{Deserialize, Serialize};

use super::{create_rich_version, insert_members, members, require_versions, version_row};
use crate::error::{GroundError, Result};
use crate::model::{ItemId, ItemKind, VersionId};
use crate::storage::Value;
use crate::version::item::{self, Item};
use crate::version::rich::{self, NewRichVersion, RichVersion};
use crate::version::tag::Tag;
use crate::version::Session;

/// Usage relationship between two arbitrary rich versions.
pub type LineageEdge = Item;

/// Named collection of lineage edges.
pub type LineageGraph = Item;

/// Lineage edge snapshot: `from_rich_version_id` was used to produce
/// `to_rich_version_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdgeVersion {
    /// Rich version fields.
    #[serde(flatten)]
    pub version: RichVersion,
    /// Owning lineage edge.
    pub lineage_edge_id: ItemId,
    /// Rich version that was consumed.
    pub from_rich_version_id: VersionId,
    /// Rich version that was produced.
    pub to_rich_version_id: VersionId,
}

/// Lineage graph snapshot listing the lineage edge versions it groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageGraphVersion {
    /// Rich version fields.
    #[serde(flatten)]
    pub version: RichVersion,
    /// Owning lineage graph.
    pub lineage_graph_id: ItemId,
    /// Member lineage edge versions, ascending.
    pub lineage_edge_version_ids: Vec<VersionId>,
}

/// Creates a lineage edge item.
pub fn create_edge(
    session: Session<'_>,
    name: &str,
    source_key: &str,
    tags: &[Tag],
) -> Result<LineageEdge> {
    item::create(session, ItemKind::LineageEdge, name, source_key, tags, &[])
}

/// Lineage edge by id.
pub fn retrieve_edge(session: Session<'_>, id: ItemId) -> Result<LineageEdge> {
    item::retrieve(session, ItemKind::LineageEdge, id)
}

/// Lineage edge by source key.
pub fn retrieve_edge_by_source_key(session: Session<'_>, source_key: &str) -> Result<LineageEdge> {
    item::retrieve_by_source_key(session, ItemKind::LineageEdge, source_key)
}

/// Records that `to_rich_version_id` was derived from `from_rich_version_id`.
pub fn create_edge_version(
    session: Session<'_>,
    lineage_edge_id: ItemId,
    fields: &NewRichVersion,
    from_rich_version_id: VersionId,
    to_rich_version_id: VersionId,
    parents: &[VersionId],
) -> Result<LineageEdgeVersion> {
    for id in [from_rich_version_id, to_rich_version_id] {
        if !rich::exists(session, id)? {
            return Err(GroundError::not_found("RichVersion", id));
        }
    }
    let version = create_rich_version(
        session,
        ItemKind::LineageEdge,
        lineage_edge_id,
        fields,
        &[
            ("from_rich_version_id", Value::from(from_rich_version_id)),
            ("to_rich_version_id", Value::from(to_rich_version_id)),
        ],
        parents,
    )?;
    Ok(LineageEdgeVersion {
        version,
        lineage_edge_id,
        from_rich_version_id,
        to_rich_version_id,
    })
}

/// Lineage edge version by id.
pub fn retrieve_edge_version(session: Session<'_>, id: VersionId) -> Result<LineageEdgeVersion> {
    let row = version_row(session, ItemKind::LineageEdge, id)?;
    Ok(LineageEdgeVersion {
        version: rich::retrieve(session, id)?,
        lineage_edge_id: row.get_u64("lineage_edge_id")?,
        from_rich_version_id: row.get_u64("from_rich_version_id")?,
        to_rich_version_id: row.get_u64("to_rich_version_id")?,
    })
}

/// Creates a lineage graph item.
pub fn create_graph(
    session: Session<'_>,
    name: &str,
    source_key: &str,
    tags: &[Tag],
) -> Result<LineageGraph> {
    item::create(session, ItemKind::LineageGraph, name, source_key, tags, &[])
}

/// Lineage graph by id.
pub fn retrieve_graph(session: Session<'_>, id: ItemId) -> Result<LineageGraph> {
    item::retrieve(session, ItemKind::LineageGraph, id)
}

/// Lineage graph by source key.
pub fn retrieve_graph_by_source_key(
    session: Session<'_>,
    source_key: &str,
) -> Result<LineageGraph> {
    item::retrieve_by_source_key(session, ItemKind::LineageGraph, source_key)
}

/// Creates a lineage graph version over existing lineage edge versions.
pub fn create_graph_version(
    session: Session<'_>,
    lineage_graph_id: ItemId,
    fields: &NewRichVersion,
    lineage_edge_version_ids: &[VersionId],
    parents: &[VersionId],
) -> Result<LineageGraphVersion> {
    let mut lineage_edge_version_ids = lineage_edge_version_ids.to_vec();
    lineage_edge_version_ids.sort_unstable();
    lineage_edge_version_ids.dedup();
    require_versions(session, ItemKind::LineageEdge, &lineage_edge_version_ids)?;

    let version = create_rich_version(
        session,
        ItemKind::LineageGraph,
        lineage_graph_id,
        fields,
        &[],
        parents,
    )?;
    insert_members(
        session,
        ItemKind::LineageGraph,
        version.id,
        &lineage_edge_version_ids,
    )?;
    Ok(LineageGraphVersion {
        version,
        lineage_graph_id,
        lineage_edge_version_ids,
    })
}

/// Lineage graph version by id, with its members.
pub fn retrieve_graph_version(session: Session<'_>, id: VersionId) -> Result<LineageGraphVersion> {
    let row = version_row(session, ItemKind::LineageGraph, id)?;
    Ok(LineageGraphVersion {
        version: rich::retrieve(session, id)?,
        lineage_graph_id: row.get_u64("lineage_graph_id")?,
        lineage_edge_version_ids: members(session, ItemKind::LineageGraph, id)?,
    })
}
