use serde::{Deserialize, Serialize};

use super::{create_rich_version, insert_members, members, require_versions, version_row};
use crate::error::Result;
use crate::model::{ItemId, ItemKind, VersionId};
use crate::version::item::{self, Item};
use crate::version::rich::{self, NewRichVersion, RichVersion};
use crate::version::tag::Tag;
use crate::version::Session;

/// Named collection of edges.
pub type Graph = Item;

/// Graph snapshot listing the edge versions it groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphVersion {
    /// Rich version fields.
    #[serde(flatten)]
    pub version: RichVersion,
    /// Owning graph.
    pub graph_id: ItemId,
    /// Member edge versions, ascending.
    pub edge_version_ids: Vec<VersionId>,
}

/// Creates a graph item.
pub fn create(session: Session<'_>, name: &str, source_key: &str, tags: &[Tag]) -> Result<Graph> {
    item::create(session, ItemKind::Graph, name, source_key, tags, &[])
}

/// Graph by id.
pub fn retrieve(session: Session<'_>, id: ItemId) -> Result<Graph> {
    item::retrieve(session, ItemKind::Graph, id)
}

/// Graph by source key.
pub fn retrieve_by_source_key(session: Session<'_>, source_key: &str) -> Result<Graph> {
    item::retrieve_by_source_key(session, ItemKind::Graph, source_key)
}

/// Creates a graph version over `edge_version_ids`, each of which must exist.
pub fn create_version(
    session: Session<'_>,
    graph_id: ItemId,
    fields: &NewRichVersion,
    edge_version_ids: &[VersionId],
    parents: &[VersionId],
) -> Result<GraphVersion> {
    let mut edge_version_ids = edge_version_ids.to_vec();
    edge_version_ids.sort_unstable();
    edge_version_ids.dedup();
    require_versions(session, ItemKind::Edge, &edge_version_ids)?;

    let version = create_rich_version(session, ItemKind::Graph, graph_id, fields, &[], parents)?;
    insert_members(session, ItemKind::Graph, version.id, &edge_version_ids)?;
    Ok(GraphVersion {
        version,
        graph_id,
        edge_version_ids,
    })
}

/// Graph version by id, with its members.
pub fn retrieve_version(session: Session<'_>, id: VersionId) -> Result<GraphVersion> {
    let row = version_row(session, ItemKind::Graph, id)?;
    Ok(GraphVersion {
        version: rich::retrieve(session, id)?,
        graph_id: row.get_u64("graph_id")?,
        edge_version_ids: members(session, ItemKind::Graph, id)?,
    })
}
