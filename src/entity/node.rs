use serde::{Deserialize, Serialize};

use super::{create_rich_version, version_row};
use crate::error::Result;
use crate::model::{ItemId, ItemKind, VersionId};
use crate::version::item::{self, Item};
use crate::version::rich::{self, NewRichVersion, RichVersion};
use crate::version::tag::Tag;
use crate::version::Session;

/// A dataset or other artifact tracked by the catalog.
pub type Node = Item;

/// Node snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVersion {
    /// Rich version fields.
    #[serde(flatten)]
    pub version: RichVersion,
    /// Owning node.
    pub node_id: ItemId,
}

/// Creates a node item.
pub fn create(session: Session<'_>, name: &str, source_key: &str, tags: &[Tag]) -> Result<Node> {
    item::create(session, ItemKind::Node, name, source_key, tags, &[])
}

/// Node by id.
pub fn retrieve(session: Session<'_>, id: ItemId) -> Result<Node> {
    item::retrieve(session, ItemKind::Node, id)
}

/// Node by source key.
pub fn retrieve_by_source_key(session: Session<'_>, source_key: &str) -> Result<Node> {
    item::retrieve_by_source_key(session, ItemKind::Node, source_key)
}

/// Creates a node version and links it under `parents`, or under the root
/// when `parents` is empty.
pub fn create_version(
    session: Session<'_>,
    node_id: ItemId,
    fields: &NewRichVersion,
    parents: &[VersionId],
) -> Result<NodeVersion> {
    let version = create_rich_version(session, ItemKind::Node, node_id, fields, &[], parents)?;
    Ok(NodeVersion { version, node_id })
}

/// Node version by id.
pub fn retrieve_version(session: Session<'_>, id: VersionId) -> Result<NodeVersion> {
    let row = version_row(session, ItemKind::Node, id)?;
    Ok(NodeVersion {
        version: rich::retrieve(session, id)?,
        node_id: row.get_u64("node_id")?,
    })
}
