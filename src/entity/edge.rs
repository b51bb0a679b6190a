use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{create_rich_version, version_row};
use crate::error::Result;
use crate::model::{ItemId, ItemKind, VersionId, ROOT_VERSION_ID};
use crate::storage::{Row, Value};
use crate::version::item::{self, Item};
use crate::version::rich::{self, NewRichVersion, RichVersion};
use crate::version::tag::Tag;
use crate::version::{dag, Session};

/// Directed relationship between two nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Common item fields.
    #[serde(flatten)]
    pub item: Item,
    /// Source node.
    pub from_node_id: ItemId,
    /// Target node.
    pub to_node_id: ItemId,
}

/// Edge snapshot valid over a window of versions on each endpoint node.
///
/// An absent end id means the window is still open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeVersion {
    /// Rich version fields shared by every kind.
    #[serde(flatten)]
    pub version: RichVersion,
    /// Owning edge.
    pub edge_id: ItemId,
    /// First source node version the edge holds for.
    pub from_node_version_start_id: VersionId,
    /// Last source node version, or `None` while open.
    pub from_node_version_end_id: Option<VersionId>,
    /// First target node version the edge holds for.
    pub to_node_version_start_id: VersionId,
    /// Last target node version, or `None` while open.
    pub to_node_version_end_id: Option<VersionId>,
}

/// Caller-supplied fields of a new edge version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEdgeVersion {
    /// Tags, reference and structure of the new version.
    #[serde(flatten)]
    pub fields: NewRichVersion,
    /// Start of the source window.
    pub from_node_version_start_id: VersionId,
    /// Explicit end of the source window; kept as given.
    #[serde(default)]
    pub from_node_version_end_id: Option<VersionId>,
    /// Start of the target window.
    pub to_node_version_start_id: VersionId,
    /// Explicit end of the target window; kept as given.
    #[serde(default)]
    pub to_node_version_end_id: Option<VersionId>,
}

/// Finds where an open endpoint window of a parent edge version ends.
pub trait EndpointWindowResolver {
    /// Version of `node_id` that precedes `start`, if any.
    fn preceding_version(&self, node_id: ItemId, start: VersionId) -> Result<Option<VersionId>>;
}

/// Resolves windows through the endpoint node's own version history, taking
/// the first recorded parent that is not the root sentinel.
#[derive(Clone, Copy)]
pub struct NodeHistoryResolver<'a> {
    session: Session<'a>,
}

impl<'a> NodeHistoryResolver<'a> {
    /// Resolver reading histories through `session`.
    pub fn new(session: Session<'a>) -> Self {
        Self { session }
    }
}

impl EndpointWindowResolver for NodeHistoryResolver<'_> {
    fn preceding_version(&self, node_id: ItemId, start: VersionId) -> Result<Option<VersionId>> {
        let history = dag::retrieve(self.session, node_id)?;
        Ok(history
            .parents(start)
            .into_iter()
            .find(|parent| *parent != ROOT_VERSION_ID))
    }
}

fn edge_from(item: Item, row: &Row) -> Result<Edge> {
    Ok(Edge {
        item,
        from_node_id: row.get_u64("from_node_id")?,
        to_node_id: row.get_u64("to_node_id")?,
    })
}

/// Creates an edge. Both endpoints must be existing nodes.
pub fn create(
    session: Session<'_>,
    name: &str,
    source_key: &str,
    from_node_id: ItemId,
    to_node_id: ItemId,
    tags: &[Tag],
) -> Result<Edge> {
    item::require_kind(session, from_node_id, ItemKind::Node)?;
    item::require_kind(session, to_node_id, ItemKind::Node)?;
    let item = item::create(
        session,
        ItemKind::Edge,
        name,
        source_key,
        tags,
        &[
            ("from_node_id", Value::from(from_node_id)),
            ("to_node_id", Value::from(to_node_id)),
        ],
    )?;
    Ok(Edge {
        item,
        from_node_id,
        to_node_id,
    })
}

/// Edge by id, with its endpoints.
pub fn retrieve(session: Session<'_>, id: ItemId) -> Result<Edge> {
    let (item, row) = item::load_by_id(session, ItemKind::Edge, id)?;
    edge_from(item, &row)
}

/// Edge by source key.
pub fn retrieve_by_source_key(session: Session<'_>, source_key: &str) -> Result<Edge> {
    let (item, row) = item::load_by_source_key(session, ItemKind::Edge, source_key)?;
    edge_from(item, &row)
}

/// Creates an edge version and closes the open endpoint windows of each
/// parent version.
pub fn create_version(
    session: Session<'_>,
    edge_id: ItemId,
    new: &NewEdgeVersion,
    parents: &[VersionId],
    resolver: &dyn EndpointWindowResolver,
) -> Result<EdgeVersion> {
    let edge = retrieve(session, edge_id)?;
    let version = create_rich_version(
        session,
        ItemKind::Edge,
        edge_id,
        &new.fields,
        &[
            (
                "from_node_version_start_id",
                Value::from(new.from_node_version_start_id),
            ),
            (
                "from_node_version_end_id",
                Value::from(new.from_node_version_end_id),
            ),
            (
                "to_node_version_start_id",
                Value::from(new.to_node_version_start_id),
            ),
            (
                "to_node_version_end_id",
                Value::from(new.to_node_version_end_id),
            ),
        ],
        parents,
    )?;

    let mut closed = Vec::with_capacity(parents.len());
    for parent in parents {
        if *parent != ROOT_VERSION_ID && !closed.contains(parent) {
            close_windows(session, &edge, *parent, new, resolver)?;
            closed.push(*parent);
        }
    }

    Ok(EdgeVersion {
        version,
        edge_id,
        from_node_version_start_id: new.from_node_version_start_id,
        from_node_version_end_id: new.from_node_version_end_id,
        to_node_version_start_id: new.to_node_version_start_id,
        to_node_version_end_id: new.to_node_version_end_id,
    })
}

fn close_windows(
    session: Session<'_>,
    edge: &Edge,
    parent_id: VersionId,
    child: &NewEdgeVersion,
    resolver: &dyn EndpointWindowResolver,
) -> Result<()> {
    let parent = version_row(session, ItemKind::Edge, parent_id)?;
    let mut set = Vec::new();
    if parent.get_opt_u64("from_node_version_end_id")?.is_none() {
        if let Some(end) =
            resolver.preceding_version(edge.from_node_id, child.from_node_version_start_id)?
        {
            set.push(("from_node_version_end_id", Value::from(end)));
        }
    }
    if parent.get_opt_u64("to_node_version_end_id")?.is_none() {
        if let Some(end) =
            resolver.preceding_version(edge.to_node_id, child.to_node_version_start_id)?
        {
            set.push(("to_node_version_end_id", Value::from(end)));
        }
    }
    if set.is_empty() {
        return Ok(());
    }
    session.db.update(
        &set,
        &[("id", Value::from(parent_id))],
        ItemKind::Edge.version_table(),
    )?;
    debug!(
        edge_id = edge.item.id,
        parent_id,
        closed = set.len(),
        "ground.edge_version.window_closed"
    );
    Ok(())
}

/// Edge version by id, with its current window ends.
pub fn retrieve_version(session: Session<'_>, id: VersionId) -> Result<EdgeVersion> {
    let row = version_row(session, ItemKind::Edge, id)?;
    Ok(EdgeVersion {
        version: rich::retrieve(session, id)?,
        edge_id: row.get_u64("edge_id")?,
        from_node_version_start_id: row.get_u64("from_node_version_start_id")?,
        from_node_version_end_id: row.get_opt_u64("from_node_version_end_id")?,
        to_node_version_start_id: row.get_u64("to_node_version_start_id")?,
        to_node_version_end_id: row.get_opt_u64("to_node_version_end_id")?,
    })
}
