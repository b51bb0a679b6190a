use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entity::edge::{self, Edge, EdgeVersion, NewEdgeVersion, NodeHistoryResolver};
use crate::entity::graph::{self, Graph, GraphVersion};
use crate::entity::lineage::{
    self, LineageEdge, LineageEdgeVersion, LineageGraph, LineageGraphVersion,
};
use crate::entity::node::{self, Node, NodeVersion};
use crate::entity::structure::{self, Structure};
use crate::error::Result;
use crate::ids::{IdGenerator, SequentialIdGenerator};
use crate::model::{ItemId, ItemKind, VersionId};
use crate::storage::{MemoryAdapter, PersistenceAdapter, SqliteAdapter};
use crate::version::dag::{self, TruncationReport, VersionHistoryDag};
use crate::version::item::{self, Item};
use crate::version::rich::NewRichVersion;
use crate::version::structure::StructureVersion;
use crate::version::tag::{self, GroundType, Tag};
use crate::version::Session;

/// Persistence backend selected by [`CatalogOptions`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Relational backend with real transactions.
    #[default]
    Sqlite,
    /// Process-local tables without rollback.
    Memory,
}

/// Options used when opening a [`Catalog`].
#[derive(Clone, Debug)]
pub struct CatalogOptions {
    /// Backend to open.
    pub backend: StorageBackend,
    /// SQLite database file; `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Identifier of this writer among `num_machines` concurrent writers.
    pub machine_id: u64,
    /// Number of writers sharing the id space.
    pub num_machines: u64,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: None,
            machine_id: 0,
            num_machines: 1,
        }
    }
}

/// Entry point bundling one persistence adapter with one id source.
///
/// Writes run inside [`Catalog::write`], which commits on success and aborts
/// on any error. Units of work are serialized, so a catalog can be shared
/// across threads without one caller's abort reaching another's rows.
pub struct Catalog {
    db: Arc<dyn PersistenceAdapter>,
    ids: Arc<dyn IdGenerator>,
    units: Mutex<()>,
}

impl Catalog {
    /// Wraps an adapter and an id source.
    pub fn new(db: Arc<dyn PersistenceAdapter>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            db,
            ids,
            units: Mutex::new(()),
        }
    }

    /// Opens the configured backend and resumes id allocation past every id
    /// already stored.
    pub fn open(options: &CatalogOptions) -> Result<Self> {
        let ids = SequentialIdGenerator::striped(options.machine_id, options.num_machines);
        let catalog = match options.backend {
            StorageBackend::Sqlite => {
                let db = match &options.path {
                    Some(path) => SqliteAdapter::open(path)?,
                    None => SqliteAdapter::open_in_memory()?,
                };
                let ids = ids.resume_after(db.max_id()?);
                Self::new(Arc::new(db), Arc::new(ids))
            }
            StorageBackend::Memory => Self::new(Arc::new(MemoryAdapter::new()), Arc::new(ids)),
        };
        info!(
            backend = catalog.db.name(),
            path = ?options.path,
            machine_id = options.machine_id,
            "ground.catalog.opened"
        );
        Ok(catalog)
    }

    /// Catalog over a fresh [`MemoryAdapter`].
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryAdapter::new()),
            Arc::new(SequentialIdGenerator::new()),
        )
    }

    /// Underlying persistence adapter.
    pub fn adapter(&self) -> &dyn PersistenceAdapter {
        self.db.as_ref()
    }

    /// Unguarded session over this catalog's adapter and id source.
    ///
    /// Nothing commits or aborts on its behalf; prefer [`Catalog::write`].
    pub fn session(&self) -> Session<'_> {
        Session::new(self.db.as_ref(), self.ids.as_ref())
    }

    /// Runs `op` as one unit of work: commit on `Ok`, abort on `Err`.
    ///
    /// Only one unit of work runs at a time; `op` must not call back into
    /// this catalog.
    pub fn write<T>(&self, op: impl FnOnce(Session<'_>) -> Result<T>) -> Result<T> {
        let _unit = self.units.lock();
        match op(self.session()).and_then(|value| {
            self.db.commit()?;
            Ok(value)
        }) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(backend = self.db.name(), error = %err, "ground.catalog.write_aborted");
                if let Err(abort_err) = self.db.abort() {
                    warn!(error = %abort_err, "ground.catalog.abort_failed");
                }
                Err(err)
            }
        }
    }

    fn read<T>(&self, op: impl FnOnce(Session<'_>) -> Result<T>) -> Result<T> {
        let _unit = self.units.lock();
        op(self.session())
    }

    /// Creates a node item.
    pub fn create_node(&self, name: &str, source_key: &str, tags: &[Tag]) -> Result<Node> {
        self.write(|s| node::create(s, name, source_key, tags))
    }

    /// Creates a node version whose history parents are `parents`.
    pub fn create_node_version(
        &self,
        node_id: ItemId,
        fields: &NewRichVersion,
        parents: &[VersionId],
    ) -> Result<NodeVersion> {
        self.write(|s| node::create_version(s, node_id, fields, parents))
    }

    /// Node by id.
    pub fn node(&self, id: ItemId) -> Result<Node> {
        self.read(|s| node::retrieve(s, id))
    }

    /// Node by its unique source key.
    pub fn node_by_source_key(&self, source_key: &str) -> Result<Node> {
        self.read(|s| node::retrieve_by_source_key(s, source_key))
    }

    /// Node version by id.
    pub fn node_version(&self, id: VersionId) -> Result<NodeVersion> {
        self.read(|s| node::retrieve_version(s, id))
    }

    /// Creates an edge between two existing nodes.
    pub fn create_edge(
        &self,
        name: &str,
        source_key: &str,
        from_node_id: ItemId,
        to_node_id: ItemId,
        tags: &[Tag],
    ) -> Result<Edge> {
        self.write(|s| edge::create(s, name, source_key, from_node_id, to_node_id, tags))
    }

    /// Creates an edge version, closing parent windows through the endpoint
    /// nodes' histories.
    pub fn create_edge_version(
        &self,
        edge_id: ItemId,
        new: &NewEdgeVersion,
        parents: &[VersionId],
    ) -> Result<EdgeVersion> {
        self.write(|s| edge::create_version(s, edge_id, new, parents, &NodeHistoryResolver::new(s)))
    }

    /// Edge by id.
    pub fn edge(&self, id: ItemId) -> Result<Edge> {
        self.read(|s| edge::retrieve(s, id))
    }

    /// Edge by its unique source key.
    pub fn edge_by_source_key(&self, source_key: &str) -> Result<Edge> {
        self.read(|s| edge::retrieve_by_source_key(s, source_key))
    }

    /// Edge version by id.
    pub fn edge_version(&self, id: VersionId) -> Result<EdgeVersion> {
        self.read(|s| edge::retrieve_version(s, id))
    }

    /// Creates a graph item.
    pub fn create_graph(&self, name: &str, source_key: &str, tags: &[Tag]) -> Result<Graph> {
        self.write(|s| graph::create(s, name, source_key, tags))
    }

    /// Creates a graph version over existing edge versions.
    pub fn create_graph_version(
        &self,
        graph_id: ItemId,
        fields: &NewRichVersion,
        edge_version_ids: &[VersionId],
        parents: &[VersionId],
    ) -> Result<GraphVersion> {
        self.write(|s| graph::create_version(s, graph_id, fields, edge_version_ids, parents))
    }

    /// Graph by id.
    pub fn graph(&self, id: ItemId) -> Result<Graph> {
        self.read(|s| graph::retrieve(s, id))
    }

    /// Graph by its unique source key.
    pub fn graph_by_source_key(&self, source_key: &str) -> Result<Graph> {
        self.read(|s| graph::retrieve_by_source_key(s, source_key))
    }

    /// Graph version by id.
    pub fn graph_version(&self, id: VersionId) -> Result<GraphVersion> {
        self.read(|s| graph::retrieve_version(s, id))
    }

    /// Creates a structure item.
    pub fn create_structure(
        &self,
        name: &str,
        source_key: &str,
        tags: &[Tag],
    ) -> Result<Structure> {
        self.write(|s| structure::create(s, name, source_key, tags))
    }

    /// Creates a structure version declaring `attributes`.
    pub fn create_structure_version(
        &self,
        structure_id: ItemId,
        attributes: &BTreeMap<String, GroundType>,
        parents: &[VersionId],
    ) -> Result<StructureVersion> {
        self.write(|s| structure::create_version(s, structure_id, attributes, parents))
    }

    /// Structure by id.
    pub fn structure(&self, id: ItemId) -> Result<Structure> {
        self.read(|s| structure::retrieve(s, id))
    }

    /// Structure by its unique source key.
    pub fn structure_by_source_key(&self, source_key: &str) -> Result<Structure> {
        self.read(|s| structure::retrieve_by_source_key(s, source_key))
    }

    /// Structure version by id.
    pub fn structure_version(&self, id: VersionId) -> Result<StructureVersion> {
        self.read(|s| structure::retrieve_version(s, id))
    }

    /// Creates a lineage edge item.
    pub fn create_lineage_edge(
        &self,
        name: &str,
        source_key: &str,
        tags: &[Tag],
    ) -> Result<LineageEdge> {
        self.write(|s| lineage::create_edge(s, name, source_key, tags))
    }

    /// Creates a lineage edge version linking two rich versions.
    pub fn create_lineage_edge_version(
        &self,
        lineage_edge_id: ItemId,
        fields: &NewRichVersion,
        from_rich_version_id: VersionId,
        to_rich_version_id: VersionId,
        parents: &[VersionId],
    ) -> Result<LineageEdgeVersion> {
        self.write(|s| {
            lineage::create_edge_version(
                s,
                lineage_edge_id,
                fields,
                from_rich_version_id,
                to_rich_version_id,
                parents,
            )
        })
    }

    /// Lineage edge by id.
    pub fn lineage_edge(&self, id: ItemId) -> Result<LineageEdge> {
        self.read(|s| lineage::retrieve_edge(s, id))
    }

    /// Lineage edge by its unique source key.
    pub fn lineage_edge_by_source_key(&self, source_key: &str) -> Result<LineageEdge> {
        self.read(|s| lineage::retrieve_edge_by_source_key(s, source_key))
    }

    /// Lineage edge version by id.
    pub fn lineage_edge_version(&self, id: VersionId) -> Result<LineageEdgeVersion> {
        self.read(|s| lineage::retrieve_edge_version(s, id))
    }

    /// Creates a lineage graph item.
    pub fn create_lineage_graph(
        &self,
        name: &str,
        source_key: &str,
        tags: &[Tag],
    ) -> Result<LineageGraph> {
        self.write(|s| lineage::create_graph(s, name, source_key, tags))
    }

    /// Creates a lineage graph version over existing lineage edge versions.
    pub fn create_lineage_graph_version(
        &self,
        lineage_graph_id: ItemId,
        fields: &NewRichVersion,
        lineage_edge_version_ids: &[VersionId],
        parents: &[VersionId],
    ) -> Result<LineageGraphVersion> {
        self.write(|s| {
            lineage::create_graph_version(
                s,
                lineage_graph_id,
                fields,
                lineage_edge_version_ids,
                parents,
            )
        })
    }

    /// Lineage graph by id.
    pub fn lineage_graph(&self, id: ItemId) -> Result<LineageGraph> {
        self.read(|s| lineage::retrieve_graph(s, id))
    }

    /// Lineage graph by its unique source key.
    pub fn lineage_graph_by_source_key(&self, source_key: &str) -> Result<LineageGraph> {
        self.read(|s| lineage::retrieve_graph_by_source_key(s, source_key))
    }

    /// Lineage graph version by id.
    pub fn lineage_graph_version(&self, id: VersionId) -> Result<LineageGraphVersion> {
        self.read(|s| lineage::retrieve_graph_version(s, id))
    }

    /// Any item by id, whatever its kind.
    pub fn item(&self, id: ItemId) -> Result<Item> {
        self.read(|s| {
            let kind = item::kind_of(s, id)?;
            item::retrieve(s, kind, id)
        })
    }

    /// Item of `kind` by its source key.
    pub fn item_by_source_key(&self, kind: ItemKind, source_key: &str) -> Result<Item> {
        self.read(|s| item::retrieve_by_source_key(s, kind, source_key))
    }

    /// Appends an existing version id to an item's history.
    pub fn update_item(
        &self,
        item_id: ItemId,
        child: VersionId,
        parents: &[VersionId],
    ) -> Result<VersionHistoryDag> {
        self.write(|s| {
            item::kind_of(s, item_id)?;
            item::update(s, item_id, child, parents)
        })
    }

    /// Versions of `item_id` with no children, ascending.
    pub fn leaves(&self, item_id: ItemId) -> Result<Vec<VersionId>> {
        self.read(|s| item::leaves(s, item_id))
    }

    /// Full version history of `item_id`.
    pub fn history(&self, item_id: ItemId) -> Result<VersionHistoryDag> {
        self.read(|s| dag::retrieve(s, item_id))
    }

    /// Keeps the newest `num_levels` levels of history and deletes the rest.
    pub fn truncate(&self, item_id: ItemId, num_levels: usize) -> Result<TruncationReport> {
        self.write(|s| item::truncate(s, item_id, num_levels))
    }

    /// Items carrying a tag named `key`.
    pub fn items_with_tag(&self, key: &str) -> Result<Vec<ItemId>> {
        self.read(|s| tag::item_ids_by_tag(s, key))
    }

    /// Rich versions carrying a tag named `key`.
    pub fn versions_with_tag(&self, key: &str) -> Result<Vec<VersionId>> {
        let ids = self.read(|s| tag::version_ids_by_tag(s, key))?;
        debug!(key, matches = ids.len(), "ground.tag.search");
        Ok(ids)
    }
}
