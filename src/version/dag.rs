use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::successor::{self, VersionSuccessor};
use super::{purge_version, Session};
use crate::error::Result;
use crate::model::{ItemId, ItemKind, SuccessorId, VersionId, ROOT_VERSION_ID};
use crate::storage::schema::{RETIRED_ID, VERSION_HISTORY_DAG};
use crate::storage::Value;

/// Version history of one item, as the set of its successor edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistoryDag {
    item_id: ItemId,
    edges: Vec<VersionSuccessor>,
}

impl VersionHistoryDag {
    /// Empty history for `item_id`.
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            edges: Vec::new(),
        }
    }

    /// Item this history belongs to.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// Edges in creation order.
    pub fn edges(&self) -> &[VersionSuccessor] {
        &self.edges
    }

    /// Whether the item has no versions yet.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether `id` is a version of this history. The sentinel never is.
    pub fn contains(&self, id: VersionId) -> bool {
        id != ROOT_VERSION_ID && self.edges.iter().any(|edge| edge.to_id == id)
    }

    /// All version ids in the history, ascending.
    pub fn version_ids(&self) -> Vec<VersionId> {
        self.edges
            .iter()
            .map(|edge| edge.to_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Current heads: versions that are not the parent of any other version.
    pub fn leaves(&self) -> Vec<VersionId> {
        let parents: HashSet<VersionId> = self.edges.iter().map(|edge| edge.from_id).collect();
        self.version_ids()
            .into_iter()
            .filter(|id| !parents.contains(id))
            .collect()
    }

    /// Sources of every edge into `id`, in edge creation order. May include `0`.
    pub fn parents(&self, id: VersionId) -> Vec<VersionId> {
        let mut parents = Vec::new();
        for edge in self.edges.iter().filter(|edge| edge.to_id == id) {
            if !parents.contains(&edge.from_id) {
                parents.push(edge.from_id);
            }
        }
        parents
    }

    fn push(&mut self, edge: VersionSuccessor) {
        self.edges.push(edge);
    }

    fn forget(&mut self, removed: &HashSet<SuccessorId>) {
        self.edges.retain(|edge| !removed.contains(&edge.id));
    }
}

/// Outcome of [`truncate`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TruncationReport {
    /// Item whose history was truncated.
    pub item_id: ItemId,
    /// Versions removed with all their rows, ascending.
    pub deleted_versions: Vec<VersionId>,
    /// Boundary versions that received a synthetic `0 -> id` edge, ascending.
    pub rerooted_versions: Vec<VersionId>,
    /// Versions kept, ascending.
    pub retained_versions: Vec<VersionId>,
}

/// Loads the persisted history of `item_id`. An item without versions yields
/// an empty DAG.
pub fn retrieve(session: Session<'_>, item_id: ItemId) -> Result<VersionHistoryDag> {
    let rows = session.db.equality_select(
        VERSION_HISTORY_DAG,
        &["version_successor_id"],
        &[("item_id", Value::from(item_id))],
    )?;
    let mut dag = VersionHistoryDag::new(item_id);
    for row in &rows {
        let successor_id = row.get_u64("version_successor_id")?;
        dag.push(successor::retrieve(session, successor_id)?);
    }
    dag.edges.sort_by_key(|edge| edge.id);
    Ok(dag)
}

/// Persists a `parent -> child` edge and its index row, then records it in
/// `dag`. Nothing is undone here on failure.
pub fn add_edge(
    session: Session<'_>,
    dag: &mut VersionHistoryDag,
    parent: VersionId,
    child: VersionId,
) -> Result<VersionSuccessor> {
    let edge = successor::instantiate(session, parent, child)?;
    session.db.insert(
        VERSION_HISTORY_DAG,
        &[
            ("item_id", Value::from(dag.item_id)),
            ("version_successor_id", Value::from(edge.id)),
        ],
    )?;
    dag.push(edge);
    debug!(
        item_id = dag.item_id,
        parent, child, "ground.dag.edge_added"
    );
    Ok(edge)
}

fn remove_edge(session: Session<'_>, item_id: ItemId, edge: &VersionSuccessor) -> Result<()> {
    session.db.delete(
        &[
            ("item_id", Value::from(item_id)),
            ("version_successor_id", Value::from(edge.id)),
        ],
        VERSION_HISTORY_DAG,
    )?;
    successor::delete(session, edge.id)
}

/// Keeps the newest `num_levels` levels of history and deletes the rest.
///
/// Level 1 is the current leaves, level `k + 1` the parents of level `k`.
/// Versions in the oldest kept level lose their edges from deleted versions
/// and are re-rooted with a `0 -> id` edge when no kept parent remains.
/// Everything older is removed together with its kind-specific rows.
/// `num_levels == 0` removes the whole history. When anything is removed,
/// the largest id the history held is recorded in `retired_id` so a
/// reopened catalog never hands it out again.
pub fn truncate(
    session: Session<'_>,
    dag: &mut VersionHistoryDag,
    num_levels: usize,
    kind: ItemKind,
) -> Result<TruncationReport> {
    let item_id = dag.item_id;
    let high_water = dag
        .edges
        .iter()
        .flat_map(|edge| [edge.id, edge.to_id])
        .max();
    let mut retained: BTreeSet<VersionId> = BTreeSet::new();
    let mut previous_level: Vec<VersionId> = dag.leaves();
    let mut last_level: Vec<VersionId> = Vec::new();

    let mut kept_levels = 1;
    while kept_levels <= num_levels && !previous_level.is_empty() {
        retained.extend(previous_level.iter().copied());
        let mut current_level = Vec::new();
        for id in &previous_level {
            for parent in dag.parents(*id) {
                if parent != ROOT_VERSION_ID && !current_level.contains(&parent) {
                    current_level.push(parent);
                }
            }
        }
        last_level = std::mem::replace(&mut previous_level, current_level);
        kept_levels += 1;
    }

    let mut removed_edges = HashSet::new();
    let mut rerooted = Vec::new();
    for id in &last_level {
        let mut has_kept_parent = false;
        for edge in dag.edges.iter().filter(|edge| edge.to_id == *id) {
            if edge.is_root() || retained.contains(&edge.from_id) {
                has_kept_parent = true;
            } else {
                remove_edge(session, item_id, edge)?;
                removed_edges.insert(edge.id);
            }
        }
        dag.forget(&removed_edges);
        if !has_kept_parent {
            add_edge(session, dag, ROOT_VERSION_ID, *id)?;
            rerooted.push(*id);
        }
    }

    let mut deleted: BTreeSet<VersionId> = BTreeSet::new();
    let mut queue: VecDeque<VersionId> = previous_level.into_iter().collect();
    while let Some(id) = queue.pop_front() {
        if id == ROOT_VERSION_ID || retained.contains(&id) || !deleted.insert(id) {
            continue;
        }
        purge_version(session, kind, id)?;
        for edge in dag.edges.iter().filter(|edge| edge.to_id == id) {
            remove_edge(session, item_id, edge)?;
            removed_edges.insert(edge.id);
            queue.push_back(edge.from_id);
        }
    }
    dag.forget(&removed_edges);
    if let Some(high_water) = high_water.filter(|_| !removed_edges.is_empty()) {
        session
            .db
            .insert(RETIRED_ID, &[("id", Value::from(high_water))])?;
    }

    rerooted.sort_unstable();
    let report = TruncationReport {
        item_id,
        deleted_versions: deleted.into_iter().collect(),
        rerooted_versions: rerooted,
        retained_versions: retained.into_iter().collect(),
    };
    info!(
        item_id,
        kind = kind.as_str(),
        num_levels,
        deleted = report.deleted_versions.len(),
        rerooted = report.rerooted_versions.len(),
        "ground.dag.truncate.completed"
    );
    Ok(report)
}
