use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::dag::{self, TruncationReport, VersionHistoryDag};
use super::tag::{self, Tag};
use super::Session;
use crate::error::{GroundError, Result};
use crate::model::{ItemId, ItemKind, VersionId, ROOT_VERSION_ID};
use crate::storage::schema::ITEM;
use crate::storage::{Column, Row, Value};

/// A versioned entity: a mutable pointer into an immutable history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique id, shared with the version id space.
    pub id: ItemId,
    /// Concrete family.
    pub kind: ItemKind,
    /// Display name.
    pub name: String,
    /// External key, unique per kind.
    pub source_key: String,
    /// Item tags, sorted by key.
    pub tags: Vec<Tag>,
}

/// Creates an item of `kind`. `attributes` are extra kind-specific columns.
///
/// Fails with [`GroundError::AlreadyExists`] when `source_key` is taken for
/// this kind.
pub fn create(
    session: Session<'_>,
    kind: ItemKind,
    name: &str,
    source_key: &str,
    tags: &[Tag],
    attributes: &[Column<'_>],
) -> Result<Item> {
    tag::check_unique_keys(tags)?;
    let taken = session.db.equality_select(
        kind.item_table(),
        &["item_id"],
        &[("source_key", Value::from(source_key))],
    )?;
    if !taken.is_empty() {
        return Err(GroundError::AlreadyExists {
            kind,
            source_key: source_key.to_string(),
        });
    }

    let id = session.ids.generate_item_id();
    session.db.insert(
        ITEM,
        &[("id", Value::from(id)), ("kind", Value::from(kind.as_str()))],
    )?;
    let mut columns: Vec<Column<'_>> = vec![
        ("item_id", Value::from(id)),
        ("source_key", Value::from(source_key)),
        ("name", Value::from(name)),
    ];
    columns.extend(attributes.iter().cloned());
    session.db.insert(kind.item_table(), &columns)?;
    let tags = tag::insert_item_tags(session, id, tags)?;

    info!(item_id = id, kind = kind.as_str(), source_key, "ground.item.created");
    Ok(Item {
        id,
        kind,
        name: name.to_string(),
        source_key: source_key.to_string(),
        tags,
    })
}

/// Loads an item of `kind` with its full kind-specific row.
pub(crate) fn load(
    session: Session<'_>,
    kind: ItemKind,
    predicate: Column<'_>,
) -> Result<Option<(Item, Row)>> {
    let rows = session
        .db
        .equality_select(kind.item_table(), &[], &[predicate])?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    let id = row.get_u64("item_id")?;
    let item = Item {
        id,
        kind,
        name: row.get_str("name")?.to_string(),
        source_key: row.get_str("source_key")?.to_string(),
        tags: tag::retrieve_item_tags(session, id)?,
    };
    Ok(Some((item, row)))
}

pub(crate) fn load_by_id(session: Session<'_>, kind: ItemKind, id: ItemId) -> Result<(Item, Row)> {
    load(session, kind, ("item_id", Value::from(id)))?
        .ok_or_else(|| GroundError::not_found(kind.item_label(), id))
}

pub(crate) fn load_by_source_key(
    session: Session<'_>,
    kind: ItemKind,
    source_key: &str,
) -> Result<(Item, Row)> {
    load(session, kind, ("source_key", Value::from(source_key)))?
        .ok_or_else(|| GroundError::not_found_by_key(kind.item_label(), source_key))
}

/// Item of `kind` by id.
pub fn retrieve(session: Session<'_>, kind: ItemKind, id: ItemId) -> Result<Item> {
    load_by_id(session, kind, id).map(|(item, _)| item)
}

/// Item of `kind` by source key.
pub fn retrieve_by_source_key(
    session: Session<'_>,
    kind: ItemKind,
    source_key: &str,
) -> Result<Item> {
    load_by_source_key(session, kind, source_key).map(|(item, _)| item)
}

/// Kind recorded for item `id`.
pub fn kind_of(session: Session<'_>, id: ItemId) -> Result<ItemKind> {
    let rows = session
        .db
        .equality_select(ITEM, &["kind"], &[("id", Value::from(id))])?;
    match rows.first() {
        Some(row) => row.get_str("kind")?.parse(),
        None => Err(GroundError::not_found("Item", id)),
    }
}

/// Fails unless item `id` exists and is of `kind`.
pub(crate) fn require_kind(session: Session<'_>, id: ItemId, kind: ItemKind) -> Result<()> {
    match kind_of(session, id) {
        Ok(found) if found == kind => Ok(()),
        Ok(_) => Err(GroundError::not_found(kind.item_label(), id)),
        Err(err) if err.is_not_found() => Err(GroundError::not_found(kind.item_label(), id)),
        Err(err) => Err(err),
    }
}

/// Every declared parent must already be a version of this item.
pub(crate) fn check_parents(dag: &VersionHistoryDag, parents: &[VersionId]) -> Result<()> {
    for parent in parents {
        if *parent != ROOT_VERSION_ID && !dag.contains(*parent) {
            return Err(GroundError::sentinel(format!(
                "version {parent} is not part of the history of item {}",
                dag.item_id()
            )));
        }
    }
    Ok(())
}

fn check_child(dag: &VersionHistoryDag, child: VersionId) -> Result<()> {
    if child == ROOT_VERSION_ID {
        return Err(GroundError::sentinel(format!(
            "the root sentinel cannot be added to item {}",
            dag.item_id()
        )));
    }
    if dag.contains(child) {
        return Err(GroundError::sentinel(format!(
            "version {child} is already part of the history of item {}",
            dag.item_id()
        )));
    }
    Ok(())
}

/// Adds one edge per distinct parent, or a single root edge when `parents`
/// is empty.
pub(crate) fn link(
    session: Session<'_>,
    dag: &mut VersionHistoryDag,
    child: VersionId,
    parents: &[VersionId],
) -> Result<()> {
    if parents.is_empty() {
        dag::add_edge(session, dag, ROOT_VERSION_ID, child)?;
        return Ok(());
    }
    let mut linked = Vec::with_capacity(parents.len());
    for parent in parents {
        if !linked.contains(parent) {
            dag::add_edge(session, dag, *parent, child)?;
            linked.push(*parent);
        }
    }
    Ok(())
}

/// Records `child` as the newest version of `item_id`, succeeding every
/// version in `parents` (or the root sentinel when empty).
pub fn update(
    session: Session<'_>,
    item_id: ItemId,
    child: VersionId,
    parents: &[VersionId],
) -> Result<VersionHistoryDag> {
    let mut dag = dag::retrieve(session, item_id)?;
    check_child(&dag, child)?;
    check_parents(&dag, parents)?;
    link(session, &mut dag, child, parents)?;
    debug!(item_id, child, parents = parents.len(), "ground.item.updated");
    Ok(dag)
}

/// Current heads of the item's history.
pub fn leaves(session: Session<'_>, item_id: ItemId) -> Result<Vec<VersionId>> {
    Ok(dag::retrieve(session, item_id)?.leaves())
}

/// Keeps `num_levels` levels of history, deleting older versions with the
/// rows of the item's kind.
pub fn truncate(
    session: Session<'_>,
    item_id: ItemId,
    num_levels: usize,
) -> Result<TruncationReport> {
    let kind = kind_of(session, item_id)?;
    let mut dag = dag::retrieve(session, item_id)?;
    dag::truncate(session, &mut dag, num_levels, kind)
}
