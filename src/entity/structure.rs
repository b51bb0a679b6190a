use std::collections::BTreeMap;

use tracing::info;

use crate::error::Result;
use crate::model::{ItemId, ItemKind, VersionId};
use crate::version::item::{self, Item};
use crate::version::structure::{self, StructureVersion};
use crate::version::tag::{GroundType, Tag};
use crate::version::{dag, Session};

/// Named schema whose versions constrain rich version tags.
pub type Structure = Item;

/// Creates a structure item.
pub fn create(
    session: Session<'_>,
    name: &str,
    source_key: &str,
    tags: &[Tag],
) -> Result<Structure> {
    item::create(session, ItemKind::Structure, name, source_key, tags, &[])
}

/// Structure by id.
pub fn retrieve(session: Session<'_>, id: ItemId) -> Result<Structure> {
    item::retrieve(session, ItemKind::Structure, id)
}

/// Structure by source key.
pub fn retrieve_by_source_key(session: Session<'_>, source_key: &str) -> Result<Structure> {
    item::retrieve_by_source_key(session, ItemKind::Structure, source_key)
}

/// Creates a structure version declaring `attributes` and links it into the
/// structure's history.
pub fn create_version(
    session: Session<'_>,
    structure_id: ItemId,
    attributes: &BTreeMap<String, GroundType>,
    parents: &[VersionId],
) -> Result<StructureVersion> {
    item::require_kind(session, structure_id, ItemKind::Structure)?;
    let mut history = dag::retrieve(session, structure_id)?;
    item::check_parents(&history, parents)?;

    let id = session.ids.generate_version_id();
    let version = structure::insert(session, id, structure_id, attributes)?;
    item::link(session, &mut history, id, parents)?;
    info!(
        item_id = structure_id,
        version_id = id,
        kind = ItemKind::Structure.as_str(),
        attributes = attributes.len(),
        "ground.version.created"
    );
    Ok(version)
}

/// Structure version by id, with its attributes.
pub fn retrieve_version(session: Session<'_>, id: VersionId) -> Result<StructureVersion> {
    structure::retrieve(session, id)
}
