use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::tag::{GroundType, Tag};
use super::{insert_base_version, Session};
use crate::error::{GroundError, Result};
use crate::model::{ItemId, ItemKind, VersionId};
use crate::storage::schema::STRUCTURE_VERSION_ATTRIBUTE;
use crate::storage::Value;

/// Immutable schema: attribute key to required value type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureVersion {
    /// Version id.
    pub id: VersionId,
    /// Owning structure.
    pub structure_id: ItemId,
    /// Required tag keys and their types.
    pub attributes: BTreeMap<String, GroundType>,
}

impl StructureVersion {
    /// Checks that `tags` carry every attribute with the declared type.
    /// Tags for keys the structure does not mention are allowed.
    pub fn check_conformance(&self, tags: &[Tag]) -> Result<()> {
        for (key, expected) in &self.attributes {
            let Some(tag) = tags.iter().find(|tag| &tag.key == key) else {
                return Err(GroundError::Conformance(format!(
                    "missing tag {key:?} required by structure version {}",
                    self.id
                )));
            };
            match tag.value_type() {
                None => {
                    return Err(GroundError::Conformance(format!(
                        "tag {key:?} has no value but structure version {} requires {expected}",
                        self.id
                    )))
                }
                Some(actual) if actual != *expected => {
                    return Err(GroundError::Conformance(format!(
                        "tag {key:?} is {actual}, structure version {} requires {expected}",
                        self.id
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Writes the base version, the structure version row and its attributes.
pub fn insert(
    session: Session<'_>,
    id: VersionId,
    structure_id: ItemId,
    attributes: &BTreeMap<String, GroundType>,
) -> Result<StructureVersion> {
    insert_base_version(session, id)?;
    session.db.insert(
        ItemKind::Structure.version_table(),
        &[
            ("id", Value::from(id)),
            ("structure_id", Value::from(structure_id)),
        ],
    )?;
    for (key, ty) in attributes {
        session.db.insert(
            STRUCTURE_VERSION_ATTRIBUTE,
            &[
                ("structure_version_id", Value::from(id)),
                ("key", Value::from(key.as_str())),
                ("type", Value::from(ty.as_str())),
            ],
        )?;
    }
    Ok(StructureVersion {
        id,
        structure_id,
        attributes: attributes.clone(),
    })
}

/// Structure version by id.
pub fn retrieve(session: Session<'_>, id: VersionId) -> Result<StructureVersion> {
    let rows = session.db.equality_select(
        ItemKind::Structure.version_table(),
        &["structure_id"],
        &[("id", Value::from(id))],
    )?;
    let Some(row) = rows.first() else {
        return Err(GroundError::not_found("StructureVersion", id));
    };
    let structure_id = row.get_u64("structure_id")?;

    let rows = session.db.equality_select(
        STRUCTURE_VERSION_ATTRIBUTE,
        &["key", "type"],
        &[("structure_version_id", Value::from(id))],
    )?;
    let mut attributes = BTreeMap::new();
    for row in &rows {
        let ty = row.get_str("type")?.parse::<GroundType>()?;
        attributes.insert(row.get_str("key")?.to_string(), ty);
    }
    Ok(StructureVersion {
        id,
        structure_id,
        attributes,
    })
}

pub(crate) fn delete_attributes(session: Session<'_>, id: VersionId) -> Result<()> {
    session.db.delete(
        &[("structure_version_id", Value::from(id))],
        STRUCTURE_VERSION_ATTRIBUTE,
    )?;
    Ok(())
}
