use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::structure;
use super::tag::{self, Tag};
use super::{insert_base_version, Session};
use crate::error::{GroundError, Result};
use crate::model::VersionId;
use crate::storage::schema::{RICH_VERSION, RICH_VERSION_EXTERNAL_PARAMETER};
use crate::storage::Value;

/// Immutable snapshot carrying tags, an optional external reference and an
/// optional structure conformance requirement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichVersion {
    /// Version id.
    pub id: VersionId,
    /// Tags bound to this version, sorted by key.
    pub tags: Vec<Tag>,
    /// Structure version the tags conform to.
    pub structure_version_id: Option<VersionId>,
    /// External location of the data, such as a URL.
    pub reference: Option<String>,
    /// Access parameters for `reference`.
    pub reference_parameters: BTreeMap<String, String>,
}

/// Caller-supplied fields of a rich version about to be created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRichVersion {
    /// Tags to attach; keys must be unique.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Structure version the tags must conform to.
    #[serde(default)]
    pub structure_version_id: Option<VersionId>,
    /// External reference.
    #[serde(default)]
    pub reference: Option<String>,
    /// Parameters for the external reference.
    #[serde(default)]
    pub reference_parameters: BTreeMap<String, String>,
}

impl NewRichVersion {
    /// Fields carrying only `tags`.
    pub fn with_tags(tags: Vec<Tag>) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }
}

/// Validates tag keys and, if a structure version is set, conformance; only
/// then writes the base version, the rich version row, parameters and tags.
pub fn insert(session: Session<'_>, id: VersionId, fields: &NewRichVersion) -> Result<RichVersion> {
    tag::check_unique_keys(&fields.tags)?;
    if let Some(structure_version_id) = fields.structure_version_id {
        structure::retrieve(session, structure_version_id)?.check_conformance(&fields.tags)?;
    }

    insert_base_version(session, id)?;
    session.db.insert(
        RICH_VERSION,
        &[
            ("id", Value::from(id)),
            (
                "structure_version_id",
                Value::from(fields.structure_version_id),
            ),
            ("reference", Value::from(fields.reference.clone())),
        ],
    )?;
    for (key, value) in &fields.reference_parameters {
        session.db.insert(
            RICH_VERSION_EXTERNAL_PARAMETER,
            &[
                ("rich_version_id", Value::from(id)),
                ("key", Value::from(key.as_str())),
                ("value", Value::from(value.as_str())),
            ],
        )?;
    }
    let tags = tag::insert_version_tags(session, id, &fields.tags)?;
    debug!(
        version_id = id,
        tags = tags.len(),
        structured = fields.structure_version_id.is_some(),
        "ground.rich_version.inserted"
    );

    Ok(RichVersion {
        id,
        tags,
        structure_version_id: fields.structure_version_id,
        reference: fields.reference.clone(),
        reference_parameters: fields.reference_parameters.clone(),
    })
}

/// Rich version by id, with tags and parameters.
pub fn retrieve(session: Session<'_>, id: VersionId) -> Result<RichVersion> {
    let rows = session.db.equality_select(
        RICH_VERSION,
        &["structure_version_id", "reference"],
        &[("id", Value::from(id))],
    )?;
    let Some(row) = rows.first() else {
        return Err(GroundError::not_found("RichVersion", id));
    };
    let structure_version_id = row.get_opt_u64("structure_version_id")?;
    let reference = row.get_opt_str("reference")?.map(str::to_string);

    let rows = session.db.equality_select(
        RICH_VERSION_EXTERNAL_PARAMETER,
        &["key", "value"],
        &[("rich_version_id", Value::from(id))],
    )?;
    let mut reference_parameters = BTreeMap::new();
    for row in &rows {
        reference_parameters.insert(
            row.get_str("key")?.to_string(),
            row.get_str("value")?.to_string(),
        );
    }

    Ok(RichVersion {
        id,
        tags: tag::retrieve_version_tags(session, id)?,
        structure_version_id,
        reference,
        reference_parameters,
    })
}

/// Whether a rich version row exists for `id`.
pub fn exists(session: Session<'_>, id: VersionId) -> Result<bool> {
    let rows = session
        .db
        .equality_select(RICH_VERSION, &["id"], &[("id", Value::from(id))])?;
    Ok(!rows.is_empty())
}

/// Removes the rich version row with its tags and parameters. The base
/// version row is left to the caller.
pub(crate) fn delete(session: Session<'_>, id: VersionId) -> Result<()> {
    tag::delete_version_tags(session, id)?;
    session.db.delete(
        &[("rich_version_id", Value::from(id))],
        RICH_VERSION_EXTERNAL_PARAMETER,
    )?;
    session.db.delete(&[("id", Value::from(id))], RICH_VERSION)?;
    Ok(())
}
