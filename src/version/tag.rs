use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Session;
use crate::error::{GroundError, Result};
use crate::storage::schema::{ITEM_TAG, RICH_VERSION_TAG};
use crate::storage::{Row, Value};

/// Declared type of a tag value or structure attribute.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundType {
    /// UTF-8 text.
    String,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Long,
    /// `true` or `false`.
    Boolean,
}

impl GroundType {
    /// Lowercase name, as persisted and accepted by `FromStr`.
    pub const fn as_str(self) -> &'static str {
        match self {
            GroundType::String => "string",
            GroundType::Integer => "integer",
            GroundType::Long => "long",
            GroundType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for GroundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroundType {
    type Err = GroundError;

    fn from_str(value: &str) -> Result<Self> {
        [
            GroundType::String,
            GroundType::Integer,
            GroundType::Long,
            GroundType::Boolean,
        ]
        .into_iter()
        .find(|ty| ty.as_str().eq_ignore_ascii_case(value))
        .ok_or_else(|| GroundError::InvalidArgument(format!("unknown value type: {value}")))
    }
}

/// Typed tag payload. The variant carries the value type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TagValue {
    /// Text value.
    String(String),
    /// 32-bit value.
    Integer(i32),
    /// 64-bit value.
    Long(i64),
    /// Boolean value.
    Boolean(bool),
}

impl TagValue {
    /// Type carried by this value.
    pub fn value_type(&self) -> GroundType {
        match self {
            TagValue::String(_) => GroundType::String,
            TagValue::Integer(_) => GroundType::Integer,
            TagValue::Long(_) => GroundType::Long,
            TagValue::Boolean(_) => GroundType::Boolean,
        }
    }

    /// Parses the textual form of a value of type `ty`.
    pub fn parse(ty: GroundType, text: &str) -> Result<Self> {
        let invalid = || GroundError::InvalidArgument(format!("{text:?} is not a valid {ty}"));
        Ok(match ty {
            GroundType::String => TagValue::String(text.to_string()),
            GroundType::Integer => TagValue::Integer(text.trim().parse().map_err(|_| invalid())?),
            GroundType::Long => TagValue::Long(text.trim().parse().map_err(|_| invalid())?),
            GroundType::Boolean => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") {
                    TagValue::Boolean(true)
                } else if text.eq_ignore_ascii_case("false") {
                    TagValue::Boolean(false)
                } else {
                    return Err(invalid());
                }
            }
        })
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::String(v) => f.write_str(v),
            TagValue::Integer(v) => write!(f, "{v}"),
            TagValue::Long(v) => write!(f, "{v}"),
            TagValue::Boolean(v) => write!(f, "{v}"),
        }
    }
}

/// Key/value annotation attached to an item or a rich version.
///
/// Equality and hashing consider only the key and value; two tags with the
/// same content on different owners compare equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tag {
    /// Item or rich version the tag is attached to; `0` when unbound.
    #[serde(default)]
    pub owner_id: u64,
    /// Tag name, unique per owner.
    pub key: String,
    /// Typed value; `None` for a bare label.
    pub value: Option<TagValue>,
}

impl Tag {
    /// Tag bound to `owner_id`.
    pub fn new(owner_id: u64, key: impl Into<String>, value: Option<TagValue>) -> Self {
        Self {
            owner_id,
            key: key.into(),
            value,
        }
    }

    /// Tag not yet bound to an owner; the owner is assigned on insert.
    pub fn unbound(key: impl Into<String>, value: Option<TagValue>) -> Self {
        Self::new(0, key, value)
    }

    /// Type of the value, if any.
    pub fn value_type(&self) -> Option<GroundType> {
        self.value.as_ref().map(TagValue::value_type)
    }

    fn bound_to(&self, owner_id: u64) -> Self {
        Self {
            owner_id,
            ..self.clone()
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.value.hash(state);
    }
}

#[derive(Copy, Clone)]
enum Owner {
    Item,
    RichVersion,
}

impl Owner {
    const fn table(self) -> &'static str {
        match self {
            Owner::Item => ITEM_TAG,
            Owner::RichVersion => RICH_VERSION_TAG,
        }
    }

    const fn column(self) -> &'static str {
        match self {
            Owner::Item => "item_id",
            Owner::RichVersion => "rich_version_id",
        }
    }
}

/// Persists `tags` against item `item_id` and returns them bound to it.
pub fn insert_item_tags(session: Session<'_>, item_id: u64, tags: &[Tag]) -> Result<Vec<Tag>> {
    insert(session, Owner::Item, item_id, tags)
}

/// Persists `tags` against rich version `version_id` and returns them bound to it.
pub fn insert_version_tags(
    session: Session<'_>,
    version_id: u64,
    tags: &[Tag],
) -> Result<Vec<Tag>> {
    insert(session, Owner::RichVersion, version_id, tags)
}

/// Tags of item `item_id`, sorted by key.
pub fn retrieve_item_tags(session: Session<'_>, item_id: u64) -> Result<Vec<Tag>> {
    retrieve(session, Owner::Item, item_id)
}

/// Tags of rich version `version_id`, sorted by key.
pub fn retrieve_version_tags(session: Session<'_>, version_id: u64) -> Result<Vec<Tag>> {
    retrieve(session, Owner::RichVersion, version_id)
}

/// Ids of every item carrying a tag named `key`, ascending.
pub fn item_ids_by_tag(session: Session<'_>, key: &str) -> Result<Vec<u64>> {
    owners_by_key(session, Owner::Item, key)
}

/// Ids of every rich version carrying a tag named `key`, ascending.
pub fn version_ids_by_tag(session: Session<'_>, key: &str) -> Result<Vec<u64>> {
    owners_by_key(session, Owner::RichVersion, key)
}

pub(crate) fn delete_version_tags(session: Session<'_>, version_id: u64) -> Result<()> {
    session.db.delete(
        &[(Owner::RichVersion.column(), Value::from(version_id))],
        RICH_VERSION_TAG,
    )?;
    Ok(())
}

/// Rejects a tag set that names the same key twice. Callers run this before
/// their first write.
pub(crate) fn check_unique_keys(tags: &[Tag]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for tag in tags {
        if !seen.insert(tag.key.as_str()) {
            return Err(GroundError::InvalidArgument(format!(
                "duplicate tag key: {}",
                tag.key
            )));
        }
    }
    Ok(())
}

fn insert(session: Session<'_>, owner: Owner, owner_id: u64, tags: &[Tag]) -> Result<Vec<Tag>> {
    check_unique_keys(tags)?;
    let mut bound = Vec::with_capacity(tags.len());
    for tag in tags {
        let (value, ty) = match &tag.value {
            Some(value) => (
                Value::Text(value.to_string()),
                Value::from(value.value_type().as_str()),
            ),
            None => (Value::Null, Value::Null),
        };
        session.db.insert(
            owner.table(),
            &[
                (owner.column(), Value::from(owner_id)),
                ("key", Value::from(tag.key.as_str())),
                ("value", value),
                ("type", ty),
            ],
        )?;
        bound.push(tag.bound_to(owner_id));
    }
    bound.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(bound)
}

fn retrieve(session: Session<'_>, owner: Owner, owner_id: u64) -> Result<Vec<Tag>> {
    let rows = session.db.equality_select(
        owner.table(),
        &["key", "value", "type"],
        &[(owner.column(), Value::from(owner_id))],
    )?;
    let mut tags = rows
        .iter()
        .map(|row| tag_from_row(owner_id, row))
        .collect::<Result<Vec<_>>>()?;
    tags.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(tags)
}

fn tag_from_row(owner_id: u64, row: &Row) -> Result<Tag> {
    let key = row.get_str("key")?;
    let value = match (row.get_opt_str("type")?, row.get_opt_str("value")?) {
        (Some(ty), Some(text)) => Some(TagValue::parse(ty.parse::<GroundType>()?, text)?),
        _ => None,
    };
    Ok(Tag::new(owner_id, key, value))
}

fn owners_by_key(session: Session<'_>, owner: Owner, key: &str) -> Result<Vec<u64>> {
    let rows = session.db.equality_select(
        owner.table(),
        &[owner.column()],
        &[("key", Value::from(key))],
    )?;
    let mut ids = rows
        .iter()
        .map(|row| row.get_u64(owner.column()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}
