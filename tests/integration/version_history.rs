#![allow(missing_docs)]

use std::sync::Arc;

use ground::ids::SequentialIdGenerator;
use ground::storage::schema::{ITEM, RICH_VERSION, VERSION};
use ground::storage::{MemoryAdapter, TransactionCounters};
use ground::version::rich::NewRichVersion;
use ground::version::tag::{Tag, TagValue};
use ground::{Catalog, GroundError, ItemKind, Result, ROOT_VERSION_ID};

fn memory_catalog() -> (Arc<MemoryAdapter>, Catalog) {
    let db = Arc::new(MemoryAdapter::new());
    let catalog = Catalog::new(db.clone(), Arc::new(SequentialIdGenerator::new()));
    (db, catalog)
}

#[test]
fn single_version_is_the_only_leaf() -> Result<()> {
    let (_, catalog) = memory_catalog();
    let node = catalog.create_node("Orders", "orders", &[])?;
    assert!(catalog.leaves(node.id)?.is_empty());

    let v1 = catalog.create_node_version(node.id, &NewRichVersion::default(), &[])?;
    assert_eq!(catalog.leaves(node.id)?, vec![v1.version.id]);
    assert_eq!(
        catalog.history(node.id)?.parents(v1.version.id),
        vec![ROOT_VERSION_ID]
    );
    Ok(())
}

#[test]
fn branches_and_merges_update_leaves() -> Result<()> {
    let (_, catalog) = memory_catalog();
    let node = catalog.create_node("Orders", "orders", &[])?;
    let fields = NewRichVersion::default();
    let root = catalog.create_node_version(node.id, &fields, &[])?.version.id;
    let left = catalog.create_node_version(node.id, &fields, &[root])?.version.id;
    let right = catalog.create_node_version(node.id, &fields, &[root])?.version.id;

    let mut heads = vec![left, right];
    heads.sort_unstable();
    assert_eq!(catalog.leaves(node.id)?, heads);

    let merged = catalog
        .create_node_version(node.id, &fields, &[left, right])?
        .version
        .id;
    let history = catalog.history(node.id)?;
    assert_eq!(history.leaves(), vec![merged]);
    assert_eq!(history.parents(merged), vec![left, right]);
    assert_eq!(history.edges().len(), 5);
    Ok(())
}

#[test]
fn item_and_version_ids_share_one_space() -> Result<()> {
    let (_, catalog) = memory_catalog();
    let node = catalog.create_node("a", "a", &[])?;
    let version = catalog.create_node_version(node.id, &NewRichVersion::default(), &[])?;
    let graph = catalog.create_graph("g", "g", &[])?;
    let ids = [node.id, version.version.id, graph.id];
    assert!(ids.iter().all(|id| *id != ROOT_VERSION_ID));
    assert_ne!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
    Ok(())
}

#[test]
fn foreign_parent_is_rejected_and_aborted() -> Result<()> {
    let (db, catalog) = memory_catalog();
    let a = catalog.create_node("a", "a", &[])?;
    let b = catalog.create_node("b", "b", &[])?;
    let a1 = catalog.create_node_version(a.id, &NewRichVersion::default(), &[])?;

    let err = catalog
        .create_node_version(b.id, &NewRichVersion::default(), &[a1.version.id])
        .unwrap_err();
    assert!(matches!(err, GroundError::SentinelMisuse(_)));
    assert!(catalog.leaves(b.id)?.is_empty());
    assert_eq!(
        db.counters(),
        TransactionCounters {
            commits: 3,
            aborts: 1
        }
    );
    Ok(())
}

#[test]
fn update_item_links_existing_versions() -> Result<()> {
    let (_, catalog) = memory_catalog();
    let node = catalog.create_node("a", "a", &[])?;
    let v1 = catalog.create_node_version(node.id, &NewRichVersion::default(), &[])?;

    let history = catalog.update_item(node.id, 9_000, &[v1.version.id])?;
    assert_eq!(history.leaves(), vec![9_000]);

    let err = catalog.update_item(node.id, ROOT_VERSION_ID, &[]).unwrap_err();
    assert!(matches!(err, GroundError::SentinelMisuse(_)));
    let err = catalog.update_item(node.id, 9_000, &[]).unwrap_err();
    assert!(matches!(err, GroundError::SentinelMisuse(_)));
    Ok(())
}

#[test]
fn source_keys_are_unique_per_kind() -> Result<()> {
    let (_, catalog) = memory_catalog();
    catalog.create_node("orders", "orders", &[])?;
    let err = catalog.create_node("dup", "orders", &[]).unwrap_err();
    assert!(matches!(
        err,
        GroundError::AlreadyExists {
            kind: ItemKind::Node,
            ..
        }
    ));
    catalog.create_graph("orders", "orders", &[])?;
    assert_eq!(catalog.node_by_source_key("orders")?.name, "orders");
    assert!(catalog.node_by_source_key("missing").unwrap_err().is_not_found());
    Ok(())
}

#[test]
fn tag_search_finds_items_and_versions() -> Result<()> {
    let (_, catalog) = memory_catalog();
    let owner = Tag::unbound("owner", Some(TagValue::String("ops".into())));
    let node = catalog.create_node("a", "a", &[owner.clone()])?;
    let other = catalog.create_node("b", "b", &[])?;
    let version = catalog.create_node_version(
        other.id,
        &NewRichVersion::with_tags(vec![owner.clone()]),
        &[],
    )?;

    assert_eq!(catalog.items_with_tag("owner")?, vec![node.id]);
    assert_eq!(catalog.versions_with_tag("owner")?, vec![version.version.id]);
    assert!(catalog.items_with_tag("missing")?.is_empty());

    let stored = catalog.node(node.id)?;
    assert_eq!(stored.tags, vec![owner.clone()]);
    assert_eq!(stored.tags[0].owner_id, node.id);
    assert_eq!(catalog.node_version(version.version.id)?.version.tags, vec![owner]);
    Ok(())
}

#[test]
fn duplicate_tag_keys_are_rejected_before_any_row() -> Result<()> {
    let (db, catalog) = memory_catalog();
    let twice = vec![
        Tag::unbound("owner", Some(TagValue::String("ops".into()))),
        Tag::unbound("owner", Some(TagValue::String("dev".into()))),
    ];

    let err = catalog.create_node("orders", "orders", &twice).unwrap_err();
    assert!(matches!(err, GroundError::InvalidArgument(_)));
    assert_eq!(db.row_count(ITEM), 0);
    let node = catalog.create_node("orders", "orders", &[])?;

    let err = catalog
        .create_node_version(node.id, &NewRichVersion::with_tags(twice), &[])
        .unwrap_err();
    assert!(matches!(err, GroundError::InvalidArgument(_)));
    assert_eq!(db.row_count(VERSION), 0);
    assert_eq!(db.row_count(RICH_VERSION), 0);
    assert!(catalog.history(node.id)?.is_empty());
    Ok(())
}
