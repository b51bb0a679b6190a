#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use ground::entity::edge::NewEdgeVersion;
use ground::ids::SequentialIdGenerator;
use ground::storage::schema::{
    RICH_VERSION, RICH_VERSION_TAG, STRUCTURE_VERSION_ATTRIBUTE, VERSION, VERSION_HISTORY_DAG,
    VERSION_SUCCESSOR,
};
use ground::storage::MemoryAdapter;
use ground::version::rich::NewRichVersion;
use ground::version::tag::{GroundType, Tag, TagValue};
use ground::{Catalog, ItemId, Result, VersionId, ROOT_VERSION_ID};

fn memory_catalog() -> (Arc<MemoryAdapter>, Catalog) {
    let db = Arc::new(MemoryAdapter::new());
    let catalog = Catalog::new(db.clone(), Arc::new(SequentialIdGenerator::new()));
    (db, catalog)
}

fn tagged() -> NewRichVersion {
    let mut fields =
        NewRichVersion::with_tags(vec![Tag::unbound("rows", Some(TagValue::Long(1)))]);
    fields.reference = Some("s3://bucket/orders".into());
    fields.reference_parameters = BTreeMap::from([("region".into(), "eu".into())]);
    fields
}

fn node_version(catalog: &Catalog, node: ItemId, parents: &[VersionId]) -> Result<VersionId> {
    Ok(catalog.create_node_version(node, &tagged(), parents)?.version.id)
}

fn sorted(mut ids: Vec<VersionId>) -> Vec<VersionId> {
    ids.sort_unstable();
    ids
}

#[test]
fn linear_history_keeps_newest_levels() -> Result<()> {
    let (db, catalog) = memory_catalog();
    let node = catalog.create_node("orders", "orders", &[])?;
    let mut versions = Vec::new();
    let mut parent: Option<VersionId> = None;
    for _ in 0..5 {
        let parents: Vec<VersionId> = parent.into_iter().collect();
        let id = node_version(&catalog, node.id, &parents)?;
        versions.push(id);
        parent = Some(id);
    }
    let (v1, v2, v3, v4, v5) = (versions[0], versions[1], versions[2], versions[3], versions[4]);

    let report = catalog.truncate(node.id, 2)?;
    assert_eq!(report.deleted_versions, sorted(vec![v1, v2, v3]));
    assert_eq!(report.rerooted_versions, vec![v4]);

    let history = catalog.history(node.id)?;
    assert_eq!(history.version_ids(), vec![v4, v5]);
    assert_eq!(history.parents(v4), vec![ROOT_VERSION_ID]);
    assert_eq!(history.parents(v5), vec![v4]);
    assert_eq!(history.leaves(), vec![v5]);

    for gone in [v1, v2, v3] {
        assert!(catalog.node_version(gone).unwrap_err().is_not_found());
    }
    assert_eq!(catalog.node_version(v4)?.version.tags.len(), 1);
    assert_eq!(db.row_count(VERSION), 2);
    assert_eq!(db.row_count(RICH_VERSION), 2);
    assert_eq!(db.row_count(RICH_VERSION_TAG), 2);
    assert_eq!(db.row_count(VERSION_SUCCESSOR), 2);
    assert_eq!(db.row_count(VERSION_HISTORY_DAG), 2);
    Ok(())
}

#[test]
fn fan_in_ancestors_are_deleted_once() -> Result<()> {
    let (db, catalog) = memory_catalog();
    let node = catalog.create_node("orders", "orders", &[])?;
    let v1 = node_version(&catalog, node.id, &[])?;
    let v2 = node_version(&catalog, node.id, &[v1])?;
    let v3 = node_version(&catalog, node.id, &[v1])?;
    let v4 = node_version(&catalog, node.id, &[v2, v3])?;
    let v5 = node_version(&catalog, node.id, &[v4])?;

    let report = catalog.truncate(node.id, 2)?;
    assert_eq!(report.deleted_versions, sorted(vec![v1, v2, v3]));
    assert_eq!(report.rerooted_versions, vec![v4]);
    assert_eq!(report.retained_versions, sorted(vec![v4, v5]));
    assert_eq!(db.row_count(VERSION), 2);
    assert_eq!(db.row_count(VERSION_SUCCESSOR), 2);
    Ok(())
}

#[test]
fn uneven_branches_reroot_only_orphaned_versions() -> Result<()> {
    let (_, catalog) = memory_catalog();
    let node = catalog.create_node("orders", "orders", &[])?;
    let v1 = node_version(&catalog, node.id, &[])?;
    let v2 = node_version(&catalog, node.id, &[v1])?;
    let v3 = node_version(&catalog, node.id, &[v2])?;
    let v4 = node_version(&catalog, node.id, &[v3])?;
    let v5 = node_version(&catalog, node.id, &[v2])?;

    let report = catalog.truncate(node.id, 2)?;
    assert_eq!(report.deleted_versions, vec![v1]);
    assert_eq!(report.rerooted_versions, vec![v2]);

    let history = catalog.history(node.id)?;
    assert_eq!(history.version_ids(), sorted(vec![v2, v3, v4, v5]));
    assert_eq!(history.parents(v2), vec![ROOT_VERSION_ID]);
    assert_eq!(history.parents(v3), vec![v2]);
    assert_eq!(history.leaves(), sorted(vec![v4, v5]));
    Ok(())
}

#[test]
fn deep_retention_changes_nothing() -> Result<()> {
    let (_, catalog) = memory_catalog();
    let node = catalog.create_node("orders", "orders", &[])?;
    let v1 = node_version(&catalog, node.id, &[])?;
    node_version(&catalog, node.id, &[v1])?;
    let before = catalog.history(node.id)?;

    let report = catalog.truncate(node.id, 10)?;
    assert!(report.deleted_versions.is_empty());
    assert!(report.rerooted_versions.is_empty());
    assert_eq!(catalog.history(node.id)?, before);
    Ok(())
}

#[test]
fn graph_truncation_drops_membership_rows() -> Result<()> {
    let (db, catalog) = memory_catalog();
    let a = catalog.create_node("a", "a", &[])?;
    let b = catalog.create_node("b", "b", &[])?;
    let a1 = node_version(&catalog, a.id, &[])?;
    let b1 = node_version(&catalog, b.id, &[])?;
    let edge = catalog.create_edge("a-b", "a-b", a.id, b.id, &[])?;
    let e1 = catalog.create_edge_version(
        edge.item.id,
        &NewEdgeVersion {
            from_node_version_start_id: a1,
            to_node_version_start_id: b1,
            ..NewEdgeVersion::default()
        },
        &[],
    )?;

    let graph = catalog.create_graph("g", "g", &[])?;
    let fields = NewRichVersion::default();
    let g1 = catalog.create_graph_version(graph.id, &fields, &[e1.version.id], &[])?;
    let g2 =
        catalog.create_graph_version(graph.id, &fields, &[e1.version.id], &[g1.version.id])?;
    assert_eq!(db.row_count("graph_version_edge"), 2);

    catalog.truncate(graph.id, 1)?;
    assert_eq!(db.row_count("graph_version_edge"), 1);
    assert!(catalog.graph_version(g1.version.id).unwrap_err().is_not_found());
    assert_eq!(
        catalog.graph_version(g2.version.id)?.edge_version_ids,
        vec![e1.version.id]
    );
    assert_eq!(catalog.edge_version(e1.version.id)?.edge_id, edge.item.id);
    Ok(())
}

#[test]
fn structure_truncation_drops_attributes() -> Result<()> {
    let (db, catalog) = memory_catalog();
    let structure = catalog.create_structure("table", "table", &[])?;
    let attributes = BTreeMap::from([("rows".to_string(), GroundType::Long)]);
    let s1 = catalog.create_structure_version(structure.id, &attributes, &[])?;
    let s2 = catalog.create_structure_version(structure.id, &attributes, &[s1.id])?;

    let report = catalog.truncate(structure.id, 0)?;
    assert_eq!(report.deleted_versions, sorted(vec![s1.id, s2.id]));
    assert_eq!(db.row_count(STRUCTURE_VERSION_ATTRIBUTE), 0);
    assert_eq!(db.row_count(VERSION), 0);
    assert!(catalog.history(structure.id)?.is_empty());
    Ok(())
}
