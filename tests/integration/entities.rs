#![allow(missing_docs)]

use std::collections::BTreeMap;

use ground::entity::edge::NewEdgeVersion;
use ground::version::rich::NewRichVersion;
use ground::version::tag::{GroundType, Tag, TagValue};
use ground::{Catalog, GroundError, ItemKind, Result, VersionId};

fn starting_at(from: VersionId, to: VersionId) -> NewEdgeVersion {
    NewEdgeVersion {
        from_node_version_start_id: from,
        to_node_version_start_id: to,
        ..NewEdgeVersion::default()
    }
}

#[test]
fn edge_windows_close_at_the_preceding_node_version() -> Result<()> {
    let catalog = Catalog::in_memory();
    let fields = NewRichVersion::default();
    let a = catalog.create_node("a", "a", &[])?;
    let b = catalog.create_node("b", "b", &[])?;
    let a1 = catalog.create_node_version(a.id, &fields, &[])?.version.id;
    let a2 = catalog.create_node_version(a.id, &fields, &[a1])?.version.id;
    let b1 = catalog.create_node_version(b.id, &fields, &[])?.version.id;

    let edge = catalog.create_edge("a-b", "a-b", a.id, b.id, &[])?;
    let e1 = catalog.create_edge_version(edge.item.id, &starting_at(a1, b1), &[])?;
    let e2 = catalog.create_edge_version(
        edge.item.id,
        &starting_at(a2, b1),
        &[e1.version.id],
    )?;

    let closed = catalog.edge_version(e1.version.id)?;
    assert_eq!(closed.from_node_version_end_id, Some(a1));
    assert_eq!(closed.to_node_version_end_id, None);

    let open = catalog.edge_version(e2.version.id)?;
    assert_eq!(open.from_node_version_start_id, a2);
    assert_eq!(open.from_node_version_end_id, None);
    assert_eq!(catalog.leaves(edge.item.id)?, vec![e2.version.id]);
    Ok(())
}

#[test]
fn explicit_window_ends_are_kept() -> Result<()> {
    let catalog = Catalog::in_memory();
    let fields = NewRichVersion::default();
    let a = catalog.create_node("a", "a", &[])?;
    let a1 = catalog.create_node_version(a.id, &fields, &[])?.version.id;
    let a2 = catalog.create_node_version(a.id, &fields, &[a1])?.version.id;
    let a3 = catalog.create_node_version(a.id, &fields, &[a2])?.version.id;
    let edge = catalog.create_edge("loop", "loop", a.id, a.id, &[])?;

    let mut first = starting_at(a1, a1);
    first.from_node_version_end_id = Some(a1);
    let e1 = catalog.create_edge_version(edge.item.id, &first, &[])?;
    catalog.create_edge_version(edge.item.id, &starting_at(a3, a3), &[e1.version.id])?;

    let parent = catalog.edge_version(e1.version.id)?;
    assert_eq!(parent.from_node_version_end_id, Some(a1));
    assert_eq!(parent.to_node_version_end_id, Some(a2));
    Ok(())
}

#[test]
fn edges_need_existing_nodes() {
    let catalog = Catalog::in_memory();
    let a = catalog.create_node("a", "a", &[]).unwrap();
    let err = catalog.create_edge("e", "e", a.id, 4_242, &[]).unwrap_err();
    assert!(err.is_not_found());
    assert!(catalog.edge_by_source_key("e").unwrap_err().is_not_found());
}

#[test]
fn graph_versions_group_edge_versions() -> Result<()> {
    let catalog = Catalog::in_memory();
    let fields = NewRichVersion::default();
    let a = catalog.create_node("a", "a", &[])?;
    let b = catalog.create_node("b", "b", &[])?;
    let a1 = catalog.create_node_version(a.id, &fields, &[])?.version.id;
    let b1 = catalog.create_node_version(b.id, &fields, &[])?.version.id;
    let ab = catalog.create_edge("a-b", "a-b", a.id, b.id, &[])?;
    let ba = catalog.create_edge("b-a", "b-a", b.id, a.id, &[])?;
    let e1 = catalog.create_edge_version(ab.item.id, &starting_at(a1, b1), &[])?;
    let e2 = catalog.create_edge_version(ba.item.id, &starting_at(b1, a1), &[])?;

    let graph = catalog.create_graph("pipeline", "pipeline", &[])?;
    let mut members = vec![e2.version.id, e1.version.id, e2.version.id];
    let version = catalog.create_graph_version(graph.id, &fields, &members, &[])?;
    members.sort_unstable();
    members.dedup();
    assert_eq!(version.edge_version_ids, members);
    assert_eq!(catalog.graph_version(version.version.id)?, version);
    assert_eq!(catalog.graph_by_source_key("pipeline")?.id, graph.id);

    let err = catalog
        .create_graph_version(graph.id, &fields, &[a1], &[version.version.id])
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(catalog.leaves(graph.id)?, vec![version.version.id]);
    Ok(())
}

#[test]
fn lineage_links_arbitrary_rich_versions() -> Result<()> {
    let catalog = Catalog::in_memory();
    let fields = NewRichVersion::default();
    let raw = catalog.create_node("raw", "raw", &[])?;
    let clean = catalog.create_node("clean", "clean", &[])?;
    let raw1 = catalog.create_node_version(raw.id, &fields, &[])?.version.id;
    let clean1 = catalog.create_node_version(clean.id, &fields, &[])?.version.id;

    let job = catalog.create_lineage_edge("etl", "etl", &[])?;
    let mut run = NewRichVersion::with_tags(vec![Tag::unbound(
        "runtime_ms",
        Some(TagValue::Integer(1_200)),
    )]);
    run.reference = Some("https://ci.example.com/runs/7".into());
    let l1 = catalog.create_lineage_edge_version(job.id, &run, raw1, clean1, &[])?;
    let stored = catalog.lineage_edge_version(l1.version.id)?;
    assert_eq!(stored.from_rich_version_id, raw1);
    assert_eq!(stored.to_rich_version_id, clean1);
    assert_eq!(stored.version.reference.as_deref(), Some("https://ci.example.com/runs/7"));
    assert_eq!(stored.version.tags[0].value, Some(TagValue::Integer(1_200)));

    let err = catalog
        .create_lineage_edge_version(job.id, &fields, raw1, 77_777, &[])
        .unwrap_err();
    assert!(err.is_not_found());

    let workflow = catalog.create_lineage_graph("nightly", "nightly", &[])?;
    let g1 = catalog.create_lineage_graph_version(workflow.id, &fields, &[l1.version.id], &[])?;
    assert_eq!(
        catalog.lineage_graph_version(g1.version.id)?.lineage_edge_version_ids,
        vec![l1.version.id]
    );
    assert_eq!(catalog.lineage_edge_by_source_key("etl")?.id, job.id);
    assert_eq!(catalog.lineage_graph(workflow.id)?.kind, ItemKind::LineageGraph);
    Ok(())
}

#[test]
fn structures_gate_tags_of_rich_versions() -> Result<()> {
    let catalog = Catalog::in_memory();
    let table = catalog.create_structure("orders_schema", "orders_schema", &[])?;
    let attributes = BTreeMap::from([
        ("rows".to_string(), GroundType::Long),
        ("owner".to_string(), GroundType::String),
    ]);
    let schema = catalog.create_structure_version(table.id, &attributes, &[])?;
    assert_eq!(catalog.structure_version(schema.id)?.attributes, attributes);

    let node = catalog.create_node("orders", "orders", &[])?;
    let mut fields = NewRichVersion::with_tags(vec![
        Tag::unbound("rows", Some(TagValue::Long(10))),
        Tag::unbound("owner", Some(TagValue::String("ops".into()))),
        Tag::unbound("note", None),
    ]);
    fields.structure_version_id = Some(schema.id);
    let ok = catalog.create_node_version(node.id, &fields, &[])?;
    assert_eq!(ok.version.structure_version_id, Some(schema.id));

    fields.tags[0] = Tag::unbound("rows", Some(TagValue::Boolean(true)));
    let err = catalog
        .create_node_version(node.id, &fields, &[ok.version.id])
        .unwrap_err();
    assert!(matches!(err, GroundError::Conformance(_)));

    fields.tags.remove(0);
    let err = catalog
        .create_node_version(node.id, &fields, &[ok.version.id])
        .unwrap_err();
    assert!(matches!(err, GroundError::Conformance(_)));
    assert_eq!(catalog.leaves(node.id)?, vec![ok.version.id]);
    Ok(())
}

#[test]
fn items_resolve_across_kinds() -> Result<()> {
    let catalog = Catalog::in_memory();
    let node = catalog.create_node("orders", "orders", &[])?;
    let structure = catalog.create_structure("orders", "orders", &[])?;

    assert_eq!(catalog.item(node.id)?.kind, ItemKind::Node);
    assert_eq!(catalog.item(structure.id)?.kind, ItemKind::Structure);
    assert_eq!(
        catalog.item_by_source_key(ItemKind::Structure, "orders")?.id,
        structure.id
    );
    assert!(catalog.item(123_456).unwrap_err().is_not_found());
    assert!(catalog.structure(node.id).unwrap_err().is_not_found());
    Ok(())
}
