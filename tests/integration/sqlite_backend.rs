#![allow(missing_docs)]

use std::path::Path;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use ground::entity::node;
use ground::storage::schema::{ITEM, VERSION};
use ground::version::rich::NewRichVersion;
use ground::version::tag::{Tag, TagValue};
use ground::{Catalog, CatalogOptions, GroundError, Result, StorageBackend, ROOT_VERSION_ID};
use tempfile::tempdir;

fn open(path: &Path) -> Result<Catalog> {
    Catalog::open(&CatalogOptions {
        path: Some(path.to_path_buf()),
        ..CatalogOptions::default()
    })
}

fn row_count(catalog: &Catalog, table: &str) -> usize {
    catalog
        .adapter()
        .equality_select(table, &[], &[])
        .expect("select")
        .len()
}

/// Unit of work that writes a node and then fails, as a crash midway would.
fn interrupted_create(catalog: &Catalog, source_key: &str) -> GroundError {
    catalog
        .write(|s| {
            node::create(s, source_key, source_key, &[])?;
            Err::<(), _>(GroundError::InvalidArgument("interrupted".into()))
        })
        .unwrap_err()
}

#[test]
fn failed_write_rolls_back_every_row() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let catalog = open(&dir.path().join("ground.db"))?;

    let err = interrupted_create(&catalog, "orders");
    assert!(matches!(err, GroundError::InvalidArgument(_)));
    assert_eq!(row_count(&catalog, ITEM), 0);
    assert!(catalog.node_by_source_key("orders").unwrap_err().is_not_found());

    let node = catalog.create_node("orders", "orders", &[])?;
    assert_eq!(catalog.node_by_source_key("orders")?.id, node.id);
    Ok(())
}

#[test]
fn memory_backend_keeps_partial_writes() -> Result<()> {
    let catalog = Catalog::open(&CatalogOptions {
        backend: StorageBackend::Memory,
        ..CatalogOptions::default()
    })?;
    assert_eq!(catalog.adapter().name(), "memory");

    interrupted_create(&catalog, "orders");
    assert_eq!(row_count(&catalog, ITEM), 1);
    assert!(catalog.node_by_source_key("orders").is_ok());
    Ok(())
}

#[test]
fn invalid_tags_leave_no_rows_on_either_backend() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let twice = vec![
        Tag::unbound("owner", Some(TagValue::String("ops".into()))),
        Tag::unbound("owner", Some(TagValue::String("dev".into()))),
    ];
    let sqlite = open(&dir.path().join("ground.db"))?;
    let memory = Catalog::open(&CatalogOptions {
        backend: StorageBackend::Memory,
        ..CatalogOptions::default()
    })?;
    for catalog in [&sqlite, &memory] {
        let err = catalog.create_node("orders", "orders", &twice).unwrap_err();
        assert!(matches!(err, GroundError::InvalidArgument(_)));
        assert_eq!(row_count(catalog, ITEM), 0);
        catalog.create_node("orders", "orders", &twice[..1])?;
    }
    Ok(())
}

#[test]
fn concurrent_abort_leaves_other_writers_alone() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let catalog = open(&dir.path().join("ground.db"))?;
    let started = Barrier::new(2);

    let written = thread::scope(|scope| {
        let writer = scope.spawn(|| {
            catalog.write(|s| {
                let node = node::create(s, "a", "a", &[])?;
                started.wait();
                thread::sleep(Duration::from_millis(50));
                Ok(node)
            })
        });
        started.wait();
        interrupted_create(&catalog, "b");
        writer.join().expect("writer thread")
    })?;

    assert_eq!(catalog.node_by_source_key("a")?.id, written.id);
    assert!(catalog.node_by_source_key("b").unwrap_err().is_not_found());
    assert_eq!(row_count(&catalog, ITEM), 1);
    Ok(())
}

#[test]
fn reopened_catalog_keeps_history_and_fresh_ids() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("ground.db");

    let (node_id, v1, v2) = {
        let catalog = open(&path)?;
        let node = catalog.create_node("orders", "orders", &[])?;
        let fields = NewRichVersion::default();
        let v1 = catalog.create_node_version(node.id, &fields, &[])?.version.id;
        let v2 = catalog.create_node_version(node.id, &fields, &[v1])?.version.id;
        (node.id, v1, v2)
    };

    let catalog = open(&path)?;
    assert_eq!(catalog.node(node_id)?.name, "orders");
    assert_eq!(catalog.leaves(node_id)?, vec![v2]);
    assert_eq!(catalog.history(node_id)?.parents(v1), vec![ROOT_VERSION_ID]);

    let before = catalog
        .history(node_id)?
        .edges()
        .iter()
        .map(|edge| edge.id)
        .chain([node_id, v1, v2])
        .max()
        .unwrap_or(0);
    let other = catalog.create_node("customers", "customers", &[])?;
    assert!(other.id > before);
    let v3 = catalog
        .create_node_version(node_id, &NewRichVersion::default(), &[v2])?
        .version
        .id;
    assert!(v3 > other.id);
    assert_eq!(catalog.leaves(node_id)?, vec![v3]);
    Ok(())
}

#[test]
fn truncation_is_durable() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("ground.db");
    let catalog = open(&path)?;
    let node = catalog.create_node("orders", "orders", &[])?;
    let fields = NewRichVersion::with_tags(vec![Tag::unbound("rows", Some(TagValue::Long(3)))]);
    let v1 = catalog.create_node_version(node.id, &fields, &[])?.version.id;
    let v2 = catalog.create_node_version(node.id, &fields, &[v1])?.version.id;
    let v3 = catalog.create_node_version(node.id, &fields, &[v2])?.version.id;

    let report = catalog.truncate(node.id, 1)?;
    assert_eq!(report.deleted_versions, vec![v1, v2]);
    drop(catalog);

    let catalog = open(&path)?;
    assert_eq!(row_count(&catalog, VERSION), 1);
    assert_eq!(catalog.history(node.id)?.parents(v3), vec![ROOT_VERSION_ID]);
    assert!(catalog.node_version(v1).unwrap_err().is_not_found());
    assert_eq!(catalog.node_version(v3)?.version.tags, fields.tags);
    Ok(())
}

#[test]
fn ids_freed_by_truncation_stay_retired_after_reopen() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("ground.db");

    let (node_id, issued) = {
        let catalog = open(&path)?;
        let node = catalog.create_node("orders", "orders", &[])?;
        let fields = NewRichVersion::default();
        let v1 = catalog.create_node_version(node.id, &fields, &[])?.version.id;
        let v2 = catalog.create_node_version(node.id, &fields, &[v1])?.version.id;
        let issued: Vec<u64> = catalog
            .history(node.id)?
            .edges()
            .iter()
            .map(|edge| edge.id)
            .chain([node.id, v1, v2])
            .collect();
        catalog.truncate(node.id, 0)?;
        (node.id, issued)
    };

    let catalog = open(&path)?;
    assert!(catalog.history(node_id)?.is_empty());
    let fresh = catalog.create_node("customers", "customers", &[])?;
    let version = catalog.create_node_version(fresh.id, &NewRichVersion::default(), &[])?;
    for id in [fresh.id, version.version.id] {
        assert!(!issued.contains(&id), "id {id} was handed out twice");
        assert!(issued.iter().all(|old| id > *old));
    }
    Ok(())
}
