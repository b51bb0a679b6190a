//! Logical table layout shared by every backend.

/// Every item with its kind.
pub const ITEM: &str = "item";
/// Tags attached to items.
pub const ITEM_TAG: &str = "item_tag";
/// Every version id, whatever its kind.
pub const VERSION: &str = "version";
/// Reference and structure pointer of each rich version.
pub const RICH_VERSION: &str = "rich_version";
/// Tags attached to rich versions.
pub const RICH_VERSION_TAG: &str = "rich_version_tag";
/// Key/value parameters of a rich version's external reference.
pub const RICH_VERSION_EXTERNAL_PARAMETER: &str = "rich_version_external_parameter";
/// Attribute types declared by structure versions.
pub const STRUCTURE_VERSION_ATTRIBUTE: &str = "structure_version_attribute";
/// Successor edges `from_version_id -> to_version_id`.
pub const VERSION_SUCCESSOR: &str = "version_successor";
/// Which successor edges belong to which item's history.
pub const VERSION_HISTORY_DAG: &str = "version_history_dag";
/// High-water marks of ids whose rows were deleted; keeps them out of reuse.
pub const RETIRED_ID: &str = "retired_id";

/// DDL applied by relational backends on open.
pub(crate) const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS item (
        id INTEGER PRIMARY KEY,
        kind TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS item_tag (
        item_id INTEGER NOT NULL REFERENCES item (id),
        key TEXT NOT NULL,
        value TEXT,
        type TEXT,
        PRIMARY KEY (item_id, key)
    )",
    "CREATE TABLE IF NOT EXISTS version (
        id INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS rich_version (
        id INTEGER PRIMARY KEY REFERENCES version (id),
        structure_version_id INTEGER,
        reference TEXT
    )",
    "CREATE TABLE IF NOT EXISTS rich_version_tag (
        rich_version_id INTEGER NOT NULL REFERENCES rich_version (id),
        key TEXT NOT NULL,
        value TEXT,
        type TEXT,
        PRIMARY KEY (rich_version_id, key)
    )",
    "CREATE TABLE IF NOT EXISTS rich_version_external_parameter (
        rich_version_id INTEGER NOT NULL REFERENCES rich_version (id),
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (rich_version_id, key)
    )",
    "CREATE TABLE IF NOT EXISTS structure (
        item_id INTEGER PRIMARY KEY REFERENCES item (id),
        source_key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS structure_version (
        id INTEGER PRIMARY KEY REFERENCES version (id),
        structure_id INTEGER NOT NULL REFERENCES structure (item_id)
    )",
    "CREATE TABLE IF NOT EXISTS structure_version_attribute (
        structure_version_id INTEGER NOT NULL REFERENCES structure_version (id),
        key TEXT NOT NULL,
        type TEXT NOT NULL,
        PRIMARY KEY (structure_version_id, key)
    )",
    "CREATE TABLE IF NOT EXISTS version_successor (
        id INTEGER PRIMARY KEY,
        from_version_id INTEGER NOT NULL,
        to_version_id INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS version_history_dag (
        item_id INTEGER NOT NULL REFERENCES item (id),
        version_successor_id INTEGER NOT NULL REFERENCES version_successor (id),
        PRIMARY KEY (item_id, version_successor_id)
    )",
    "CREATE TABLE IF NOT EXISTS node (
        item_id INTEGER PRIMARY KEY REFERENCES item (id),
        source_key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS node_version (
        id INTEGER PRIMARY KEY REFERENCES rich_version (id),
        node_id INTEGER NOT NULL REFERENCES node (item_id)
    )",
    "CREATE TABLE IF NOT EXISTS edge (
        item_id INTEGER PRIMARY KEY REFERENCES item (id),
        source_key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        from_node_id INTEGER NOT NULL REFERENCES node (item_id),
        to_node_id INTEGER NOT NULL REFERENCES node (item_id)
    )",
    "CREATE TABLE IF NOT EXISTS edge_version (
        id INTEGER PRIMARY KEY REFERENCES rich_version (id),
        edge_id INTEGER NOT NULL REFERENCES edge (item_id),
        from_node_version_start_id INTEGER NOT NULL,
        from_node_version_end_id INTEGER,
        to_node_version_start_id INTEGER NOT NULL,
        to_node_version_end_id INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS graph (
        item_id INTEGER PRIMARY KEY REFERENCES item (id),
        source_key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS graph_version (
        id INTEGER PRIMARY KEY REFERENCES rich_version (id),
        graph_id INTEGER NOT NULL REFERENCES graph (item_id)
    )",
    "CREATE TABLE IF NOT EXISTS graph_version_edge (
        graph_version_id INTEGER NOT NULL REFERENCES graph_version (id),
        edge_version_id INTEGER NOT NULL,
        PRIMARY KEY (graph_version_id, edge_version_id)
    )",
    "CREATE TABLE IF NOT EXISTS lineage_edge (
        item_id INTEGER PRIMARY KEY REFERENCES item (id),
        source_key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS lineage_edge_version (
        id INTEGER PRIMARY KEY REFERENCES rich_version (id),
        lineage_edge_id INTEGER NOT NULL REFERENCES lineage_edge (item_id),
        from_rich_version_id INTEGER NOT NULL,
        to_rich_version_id INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS lineage_graph (
        item_id INTEGER PRIMARY KEY REFERENCES item (id),
        source_key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS lineage_graph_version (
        id INTEGER PRIMARY KEY REFERENCES rich_version (id),
        lineage_graph_id INTEGER NOT NULL REFERENCES lineage_graph (item_id)
    )",
    "CREATE TABLE IF NOT EXISTS lineage_graph_version_edge (
        lineage_graph_version_id INTEGER NOT NULL REFERENCES lineage_graph_version (id),
        lineage_edge_version_id INTEGER NOT NULL,
        PRIMARY KEY (lineage_graph_version_id, lineage_edge_version_id)
    )",
    "CREATE TABLE IF NOT EXISTS retired_id (
        id INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_version_successor_to ON version_successor (to_version_id)",
    "CREATE INDEX IF NOT EXISTS idx_item_tag_key ON item_tag (key)",
    "CREATE INDEX IF NOT EXISTS idx_rich_version_tag_key ON rich_version_tag (key)",
];

/// Tables whose `id` column bounds every id issued so far; used to seed id
/// generators.
pub(crate) const ID_TABLES: &[(&str, &str)] = &[
    (ITEM, "id"),
    (VERSION, "id"),
    (VERSION_SUCCESSOR, "id"),
    (RETIRED_ID, "id"),
];
