use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GroundError;

/// Id of an item. Shares one space with version ids.
pub type ItemId = u64;
/// Id of a version. `0` is the root sentinel.
pub type VersionId = u64;
/// Id of a successor edge.
pub type SuccessorId = u64;

/// Reserved pseudo-id meaning "no parent"; never assigned to a real entity.
pub const ROOT_VERSION_ID: VersionId = 0;

/// Concrete item families tracked by the catalog.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A dataset or other artifact.
    Node,
    /// Relationship between two nodes.
    Edge,
    /// Collection of edges.
    Graph,
    /// Schema constraining tags.
    Structure,
    /// Usage link between two rich versions.
    LineageEdge,
    /// Collection of lineage edges.
    LineageGraph,
}

impl ItemKind {
    /// Every kind, in declaration order.
    pub const ALL: [ItemKind; 6] = [
        ItemKind::Node,
        ItemKind::Edge,
        ItemKind::Graph,
        ItemKind::Structure,
        ItemKind::LineageEdge,
        ItemKind::LineageGraph,
    ];

    /// Name persisted in the `item.kind` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            ItemKind::Node => "node",
            ItemKind::Edge => "edge",
            ItemKind::Graph => "graph",
            ItemKind::Structure => "structure",
            ItemKind::LineageEdge => "lineage_edge",
            ItemKind::LineageGraph => "lineage_graph",
        }
    }

    /// Table holding the kind-specific item row.
    pub const fn item_table(self) -> &'static str {
        self.as_str()
    }

    /// Table holding the kind-specific version row.
    pub const fn version_table(self) -> &'static str {
        match self {
            ItemKind::Node => "node_version",
            ItemKind::Edge => "edge_version",
            ItemKind::Graph => "graph_version",
            ItemKind::Structure => "structure_version",
            ItemKind::LineageEdge => "lineage_edge_version",
            ItemKind::LineageGraph => "lineage_graph_version",
        }
    }

    /// Column in the version table that points back at the owning item.
    pub const fn owner_column(self) -> &'static str {
        match self {
            ItemKind::Node => "node_id",
            ItemKind::Edge => "edge_id",
            ItemKind::Graph => "graph_id",
            ItemKind::Structure => "structure_id",
            ItemKind::LineageEdge => "lineage_edge_id",
            ItemKind::LineageGraph => "lineage_graph_id",
        }
    }

    /// Membership table listing edge versions grouped by a version of this kind.
    pub const fn member_table(self) -> Option<(&'static str, &'static str, &'static str)> {
        match self {
            ItemKind::Graph => Some(("graph_version_edge", "graph_version_id", "edge_version_id")),
            ItemKind::LineageGraph => Some((
                "lineage_graph_version_edge",
                "lineage_graph_version_id",
                "lineage_edge_version_id",
            )),
            _ => None,
        }
    }

    /// Structures carry plain versions; every other kind has a rich component.
    pub const fn has_rich_version(self) -> bool {
        !matches!(self, ItemKind::Structure)
    }

    pub(crate) const fn item_label(self) -> &'static str {
        match self {
            ItemKind::Node => "Node",
            ItemKind::Edge => "Edge",
            ItemKind::Graph => "Graph",
            ItemKind::Structure => "Structure",
            ItemKind::LineageEdge => "LineageEdge",
            ItemKind::LineageGraph => "LineageGraph",
        }
    }

    pub(crate) const fn version_label(self) -> &'static str {
        match self {
            ItemKind::Node => "NodeVersion",
            ItemKind::Edge => "EdgeVersion",
            ItemKind::Graph => "GraphVersion",
            ItemKind::Structure => "StructureVersion",
            ItemKind::LineageEdge => "LineageEdgeVersion",
            ItemKind::LineageGraph => "LineageGraphVersion",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.item_label())
    }
}

impl FromStr for ItemKind {
    type Err = GroundError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| GroundError::InvalidArgument(format!("unknown item kind: {value}")))
    }
}
