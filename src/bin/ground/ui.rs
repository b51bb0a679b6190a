//! Text rendering of catalog records for `--format text`.

use std::io::IsTerminal;

use clap::ValueEnum;
use nu_ansi_term::{Color, Style};

use ground::version::dag::{TruncationReport, VersionHistoryDag};
use ground::version::item::Item;
use ground::version::rich::RichVersion;
use ground::version::tag::Tag;
use ground::{ItemKind, VersionId, ROOT_VERSION_ID};

use crate::{AnyVersion, ConfigReport};

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Theme {
    /// Color when stdout is a terminal.
    Auto,
    Plain,
}

/// A titled block of aligned `label value` lines.
struct Card {
    kind: Option<ItemKind>,
    title: String,
    lines: Vec<(String, String)>,
}

impl Card {
    fn new(kind: Option<ItemKind>, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            lines: Vec::new(),
        }
    }

    fn line(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.lines.push((label.into(), value.into()));
        self
    }
}

pub struct Ui {
    paint: bool,
}

impl Ui {
    pub fn new(theme: Theme) -> Self {
        let paint = theme == Theme::Auto && std::io::stdout().is_terminal();

        #[cfg(windows)]
        if paint {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        Self { paint }
    }

    pub fn item(&self, item: &Item) {
        print!("{}", self.render(&item_card(item)));
    }

    pub fn version(&self, version: &AnyVersion) {
        print!("{}", self.render(&version_card(version)));
    }

    pub fn history(&self, history: &VersionHistoryDag) {
        print!("{}", self.render(&history_card(history)));
    }

    pub fn truncation(&self, report: &TruncationReport) {
        print!("{}", self.render(&truncation_card(report)));
    }

    pub fn config(&self, report: &ConfigReport) {
        print!("{}", self.render(&config_card(report)));
    }

    /// Id listing such as leaves or search hits.
    pub fn ids(&self, title: &str, ids: &[u64]) {
        print!("{}", self.render(&Card::new(None, title).line("ids", join_ids(ids))));
    }

    pub fn done(&self, message: &str) {
        if self.paint {
            println!("{}", Style::new().fg(Color::Green).bold().paint(message));
        } else {
            println!("{message}");
        }
    }

    fn render(&self, card: &Card) -> String {
        let width = card.lines.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        let mut out = if self.paint {
            kind_style(card.kind).paint(card.title.as_str()).to_string()
        } else {
            card.title.clone()
        };
        out.push('\n');
        for (label, value) in &card.lines {
            let label = format!("{label:>width$}");
            if self.paint {
                out.push_str(&format!("  {} {value}\n", Color::DarkGray.paint(label)));
            } else {
                out.push_str(&format!("  {label} {value}\n"));
            }
        }
        out
    }
}

fn kind_style(kind: Option<ItemKind>) -> Style {
    let color = match kind {
        Some(ItemKind::Node) => Color::Cyan,
        Some(ItemKind::Edge) => Color::Blue,
        Some(ItemKind::Graph) => Color::Purple,
        Some(ItemKind::Structure) => Color::Yellow,
        Some(ItemKind::LineageEdge | ItemKind::LineageGraph) => Color::Magenta,
        None => Color::White,
    };
    Style::new().fg(color).bold()
}

fn item_card(item: &Item) -> Card {
    Card::new(Some(item.kind), format!("{} {}", item.kind, item.id))
        .line("name", item.name.as_str())
        .line("source_key", item.source_key.as_str())
        .line("tags", join_tags(&item.tags))
}

fn version_card(version: &AnyVersion) -> Card {
    let (kind, id) = match version {
        AnyVersion::Node(v) => (ItemKind::Node, v.version.id),
        AnyVersion::Edge(v) => (ItemKind::Edge, v.version.id),
        AnyVersion::Graph(v) => (ItemKind::Graph, v.version.id),
        AnyVersion::Structure(v) => (ItemKind::Structure, v.id),
        AnyVersion::LineageEdge(v) => (ItemKind::LineageEdge, v.version.id),
        AnyVersion::LineageGraph(v) => (ItemKind::LineageGraph, v.version.id),
    };
    let card = Card::new(Some(kind), format!("{kind}Version {id}"));
    match version {
        AnyVersion::Node(v) => rich_lines(card.line("node", v.node_id.to_string()), &v.version),
        AnyVersion::Edge(v) => {
            let card = card
                .line("edge", v.edge_id.to_string())
                .line(
                    "from",
                    window(v.from_node_version_start_id, v.from_node_version_end_id),
                )
                .line(
                    "to",
                    window(v.to_node_version_start_id, v.to_node_version_end_id),
                );
            rich_lines(card, &v.version)
        }
        AnyVersion::Graph(v) => {
            let card = card
                .line("graph", v.graph_id.to_string())
                .line("edge_versions", join_ids(&v.edge_version_ids));
            rich_lines(card, &v.version)
        }
        AnyVersion::Structure(v) => {
            let attributes = v
                .attributes
                .iter()
                .map(|(key, ty)| format!("{key}: {ty}"))
                .collect::<Vec<_>>();
            card.line("structure", v.structure_id.to_string())
                .line("attributes", or_dash(attributes.join(", ")))
        }
        AnyVersion::LineageEdge(v) => {
            let card = card.line("lineage_edge", v.lineage_edge_id.to_string()).line(
                "links",
                format!("{} => {}", v.from_rich_version_id, v.to_rich_version_id),
            );
            rich_lines(card, &v.version)
        }
        AnyVersion::LineageGraph(v) => {
            let card = card
                .line("lineage_graph", v.lineage_graph_id.to_string())
                .line("lineage_edges", join_ids(&v.lineage_edge_version_ids));
            rich_lines(card, &v.version)
        }
    }
}

fn rich_lines(card: Card, version: &RichVersion) -> Card {
    let params = version
        .reference_parameters
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>();
    card.line("tags", join_tags(&version.tags))
        .line(
            "structure",
            version
                .structure_version_id
                .map_or_else(|| "-".to_string(), |id| format!("version {id}")),
        )
        .line(
            "reference",
            version.reference.clone().unwrap_or_else(|| "-".to_string()),
        )
        .line("parameters", or_dash(params.join(", ")))
}

/// One line per version, `parents -> version`, leaves flagged.
fn history_card(history: &VersionHistoryDag) -> Card {
    let leaves = history.leaves();
    let mut card = Card::new(None, format!("History of item {}", history.item_id()));
    if history.is_empty() {
        return card.line("", "(no versions)");
    }
    for id in history.version_ids() {
        let parents = history
            .parents(id)
            .into_iter()
            .map(|parent| {
                if parent == ROOT_VERSION_ID {
                    "root".to_string()
                } else {
                    parent.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" + ");
        let marker = if leaves.contains(&id) { "  (leaf)" } else { "" };
        card = card.line(id.to_string(), format!("<- {parents}{marker}"));
    }
    card
}

fn truncation_card(report: &TruncationReport) -> Card {
    Card::new(None, format!("Truncated item {}", report.item_id))
        .line("deleted", join_ids(&report.deleted_versions))
        .line("rerooted", join_ids(&report.rerooted_versions))
        .line("retained", join_ids(&report.retained_versions))
}

fn config_card(report: &ConfigReport) -> Card {
    let shown = |path: &Option<std::path::PathBuf>| {
        path.as_ref()
            .map_or_else(|| "-".to_string(), |p| p.display().to_string())
    };
    Card::new(None, "CLI config")
        .line("path", shown(&report.path))
        .line("database", shown(&report.database))
        .line(
            "log_filter",
            report.log_filter.clone().unwrap_or_else(|| "-".to_string()),
        )
        .line(
            "writer",
            format!("{} of {}", report.machine_id, report.num_machines),
        )
}

fn window(start: VersionId, end: Option<VersionId>) -> String {
    match end {
        Some(end) => format!("{start}..{end}"),
        None => format!("{start}.. (open)"),
    }
}

fn join_tags(tags: &[Tag]) -> String {
    let rendered = tags
        .iter()
        .map(|tag| match &tag.value {
            Some(value) => format!("{}={}:{}", tag.key, value.value_type(), value),
            None => tag.key.clone(),
        })
        .collect::<Vec<_>>();
    or_dash(rendered.join(", "))
}

fn join_ids(ids: &[u64]) -> String {
    let rendered = ids.iter().map(ToString::to_string).collect::<Vec<_>>();
    or_dash(rendered.join(", "))
}

fn or_dash(text: String) -> String {
    if text.is_empty() {
        "-".to_string()
    } else {
        text
    }
}
