//! Binary entry point for the Ground administrative CLI.
#![forbid(unsafe_code)]

mod config;
mod ui;

use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use config::CliConfig;
use ground::entity::edge::{EdgeVersion, NewEdgeVersion};
use ground::entity::graph::GraphVersion;
use ground::entity::lineage::{LineageEdgeVersion, LineageGraphVersion};
use ground::entity::node::NodeVersion;
use ground::version::item::Item;
use ground::version::rich::NewRichVersion;
use ground::version::structure::StructureVersion;
use ground::version::tag::{GroundType, Tag, TagValue};
use ground::{Catalog, CatalogOptions, ItemId, ItemKind, StorageBackend, VersionId};
use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "ground",
    version,
    about = "Administrative CLI for the Ground metadata catalog",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "GROUND_DB",
        value_name = "FILE",
        help = "SQLite catalog file (defaults to database.default from the config)"
    )]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "GROUND_CONFIG",
        value_name = "FILE",
        help = "CLI config file (defaults to <config dir>/ground/cli.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = Theme::Auto,
        help = "Color theme for text output"
    )]
    theme: Theme,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Create the catalog schema if it does not exist")]
    Init,

    #[command(subcommand, about = "Create and inspect items")]
    Item(ItemCmd),

    #[command(subcommand, about = "Create and inspect versions")]
    Version(VersionCmd),

    #[command(about = "List the current head versions of an item")]
    Leaves {
        #[arg(value_name = "ITEM_ID")]
        item_id: ItemId,
    },

    #[command(about = "Show each version of an item with its parents")]
    History {
        #[arg(value_name = "ITEM_ID")]
        item_id: ItemId,
    },

    #[command(about = "Keep the newest levels of an item's history and delete the rest")]
    Truncate {
        #[arg(value_name = "ITEM_ID")]
        item_id: ItemId,

        #[arg(long, help = "Number of levels to keep, counting the heads as level 1")]
        levels: usize,
    },

    #[command(about = "Find items or versions carrying a tag key")]
    Search {
        #[arg(value_enum)]
        scope: SearchScope,

        #[arg(value_name = "KEY")]
        key: String,
    },

    #[command(subcommand, about = "Inspect or update the CLI config file")]
    Config(ConfigCmd),
}

#[derive(Subcommand, Debug)]
enum ItemCmd {
    #[command(about = "Create a new item")]
    Create(CreateItemArgs),

    #[command(about = "Show an item by id")]
    Show {
        #[arg(value_name = "ITEM_ID")]
        id: ItemId,
    },

    #[command(about = "Find an item by kind and source key")]
    Find {
        #[arg(value_parser = parse_kind)]
        kind: ItemKind,

        #[arg(value_name = "SOURCE_KEY")]
        source_key: String,
    },
}

#[derive(Args, Debug)]
struct CreateItemArgs {
    #[arg(value_parser = parse_kind)]
    kind: ItemKind,

    #[arg(long)]
    name: String,

    #[arg(long)]
    source_key: String,

    #[arg(long = "tag", value_parser = parse_tag, value_name = "KEY[=TYPE:VALUE]")]
    tags: Vec<Tag>,

    #[arg(long, help = "Source node of an edge")]
    from_node: Option<ItemId>,

    #[arg(long, help = "Destination node of an edge")]
    to_node: Option<ItemId>,
}

#[derive(Subcommand, Debug)]
enum VersionCmd {
    #[command(about = "Create a new version of an item")]
    Create(CreateVersionArgs),

    #[command(about = "Show a version by kind and id")]
    Show {
        #[arg(value_parser = parse_kind)]
        kind: ItemKind,

        #[arg(value_name = "VERSION_ID")]
        id: VersionId,
    },
}

#[derive(Args, Debug)]
struct CreateVersionArgs {
    #[arg(value_name = "ITEM_ID")]
    item_id: ItemId,

    #[arg(long = "parent", value_name = "VERSION_ID", help = "Parent version (repeatable)")]
    parents: Vec<VersionId>,

    #[arg(long = "tag", value_parser = parse_tag, value_name = "KEY[=TYPE:VALUE]")]
    tags: Vec<Tag>,

    #[arg(long, value_name = "VERSION_ID")]
    structure_version: Option<VersionId>,

    #[arg(long)]
    reference: Option<String>,

    #[arg(long = "param", value_parser = parse_pair, value_name = "KEY=VALUE")]
    params: Vec<(String, String)>,

    #[arg(long = "attribute", value_parser = parse_attribute, value_name = "KEY=TYPE")]
    attributes: Vec<(String, GroundType)>,

    #[arg(long = "member", value_name = "VERSION_ID", help = "Edge version grouped by a graph version")]
    members: Vec<VersionId>,

    #[arg(long, value_name = "VERSION_ID")]
    from_start: Option<VersionId>,

    #[arg(long, value_name = "VERSION_ID")]
    from_end: Option<VersionId>,

    #[arg(long, value_name = "VERSION_ID")]
    to_start: Option<VersionId>,

    #[arg(long, value_name = "VERSION_ID")]
    to_end: Option<VersionId>,

    #[arg(long, value_name = "VERSION_ID", help = "Source rich version of a lineage edge")]
    from_version: Option<VersionId>,

    #[arg(long, value_name = "VERSION_ID", help = "Target rich version of a lineage edge")]
    to_version: Option<VersionId>,
}

#[derive(Subcommand, Debug)]
enum ConfigCmd {
    #[command(about = "Print the config file location")]
    Path,

    #[command(about = "Print the effective settings")]
    Show,

    #[command(about = "Set or clear the default catalog file")]
    SetDatabase {
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },

    #[command(about = "Set or clear the default log filter")]
    SetLogFilter {
        #[arg(value_name = "FILTER")]
        filter: Option<String>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SearchScope {
    Items,
    Versions,
}

#[derive(Serialize)]
#[serde(untagged)]
enum AnyVersion {
    Node(NodeVersion),
    Edge(EdgeVersion),
    Graph(GraphVersion),
    Structure(StructureVersion),
    LineageEdge(LineageEdgeVersion),
    LineageGraph(LineageGraphVersion),
}

#[derive(Serialize)]
struct ConfigReport {
    path: Option<PathBuf>,
    database: Option<PathBuf>,
    log_filter: Option<String>,
    machine_id: u64,
    num_machines: u64,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.clone())?;
    install_tracing_subscriber(config.log_filter());
    let ui = Ui::new(cli.theme);

    match &cli.command {
        Command::Init => {
            let path = resolve_db_path(&cli, &config)?;
            open_catalog(&cli, &config)?;
            emit(cli.format, &path, || {
                ui.done(&format!("catalog ready at {}", path.display()))
            })?;
        }
        Command::Item(cmd) => run_item(cmd, &open_catalog(&cli, &config)?, cli.format, &ui)?,
        Command::Version(cmd) => {
            run_version(cmd, &open_catalog(&cli, &config)?, cli.format, &ui)?
        }
        Command::Leaves { item_id } => {
            let leaves = open_catalog(&cli, &config)?.leaves(*item_id)?;
            emit(cli.format, &leaves, || {
                ui.ids(&format!("Leaves of item {item_id}"), &leaves)
            })?;
        }
        Command::History { item_id } => {
            let history = open_catalog(&cli, &config)?.history(*item_id)?;
            emit(cli.format, &history, || ui.history(&history))?;
        }
        Command::Truncate { item_id, levels } => {
            let report = open_catalog(&cli, &config)?.truncate(*item_id, *levels)?;
            emit(cli.format, &report, || ui.truncation(&report))?;
        }
        Command::Search { scope, key } => {
            let catalog = open_catalog(&cli, &config)?;
            let (title, ids) = match scope {
                SearchScope::Items => ("Items", catalog.items_with_tag(key)?),
                SearchScope::Versions => ("Versions", catalog.versions_with_tag(key)?),
            };
            emit(cli.format, &ids, || {
                ui.ids(&format!("{title} tagged {key:?}"), &ids)
            })?;
        }
        Command::Config(cmd) => run_config(cmd, &mut config, cli.format, &ui)?,
    }
    Ok(())
}

fn install_tracing_subscriber(configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_db_path(cli: &Cli, config: &CliConfig) -> Result<PathBuf, Box<dyn Error>> {
    cli.db
        .clone()
        .or_else(|| config.default_db_path().cloned())
        .ok_or_else(|| {
            "no catalog file given; pass --db, set GROUND_DB, or set database.default in the CLI config"
                .into()
        })
}

fn open_catalog(cli: &Cli, config: &CliConfig) -> Result<Catalog, Box<dyn Error>> {
    let options = CatalogOptions {
        backend: StorageBackend::Sqlite,
        path: Some(resolve_db_path(cli, config)?),
        machine_id: config.machine_id().unwrap_or(0),
        num_machines: config.num_machines().unwrap_or(1),
    };
    Ok(Catalog::open(&options)?)
}

fn run_item(
    cmd: &ItemCmd,
    catalog: &Catalog,
    format: OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    let item = match cmd {
        ItemCmd::Create(args) => create_item(catalog, args)?,
        ItemCmd::Show { id } => catalog.item(*id)?,
        ItemCmd::Find { kind, source_key } => catalog.item_by_source_key(*kind, source_key)?,
    };
    emit(format, &item, || ui.item(&item))
}

fn create_item(catalog: &Catalog, args: &CreateItemArgs) -> Result<Item, Box<dyn Error>> {
    let (name, key, tags) = (args.name.as_str(), args.source_key.as_str(), &args.tags);
    let item = match args.kind {
        ItemKind::Node => catalog.create_node(name, key, tags)?,
        ItemKind::Edge => {
            let (Some(from), Some(to)) = (args.from_node, args.to_node) else {
                return Err("edges need --from-node and --to-node".into());
            };
            catalog.create_edge(name, key, from, to, tags)?.item
        }
        ItemKind::Graph => catalog.create_graph(name, key, tags)?,
        ItemKind::Structure => catalog.create_structure(name, key, tags)?,
        ItemKind::LineageEdge => catalog.create_lineage_edge(name, key, tags)?,
        ItemKind::LineageGraph => catalog.create_lineage_graph(name, key, tags)?,
    };
    Ok(item)
}

fn run_version(
    cmd: &VersionCmd,
    catalog: &Catalog,
    format: OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    let version = match cmd {
        VersionCmd::Create(args) => create_version(catalog, args)?,
        VersionCmd::Show { kind, id } => match kind {
            ItemKind::Node => AnyVersion::Node(catalog.node_version(*id)?),
            ItemKind::Edge => AnyVersion::Edge(catalog.edge_version(*id)?),
            ItemKind::Graph => AnyVersion::Graph(catalog.graph_version(*id)?),
            ItemKind::Structure => AnyVersion::Structure(catalog.structure_version(*id)?),
            ItemKind::LineageEdge => AnyVersion::LineageEdge(catalog.lineage_edge_version(*id)?),
            ItemKind::LineageGraph => {
                AnyVersion::LineageGraph(catalog.lineage_graph_version(*id)?)
            }
        },
    };
    emit(format, &version, || ui.version(&version))
}

fn create_version(catalog: &Catalog, args: &CreateVersionArgs) -> Result<AnyVersion, Box<dyn Error>> {
    let kind = catalog.item(args.item_id)?.kind;
    let fields = NewRichVersion {
        tags: args.tags.clone(),
        structure_version_id: args.structure_version,
        reference: args.reference.clone(),
        reference_parameters: args.params.iter().cloned().collect(),
    };
    let parents = args.parents.as_slice();
    let version = match kind {
        ItemKind::Node => {
            AnyVersion::Node(catalog.create_node_version(args.item_id, &fields, parents)?)
        }
        ItemKind::Edge => {
            let (Some(from_start), Some(to_start)) = (args.from_start, args.to_start) else {
                return Err("edge versions need --from-start and --to-start".into());
            };
            let new = NewEdgeVersion {
                fields,
                from_node_version_start_id: from_start,
                from_node_version_end_id: args.from_end,
                to_node_version_start_id: to_start,
                to_node_version_end_id: args.to_end,
            };
            AnyVersion::Edge(catalog.create_edge_version(args.item_id, &new, parents)?)
        }
        ItemKind::Graph => AnyVersion::Graph(catalog.create_graph_version(
            args.item_id,
            &fields,
            &args.members,
            parents,
        )?),
        ItemKind::Structure => {
            let attributes: BTreeMap<String, GroundType> =
                args.attributes.iter().cloned().collect();
            AnyVersion::Structure(catalog.create_structure_version(
                args.item_id,
                &attributes,
                parents,
            )?)
        }
        ItemKind::LineageEdge => {
            let (Some(from), Some(to)) = (args.from_version, args.to_version) else {
                return Err("lineage edge versions need --from-version and --to-version".into());
            };
            AnyVersion::LineageEdge(catalog.create_lineage_edge_version(
                args.item_id,
                &fields,
                from,
                to,
                parents,
            )?)
        }
        ItemKind::LineageGraph => AnyVersion::LineageGraph(catalog.create_lineage_graph_version(
            args.item_id,
            &fields,
            &args.members,
            parents,
        )?),
    };
    Ok(version)
}

fn run_config(
    cmd: &ConfigCmd,
    config: &mut CliConfig,
    format: OutputFormat,
    ui: &Ui,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        ConfigCmd::Path => {
            let path = config
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(no config directory)".to_string());
            emit(format, &path, || println!("{path}"))?;
        }
        ConfigCmd::Show => {
            let report = ConfigReport {
                path: config.path().map(|path| path.to_path_buf()),
                database: config.default_db_path().cloned(),
                log_filter: config.log_filter().map(str::to_string),
                machine_id: config.machine_id().unwrap_or(0),
                num_machines: config.num_machines().unwrap_or(1),
            };
            emit(format, &report, || ui.config(&report))?;
        }
        ConfigCmd::SetDatabase { path } => {
            config.set_default_db_path(path.clone());
            let written = config.persist()?;
            emit(format, &written, || {
                ui.done(&format!("updated {}", written.display()))
            })?;
        }
        ConfigCmd::SetLogFilter { filter } => {
            config.set_log_filter(filter.clone());
            let written = config.persist()?;
            emit(format, &written, || {
                ui.done(&format!("updated {}", written.display()))
            })?;
        }
    }
    Ok(())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize + ?Sized,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn parse_kind(value: &str) -> Result<ItemKind, String> {
    value
        .replace('-', "_")
        .parse()
        .map_err(|err: ground::GroundError| err.to_string())
}

/// `key` for an untyped tag, `key=type:value` for a typed one.
fn parse_tag(value: &str) -> Result<Tag, String> {
    let Some((key, typed)) = value.split_once('=') else {
        return Ok(Tag::unbound(value, None));
    };
    let (ty, text) = typed
        .split_once(':')
        .ok_or_else(|| format!("expected KEY=TYPE:VALUE, got {value:?}"))?;
    let ty: GroundType = ty.parse().map_err(|err: ground::GroundError| err.to_string())?;
    let parsed = TagValue::parse(ty, text).map_err(|err| err.to_string())?;
    Ok(Tag::unbound(key, Some(parsed)))
}

fn parse_pair(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, val)| (key.to_string(), val.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {value:?}"))
}

fn parse_attribute(value: &str) -> Result<(String, GroundType), String> {
    let (key, ty) = parse_pair(value)?;
    let ty: GroundType = ty.parse().map_err(|err: ground::GroundError| err.to_string())?;
    Ok((key, ty))
}
