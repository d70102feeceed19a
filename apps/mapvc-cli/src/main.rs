use anyhow::Context;
use clap::{Parser, Subcommand};
use mapvc_common::CommitId;
use mapvc_engine::{EngineConfig, Notice, NoticeKind, Notifier, VersionControl};
use mapvc_kernel::MapDocument;
use mapvc_persist::{Commit, FileStore};
use mapvc_tools::{CommitGraph, ProjectInspector};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mapvc", about = "Version control for map documents")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding the project store
    #[arg(long, env = "MAPVC_DATA_DIR", default_value = ".mapvc")]
    data_dir: PathBuf,

    /// The live map document (JSON)
    #[arg(long, env = "MAPVC_DOCUMENT", default_value = "map.json")]
    document: PathBuf,

    /// Engine configuration file [default: <data-dir>/config.json]
    #[arg(long, env = "MAPVC_CONFIG")]
    config: Option<PathBuf>,

    /// Override the store key prefix from the config file
    #[arg(long, env = "MAPVC_PREFIX")]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Record the live document on the current branch
    Commit {
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Load a commit of the current branch into the live document
    Checkout {
        /// Commit id or unique prefix
        commit: String,
    },
    /// Manage branches
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },
    /// Put aside or restore uncommitted work
    Stash {
        #[command(subcommand)]
        action: StashAction,
    },
    /// Show the current branch history
    Log,
    /// Show the selected project, branch and head
    Status,
    /// Print what checking out a commit would change, without applying it
    Plan {
        /// Commit id or unique prefix
        commit: String,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project and select it
    New { name: String },
    /// Select a project and load its head
    Select { name: String },
    /// List projects
    List,
    /// Summarize the selected project
    Show,
    /// Delete the selected project
    Delete,
}

#[derive(Subcommand)]
enum BranchAction {
    /// Fork the current branch
    New { name: String },
    /// Switch to another branch
    Switch { name: String },
    /// List branches
    List,
}

#[derive(Subcommand)]
enum StashAction {
    /// Stash the live document
    Save {
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Apply and remove the most recent entry
    Pop,
    /// Remove an entry without applying it
    Drop { index: usize },
    /// List entries, most recent first
    List,
}

/// Prints success notices; failures surface as the command's error.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        if notice.kind == NoticeKind::Success {
            println!("{}", notice.text);
        }
    }
}

type Engine = VersionControl<FileStore, MapDocument, ConsoleNotifier>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.data_dir.join("config.json"));
    let mut config = load_config(&config_path)?;
    if let Some(prefix) = cli.prefix.clone() {
        config.key_prefix = prefix;
    }

    let store = FileStore::open(&cli.data_dir)
        .with_context(|| format!("opening store at {}", cli.data_dir.display()))?;
    let document = MapDocument::load(&cli.document)
        .with_context(|| format!("loading document {}", cli.document.display()))?;
    let mut vc = VersionControl::new(store, document, ConsoleNotifier, config);

    run(&mut vc, cli.command)?;

    if !vc.document().events().is_empty() {
        debug!(changes = vc.document().events().len(), "saving live document");
        vc.document()
            .save(&cli.document)
            .with_context(|| format!("saving document {}", cli.document.display()))?;
    }
    Ok(())
}

fn run(vc: &mut Engine, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Project { action } => match action {
            ProjectAction::New { name } => vc.create_project(&name)?,
            ProjectAction::Select { name } => {
                vc.select_project(&name)?;
            }
            ProjectAction::List => {
                let current = vc.store().current_project_name()?;
                for name in vc.list_projects()? {
                    let marker = if current.as_deref() == Some(name.as_str()) { "*" } else { " " };
                    println!("{marker} {name}");
                }
            }
            ProjectAction::Show => {
                let summary = ProjectInspector::summary(&vc.current_project()?);
                println!("{summary}");
                for branch in &summary.branches {
                    println!("  {branch}");
                }
            }
            ProjectAction::Delete => {
                vc.delete_project()?;
            }
        },
        Commands::Commit { message } => {
            let id = vc.commit(&message)?;
            println!("{id}");
        }
        Commands::Checkout { commit } => {
            let id = resolve_commit(&vc.log()?, &commit);
            vc.checkout(&id)?;
        }
        Commands::Branch { action } => match action {
            BranchAction::New { name } => vc.create_branch(&name)?,
            BranchAction::Switch { name } => vc.switch_branch(&name)?,
            BranchAction::List => {
                let current = vc.status()?.branch;
                for name in vc.list_branches()? {
                    let marker = if name == current { "*" } else { " " };
                    println!("{marker} {name}");
                }
            }
        },
        Commands::Stash { action } => match action {
            StashAction::Save { message } => {
                vc.stash_save(&message)?;
            }
            StashAction::Pop => {
                vc.stash_pop()?;
            }
            StashAction::Drop { index } => {
                vc.delete_stash(index)?;
            }
            StashAction::List => {
                for (i, entry) in vc.stash_list()?.iter().enumerate() {
                    println!(
                        "stash@{{{i}}}: {} ({})",
                        entry.message,
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        },
        Commands::Log => {
            let log = vc.log()?;
            let head = vc.status()?.head;
            print!("{}", CommitGraph::build(&log, head.as_ref()).render());
        }
        Commands::Status => println!("{}", vc.status()?),
        Commands::Plan { commit } => {
            let id = resolve_commit(&vc.log()?, &commit);
            let plan = vc.plan_checkout(&id)?;
            for op in plan.ops() {
                println!("{op}");
            }
            println!(
                "{} removals, {} creations",
                plan.removals().len(),
                plan.creations().len()
            );
        }
    }
    Ok(())
}

/// Read the engine configuration; a missing file means defaults.
fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(EngineConfig::default()),
        Err(err) => Err(err).with_context(|| format!("reading config {}", path.display())),
    }
}

/// Expand a unique id prefix against the branch log. Anything else is passed
/// through unchanged and left for the engine to reject.
fn resolve_commit(log: &[Commit], arg: &str) -> CommitId {
    let mut matches = log.iter().filter(|c| c.id.as_str().starts_with(arg));
    match (matches.next(), matches.next()) {
        (Some(only), None) if !arg.is_empty() => only.id.clone(),
        _ => CommitId::from(arg),
    }
}
