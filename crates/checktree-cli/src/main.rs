mod render;

use anyhow::{Context, Result};
use checktree_api::{init_tracing, AppState, Server};
use checktree_core::{ConfigManager, NodeId, Settings, Status};
use checktree_store::TreeStore;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "checktree")]
#[command(about = "CheckTree CLI - inspect and override pass/fail check trees", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    output: OutputFormat,

    /// SQLite database path (overrides database.path)
    #[arg(long, global = true, env = "CHECKTREE_DATABASE")]
    database: Option<String>,

    /// Configuration directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Configuration environment (development, production, ...)
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Pass,
    Fail,
}

impl From<StatusArg> for Status {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pass => Status::Pass,
            StatusArg::Fail => Status::Fail,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Import trees from a JSON file (one tree or a list of trees)
    Seed {
        file: PathBuf,
    },

    /// List ROOT nodes
    Roots,

    /// Print a node with its subtree (a random root when no id is given)
    Show {
        id: Option<NodeId>,
    },

    /// Override a node's status and propagate it to the root
    Override {
        id: NodeId,

        #[arg(value_enum, ignore_case = true)]
        status: StatusArg,
    },

    /// Delete a node and its whole subtree
    Delete {
        id: NodeId,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Serialize)]
struct DeleteResult {
    id: NodeId,
    removed: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(ConfigManager::default_config_dir);
    let manager = ConfigManager::from_dir(config_dir, cli.env.clone())
        .context("Failed to load configuration")?;
    let mut settings = manager.settings().clone();
    if let Some(path) = &cli.database {
        settings.database.path = path.clone();
    }
    init_tracing(&settings.logging);

    if let Err(e) = execute_command(&cli, &manager, settings).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}

async fn execute_command(cli: &Cli, manager: &ConfigManager, mut settings: Settings) -> Result<()> {
    match &cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host.clone();
            }
            if let Some(port) = port {
                settings.server.port = *port;
            }
            let config = Arc::new(ConfigManager::from_settings(settings)?);
            let server = Server::new(config).await?;
            server.run().await?;
            Ok(())
        }
        Commands::Config => print_value(
            &cli.output,
            &serde_json::json!({
                "config_dir": manager.config_dir().display().to_string(),
                "env": manager.env(),
                "settings": settings,
            }),
        ),
        command => {
            let path = settings.database.path.clone();
            let store = tokio::task::spawn_blocking(move || TreeStore::open(path))
                .await?
                .context("Failed to open database")?;
            let config = Arc::new(ConfigManager::from_settings(settings)?);
            let state = AppState::with_store(store, config);
            execute_store_command(command, &cli.output, state).await
        }
    }
}

async fn execute_store_command(
    command: &Commands,
    output: &OutputFormat,
    state: AppState,
) -> Result<()> {
    match command {
        Commands::Seed { file } => {
            let file = file.clone();
            let trees = state
                .blocking(move |store| store.seed_from_file(file))
                .await?;
            match output {
                OutputFormat::Json => {
                    let projected: Vec<_> = trees.iter().map(|t| t.project()).collect();
                    println!("{}", serde_json::to_string_pretty(&projected)?);
                }
                OutputFormat::Pretty => {
                    for tree in &trees {
                        println!(
                            "{} {} ({} nodes)",
                            "Imported".green().bold(),
                            tree.root().name,
                            tree.node_count()
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Roots => {
            let roots = state.blocking(|store| store.roots()).await?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&roots)?),
                OutputFormat::Pretty => {
                    if roots.is_empty() {
                        println!("{}", "No root nodes.".dimmed());
                    }
                    for root in roots {
                        println!(
                            "{} {} {}",
                            format!("#{}", root.id).cyan(),
                            root.name.bold(),
                            root.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Show { id } => {
            let id = *id;
            let subtree = state
                .blocking(move |store| match id {
                    Some(id) => store.subtree(id),
                    None => store.random_root(),
                })
                .await?;
            print_tree(output, &subtree.project())
        }
        Commands::Override { id, status } => {
            let (id, status) = (*id, Status::from(*status));
            let result = state
                .blocking(move |store| {
                    let result = store.override_status(id, status)?;
                    let root = result.report.root().map(|c| c.id).unwrap_or(id);
                    Ok((result, store.subtree(root)?))
                })
                .await?;
            let (result, root_tree) = result;
            match output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "node": result.subtree.project(),
                        "changes": result.report.changes,
                    }))?
                ),
                OutputFormat::Pretty => {
                    for change in &result.report.changes {
                        let marker = if change.changed() {
                            "changed".yellow()
                        } else {
                            "unchanged".dimmed()
                        };
                        println!(
                            "{} {} -> {} ({})",
                            format!("#{}", change.id).cyan(),
                            change.previous.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                            change.current,
                            marker
                        );
                    }
                    println!();
                    print!("{}", render::render_tree(&root_tree.project()));
                }
            }
            Ok(())
        }
        Commands::Delete { id } => {
            let id = *id;
            let removed = state.blocking(move |store| store.delete(id)).await?;
            print_value(output, &serde_json::to_value(DeleteResult { id, removed })?)
        }
        Commands::Serve { .. } | Commands::Config => Ok(()),
    }
}

fn print_tree(output: &OutputFormat, tree: &checktree_core::NodeTree) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(tree)?),
        OutputFormat::Pretty => print!("{}", render::render_tree(tree)),
    }
    Ok(())
}

fn print_value(output: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Pretty => print_pretty(value, 0),
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::Object(_) => {
                        println!("{}{}:", pad, key_colored);
                        print_pretty(val, indent + 1);
                    }
                    serde_json::Value::String(s) => println!("{}{}: {}", pad, key_colored, s.green()),
                    serde_json::Value::Number(n) => {
                        println!("{}{}: {}", pad, key_colored, n.to_string().yellow())
                    }
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{}{}: {}", pad, key_colored, val_colored);
                    }
                    other => println!("{}{}: {}", pad, key_colored, other),
                }
            }
        }
        other => println!("{}{}", pad, other),
    }
}
