//! Simulator binary
//!
//! Loads configuration, spawns the node fleet, and feeds it user commands
//! from stdin until an empty line or EOF.

use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};
use treelock::{Cluster, Config, ConfigError, NodeId};

/// Tree-based distributed mutual exclusion simulator
#[derive(Parser, Debug)]
#[command(name = "treelock", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Resolve the configuration: a file named on the command line is used
/// alone; otherwise the cascading search paths apply.
fn resolve_config(explicit: Option<&Path>) -> Result<(Config, Vec<PathBuf>), ConfigError> {
    match explicit {
        Some(path) => Config::load_file(path).map(|config| (config, vec![path.to_path_buf()])),
        None => Config::load(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    info!("treelock starting");

    let (config, loaded_paths) = match resolve_config(args.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(error = %e, "configuration is unusable");
            std::process::exit(1);
        }
    };

    if loaded_paths.is_empty() {
        info!("running on built-in defaults");
    }
    for path in &loaded_paths {
        info!(path = %path.display(), "applied config file");
    }

    // Validate the tree
    let topology = match config.topology() {
        Ok(topology) => topology,
        Err(e) => {
            error!(error = %e, "invalid topology");
            std::process::exit(1);
        }
    };

    info!("Simulation parameters:");
    info!("          nodes: {}", topology.len());
    info!("        starter: {}", topology.starter());
    info!("  bootstrap (ms): {}", config.timing.bootstrap_delay_ms);
    info!("         cs (ms): {}", config.timing.critical_section_ms);
    info!("      crash (ms): {}", config.timing.crash_ms);

    let mut cluster =
        Cluster::spawn(&topology, config.timing.clone(), config.node.mailbox_capacity).await;

    println!(">>> commands: r <id> = request, c <id> = crash, s [<id>] = status, empty line exits <<<");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        run_command(&cluster, line).await;
    }

    info!("treelock shutting down");
    cluster.shutdown();
}

/// Parse and execute one driver command line.
async fn run_command(cluster: &Cluster, line: &str) {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().unwrap_or_default();
    let id = tokens.next().map(|t| t.parse::<u32>());

    match (verb, id) {
        ("r", Some(Ok(id))) => {
            if let Err(e) = cluster.request(NodeId::new(id)).await {
                eprintln!("{}", e);
            }
        }
        ("c", Some(Ok(id))) => {
            if let Err(e) = cluster.crash(NodeId::new(id)).await {
                eprintln!("{}", e);
            }
        }
        ("s", Some(Ok(id))) => match cluster.inspect(NodeId::new(id)).await {
            Ok(snapshot) => println!("{}", snapshot),
            Err(e) => eprintln!("{}", e),
        },
        ("s", None) => {
            for id in 0..cluster.len() as u32 {
                match cluster.inspect(NodeId::new(id)).await {
                    Ok(snapshot) => println!("{}", snapshot),
                    Err(e) => eprintln!("{}", e),
                }
            }
        }
        _ => {
            eprintln!("usage: r <id> | c <id> | s [<id>] | empty line to exit");
        }
    }
}
