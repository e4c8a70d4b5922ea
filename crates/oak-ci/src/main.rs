//! `oak-ci`: the daemon binary in foreground mode for `start`, and a thin
//! HTTP/stdio front-end against an already-running daemon for every other
//! subcommand (spec.md §6.4).

mod cli;
mod client;
mod commands;
mod daemon;
mod exit;
mod mcp_stdio;
mod process;

use clap::Parser;

use cli::{Cli, Command};
use oak_ci_infrastructure::config::ProjectPaths;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    oak_ci_infrastructure::logging::init();

    let project_root = match cli.project {
        Some(path) => path,
        None => match std::env::current_dir() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("failed to resolve current directory: {e}");
                std::process::exit(exit::CONFIG_INVALID);
            }
        },
    };

    let code = match cli.command {
        Command::Start => run_start(&project_root).await,
        Command::Mcp => run_mcp(&project_root).await,
        other => commands::run(&project_root, other).await,
    };
    std::process::exit(code);
}

async fn run_start(project_root: &std::path::Path) -> i32 {
    match daemon::run(project_root.to_owned()).await {
        Ok(()) => exit::OK,
        Err(e) => {
            eprintln!("oak-ci failed: {e}");
            if let Some(domain_err) = e.downcast_ref::<oak_ci_domain::error::Error>() {
                return exit_code_for(domain_err);
            }
            exit::PROVIDER_UNREACHABLE
        }
    }
}

fn exit_code_for(e: &oak_ci_domain::error::Error) -> i32 {
    match e {
        oak_ci_domain::error::Error::ConfigError { .. } => exit::CONFIG_INVALID,
        oak_ci_domain::error::Error::ProviderUnreachable { .. } | oak_ci_domain::error::Error::ProviderTimeout { .. } => exit::PROVIDER_UNREACHABLE,
        _ => exit::PROVIDER_UNREACHABLE,
    }
}

async fn run_mcp(project_root: &std::path::Path) -> i32 {
    let paths = ProjectPaths::new(project_root);
    let daemon_port = process::read_pid(&paths).filter(|pid| process::is_running(*pid)).and_then(|_| process::read_port(&paths));

    match mcp_stdio::run(project_root, daemon_port).await {
        Ok(()) => exit::OK,
        Err(e) => {
            eprintln!("mcp: {e}");
            exit::DAEMON_NOT_RUNNING
        }
    }
}
