//! Dispatch for every CLI subcommand that talks to an already-running
//! daemon over HTTP (spec.md §6.4). `start` and `mcp` are handled directly
//! in [`crate::main`]; everything here goes through [`DaemonClient`].

use std::io::Write as _;
use std::path::{Path, PathBuf};

use oak_ci_infrastructure::config::ProjectPaths;

use crate::cli::Command;
use crate::client::DaemonClient;
use crate::{exit, process};

/// A required daemon connection could not be established.
pub struct NotRunning;

fn connect(project_root: &Path) -> Result<DaemonClient, NotRunning> {
    let paths = ProjectPaths::new(project_root);
    let pid = process::read_pid(&paths);
    let port = process::read_port(&paths);
    match (pid, port) {
        (Some(pid), Some(port)) if process::is_running(pid) => Ok(DaemonClient::new(port)),
        _ => Err(NotRunning),
    }
}

/// Run one non-`start`, non-`mcp` subcommand. Returns the process exit code.
pub async fn run(project_root: &Path, command: Command) -> i32 {
    match command {
        Command::Stop => stop(project_root).await,
        Command::Restart => restart(project_root).await,
        Command::Status => status(project_root).await,
        Command::Logs { lines } => logs(project_root, lines),
        Command::Index { .. } => with_client(project_root, |client| Box::pin(async move {
            let report = client.index().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        })).await,
        Command::Search { query, search_type, limit } => with_client(project_root, |client| Box::pin(async move {
            let results = client.search(&query, search_type.as_deref(), limit).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        })).await,
        Command::Remember { text, r#type, tag } => with_client(project_root, |client| Box::pin(async move {
            let stored = client.remember(&text, &r#type, tag).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        })).await,
        Command::Sessions { limit } => with_client(project_root, |client| Box::pin(async move {
            let sessions = client.sessions(limit).await?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
            Ok(())
        })).await,
        Command::Backup { out } => backup(project_root, out).await,
        Command::Restore { path } => restore(project_root, path).await,
        Command::Start | Command::Mcp => unreachable!("handled before dispatch"),
    }
}

async fn with_client<F>(project_root: &Path, body: F) -> i32
where
    F: FnOnce(DaemonClient) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>,
{
    let client = match connect(project_root) {
        Ok(client) => client,
        Err(NotRunning) => {
            eprintln!("daemon is not running for {}; start it with `oak-ci start`", project_root.display());
            return exit::DAEMON_NOT_RUNNING;
        }
    };
    match body(client).await {
        Ok(()) => exit::OK,
        Err(e) => {
            eprintln!("error: {e}");
            exit::PROVIDER_UNREACHABLE
        }
    }
}

async fn status(project_root: &Path) -> i32 {
    let client = match connect(project_root) {
        Ok(client) => client,
        Err(NotRunning) => {
            println!("stopped");
            return exit::DAEMON_NOT_RUNNING;
        }
    };
    match client.health().await {
        Ok(health) => {
            println!("{}", serde_json::to_string_pretty(&health).unwrap_or_default());
            exit::OK
        }
        Err(e) => {
            eprintln!("daemon process is running but unresponsive: {e}");
            exit::PROVIDER_UNREACHABLE
        }
    }
}

async fn stop(project_root: &Path) -> i32 {
    let paths = ProjectPaths::new(project_root);
    let Some(pid) = process::read_pid(&paths) else {
        eprintln!("daemon is not running for {}", project_root.display());
        return exit::DAEMON_NOT_RUNNING;
    };
    if !process::is_running(pid) {
        process::clear(&paths);
        eprintln!("daemon is not running for {}", project_root.display());
        return exit::DAEMON_NOT_RUNNING;
    }
    if let Err(e) = process::terminate(pid) {
        eprintln!("failed to stop daemon: {e}");
        return exit::PROVIDER_UNREACHABLE;
    }
    for _ in 0..50 {
        if !process::is_running(pid) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    process::clear(&paths);
    println!("stopped");
    exit::OK
}

async fn restart(project_root: &Path) -> i32 {
    let stop_code = stop(project_root).await;
    if stop_code != exit::OK && stop_code != exit::DAEMON_NOT_RUNNING {
        return stop_code;
    }
    eprintln!("daemon stopped; run `oak-ci start` to bring it back up in the foreground");
    exit::OK
}

fn logs(project_root: &Path, lines: usize) -> i32 {
    let paths = ProjectPaths::new(project_root);
    let log_path = paths.log_file();
    println!("{}", log_path.display());
    let Ok(contents) = std::fs::read_to_string(&log_path) else {
        eprintln!("no log file yet at {}", log_path.display());
        return exit::OK;
    };
    let tail: Vec<&str> = contents.lines().rev().take(lines).collect();
    for line in tail.into_iter().rev() {
        println!("{line}");
    }
    exit::OK
}

async fn backup(project_root: &Path, out: Option<PathBuf>) -> i32 {
    let client = match connect(project_root) {
        Ok(client) => client,
        Err(NotRunning) => {
            eprintln!("daemon is not running for {}; start it with `oak-ci start`", project_root.display());
            return exit::DAEMON_NOT_RUNNING;
        }
    };
    let response = match client.backup_export().await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("backup failed: {e}");
            return exit::PROVIDER_UNREACHABLE;
        }
    };
    let Some(sql) = response.get("sql").and_then(|v| v.as_str()) else {
        eprintln!("malformed backup response from daemon");
        return exit::PROVIDER_UNREACHABLE;
    };
    match out {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, sql) {
                eprintln!("failed to write {}: {e}", path.display());
                return exit::PROVIDER_UNREACHABLE;
            }
            println!("wrote {}", path.display());
        }
        None => {
            let _ = std::io::stdout().write_all(sql.as_bytes());
        }
    }
    exit::OK
}

async fn restore(project_root: &Path, path: PathBuf) -> i32 {
    let sql = match std::fs::read_to_string(&path) {
        Ok(sql) => sql,
        Err(e) => {
            eprintln!("failed to read {}: {e}", path.display());
            return exit::CONFIG_INVALID;
        }
    };
    let client = match connect(project_root) {
        Ok(client) => client,
        Err(NotRunning) => {
            eprintln!("daemon is not running for {}; start it with `oak-ci start`", project_root.display());
            return exit::DAEMON_NOT_RUNNING;
        }
    };
    match client.backup_import(&sql).await {
        Ok(()) => {
            println!("restored from {}", path.display());
            exit::OK
        }
        Err(e) => {
            eprintln!("restore failed: {e}");
            exit::PROVIDER_UNREACHABLE
        }
    }
}
