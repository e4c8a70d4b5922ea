//! Command-line surface (spec.md §6.4): a thin front-end that is itself
//! the daemon in foreground mode for `start`, and an HTTP client against
//! `/api/*` for everything else.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oak-ci")]
#[command(about = "Per-project codebase intelligence daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Project root to operate on. Defaults to the current directory.
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground.
    Start,
    /// Stop a running daemon.
    Stop,
    /// Stop then start the daemon.
    Restart,
    /// Report whether the daemon is running and its health.
    Status,
    /// Print the daemon's log file path and tail its contents.
    Logs {
        /// Number of trailing lines to print.
        #[arg(short, long, default_value_t = 50)]
        lines: usize,
    },
    /// Trigger a project re-index.
    Index {
        /// Re-walk every file, including ones whose content hash is
        /// unchanged (the default already skips unchanged files, so this
        /// flag only affects how the run is framed to the caller).
        #[arg(long)]
        full: bool,
        #[arg(long, conflicts_with = "full")]
        incremental: bool,
    },
    /// Run a unified search over code, memories, and plans.
    Search {
        query: String,
        #[arg(long)]
        search_type: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Store a manual memory observation.
    Remember {
        text: String,
        #[arg(long, default_value = "discovery")]
        r#type: String,
        #[arg(long)]
        tag: Vec<String>,
    },
    /// List recorded sessions.
    Sessions {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Export the relational store as a SQL script.
    Backup {
        /// Destination file; defaults to stdout.
        out: Option<PathBuf>,
    },
    /// Import a SQL script produced by `backup`.
    Restore { path: PathBuf },
    /// Serve the MCP tool surface on stdio. Probes `/api/health` first and
    /// exits with a clear message if the daemon is unreachable (spec.md
    /// §4.11).
    Mcp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_with_defaults() {
        let cli = Cli::parse_from(["oak-ci", "search", "where is auth handled"]);
        match cli.command {
            Command::Search { query, search_type, limit } => {
                assert_eq!(query, "where is auth handled");
                assert_eq!(search_type, None);
                assert_eq!(limit, 10);
            }
            _ => panic!("expected Search"),
        }
    }

    #[test]
    fn index_full_and_incremental_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["oak-ci", "index", "--full", "--incremental"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn project_flag_is_global() {
        let cli = Cli::parse_from(["oak-ci", "--project", "/tmp/some-repo", "status"]);
        assert_eq!(cli.project, Some(PathBuf::from("/tmp/some-repo")));
    }

    #[test]
    fn remember_collects_repeated_tag_flags() {
        let cli = Cli::parse_from(["oak-ci", "remember", "note", "--tag", "a", "--tag", "b"]);
        match cli.command {
            Command::Remember { tag, .. } => assert_eq!(tag, vec!["a".to_owned(), "b".to_owned()]),
            _ => panic!("expected Remember"),
        }
    }
}
