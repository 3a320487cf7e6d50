//! CLI argument parsing and command definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nusearch_query::SortMode;

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level arguments for the `nusearch` binary.
#[derive(Parser, Debug)]
#[command(name = "nusearch", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "NUSEARCH_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bulk-load package dumps into the index.
    Index {
        /// Dump directory or file (defaults to `dump.path` from config).
        path: Option<PathBuf>,

        /// Keep the index if it already exists instead of recreating it.
        #[arg(long)]
        keep_existing: bool,
    },

    /// Search the package index.
    Search {
        /// Free-text query.
        text: String,

        /// 1-based page number.
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Hits per page (defaults to `search.page_size` from config).
        #[arg(long)]
        page_size: Option<u32>,

        /// Sort order: relevance, downloads or recent.
        #[arg(short, long, default_value_t = SortMode::Relevance)]
        sort: SortMode,

        /// Print the results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the number of searchable documents.
    Count,

    /// Print version information.
    Version,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Print the effective configuration as TOML.
    Show,

    /// Get a configuration value by dotted key.
    Get {
        /// Dotted key (e.g., "store.url").
        key: String,
    },

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_default() {
        let args = CliArgs::parse_from(["nusearch"]);
        assert!(args.config.is_none());
        assert!(!args.verbose);
        assert!(!args.quiet);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["nusearch", "-v", "--config", "/tmp/c.toml", "count"]);
        assert!(args.verbose);
        assert_eq!(args.config.as_deref(), Some("/tmp/c.toml"));
        assert!(matches!(args.command, Some(Command::Count)));
    }

    #[test]
    fn test_index_command() {
        let args = CliArgs::parse_from(["nusearch", "index", "/data/dumps", "--keep-existing"]);
        match args.command {
            Some(Command::Index {
                path,
                keep_existing,
            }) => {
                assert_eq!(path, Some(PathBuf::from("/data/dumps")));
                assert!(keep_existing);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let args = CliArgs::parse_from(["nusearch", "index"]);
        assert!(matches!(
            args.command,
            Some(Command::Index {
                path: None,
                keep_existing: false
            })
        ));
    }

    #[test]
    fn test_search_defaults() {
        let args = CliArgs::parse_from(["nusearch", "search", "json"]);
        match args.command {
            Some(Command::Search {
                text,
                page,
                page_size,
                sort,
                json,
            }) => {
                assert_eq!(text, "json");
                assert_eq!(page, 1);
                assert_eq!(page_size, None);
                assert_eq!(sort, SortMode::Relevance);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_search_options() {
        let args = CliArgs::parse_from([
            "nusearch",
            "search",
            "http client",
            "--page",
            "3",
            "--page-size",
            "10",
            "--sort",
            "downloads",
            "--json",
        ]);
        match args.command {
            Some(Command::Search {
                text,
                page,
                page_size,
                sort,
                json,
            }) => {
                assert_eq!(text, "http client");
                assert_eq!(page, 3);
                assert_eq!(page_size, Some(10));
                assert_eq!(sort, SortMode::Downloads);
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_sort_is_rejected() {
        let result = CliArgs::try_parse_from(["nusearch", "search", "x", "--sort", "stars"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_init() {
        let args = CliArgs::parse_from(["nusearch", "config", "init", "-f", "/tmp/n.toml", "--force"]);
        match args.command {
            Some(Command::Config(ConfigCommand {
                command: ConfigAction::Init { file, force },
            })) => {
                assert_eq!(file.as_deref(), Some("/tmp/n.toml"));
                assert!(force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
