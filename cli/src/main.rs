//! LQT CLI
//!
//! Command-line interface for validating and running RabbitMQ log queries.
//!
//! # Usage
//!
//! ```bash
//! lqt --help
//! lqt validate 'sevrity == "error"'
//! lqt --data logs.json query '@24h :crashes | sort timestamp desc' --limit 20
//! lqt --data logs.json complete label t
//! ```

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::config::EngineConfig;
use engine::models::LogEntry;
use engine::query::{Category, DatasetCatalogs, QlEngine, QueryError, ValidationResult};
use engine::storage::{InMemoryLogStore, LogStore};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// LQT CLI - query RabbitMQ log datasets
#[derive(Parser)]
#[command(name = "lqt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log dataset: a JSON array or one JSON object per line
    #[arg(short, long, env = "LQT_DATA_FILE")]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a query and print the result
    Validate {
        /// Query text
        query: String,
    },
    /// Complete a partially typed name
    Complete {
        /// field, severity, subsystem, label or preset
        category: Category,
        /// Typed prefix
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Suggest near matches for a misspelled name
    Suggest {
        /// field, severity, subsystem, label or preset
        category: Category,
        /// Typed term
        term: String,
    },
    /// Print every catalog
    Schema,
    /// Run a query against the dataset
    Query {
        /// Query text
        query: String,
        /// Maximum number of entries to print
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("LQT CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for usage information");
        return Ok(());
    };

    let config = EngineConfig::from_env()?;
    let output = run(&command, cli.data.as_deref(), config)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Runs one command and returns its JSON output.
fn run(command: &Commands, data: Option<&Path>, config: EngineConfig) -> Result<Value> {
    let store = InMemoryLogStore::new();
    if let Some(path) = data {
        store.insert_batch(load_entries(path)?)?;
    }
    let engine = if data.is_some() {
        QlEngine::from_store(&store, config)?
    } else {
        QlEngine::with_config(DatasetCatalogs::unresolved(), config)?
    };

    let output = match command {
        Commands::Validate { query } => serde_json::to_value(engine.validate_query(query))?,
        Commands::Complete { category, prefix } => json!(engine.complete(*category, prefix)),
        Commands::Suggest { category, term } => json!(engine.suggest(*category, term)),
        Commands::Schema => serde_json::to_value(engine.autocomplete_data())?,
        Commands::Query { query, limit } => match engine.run(query, &store, *limit) {
            Ok(result) => json!({
                "total_count": result.total_count,
                "logs": result.logs,
            }),
            Err(QueryError::Parse(e)) => {
                serde_json::to_value(ValidationResult::from_parse_error(&e, engine.config()))?
            }
            Err(QueryError::Semantic(e)) => serde_json::to_value(ValidationResult::from(&e))?,
            Err(e) => return Err(e.into()),
        },
    };
    Ok(output)
}

/// Reads log entries from a JSON array or JSON lines file.
///
/// Records that fail to deserialize or validate are skipped with a warning.
fn load_entries(path: &Path) -> Result<Vec<LogEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let records: Vec<Value> = if text.trim_start().starts_with('[') {
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON array", path.display()))?
    } else {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str(line) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(line = n + 1, error = %e, "Skipping malformed JSON line");
                    None
                }
            })
            .collect()
    };

    let total = records.len();
    let entries: Vec<LogEntry> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| {
            let entry = match serde_json::from_value::<LogEntry>(record) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(record = i, error = %e, "Skipping malformed log entry");
                    return None;
                }
            };
            match entry.validate_entry() {
                Ok(()) => Some(entry),
                Err(e) => {
                    tracing::warn!(id = entry.id, error = %e, "Skipping invalid log entry");
                    None
                }
            }
        })
        .collect();

    tracing::info!(
        path = %path.display(),
        loaded = entries.len(),
        skipped = total - entries.len(),
        "Dataset loaded"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ENTRIES: &str = r#"[
        {"id": 1, "node": "rabbit@a", "timestamp": "2024-03-10 11:00:00.000000+00:00",
         "severity": "error", "message": "closing AMQP connection", "subsystem": "connections",
         "labels": {"disconnects": true, "tls": false}},
        {"id": 2, "node": "rabbit@a", "timestamp": "2024-03-10 11:05:00.000000+00:00",
         "severity": "info", "message": "queue declared", "subsystem": "queues",
         "labels": {"tls": true}},
        {"id": 3, "node": "", "timestamp": "2024-03-10 11:06:00+00:00", "severity": "error"}
    ]"#;

    fn data_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_cli_parse() {
        // Verify CLI can parse without arguments
        let cli = Cli::try_parse_from(["lqt"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_validate_command() {
        let cli = Cli::try_parse_from(["lqt", "validate", ":errors"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Validate { ref query }) if query == ":errors"));
    }

    #[test]
    fn test_cli_complete_category() {
        let cli = Cli::try_parse_from(["lqt", "complete", "preset"]).unwrap();
        match cli.command {
            Some(Commands::Complete { category, prefix }) => {
                assert_eq!(category, Category::Preset);
                assert!(prefix.is_empty());
            }
            _ => panic!("Expected complete command"),
        }
        assert!(Cli::try_parse_from(["lqt", "complete", "colour", "x"]).is_err());
    }

    #[test]
    fn test_cli_query_limit() {
        let cli =
            Cli::try_parse_from(["lqt", "--data", "logs.json", "query", ":errors", "--limit", "5"])
                .unwrap();
        assert_eq!(cli.data, Some(PathBuf::from("logs.json")));
        assert!(matches!(cli.command, Some(Commands::Query { limit: 5, .. })));
    }

    #[test]
    fn test_load_entries_array_skips_invalid() {
        let file = data_file(ENTRIES);
        let entries = load_entries(file.path()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_load_entries_json_lines() {
        let file = data_file(
            "{\"id\": 1, \"node\": \"rabbit@a\", \"timestamp\": \"2024-03-10T11:00:00Z\"}\n\
             \n\
             not json\n\
             {\"id\": 2, \"node\": \"rabbit@b\", \"timestamp\": \"2024-03-10T11:01:00Z\"}\n",
        );
        let entries = load_entries(file.path()).unwrap();
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_load_entries_missing_file() {
        assert!(load_entries(Path::new("/nonexistent/lqt.json")).is_err());
    }

    #[test]
    fn test_run_query() {
        let file = data_file(ENTRIES);
        let command = Commands::Query {
            query: "labels any [\"disconnects\"]".to_string(),
            limit: 10,
        };
        let output = run(&command, Some(file.path()), EngineConfig::default()).unwrap();
        assert_eq!(output["total_count"], 1);
        assert_eq!(output["logs"][0]["id"], 1);
    }

    #[test]
    fn test_run_query_invalid_prints_validation() {
        let command = Commands::Query {
            query: "sevrity == error".to_string(),
            limit: 10,
        };
        let output = run(&command, None, EngineConfig::default()).unwrap();
        assert_eq!(output["valid"], false);
        assert_eq!(output["suggestions"][0], "severity");
    }

    #[test]
    fn test_run_complete_uses_dataset_catalogs() {
        let file = data_file(ENTRIES);
        let command = Commands::Complete {
            category: Category::Subsystem,
            prefix: "c".to_string(),
        };
        let output = run(&command, Some(file.path()), EngineConfig::default()).unwrap();
        assert_eq!(output, json!(["connections"]));
    }

    #[test]
    fn test_run_validate_against_dataset() {
        let file = data_file(ENTRIES);
        let command = Commands::Validate {
            query: "labels any [\"disconects\"]".to_string(),
        };
        let output = run(&command, Some(file.path()), EngineConfig::default()).unwrap();
        assert_eq!(output["valid"], false);
        assert_eq!(output["suggestions"][0], "disconnects");
    }

    #[test]
    fn test_run_schema() {
        let output = run(&Commands::Schema, None, EngineConfig::default()).unwrap();
        assert_eq!(output["severities"][0], "debug");
        assert!(output["subsystems"].as_array().unwrap().is_empty());
    }
}
