//! Insight CLI
//!
//! Command-line interface for Insight operations:
//! - Run queries against registered datasets
//! - Register, list and remove datasets
//! - Generate a default config file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use insight::config::{generate_default_config, init_logging, Config};
use insight::dataset::{import_files, DatasetInfo, DatasetKind, DatasetProvider, DatasetStore};
use insight::query::{QueryExecutor, QueryOutput};

#[derive(Parser)]
#[command(name = "insight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query course and room datasets in restricted English")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query
    Query {
        /// Query text, e.g. "In courses dataset courses, find all entries; show Average."
        query: String,
    },

    /// Manage registered datasets
    Datasets {
        #[command(subcommand)]
        action: DatasetCommand,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DatasetCommand {
    /// List registered datasets
    List,

    /// Register a dataset from section exports (.csv) or record arrays (.json)
    Add {
        /// Dataset id
        id: String,
        /// Dataset kind
        #[arg(short, long)]
        kind: DatasetKind,
        /// Source files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove a dataset
    Remove {
        /// Dataset id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load_with_env(path)
                .with_context(|| format!("Failed to load config from {:?}", path))?;
            init_logging(&config.logging);
            config
        }
        None => {
            let loaded = Config::load_default();
            init_logging(&loaded.config.logging);
            loaded.report();
            loaded.config
        }
    };

    match cli.command {
        Commands::Query { query } => {
            let store = open_store(&config).await?;
            let executor = QueryExecutor::new(store);
            let output = executor.execute_str(&query).await?;

            match cli.format {
                OutputFormat::Table => print_table(&output),
                OutputFormat::Json => {
                    let body = serde_json::json!({ "result": output.rows });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                OutputFormat::Csv => output
                    .write_csv(std::io::stdout().lock())
                    .context("Failed to write CSV")?,
            }
        }

        Commands::Datasets { action } => {
            let store = open_store(&config).await?;

            match action {
                DatasetCommand::List => {
                    let datasets = store.list_datasets().await;
                    match cli.format {
                        OutputFormat::Json => {
                            let body = serde_json::json!({ "result": datasets });
                            println!("{}", serde_json::to_string_pretty(&body)?);
                        }
                        _ => print_datasets(&datasets),
                    }
                }

                DatasetCommand::Add { id, kind, files } => {
                    let records = import_files(kind, &files)
                        .await
                        .with_context(|| format!("Failed to import {:?}", files))?;
                    let info = store.add_dataset(&id, records).await?;
                    println!("Added {} dataset '{}' with {} rows", info.kind, info.id, info.num_rows);
                }

                DatasetCommand::Remove { id } => {
                    store.remove_dataset(&id).await?;
                    println!("Removed dataset '{}'", id);
                }
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", content);
                }
            }
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<DatasetStore>> {
    let store = DatasetStore::open(&config.storage.data_dir)
        .await
        .with_context(|| format!("Failed to open data directory {}", config.storage.data_dir))?;
    Ok(Arc::new(store))
}

fn print_table(output: &QueryOutput) {
    if output.is_empty() {
        println!("No rows");
        return;
    }

    let cells: Vec<Vec<String>> = output
        .rows
        .iter()
        .map(|row| {
            output
                .columns
                .iter()
                .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = output
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| cells.iter().map(|r| r[i].len()).fold(c.len(), usize::max))
        .collect();

    // Header
    let header: Vec<String> = output
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c, w = *w))
        .collect();
    println!("{}", header.join(" | "));

    // Separator
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 3 * (widths.len() - 1)));

    // Data rows
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<w$}", v, w = *w))
            .collect();
        println!("{}", line.join(" | "));
    }

    println!("\n{} rows ({} ms)", output.len(), output.execution_time_ms);
}

fn print_datasets(datasets: &[DatasetInfo]) {
    if datasets.is_empty() {
        println!("No datasets registered");
        return;
    }

    println!("{:<20} | {:<8} | {:>8} | Added", "ID", "Kind", "Rows");
    println!("{}", "-".repeat(64));
    for info in datasets {
        println!(
            "{:<20} | {:<8} | {:>8} | {}",
            info.id,
            info.kind.as_str(),
            info.num_rows,
            info.added_at.format("%Y-%m-%d %H:%M")
        );
    }
}
