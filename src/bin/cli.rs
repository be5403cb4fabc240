use clap::{Parser, Subcommand};
use colored::Colorize;
use sftap::{
    Catalog, CatalogLoader, CheckpointStore, HttpTransport, JsonLinesWriter, Message, MessageSink,
    ReqwestTransport, SfTapError, StaticCredentials, SyncReport, SyncRunner, SyncScope, TapConfig,
    TapState,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sftap")]
#[command(about = "Incremental Salesforce extraction over Bulk API 2.0 and REST query")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the selected entities and write messages to stdout
    Sync {
        #[arg(short, long)]
        config: PathBuf,

        /// Checkpoint file to resume from
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Where to write checkpoints (defaults to --state); updated after each entity
        #[arg(long)]
        state_out: Option<PathBuf>,

        /// Restrict the run to these entities (repeatable)
        #[arg(short, long = "entity")]
        entities: Vec<String>,

        #[arg(long, env = "SFTAP_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,
    },

    /// Print a SCHEMA message for every catalog entity
    Discover {
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// List catalog entities and their replication keys
    Entities {
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Show the SOQL a sync would submit for one entity
    Query {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        entity: String,

        #[arg(short, long)]
        state: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "Entity")]
    name: String,
    #[tabled(rename = "Replication Key")]
    replication_key: String,
    #[tabled(rename = "Primary Key")]
    primary_key: String,
    #[tabled(rename = "Fields")]
    fields: usize,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Records")]
    records: String,
    #[tabled(rename = "Checkpoint")]
    checkpoint: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sftap=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "sftap failed");
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> sftap::Result<bool> {
    match cli.command {
        Commands::Sync {
            config,
            state,
            state_out,
            entities,
            access_token,
        } => {
            let mut config = TapConfig::load(&config)?;
            if !entities.is_empty() {
                config.entities = entities;
            }
            let catalog = load_catalog(config.catalog.as_deref())?;
            let token = access_token
                .or_else(|| config.auth.access_token.clone())
                .ok_or_else(|| {
                    SfTapError::Auth(
                        "No access token: set SFTAP_ACCESS_TOKEN or auth.access_token".to_string(),
                    )
                })?;

            let credentials = Arc::new(StaticCredentials::new(token)?);
            let transport: Arc<dyn HttpTransport> =
                Arc::new(ReqwestTransport::new(&config, credentials)?);
            let runner = SyncRunner::from_config(&config, catalog, transport)?;

            let mut tap_state = match &state {
                Some(path) => TapState::load_or_default(path)?,
                None => TapState::default(),
            };
            let state_path = state_out.or(state);
            let mut sink = JsonLinesWriter::new(io::stdout()).with_state_file(state_path.clone());
            let report = runner.run(&mut tap_state, &mut sink).await?;

            if let Some(path) = &state_path {
                tap_state.save(path)?;
            }

            print_summary(&report, &tap_state);
            Ok(report.is_success())
        }

        Commands::Discover { catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let mut sink = JsonLinesWriter::new(io::stdout());
            for entity in catalog.entities() {
                sink.write(&Message::schema(entity))?;
            }
            Ok(true)
        }

        Commands::Entities { catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let rows: Vec<EntityRow> = catalog
                .entities()
                .iter()
                .map(|e| EntityRow {
                    name: e.name.clone(),
                    replication_key: e
                        .replication_key
                        .clone()
                        .unwrap_or_else(|| "(full table)".to_string()),
                    primary_key: e.primary_key.join(", "),
                    fields: e.fields.len(),
                })
                .collect();

            println!("{}", Table::new(rows).with(Style::rounded()));
            println!("{} entities", catalog.len().to_string().bold());
            Ok(true)
        }

        Commands::Query {
            config,
            entity,
            state,
        } => {
            let config = TapConfig::load(&config)?;
            let catalog = load_catalog(config.catalog.as_deref())?;
            let tap_state = match &state {
                Some(path) => TapState::load_or_default(path)?,
                None => TapState::default(),
            };

            let query = SyncScope::from_config(&config, catalog).query_for(&entity, &tap_state)?;

            println!("{}", query.to_soql());
            if let Some(checkpoint) = tap_state.checkpoint(&entity) {
                eprintln!("{} {}", "checkpoint:".dimmed(), checkpoint);
            }
            Ok(true)
        }
    }
}

fn load_catalog(path: Option<&Path>) -> sftap::Result<Catalog> {
    match path {
        Some(p) => CatalogLoader::load(p),
        None => CatalogLoader::bundled(),
    }
}

fn print_summary(report: &SyncReport, state: &TapState) {
    let mut rows: Vec<SummaryRow> = report
        .stats
        .iter()
        .map(|s| SummaryRow {
            entity: s.entity.clone(),
            status: "ok".green().to_string(),
            operation: "-".to_string(),
            records: s.records.to_string(),
            checkpoint: state.checkpoint(&s.entity).unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    rows.extend(report.failures.iter().map(|f| SummaryRow {
        entity: f.entity.clone(),
        status: "failed".red().to_string(),
        operation: f
            .operation
            .map(|o| o.as_str().to_string())
            .unwrap_or_else(|| "-".to_string()),
        records: "-".to_string(),
        checkpoint: state.checkpoint(&f.entity).unwrap_or_else(|| "-".to_string()),
    }));

    eprintln!("{}", Table::new(rows).with(Style::rounded()));
    for failure in &report.failures {
        eprintln!("{} {}: {}", "✗".red(), failure.entity.bold(), failure.error);
    }
    eprintln!(
        "run {}: {} records, {} failed",
        report.run_id,
        report.total_records(),
        report.failures.len()
    );
}
