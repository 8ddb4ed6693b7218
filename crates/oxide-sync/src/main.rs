//! oxide-sync CLI
//!
//! Command-line tool bringing a database schema in line with an entity
//! document.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use oxide_sync::prelude::*;

/// Schema synchronization for SQL Server, MySQL, PostgreSQL, SQLite and Oracle.
#[derive(Parser)]
#[command(name = "oxide-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL.
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// SQL dialect (inferred from the database URL when omitted).
    #[arg(long, env = "OXIDE_SYNC_DIALECT")]
    dialect: Option<Dialect>,

    /// Schema to synchronize (dialect default when omitted).
    #[arg(long, env = "OXIDE_SYNC_SCHEMA")]
    schema: Option<String>,

    /// Authorize column, constraint and key changes that lose data.
    #[arg(long, env = "OXIDE_SYNC_DEVELOPER_MODE")]
    developer_mode: bool,

    /// Per-statement timeout in seconds.
    #[arg(long, env = "OXIDE_SYNC_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Write executed statements to a timestamped .sql file in this directory.
    #[arg(long, env = "OXIDE_SYNC_EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    /// Entity document (JSON array of entity descriptors).
    #[arg(short, long, env = "OXIDE_SYNC_ENTITIES", default_value = "entities.json")]
    entities: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the schema in line with the entities.
    Update {
        /// Authorize every destructive change for this run.
        #[arg(long)]
        force: bool,
    },

    /// Drop every entity table present in the database.
    Drop {
        /// Required: table drops are only ever forced.
        #[arg(long)]
        force: bool,
    },

    /// Print the statements an update would run, without executing.
    Parse {
        /// Plan against an empty database instead of connecting.
        #[arg(long)]
        offline: bool,

        /// Print the script as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let dialect = match cli.dialect {
        Some(dialect) => dialect,
        None => Dialect::from_url(&cli.database).with_context(|| {
            format!("cannot infer the dialect of '{}', pass --dialect", cli.database)
        })?,
    };
    let entities = load_entities(&cli.entities)?;

    let force = matches!(
        cli.command,
        Commands::Update { force: true } | Commands::Drop { force: true }
    );
    let mut context = SyncContext::new()
        .developer_mode(cli.developer_mode)
        .force(force)
        .command_timeout(Duration::from_secs(cli.timeout_secs));
    if let Some(schema) = cli.schema {
        context = context.schema(schema);
    }
    if let Some(dir) = cli.export_dir {
        context = context.export_dir(dir);
    }
    let sync = SchemaSync::new(dialect, context);

    if let Commands::Parse {
        offline: true,
        json,
    } = cli.command
    {
        let plan = sync.plan_offline(&entities)?;
        return print_script(&plan.script, json);
    }

    if matches!(dialect, Dialect::SqlServer | Dialect::Oracle) {
        bail!("no bundled driver for {dialect}; use `parse --offline` or a custom ExecutionProvider");
    }
    let mut provider = SqlxProvider::connect(&cli.database).await?;

    match cli.command {
        Commands::Update { .. } => {
            let report = sync.update(&mut provider, &entities).await?;
            print_report(&report);
        }

        Commands::Drop { force } => {
            if !force {
                warn!("Table drops need --force");
            }
            let report = sync.drop_database(&mut provider, &entities).await?;
            print_report(&report);
        }

        Commands::Parse { json, .. } => {
            let plan = sync.plan(&mut provider, &entities).await?;
            print_script(&plan.script, json)?;
        }
    }

    provider.close().await?;
    Ok(())
}

fn print_script(script: &Script, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(script)?);
        return Ok(());
    }
    if script.is_empty() {
        info!("Schema is up to date.");
        return Ok(());
    }
    println!("-- strategy: {:?}", script.strategy());
    for statement in script.statements() {
        println!("{};", statement.sql);
        for revert in &statement.revert {
            println!("-- revert: {revert};");
        }
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    if report.up_to_date {
        info!(schema = %report.schema, "Schema is up to date.");
        return;
    }
    info!(
        dialect = %report.dialect,
        schema = %report.schema,
        statements = report.statements_executed,
        "Schema synchronized."
    );
    for operation in &report.destructive {
        warn!("Applied destructive change: {operation}");
    }
    if let Some(path) = &report.export_path {
        info!("SQL exported to {}", path.display());
    }
}
