use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use entity_repo::{DbConnConfig, UnitOfWork};
use runtime::{AppConfig, CliArgs};
use std::path::{Path, PathBuf};
use url::Url;

mod demo;

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps in-memory DSNs as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    let parsed = DbConnConfig::new(dsn);
    if parsed.is_sqlite_memory() {
        return Ok(dsn.to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if create_dirs {
        if let Some(dir) = p.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Detect DB backend from URL scheme (sqlite/postgres/mysql).
fn detect_backend(dsn: &str) -> Result<&'static str> {
    let raw = dsn.trim();
    if raw.is_empty() {
        return Err(anyhow!("Database DSN not configured"));
    }

    let url = Url::parse(raw).map_err(|e| {
        anyhow!(
            "Invalid database DSN '{}': {}",
            entity_repo::redact_credentials_in_dsn(Some(raw)),
            e
        )
    })?;

    match url.scheme() {
        "sqlite" | "sqlite3" => Ok("sqlite"),
        "postgres" | "postgresql" => Ok("postgres"),
        "mysql" | "mariadb" => Ok("mysql"),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

/// Final connection settings: configured DSN, sqlite paths made absolute.
fn resolve_db_config(config: &AppConfig) -> Result<DbConnConfig> {
    let mut db = config
        .database
        .clone()
        .ok_or_else(|| anyhow!("No database configuration found"))?;

    let backend = detect_backend(&db.dsn)?;
    if backend == "sqlite" {
        db.dsn = absolutize_sqlite_dsn(db.dsn.trim(), Path::new(&config.home_dir), true)?;
    }
    Ok(db)
}

/// Repository toolkit demo and connectivity checker
#[derive(Parser)]
#[command(name = "repo-cli")]
#[command(about = "Generic repository / unit of work demo over SeaORM")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database DSN (overrides config)
    #[arg(long)]
    dsn: Option<String>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the database and ping it
    Check,
    /// Run the demo workload against a scratch table
    Demo {
        /// Rows to insert
        #[arg(long, default_value_t = 25)]
        rows: usize,

        /// Page size for the listing
        #[arg(long, default_value_t = 10)]
        page_size: u64,

        /// Page to print (1-based)
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        dsn: cli.dsn.clone(),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.home_dir));
    tracing::info!("repo-cli starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => check_database(&config).await,
        Commands::Demo {
            rows,
            page_size,
            page,
        } => run_demo(&config, rows, page_size, page).await,
    }
}

async fn check_database(config: &AppConfig) -> Result<()> {
    let db = resolve_db_config(config)?;
    tracing::info!("Checking database connectivity...");

    let conn = entity_repo::connect(&db).await?;
    conn.ping().await.context("Database ping failed")?;

    println!(
        "Database check passed: {}",
        entity_repo::redact_credentials_in_dsn(Some(&db.dsn))
    );
    Ok(())
}

async fn run_demo(config: &AppConfig, rows: usize, page_size: u64, page: u64) -> Result<()> {
    let db = resolve_db_config(config)?;
    let uow = UnitOfWork::connect(&db).await?;
    demo::create_schema(uow.connection()).await?;

    let report = demo::run(&uow, rows, page_size, page).await?;
    print!("{report}");
    Ok(())
}
