//! rowdoc: relational rows to hierarchical documents

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rowdoc::{
    config::{parse_collections, Config, LogFormat},
    migrate::{MigrationJob, MigrationJobBuilder},
    serialize::{serializer_for, OutputFormat},
    source::SqliteRowSource,
    store::{DocumentStore, FileSystemStore, MemoryStore},
    writer::BatchWriter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "rowdoc")]
#[command(about = "Turn relational query results into XML or JSON documents")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "rowdoc.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a migration and write documents to the output directory
    Migrate {
        #[command(flatten)]
        overrides: Overrides,

        /// Output directory for documents
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Quiet mode (no progress output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the first documents a migration would write, without storing them
    Preview {
        #[command(flatten)]
        overrides: Overrides,

        /// Number of documents to print
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// Validate the configuration and the source query
    Check {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Write a starter configuration file
    Init {
        /// Output directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Command line overrides for configuration values
#[derive(Args, Debug, Default)]
struct Overrides {
    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// SQL query; column aliases such as "invoice/total" become nested fields
    #[arg(long)]
    sql: Option<String>,

    /// Output format (xml, json)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Root element name and URI prefix
    #[arg(long)]
    root_name: Option<String>,

    /// Namespace declared on the XML root element
    #[arg(long)]
    root_namespace: Option<String>,

    /// Comma-separated collections
    #[arg(long)]
    collections: Option<String>,

    /// Column used to group rows (defaults to the first column)
    #[arg(long)]
    identifier_column: Option<String>,

    /// Keep the identifier column in the documents
    #[arg(long)]
    retain_id: bool,

    /// Server-side transform name
    #[arg(long)]
    transform_name: Option<String>,

    /// Transform parameters as key,value,key,value
    #[arg(long)]
    transform_parameters: Option<String>,

    /// Rows per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Maximum documents to write
    #[arg(long)]
    max_records: Option<usize>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(database) = self.database {
            config.source.database = database;
        }
        if let Some(sql) = self.sql {
            config.source.sql = sql;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(root_name) = self.root_name {
            config.output.root_name = root_name;
        }
        if self.root_namespace.is_some() {
            config.output.root_namespace = self.root_namespace;
        }
        if let Some(collections) = self.collections {
            config.output.collections = parse_collections(&collections);
        }
        if self.identifier_column.is_some() {
            config.output.identifier_column = self.identifier_column;
        }
        if self.retain_id {
            config.output.retain_identifier = true;
        }
        if let Some(name) = self.transform_name {
            config.transform.name = name;
        }
        if let Some(parameters) = self.transform_parameters {
            config.transform.parameters = parameters;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.job.chunk_size = chunk_size;
        }
        if self.max_records.is_some() {
            config.job.max_records = self.max_records;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config if present; a missing default file just means defaults
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Migrate {
            overrides,
            out_dir,
            quiet,
        } => {
            let mut config = config;
            overrides.apply(&mut config);
            if let Some(dir) = out_dir {
                config.store.directory = dir;
            }
            run_migration(config, quiet)
        }
        Commands::Preview { overrides, limit } => {
            let mut config = config;
            overrides.apply(&mut config);
            preview(config, limit)
        }
        Commands::Check { overrides } => {
            let mut config = config;
            overrides.apply(&mut config);
            check(config)
        }
        Commands::Init { path } => init_config(path),
    }
}

fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let level = config.logging.level.raised_by(verbose).to_tracing();
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

fn build_job(config: &Config, store: Arc<dyn DocumentStore>, quiet: bool) -> Result<MigrationJob> {
    let serializer = serializer_for(config.output.format, config.output.root_namespace.clone());
    let writer = BatchWriter::new(serializer, store, config.output.root_name.trim())
        .with_collections(&config.output.collections)
        .with_transform(config.transform()?);

    MigrationJobBuilder::new(writer)
        .with_processor_config(config.output.processor_config())
        .with_chunk_size(config.job.chunk_size)
        .with_max_records(config.job.max_records)
        .with_quiet(quiet)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create migration job: {}", e))
}

fn open_source(config: &Config) -> Result<SqliteRowSource> {
    if !config.source.database.exists() {
        anyhow::bail!("Database not found: {}", config.source.database.display());
    }
    SqliteRowSource::open(&config.source.database, config.source.sql.clone())
        .with_context(|| format!("Failed to open source {}", config.source.database.display()))
}

fn run_migration(config: Config, quiet: bool) -> Result<()> {
    config.validate()?;

    info!(
        "Migrating {} as {} documents into {}",
        config.source.database.display(),
        config.output.format,
        config.store.directory.display()
    );

    let mut source = open_source(&config)?;
    let store = Arc::new(
        FileSystemStore::new(&config.store.directory)
            .with_context(|| format!("Failed to open store {}", config.store.directory.display()))?,
    );
    let job = build_job(&config, store, quiet)?;

    let stats = job.run(&mut source)?;
    info!(
        "Wrote {} documents in {:.1}s",
        stats.records_written, stats.elapsed_seconds
    );
    Ok(())
}

fn preview(mut config: Config, limit: usize) -> Result<()> {
    if limit == 0 {
        anyhow::bail!("limit must be positive");
    }
    config.job.max_records = Some(config.job.max_records.map_or(limit, |max| max.min(limit)));
    config.validate()?;

    let mut source = open_source(&config)?;
    let store = Arc::new(MemoryStore::new());
    let job = build_job(&config, store.clone(), true)?;
    job.run(&mut source)?;

    for unit in store.documents() {
        println!("{}", unit.uri);
        println!("{}\n", unit.content);
    }
    Ok(())
}

fn check(config: Config) -> Result<()> {
    config.validate()?;
    let source = open_source(&config)?;
    let transform = config.transform()?;

    println!("Configuration OK");
    println!("  Source:      {}", config.source.database.display());
    println!("  Query:       {}", source.sql());
    println!("  Format:      {}", config.output.format);
    println!("  Root name:   {}", config.output.root_name);
    let collections = if config.output.collections.is_empty() {
        config.output.root_name.clone()
    } else {
        config.output.collections.join(",")
    };
    println!("  Collections: {}", collections);
    if let Some(t) = transform {
        println!("  Transform:   {} {:?}", t.name, t.parameters);
    }
    println!("  Chunk size:  {}", config.job.chunk_size);
    println!("  Output dir:  {}", config.store.directory.display());
    Ok(())
}

fn init_config(path: PathBuf) -> Result<()> {
    let config_path = path.join("rowdoc.toml");
    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    let mut config = Config::default();
    config.source.sql =
        "SELECT id, name, total AS \"invoice/total\" FROM customer ORDER BY id".to_string();

    let toml_content = format!("# rowdoc configuration\n\n{}", config.to_toml()?);
    std::fs::create_dir_all(&path)?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());
    Ok(())
}
