//! contentmirror CLI
//!
//! Command-line tools for inspecting a SQLite content mirror.
//!
//! # Commands
//!
//! - `inspect` - Display record counts and the sync cursor
//! - `get` - Print one record
//! - `query` - Run a filtered query
//! - `resolve` - Print a record with its links expanded
//! - `cursor` - Show or reset the persisted sync cursor

mod commands;

use clap::{Parser, Subcommand};
use commands::Format;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// contentmirror command-line tools.
#[derive(Parser)]
#[command(name = "cmirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite mirror file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Default locale of the space
    #[arg(global = true, long, default_value = "en-US")]
    default_locale: String,

    /// Extra locale with its fallback, as `code` or `code:fallback` (repeatable)
    #[arg(global = true, long = "locale-fallback")]
    locale_fallbacks: Vec<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display record counts per content type and the sync cursor
    Inspect {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print one record by id
    Get {
        /// Record id
        id: String,
    },

    /// Run a filtered query over one content type
    Query {
        /// Content type id
        content_type: String,

        /// Condition as `path=value` or `path[op]=value` (repeatable)
        #[arg(short = 'F', long = "filter")]
        filters: Vec<String>,

        /// Link levels to include
        #[arg(short, long, default_value = "0")]
        include: usize,

        /// Maximum number of items
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of items to skip
        #[arg(short, long, default_value = "0")]
        skip: usize,

        /// Locale for field paths
        #[arg(long)]
        locale: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Print a record with its links resolved
    Resolve {
        /// Record id
        id: String,

        /// Link levels to follow
        #[arg(short, long, default_value = "1")]
        depth: usize,

        /// Locale to read fields in
        #[arg(long)]
        locale: Option<String>,
    },

    /// Show or reset the persisted sync cursor
    Cursor {
        /// Delete the cursor so the next sync starts over
        #[arg(long)]
        reset: bool,

        /// Id of the cursor record
        #[arg(long, default_value = contentmirror_sync_engine::DEFAULT_CURSOR_KEY)]
        key: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("cmirror v{}", env!("CARGO_PKG_VERSION"));
        println!("contentmirror core v{}", contentmirror_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or("Mirror path required (--path)")?;
    let config = commands::config(&cli.default_locale, &cli.locale_fallbacks)?;
    let store = commands::open_store(&path, config)?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Inspect { format } => commands::inspect::run(&store, &path, format, &mut out)?,
        Commands::Get { id } => commands::get::run(&store, &id, &mut out)?,
        Commands::Query {
            content_type,
            filters,
            include,
            limit,
            skip,
            locale,
            format,
        } => {
            let request = commands::query::QueryRequest {
                content_type,
                filters,
                include,
                limit,
                skip,
                locale,
            };
            commands::query::run(&store, &request, format, &mut out)?;
        }
        Commands::Resolve { id, depth, locale } => {
            commands::resolve::run(&store, &id, depth, locale.as_deref(), &mut out)?;
        }
        Commands::Cursor { reset, key } => commands::cursor::run(&store, &key, reset, &mut out)?,
        Commands::Version => {}
    }

    Ok(())
}
