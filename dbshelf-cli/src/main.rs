use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use dbshelf_core::{DatabaseManager, ShelfConfigBuilder};
use dbshelf_tools::ToolServer;

#[derive(Parser, Debug)]
#[command(name = "dbshelf", version)]
#[command(about = "dbshelf - sandboxed SQLite database management over stdio")]
struct Cli {
    /// Directory holding the database files (overrides DBSHELF_DATABASE_DIR)
    #[arg(long, global = true)]
    database_dir: Option<PathBuf>,

    /// Append a JSON line per operation to logs/{db}.log
    #[arg(long, global = true)]
    enable_query_logging: bool,

    /// Database used when a request omits db_name
    #[arg(long, global = true)]
    default_database: Option<String>,

    /// Log output format (logs always go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve line-delimited JSON requests on stdin/stdout (default)
    Serve,
    /// Print the definition of every operation
    Tools,
    /// Run a single operation and print its result
    Call {
        /// Operation name, e.g. read_query
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogFormat {
    Json,
    Pretty,
}

fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

fn build_manager(cli: &Cli) -> Result<DatabaseManager, dbshelf_core::ConfigError> {
    let mut builder = ShelfConfigBuilder::from_env()?;
    if let Some(dir) = &cli.database_dir {
        builder = builder.database_dir(dir.clone());
    }
    if cli.enable_query_logging {
        builder = builder.query_logging(true);
    }
    if let Some(name) = &cli.default_database {
        builder = builder.default_database(name.as_str());
    }

    let config = builder.build()?;
    Ok(DatabaseManager::new(Arc::new(config)))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let manager = match build_manager(&cli) {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };
    let server = ToolServer::new(manager);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = server.serve_stdio().await {
                tracing::error!(error = %e, "Server stopped");
                std::process::exit(1);
            }
        }
        Commands::Tools => match serde_json::to_string_pretty(&server.list_tools()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode tool definitions");
                std::process::exit(1);
            }
        },
        Commands::Call { tool, arguments } => {
            let arguments: serde_json::Value = match serde_json::from_str(&arguments) {
                Ok(value) => value,
                Err(e) => {
                    eprintln!("Invalid JSON arguments: {}", e);
                    std::process::exit(2);
                }
            };

            match server.call_tool(&tool, arguments).await {
                Ok(result) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string())
                    );
                }
                Err(e) => {
                    let payload = e.to_payload();
                    eprintln!("{}: {}", payload.kind, payload.message);
                    std::process::exit(1);
                }
            }
        }
    }
}
