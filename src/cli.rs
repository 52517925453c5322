//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::import::import_file;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::error::JournalError;
use crate::domain::reconstruct::DEFAULT_POINT_VALUE;
use crate::ports::config_port::ConfigPort;
use crate::ports::journal_port::JournalPort;

#[derive(Parser, Debug)]
#[command(name = "tradejournal", about = "Local-first futures trade journal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the database schema
    Init {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Import a fill export from the command line
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV file of fills
        file: PathBuf,
        /// Portfolio id to import into
        #[arg(short, long)]
        portfolio: Option<i64>,
    },
    /// Dump the database as a SQL script
    Export {
        #[arg(short, long)]
        config: PathBuf,
        /// Output path; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::Init { config } => run_init(&config),
        Command::Import {
            config,
            file,
            portfolio,
        } => run_import(&config, &file, portfolio),
        Command::Export { config, output } => run_export(&config, output.as_ref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = JournalError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn open_journal(config: &FileConfigAdapter) -> Result<SqliteAdapter, ExitCode> {
    let journal = SqliteAdapter::from_config(config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    journal.initialize_schema().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(journal)
}

fn run_init(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match open_journal(&config) {
        Ok(_) => {
            eprintln!("Database initialized");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_import(config_path: &PathBuf, file: &PathBuf, portfolio: Option<i64>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let journal = match open_journal(&config) {
        Ok(j) => j,
        Err(code) => return code,
    };

    eprintln!("Importing fills from {}", file.display());
    let data = match fs::read(file) {
        Ok(d) => d,
        Err(e) => {
            let err = JournalError::Io(e);
            eprintln!("error: {err}");
            return ExitCode::from(&err);
        }
    };

    let point_value = config.get_double("journal", "point_value", DEFAULT_POINT_VALUE);
    let filename = file
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();

    match import_file(&journal, &filename, &data, portfolio, point_value) {
        Ok(days) => {
            for d in &days {
                eprintln!(
                    "  {}: {} trades, {:.2} P&L (day #{})",
                    d.date, d.trade_count, d.total_pnl, d.day_id
                );
            }
            eprintln!("Imported {} day(s)", days.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn run_export(config_path: &PathBuf, output: Option<&PathBuf>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let journal = match open_journal(&config) {
        Ok(j) => j,
        Err(code) => return code,
    };

    let sql = match journal.dump_sql() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    match output {
        Some(path) => match fs::write(path, &sql) {
            Ok(()) => {
                eprintln!("Wrote {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                let err = JournalError::Io(e);
                eprintln!("error: {err}");
                ExitCode::from(&err)
            }
        },
        None => {
            print!("{sql}");
            ExitCode::SUCCESS
        }
    }
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{build_router, AppState};
        use std::net::SocketAddr;
        use std::sync::Arc;

        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "tradejournal=info,tower_http=info".into()),
            )
            .init();

        eprintln!("Loading config from {}", config_path.display());
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };

        let journal = match open_journal(&config) {
            Ok(j) => j,
            Err(code) => return code,
        };

        let addr: SocketAddr = config
            .get_string("server", "listen")
            .unwrap_or_else(|| "127.0.0.1:5000".to_string())
            .parse()
            .unwrap_or_else(|_| "127.0.0.1:5000".parse().unwrap());

        let images_dir = config
            .get_string("server", "images_dir")
            .unwrap_or_else(|| "data/images".to_string());
        if let Err(e) = fs::create_dir_all(&images_dir) {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }

        eprintln!("Trade Journal is running on http://{addr}");

        let state = AppState {
            journal: Arc::new(journal),
            config: Arc::new(config),
            images_dir: images_dir.into(),
        };
        let router = build_router(state);

        tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(async {
                let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
                axum::serve(listener, router).await.unwrap();
            });

        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}
