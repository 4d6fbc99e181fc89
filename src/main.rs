use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use sqlx::postgres::PgPoolOptions;

use sheetload::config::Config;
use sheetload::pipeline::LoadCoordinator;

/// Bulk-load an Excel workbook into a PostgreSQL table via COPY.
///
/// Connection parameters and defaults come from the environment (a `.env`
/// file is honored); flags override the environment.
#[derive(Parser)]
#[command(name = "sheetload", version, about)]
struct Args {
    /// Workbook to load (overrides EXCEL_FILE_PATH)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Target table name (overrides TABLE_NAME)
    #[arg(long)]
    table: Option<String>,

    /// Rows per batch (overrides CHUNK_SIZE)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Concurrent loader connections (overrides WORKER_COUNT)
    #[arg(long)]
    workers: Option<usize>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(file) = self.file {
            config.file_path = file;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        log::error!("configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    log::info!(
        "loading {:?} into table \"{}\" on {}:{}/{}",
        config.file_path,
        config.table,
        config.db_host,
        config.db_port,
        config.db_name
    );

    // One connection per worker plus one for schema setup. Connections are
    // established lazily, so connection failures surface through the
    // pipeline's own error reporting.
    let pool = PgPoolOptions::new()
        .max_connections(config.workers as u32 + 1)
        .connect_lazy_with(config.connect_options());

    match LoadCoordinator::new(config, pool).run().await {
        Ok(report) if report.succeeded() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("load aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
