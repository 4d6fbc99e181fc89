use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

use crate::error::ConfigError;

fn require(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => value.parse::<T>().map_err(|_| ConfigError::Invalid {
            key,
            value,
            message: "not a valid value".to_string(),
        }),
    }
}

/// Which rows feed type inference before the schema is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStrategy {
    /// Classify from the first data row only.
    FirstRow,
    /// Classify from the whole first chunk, widening across its rows.
    FirstChunk,
}

impl SampleStrategy {
    /// Number of rows to pull for the sample given the configured chunk size.
    pub fn sample_size(&self, chunk_size: usize) -> usize {
        match self {
            SampleStrategy::FirstRow => 1,
            SampleStrategy::FirstChunk => chunk_size,
        }
    }
}

impl FromStr for SampleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "row" => Ok(SampleStrategy::FirstRow),
            "chunk" => Ok(SampleStrategy::FirstChunk),
            other => Err(format!("unknown sample strategy '{other}' (expected 'row' or 'chunk')")),
        }
    }
}

/// Immutable run configuration, built once at startup and passed by
/// reference from there on. Nothing here mutates after load.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub file_path: PathBuf,
    pub table: String,
    pub chunk_size: usize,
    pub workers: usize,
    pub copy_timeout: Duration,
    pub sample: SampleStrategy,
}

impl Config {
    /// Read configuration from the environment (a `.env` file is honored by
    /// the binary before this runs). Missing required settings and
    /// unparsable values fail here, before any I/O.
    pub fn from_env() -> Result<Self, ConfigError> {
        let sample = match env::var("INFER_SAMPLE") {
            Err(_) => SampleStrategy::FirstRow,
            Ok(value) => {
                SampleStrategy::from_str(&value).map_err(|message| ConfigError::Invalid {
                    key: "INFER_SAMPLE",
                    value,
                    message,
                })?
            }
        };

        let config = Self {
            db_host: env_string("DB_HOST", "localhost"),
            db_port: env_parse("DB_PORT", 5432)?,
            db_user: require("DB_USER")?,
            db_password: require("DB_PASSWORD")?,
            db_name: require("DB_NAME")?,
            file_path: PathBuf::from(require("EXCEL_FILE_PATH")?),
            table: env_string("TABLE_NAME", "excel_data"),
            chunk_size: env_parse("CHUNK_SIZE", 100_000)?,
            workers: env_parse("WORKER_COUNT", default_workers())?,
            copy_timeout: Duration::from_secs(env_parse("COPY_TIMEOUT_SECS", 300u64)?),
            sample,
        };

        config.validate()?;
        Ok(config)
    }

    /// Re-check the invariants; called again after CLI overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_SIZE",
                value: "0".to_string(),
                message: "chunk size must be at least 1".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKER_COUNT",
                value: "0".to_string(),
                message: "worker count must be at least 1".to_string(),
            });
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "TABLE_NAME",
                value: self.table.clone(),
                message: "table name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .username(&self.db_user)
            .password(&self.db_password)
            .database(&self.db_name)
    }
}

fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_user: "u".to_string(),
            db_password: "p".to_string(),
            db_name: "d".to_string(),
            file_path: PathBuf::from("data.xlsx"),
            table: "excel_data".to_string(),
            chunk_size: 1000,
            workers: 4,
            copy_timeout: Duration::from_secs(300),
            sample: SampleStrategy::FirstRow,
        }
    }

    #[test]
    fn sample_strategy_parses_row_and_chunk() {
        assert_eq!("row".parse::<SampleStrategy>(), Ok(SampleStrategy::FirstRow));
        assert_eq!("CHUNK".parse::<SampleStrategy>(), Ok(SampleStrategy::FirstChunk));
        assert!("both".parse::<SampleStrategy>().is_err());
    }

    #[test]
    fn sample_size_follows_strategy() {
        assert_eq!(SampleStrategy::FirstRow.sample_size(500), 1);
        assert_eq!(SampleStrategy::FirstChunk.sample_size(500), 500);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut c = config();
        c.chunk_size = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { key: "CHUNK_SIZE", .. })));
    }

    #[test]
    fn zero_workers_are_rejected() {
        let mut c = config();
        c.workers = 0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid { key: "WORKER_COUNT", .. })));
    }

    #[test]
    fn default_worker_count_stays_positive() {
        assert!(default_workers() >= 1);
    }
}
