//! Database configuration.

use clap::{Parser, Subcommand, ValueEnum};
use givedb_core::storage::StorageConfig;
use std::path::PathBuf;

/// Default data directory.
pub const DEFAULT_DATA_PATH: &str = "./givedb_data";

/// Default sled page cache size in megabytes.
pub const DEFAULT_CACHE_MB: u64 = 256;

/// Default flush interval in milliseconds.
pub const DEFAULT_FLUSH_MS: u64 = 500;

/// What happens to dependent records when a referenced record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeletePolicy {
    /// Refuse the delete while dependents exist.
    #[default]
    Restrict,
    /// Delete dependents along with the record.
    Cascade,
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database storage directory.
    pub data_path: PathBuf,

    /// Delete behavior for every foreign key of the schema. `None` keeps
    /// the stored policy, or Restrict for a new database.
    pub delete_policy: Option<DeletePolicy>,

    /// Open an existing database without touching its catalog.
    pub read_only: bool,

    /// Page cache capacity in bytes.
    pub cache_capacity: u64,

    /// Flush interval in milliseconds. None means flush on every write.
    pub flush_every_ms: Option<u64>,

    /// Temporary database (deleted on drop).
    pub temporary: bool,
}

impl DatabaseConfig {
    /// Create a new configuration with the given data path.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            delete_policy: None,
            read_only: false,
            cache_capacity: DEFAULT_CACHE_MB * 1024 * 1024,
            flush_every_ms: Some(DEFAULT_FLUSH_MS),
            temporary: false,
        }
    }

    /// Create a temporary in-memory configuration for testing.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::new("")
        }
    }

    /// Set the delete policy.
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = Some(policy);
        self
    }

    /// Never install or upgrade the schema on open.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set the page cache capacity in bytes.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Set the flush interval.
    pub fn with_flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    /// Storage engine configuration derived from this one.
    pub fn storage_config(&self) -> StorageConfig {
        let base = if self.temporary {
            StorageConfig::temporary()
        } else {
            StorageConfig::new(self.data_path.join("storage"))
        };
        base.with_cache_capacity(self.cache_capacity)
            .with_flush_every_ms(self.flush_every_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

/// Command-line arguments for the admin tool.
#[derive(Parser, Debug)]
#[command(name = "givedb")]
#[command(version, about = "givedb donation database admin tool", long_about = None)]
pub struct Args {
    /// Path to the database storage directory.
    #[arg(short, long, default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// Expected delete behavior for foreign keys. Defaults to the stored one.
    #[arg(long, value_enum)]
    pub delete_policy: Option<DeletePolicy>,

    /// Page cache size in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB)]
    pub cache_mb: u64,

    /// Flush interval in milliseconds. Set to 0 to flush on every write.
    #[arg(long, default_value_t = DEFAULT_FLUSH_MS)]
    pub flush_ms: u64,

    /// Print machine-readable JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Admin subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the current catalog.
    Schema,
    /// Print live record counts per entity.
    Stats,
    /// Re-check every stored foreign key and unique value.
    Check,
}

impl Args {
    /// Convert command-line arguments to database configuration.
    ///
    /// Every admin command only reads, so the database is opened read-only.
    pub fn into_config(self) -> DatabaseConfig {
        let flush_every_ms = if self.flush_ms == 0 {
            None
        } else {
            Some(self.flush_ms)
        };

        let mut config = DatabaseConfig::new(self.data_path)
            .with_read_only(true)
            .with_cache_capacity(self.cache_mb * 1024 * 1024)
            .with_flush_every_ms(flush_every_ms);
        config.delete_policy = self.delete_policy;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(config.delete_policy, None);
        assert_eq!(config.flush_every_ms, Some(DEFAULT_FLUSH_MS));
        assert!(!config.temporary);
        assert!(!config.read_only);
    }

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("/var/lib/givedb")
            .with_delete_policy(DeletePolicy::Cascade)
            .with_cache_capacity(1024)
            .with_flush_every_ms(None);

        assert_eq!(config.data_path, PathBuf::from("/var/lib/givedb"));
        assert_eq!(config.delete_policy, Some(DeletePolicy::Cascade));
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.flush_every_ms, None);

        let storage = config.storage_config();
        assert_eq!(storage.path, PathBuf::from("/var/lib/givedb/storage"));
        assert_eq!(storage.cache_capacity, 1024);
    }

    #[test]
    fn test_temporary_config() {
        let config = DatabaseConfig::temporary();
        assert!(config.temporary);
        assert!(config.storage_config().temporary);
    }

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "givedb",
            "--data-path",
            "/srv/givedb",
            "--delete-policy",
            "cascade",
            "--flush-ms",
            "0",
            "stats",
        ]);
        assert_eq!(args.command, Command::Stats);

        let config = args.into_config();
        assert_eq!(config.data_path, PathBuf::from("/srv/givedb"));
        assert_eq!(config.delete_policy, Some(DeletePolicy::Cascade));
        assert!(config.read_only);
        assert_eq!(config.flush_every_ms, None);
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_MB * 1024 * 1024);
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["givedb", "check"]);
        assert_eq!(args.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(args.delete_policy, None);
        assert!(!args.json);
        assert_eq!(args.into_config().delete_policy, None);
    }
}
