use serde::{Deserialize, Serialize};

/// Tunables for the managed log and its consumers.
///
/// Set through the `log` section of a service config, or with
/// `CHROMA_<SERVICE>__LOG__<FIELD>` environment variables.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq, Eq)]
pub struct LogConfig {
    /// Entries written to a ledger before the log rolls over to a new one.
    #[serde(default = "LogConfig::default_entries_per_ledger")]
    pub entries_per_ledger: u64,
    /// Upper bound on the number of records handed to one callback.
    #[serde(default = "LogConfig::default_max_batch_size")]
    pub max_batch_size: usize,
    /// Times a failed batch is redelivered before the subscription gives up.
    #[serde(default = "LogConfig::default_max_redeliveries")]
    pub max_redeliveries: u32,
    #[serde(default = "LogConfig::default_redelivery_backoff_ms")]
    pub redelivery_backoff_ms: u64,
}

impl LogConfig {
    fn default_entries_per_ledger() -> u64 {
        50_000
    }

    fn default_max_batch_size() -> usize {
        100
    }

    fn default_max_redeliveries() -> u32 {
        3
    }

    fn default_redelivery_backoff_ms() -> u64 {
        100
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            entries_per_ledger: LogConfig::default_entries_per_ledger(),
            max_batch_size: LogConfig::default_max_batch_size(),
            max_redeliveries: LogConfig::default_max_redeliveries(),
            redelivery_backoff_ms: LogConfig::default_redelivery_backoff_ms(),
        }
    }
}
