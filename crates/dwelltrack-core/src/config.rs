use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// DuckDB `memory_limit` size string, e.g. `"1GB"` or `"512MB"`.
    pub duckdb_memory_limit: String,
    pub https: bool,
    /// Intervals at or below this many seconds are not persisted.
    /// `0` disables the threshold entirely.
    pub min_dwell_secs: u64,
    pub anonymous_policy: AnonymousPolicy,
    pub store_timeout_ms: u64,
    pub session_idle_minutes: u64,
    pub session_sweep_secs: u64,
    pub buffer_flush_interval_ms: u64,
    /// Pending records that wake the flush loop early.
    pub buffer_max_size: usize,
}

/// What to do with records for a session that never supplied a `uid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnonymousPolicy {
    /// Write the record with a NULL `visitor_id`.
    #[default]
    Record,
    /// Drop the record; session state still advances.
    Skip,
}

impl AnonymousPolicy {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim() {
            "" | "record" => Ok(Self::Record),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "invalid anonymous policy {other:?}: must be one of record, skip"
            )),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("DWELLTRACK_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("DWELLTRACK_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("DWELLTRACK_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "1GB".to_string()),
            https: std::env::var("DWELLTRACK_HTTPS")
                .map(|v| v == "true")
                .unwrap_or(false),
            min_dwell_secs: std::env::var("DWELLTRACK_MIN_DWELL_SECS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .map_err(|e| format!("invalid min dwell seconds: {e}"))?,
            anonymous_policy: AnonymousPolicy::parse(
                &std::env::var("DWELLTRACK_ANONYMOUS").unwrap_or_default(),
            )?,
            store_timeout_ms: std::env::var("DWELLTRACK_STORE_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|e| format!("invalid store timeout: {e}"))?,
            session_idle_minutes: std::env::var("DWELLTRACK_SESSION_IDLE_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|e| format!("invalid session idle minutes: {e}"))?,
            session_sweep_secs: std::env::var("DWELLTRACK_SESSION_SWEEP_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|e| format!("invalid session sweep seconds: {e}"))?,
            buffer_flush_interval_ms: 1000,
            buffer_max_size: 1000,
        })
    }

    pub fn min_dwell(&self) -> Duration {
        Duration::from_secs(self.min_dwell_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_minutes.saturating_mul(60))
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_secs.max(1))
    }

    pub fn buffer_flush_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_flush_interval_ms.max(1))
    }
}
