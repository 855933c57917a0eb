use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chains_path: PathBuf,
    pub download_dir: PathBuf,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Upper bound on retailers downloading at the same time.
    pub max_concurrent_chains: usize,
    /// Total attempts per file, including the first one.
    pub max_attempts: u32,
    pub retry_delay_base_ms: u64,
    /// `None` when the run-level timeout is disabled (`0` in the environment).
    pub run_timeout_secs: Option<u64>,
}
