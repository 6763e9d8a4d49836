pub(crate) const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
pub(crate) const PROBE_BAUD_RATE: u32 = 9600;
pub(crate) const PORT_MONITOR_INTERVAL_MS: u64 = 2000;

pub(crate) const WORKER_POLL_INTERVAL_MS: u64 = 50;
pub(crate) const OUTPUT_DRAIN_GRACE_MS: u64 = 500;

pub(crate) const BACKEND_QUERY_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_PROGRAMMER_TIMEOUT_SECS: u64 = 5;

pub(crate) const DEFAULT_CHIP: &str = "12F675";
pub(crate) const DEFAULT_MAX_RECENT_FILES: usize = 10;
pub(crate) const APP_DIR_NAME: &str = "picman";
pub(crate) const CONFIG_FILE_NAME: &str = "config.json";
