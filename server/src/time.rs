use std::time::Duration;

/// How often expired pastes are swept out of memory.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Longest accepted TTL. Ten years.
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
