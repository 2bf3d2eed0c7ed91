use std::time::Duration;

/// Per-connection limits.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Outbound messages that may queue for one client before it is dropped as too slow.
    pub outbox_capacity: usize,
    /// Upper bound on a single socket write.
    pub write_timeout: Duration,
    /// Longest accepted input line, in bytes.
    pub max_line_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 128,
            write_timeout: Duration::from_secs(5),
            max_line_len: 4 * 1024,
        }
    }
}
