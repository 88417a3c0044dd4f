//! # Zone configuration
//!
//! Runtime-tunable knobs for a zone, following the same shape as the
//! teacher's `TransportConfig::default()`: plain data, sensible
//! defaults, no hidden global state (§5's "global state: none").

use std::time::Duration;

/// Configuration for one [`crate::service::Service`] instance.
#[derive(Clone, Debug)]
pub struct ZoneConfig {
    /// Worker threads the zone's [`crate::scheduler::Scheduler`] runs
    /// with. Defaults to the host's logical CPU count.
    pub scheduler_worker_threads: usize,

    /// Optional per-call timeout applied by the reference transport
    /// via `tokio::time::timeout`. `None` disables the timeout.
    pub call_timeout: Option<Duration>,

    /// Bound on the local transport's internal job channel. The
    /// reference transport uses an unbounded channel today; this is
    /// reserved for a bounded variant without changing the contract.
    pub channel_capacity: usize,
}

impl Default for ZoneConfig {
    /// - Worker threads: one per logical CPU (`num_cpus::get()`).
    /// - Call timeout: disabled (`None`) — local calls do not hang.
    /// - Channel capacity: 1024, matching the teacher's default
    ///   buffer size order of magnitude.
    fn default() -> Self {
        Self {
            scheduler_worker_threads: num_cpus::get().max(1),
            call_timeout: None,
            channel_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_at_least_one_worker_thread() {
        assert!(ZoneConfig::default().scheduler_worker_threads >= 1);
    }
}
