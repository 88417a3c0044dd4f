//! # Scheduler
//!
//! A thin wrapper around a `tokio::runtime::Runtime`, sized the way
//! the teacher sizes its own worker-count defaults (`num_cpus::get()`)
//! rather than hand-rolling a pool (§5 expansion). The core itself
//! only ever needs a `Handle` to spawn the `Drop`-triggered release
//! tasks described in §4.3; `block_on_current_thread` exists purely
//! for the demo binary's synchronous call sites and for tests that
//! are not themselves `#[tokio::test]`.

use std::future::Future;

use tracing::debug;

/// Owns a multi-threaded Tokio runtime sized at the host's CPU count,
/// or borrows the handle of whichever runtime is already driving the
/// caller (see [`Self::current`]).
pub struct Scheduler {
    handle: tokio::runtime::Handle,
    // Kept alive only when this scheduler owns its runtime; `None`
    // when it merely borrowed an ambient `Handle::current()`.
    owned_runtime: Option<tokio::runtime::Runtime>,
}

impl Scheduler {
    /// Build a scheduler with one worker thread per logical CPU.
    pub fn new() -> std::io::Result<Self> {
        let worker_threads = num_cpus::get().max(1);
        debug!(worker_threads, "scheduler starting");
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self { handle, owned_runtime: Some(runtime) })
    }

    /// Borrow the handle of the runtime already driving the caller,
    /// rather than starting a second one. Panics outside a Tokio
    /// runtime context, same as `Handle::current()`.
    pub fn current() -> Self {
        Self { handle: tokio::runtime::Handle::current(), owned_runtime: None }
    }

    /// A cloneable handle suitable for `tokio::spawn`ing background
    /// work from non-async contexts (e.g. `Drop` impls) — the
    /// suspension points §5 asks a zone's scheduler to own.
    pub fn handle(&self) -> tokio::runtime::Handle {
        self.handle.clone()
    }

    /// Drive `future` to completion from synchronous code. Never call
    /// this from within a task already running on this scheduler.
    pub fn block_on_current_thread<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_on_current_thread_drives_future_to_completion() {
        let scheduler = Scheduler::new().unwrap();
        let result = scheduler.block_on_current_thread(async { 1 + 1 });
        assert_eq!(result, 2);
    }
}
