use core::{num::NonZeroUsize, str::FromStr};

/// Environment variable overriding [`Options::execute_sequential_buffer_threshold`].
pub const SEQUENTIAL_BUFFER_THRESHOLD_ENV: &str = "THUNK_EXECUTOR_SEQUENTIAL_BUFFER_THRESHOLD";
/// Environment variable overriding [`Options::use_priority_ready_queue`].
pub const USE_PRIORITY_READY_QUEUE_ENV: &str = "THUNK_EXECUTOR_USE_PRIORITY_READY_QUEUE";
/// Environment variable overriding [`ExecuteSession::max_workers`].
pub const MAX_WORKERS_ENV: &str = "THUNK_EXECUTOR_MAX_WORKERS";
/// Environment variable overriding [`ExecuteSession::split_threshold`].
pub const SPLIT_THRESHOLD_ENV: &str = "THUNK_EXECUTOR_SPLIT_THRESHOLD";

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// Executor-wide options, fixed at [`Executor::create`](crate::executor::Executor::create).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Options {
    /// Graphs touching fewer bytes than this always run on the sequential
    /// path: scheduling overhead would dominate the work.
    pub execute_sequential_buffer_threshold: usize,
    /// Order ready nodes by priority (longest path to a sink) instead of
    /// readiness order.
    pub use_priority_ready_queue: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            execute_sequential_buffer_threshold: 512,
            use_priority_ready_queue: true,
        }
    }
}

impl Options {
    /// Defaults overridden by `THUNK_EXECUTOR_SEQUENTIAL_BUFFER_THRESHOLD` and
    /// `THUNK_EXECUTOR_USE_PRIORITY_READY_QUEUE` when they are set and parse.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            execute_sequential_buffer_threshold: env_or(
                SEQUENTIAL_BUFFER_THRESHOLD_ENV,
                default.execute_sequential_buffer_threshold,
            ),
            use_priority_ready_queue: env_or(
                USE_PRIORITY_READY_QUEUE_ENV,
                default.use_priority_ready_queue,
            ),
        }
    }

    /// Set [`Self::execute_sequential_buffer_threshold`].
    #[must_use]
    pub const fn with_sequential_buffer_threshold(mut self, bytes: usize) -> Self {
        self.execute_sequential_buffer_threshold = bytes;
        self
    }

    /// Set [`Self::use_priority_ready_queue`].
    #[must_use]
    pub const fn with_priority_ready_queue(mut self, enabled: bool) -> Self {
        self.use_priority_ready_queue = enabled;
        self
    }
}

/// Per-call bounds on parallelism, passed with every
/// [`Executor::execute`](crate::executor::Executor::execute).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExecuteSession {
    /// Maximum number of workers processing ready queues at once, including
    /// the calling thread.
    pub max_workers: usize,
    /// Minimum ready queue length at which half of the queue is handed to a
    /// new worker on the task runner.
    pub split_threshold: usize,
}

impl Default for ExecuteSession {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            split_threshold: 8,
        }
    }
}

impl ExecuteSession {
    /// Session with explicit bounds.
    pub const fn new(max_workers: usize, split_threshold: usize) -> Self {
        Self {
            max_workers,
            split_threshold,
        }
    }

    /// Defaults overridden by `THUNK_EXECUTOR_MAX_WORKERS` and
    /// `THUNK_EXECUTOR_SPLIT_THRESHOLD` when they are set and parse.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_workers: env_or(MAX_WORKERS_ENV, default.max_workers),
            split_threshold: env_or(SPLIT_THRESHOLD_ENV, default.split_threshold),
        }
    }

    /// Set [`Self::max_workers`].
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set [`Self::split_threshold`].
    #[must_use]
    pub const fn with_split_threshold(mut self, split_threshold: usize) -> Self {
        self.split_threshold = split_threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_override_defaults() {
        let options = Options::default()
            .with_sequential_buffer_threshold(0)
            .with_priority_ready_queue(false);
        assert_eq!(options.execute_sequential_buffer_threshold, 0);
        assert!(!options.use_priority_ready_queue);

        let session = ExecuteSession::default().with_max_workers(3).with_split_threshold(1);
        assert_eq!(session, ExecuteSession::new(3, 1));
        assert!(ExecuteSession::default().max_workers >= 1);
    }

    #[test]
    fn unparsable_env_falls_back() {
        assert_eq!(env_or("THUNK_EXECUTOR_TEST_UNSET_VARIABLE", 17usize), 17);
    }
}
