use crate::{
    buffer::{AllocationIndex, BufferAllocationSlice},
    sync::{AtomicUsize, Condvar, Mutex, Ordering, lock, wait},
};
use core::mem;
use derive_more::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Error delivered through an [`AsyncCompletionEvent`].
///
/// Errors are cheap to clone and comparable so that the error surfaced by a
/// whole execution can be matched against the one a thunk reported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecuteError {
    /// A thunk reported a failure.
    #[error("thunk execution failed: {0}")]
    Failed(String),
    /// A slice does not fit into its allocation.
    #[error("slice {slice} is out of bounds of an allocation of {allocation_size} bytes")]
    SliceOutOfBounds {
        /// The offending slice.
        slice: BufferAllocationSlice,
        /// Size of the allocation the slice points into.
        allocation_size: usize,
    },
    /// A slice names an allocation the table does not have.
    #[error("allocation #{index} does not exist")]
    UnknownAllocation {
        /// The missing allocation index.
        index: AllocationIndex,
    },
}

impl ExecuteError {
    /// Shorthand for [`ExecuteError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

type Callback = Box<dyn FnOnce(Result<(), ExecuteError>) + Send>;

#[derive(Debug)]
enum EventState {
    Pending(#[debug(skip)] Vec<Callback>),
    Available,
    Failed(ExecuteError),
}

impl EventState {
    fn outcome(&self) -> Option<Result<(), ExecuteError>> {
        match self {
            Self::Pending(_) => None,
            Self::Available => Some(Ok(())),
            Self::Failed(error) => Some(Err(error.clone())),
        }
    }
}

#[derive(Debug)]
struct EventInner {
    state: Mutex<EventState>,
    #[debug(skip)]
    resolved: Condvar,
}

/// Single-resolution completion signal of an asynchronous operation.
///
/// An event starts out pending and is resolved exactly once, either to
/// "available" (success) or to an [`ExecuteError`]. Clones share the same
/// state. Callbacks registered with [`on_ready`](Self::on_ready) run once the
/// event resolves, on the thread that resolves it (or immediately, on the
/// registering thread, when it is already resolved).
#[must_use]
#[derive(Debug, Clone)]
pub struct AsyncCompletionEvent {
    inner: Arc<EventInner>,
}

impl AsyncCompletionEvent {
    fn with_state(state: EventState) -> Self {
        Self {
            inner: Arc::new(EventInner {
                state: Mutex::new(state),
                resolved: Condvar::new(),
            }),
        }
    }

    /// A pending event, resolved later via [`set_available`](Self::set_available)
    /// or [`set_error`](Self::set_error).
    pub fn pending() -> Self {
        Self::with_state(EventState::Pending(Vec::new()))
    }

    /// An event that already completed successfully.
    pub fn available() -> Self {
        Self::with_state(EventState::Available)
    }

    /// An event that already failed with `error`.
    pub fn failed(error: ExecuteError) -> Self {
        Self::with_state(EventState::Failed(error))
    }

    /// Resolve from a `Result`.
    pub fn from_result(result: Result<(), ExecuteError>) -> Self {
        match result {
            Ok(()) => Self::available(),
            Err(error) => Self::failed(error),
        }
    }

    /// Resolve the event successfully.
    ///
    /// Returns `false` (and changes nothing) if it was already resolved.
    pub fn set_available(&self) -> bool {
        self.resolve(Ok(()))
    }

    /// Resolve the event with `error`.
    ///
    /// Returns `false` (and changes nothing) if it was already resolved.
    pub fn set_error(&self, error: ExecuteError) -> bool {
        self.resolve(Err(error))
    }

    /// Resolve the event with `result`, if it is still pending.
    pub fn resolve(&self, result: Result<(), ExecuteError>) -> bool {
        let callbacks = {
            let mut state = lock(&self.inner.state);
            let EventState::Pending(callbacks) = &mut *state else {
                return false;
            };
            let callbacks = mem::take(callbacks);
            *state = match &result {
                Ok(()) => EventState::Available,
                Err(error) => EventState::Failed(error.clone()),
            };
            callbacks
        };
        self.inner.resolved.notify_all();
        for callback in callbacks {
            callback(result.clone());
        }
        true
    }

    /// Whether the event has been resolved.
    pub fn is_ready(&self) -> bool {
        !matches!(*lock(&self.inner.state), EventState::Pending(_))
    }

    /// Whether the event resolved successfully.
    pub fn is_available(&self) -> bool {
        matches!(*lock(&self.inner.state), EventState::Available)
    }

    /// Whether the event resolved to an error.
    pub fn is_error(&self) -> bool {
        matches!(*lock(&self.inner.state), EventState::Failed(_))
    }

    /// Outcome of the event, or `None` while it is pending.
    pub fn result(&self) -> Option<Result<(), ExecuteError>> {
        lock(&self.inner.state).outcome()
    }

    /// Run `callback` with the outcome once the event resolves.
    ///
    /// If the event is already resolved, `callback` runs right away on the
    /// calling thread.
    pub fn on_ready(&self, callback: impl FnOnce(Result<(), ExecuteError>) + Send + 'static) {
        let result = {
            let mut state = lock(&self.inner.state);
            if let EventState::Pending(callbacks) = &mut *state {
                callbacks.push(Box::new(callback));
                return;
            }
            state.outcome().expect("AsyncCompletionEvent::on_ready: [1]")
        };
        callback(result);
    }

    /// Block the calling thread until the event resolves and return the
    /// outcome.
    pub fn wait(&self) -> Result<(), ExecuteError> {
        let mut state = lock(&self.inner.state);
        loop {
            if let Some(result) = state.outcome() {
                return result;
            }
            state = wait(&self.inner.resolved, state);
        }
    }
}

/// Counting join: resolves its event after `count` completions.
///
/// Errors recorded before the count reaches zero are kept on a first-wins
/// basis, and the event resolves to the first one.
#[derive(Debug)]
pub struct CountDownEvent {
    remaining: AtomicUsize,
    first_error: Mutex<Option<ExecuteError>>,
    event: AsyncCompletionEvent,
}

impl CountDownEvent {
    /// Join over `count` completions. With `count == 0` the event is
    /// available right away.
    pub fn new(count: usize) -> Self {
        let event = if count == 0 {
            AsyncCompletionEvent::available()
        } else {
            AsyncCompletionEvent::pending()
        };
        Self {
            remaining: AtomicUsize::new(count),
            first_error: Mutex::new(None),
            event,
        }
    }

    /// Record `error` unless another one was recorded first.
    ///
    /// Returns whether `error` became the outcome of the join.
    pub fn record_error(&self, error: ExecuteError) -> bool {
        let mut first_error = lock(&self.first_error);
        if first_error.is_some() {
            return false;
        }
        *first_error = Some(error);
        true
    }

    /// Whether an error has been recorded.
    pub fn has_error(&self) -> bool {
        lock(&self.first_error).is_some()
    }

    /// Count down by `n`. The call that brings the count to zero resolves the
    /// event and returns `true`.
    ///
    /// # Panics
    /// If counted down more times than the initial count.
    pub fn count_down(&self, n: usize) -> bool {
        if n == 0 {
            return false;
        }
        let before = self.remaining.fetch_sub(n, Ordering::AcqRel);
        assert!(before >= n, "CountDownEvent::count_down: [1]");
        if before != n {
            return false;
        }
        let first_error = lock(&self.first_error).take();
        let resolved = match first_error {
            Some(error) => self.event.set_error(error),
            None => self.event.set_available(),
        };
        assert!(resolved, "CountDownEvent::count_down: [2]");
        true
    }

    /// The joined event.
    pub fn as_event(&self) -> AsyncCompletionEvent {
        self.event.clone()
    }
}
