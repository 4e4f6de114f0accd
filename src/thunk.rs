use crate::{
    buffer::{BufferAllocations, BufferUse, ResourceUse},
    config::ExecuteSession,
    event::{AsyncCompletionEvent, ExecuteError},
};
use core::fmt::Debug;
use rayon::ThreadPool;
use std::sync::Arc;

/// A single schedulable unit of computation over buffer slices.
///
/// The executor never looks inside a thunk: it orders thunks purely from
/// the uses they declare. A thunk must therefore declare every slice and
/// resource it touches in [`execute`](Self::execute).
pub trait Thunk: Debug + Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Slices read or written by the thunk. Called once, at graph build time.
    fn buffer_uses(&self) -> Vec<BufferUse>;

    /// Shared resources read or written by the thunk. Called once, at graph
    /// build time.
    fn resource_uses(&self) -> Vec<ResourceUse> {
        Vec::new()
    }

    /// Perform the computation.
    ///
    /// Synchronous thunks return an already resolved event; asynchronous
    /// ones (e.g. those running on [`ExecuteParams::device`]) resolve it
    /// later from any thread. Every predecessor of the thunk has completed
    /// before this is called.
    fn execute(&self, params: &ExecuteParams) -> AsyncCompletionEvent;
}

/// Thunks in program order.
pub type ThunkSequence = Vec<Box<dyn Thunk>>;

/// A unit of work handed to a [`TaskRunner`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Callback that runs a [`Task`], typically by spawning it on a pool.
pub type TaskRunner = Arc<dyn Fn(Task) + Send + Sync>;

/// [`TaskRunner`] that spawns every task on `pool`.
pub fn rayon_task_runner(pool: Arc<ThreadPool>) -> TaskRunner {
    Arc::new(move |task: Task| pool.spawn(task))
}

/// Everything a thunk may need while executing.
///
/// Cheap to clone: all heavy members are shared.
#[derive(Clone, derive_more::Debug)]
pub struct ExecuteParams {
    /// Memory the thunks' slices resolve to.
    pub buffer_allocations: Arc<BufferAllocations>,
    /// Thread pool a thunk may use for its own data-parallel work.
    pub device: Option<Arc<ThreadPool>>,
    /// Runner the executor hands split-off ready queues to.
    #[debug(skip)]
    pub task_runner: Option<TaskRunner>,
    /// Parallelism bounds of the current execution.
    pub session: ExecuteSession,
}

impl ExecuteParams {
    /// Parameters without a device or task runner: everything runs on the
    /// calling thread.
    pub fn new(buffer_allocations: Arc<BufferAllocations>) -> Self {
        Self {
            buffer_allocations,
            device: None,
            task_runner: None,
            session: ExecuteSession::default(),
        }
    }

    /// Attach a device thread pool.
    #[must_use]
    pub fn with_device(mut self, device: Arc<ThreadPool>) -> Self {
        self.device = Some(device);
        self
    }

    /// Attach a task runner.
    #[must_use]
    pub fn with_task_runner(mut self, task_runner: TaskRunner) -> Self {
        self.task_runner = Some(task_runner);
        self
    }

    /// Replace the session.
    #[must_use]
    pub fn with_session(mut self, session: ExecuteSession) -> Self {
        self.session = session;
        self
    }

    /// Whether neither a device nor a task runner is attached.
    pub fn is_single_threaded(&self) -> bool {
        self.device.is_none() && self.task_runner.is_none()
    }

    /// Run `work` on the device pool and return an event resolved with its
    /// outcome. Without a device, `work` runs inline and the returned event
    /// is already resolved.
    pub fn run_on_device(
        &self,
        work: impl FnOnce() -> Result<(), ExecuteError> + Send + 'static,
    ) -> AsyncCompletionEvent {
        let Some(device) = &self.device else {
            return AsyncCompletionEvent::from_result(work());
        };
        let event = AsyncCompletionEvent::pending();
        let done = event.clone();
        device.spawn(move || {
            done.resolve(work());
        });
        event
    }
}
