mod execute;

use crate::{
    config::Options,
    event::AsyncCompletionEvent,
    executor::execute::{ExecuteState, execute_sequential},
    graph::{Graph, GraphBuildError},
    ready_queue::{FifoReadyQueue, PriorityReadyQueue},
    thunk::{ExecuteParams, Thunk, ThunkSequence},
    types::Priority,
};
use derive_more::Debug;
use std::sync::Arc;

/// Executes a thunk sequence along its dependency graph.
///
/// Key responsibilities:
/// - Builds the reduced dependency graph and node priorities once, at
///   [`create`](Self::create).
/// - Runs short or strictly sequential programs in order on the calling
///   thread.
/// - Otherwise drives ready queues: a node is dispatched once all of its
///   predecessors completed, and large queues are split onto the task runner.
/// - Joins all node completions into one [`AsyncCompletionEvent`] carrying the
///   first error, if any.
///
/// The executor is immutable after construction; every call to
/// [`execute`](Self::execute) gets its own scheduling state, so executions may
/// overlap.
#[must_use]
#[derive(Debug, Clone)]
pub struct Executor {
    plan: Arc<Plan>,
}

#[derive(Debug)]
pub(crate) struct Plan {
    thunks: ThunkSequence,
    graph: Graph,
    #[debug(skip)]
    priorities: Arc<[Priority]>,
    options: Options,
}

impl Plan {
    pub(crate) fn thunk(&self, id: usize) -> &dyn Thunk {
        self.thunks[id].as_ref()
    }

    pub(crate) const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Whether `execute` should skip the ready-queue machinery.
    fn prefers_sequential(&self, params: &ExecuteParams) -> bool {
        (self.graph.is_sequential() && params.is_single_threaded())
            || self.graph.footprint_bytes() < self.options.execute_sequential_buffer_threshold
    }
}

impl Executor {
    /// Build the dependency graph of `thunks` and prepare it for execution.
    ///
    /// # Errors
    /// If a thunk reports unusable buffer metadata.
    #[tracing::instrument(level = "debug", skip_all, fields(num_thunks = thunks.len()))]
    pub fn create(thunks: ThunkSequence, options: Options) -> Result<Self, GraphBuildError> {
        let graph = Graph::build(&thunks)?;
        tracing::debug!(
            num_edges = graph.num_edges(),
            num_sources = graph.source().len(),
            num_sinks = graph.sink().len(),
            is_sequential = graph.is_sequential(),
            footprint_bytes = graph.footprint_bytes(),
            "built thunk dependency graph"
        );
        tracing::trace!("{graph}");
        let priorities = graph.priorities().into();
        Ok(Self {
            plan: Arc::new(Plan {
                thunks,
                graph,
                priorities,
                options,
            }),
        })
    }

    /// The reduced dependency graph.
    pub fn graph(&self) -> &Graph {
        &self.plan.graph
    }

    /// Options the executor was created with.
    pub fn options(&self) -> &Options {
        &self.plan.options
    }

    /// The executed thunks, in program order.
    pub fn thunks(&self) -> &[Box<dyn Thunk>] {
        &self.plan.thunks
    }

    /// Execute every thunk, respecting dependency edges.
    ///
    /// Returns immediately with an event that resolves once all thunks have
    /// completed. If a thunk fails, no thunk that has not started yet is
    /// executed, the ones in flight are left to finish, and the event
    /// resolves to the first error observed.
    pub fn execute(&self, params: &ExecuteParams) -> AsyncCompletionEvent {
        let plan = &self.plan;
        if plan.graph.is_empty() {
            return AsyncCompletionEvent::available();
        }
        if plan.prefers_sequential(params) {
            tracing::trace!(num_thunks = plan.thunks.len(), "executing sequentially");
            return execute_sequential(Arc::clone(plan), params.clone());
        }
        tracing::trace!(
            num_thunks = plan.thunks.len(),
            priority_ready_queue = plan.options.use_priority_ready_queue,
            max_workers = params.session.max_workers,
            split_threshold = params.session.split_threshold,
            "executing concurrently"
        );
        let source = plan.graph.source().iter().copied();
        if plan.options.use_priority_ready_queue {
            let ready = PriorityReadyQueue::new(Arc::clone(&plan.priorities), source);
            ExecuteState::start(Arc::clone(plan), params.clone(), ready)
        } else {
            ExecuteState::start(Arc::clone(plan), params.clone(), FifoReadyQueue::new(source))
        }
    }
}
