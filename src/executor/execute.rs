use crate::{
    event::{AsyncCompletionEvent, CountDownEvent, ExecuteError},
    executor::Plan,
    graph::NodeDef,
    ready_queue::ReadyQueue,
    sync::{AtomicBool, AtomicUsize, Ordering, fence},
    thunk::ExecuteParams,
    types::NodeId,
};
use std::sync::Arc;

/// Run every thunk in program order on the calling thread.
///
/// Program order is a topological order of the graph, so no scheduling is
/// needed. When a thunk completes asynchronously, the remaining thunks run
/// from its completion callback instead of blocking.
pub(super) fn execute_sequential(plan: Arc<Plan>, params: ExecuteParams) -> AsyncCompletionEvent {
    let done = AsyncCompletionEvent::pending();
    resume_sequential(plan, params, 0, done.clone());
    done
}

fn resume_sequential(
    plan: Arc<Plan>,
    params: ExecuteParams,
    start: NodeId,
    done: AsyncCompletionEvent,
) {
    for id in start..plan.thunks.len() {
        let thunk = plan.thunk(id);
        tracing::trace!(node = id, thunk = thunk.name(), "executing thunk");
        let event = thunk.execute(&params);
        match event.result() {
            Some(Ok(())) => {}
            Some(Err(error)) => {
                tracing::debug!(node = id, %error, "thunk execution failed");
                done.set_error(error);
                return;
            }
            None => {
                event.on_ready(move |result| match result {
                    Ok(()) => resume_sequential(plan, params, id + 1, done),
                    Err(error) => {
                        tracing::debug!(node = id, %error, "thunk execution failed");
                        done.set_error(error);
                    }
                });
                return;
            }
        }
    }
    done.set_available();
}

/// Scheduling state of one concurrent execution.
///
/// Shared by every worker and completion callback of the execution; the plan
/// itself is never mutated.
pub(super) struct ExecuteState {
    plan: Arc<Plan>,
    params: ExecuteParams,
    /// Number of predecessors of each node that haven't completed yet. The
    /// decrement that brings a counter to zero enqueues the node, so every
    /// node is enqueued exactly once.
    pending_predecessors: Box<[AtomicUsize]>,
    /// Joins sink completions into the event returned to the caller. Every
    /// node has a path to some sink, so all sinks done means all nodes done.
    pending_sinks: CountDownEvent,
    /// Set on the first failure; from then on popped nodes are completed
    /// without running their thunks.
    aborted: AtomicBool,
    /// Workers currently draining a ready queue, the caller included.
    workers: AtomicUsize,
}

impl ExecuteState {
    /// Drain `ready` on the calling thread and return the event of the whole
    /// execution.
    pub(super) fn start<Q: ReadyQueue>(
        plan: Arc<Plan>,
        params: ExecuteParams,
        ready: Q,
    ) -> AsyncCompletionEvent {
        let graph = plan.graph();
        let state = Arc::new(Self {
            pending_predecessors: graph
                .nodes()
                .iter()
                .map(|node| AtomicUsize::new(node.in_edges().len()))
                .collect(),
            pending_sinks: CountDownEvent::new(graph.sink().len()),
            aborted: AtomicBool::new(false),
            workers: AtomicUsize::new(1),
            plan,
            params,
        });
        let event = state.pending_sinks.as_event();
        state.execute_ready(ready);
        state.workers.fetch_sub(1, Ordering::Relaxed);
        event
    }

    fn execute_ready<Q: ReadyQueue>(self: &Arc<Self>, mut ready: Q) {
        while let Some(id) = ready.pop() {
            self.split_ready_queue(&mut ready);
            let node = self.plan.graph().node(id);
            if self.aborted.load(Ordering::Relaxed) {
                self.complete(node, &mut ready);
                continue;
            }

            let thunk = self.plan.thunk(id);
            tracing::trace!(node = id, thunk = thunk.name(), "executing thunk");
            let event = thunk.execute(&self.params);
            if let Some(result) = event.result() {
                self.complete_with(node, result, &mut ready);
                continue;
            }

            // The thunk runs asynchronously: its successors are released from
            // the completion callback, on a fresh queue.
            let state = Arc::clone(self);
            let mut resumed = ready.empty_like();
            event.on_ready(move |result| {
                let node = state.plan.graph().node(id);
                state.complete_with(node, result, &mut resumed);
                state.execute_ready(resumed);
            });
        }
    }

    fn complete_with<Q: ReadyQueue>(
        &self,
        node: &NodeDef,
        result: Result<(), ExecuteError>,
        ready: &mut Q,
    ) {
        if let Err(error) = result {
            self.abort(node.id(), error);
        }
        self.complete(node, ready);
    }

    fn abort(&self, id: NodeId, error: ExecuteError) {
        if self.pending_sinks.record_error(error.clone()) {
            tracing::debug!(
                node = id,
                %error,
                "thunk execution failed, not starting further thunks"
            );
        } else {
            tracing::debug!(node = id, %error, "thunk execution failed after an earlier failure");
        }
        self.aborted.store(true, Ordering::Relaxed);
    }

    /// Release the successors of a completed node, pushing the ones that
    /// became ready onto `ready`.
    fn complete<Q: ReadyQueue>(&self, node: &NodeDef, ready: &mut Q) {
        let out_edges = node.out_edges();
        if out_edges.is_empty() {
            self.pending_sinks.count_down(1);
            return;
        }
        // Publish this node's writes to whichever thread sees a successor's
        // counter reach zero.
        fence(Ordering::Release);
        let num_ready = ready.len();
        for &successor in out_edges {
            let counter = &self.pending_predecessors[successor];
            if counter.fetch_sub(1, Ordering::Relaxed) == 1 {
                ready.push(successor);
            }
        }
        if ready.len() != num_ready {
            // Observe the writes of every other predecessor of the new nodes.
            fence(Ordering::Acquire);
        }
    }

    /// Hand the back half of `ready` to a new worker on the task runner, if
    /// the queue is long enough and the session allows another worker.
    fn split_ready_queue<Q: ReadyQueue>(self: &Arc<Self>, ready: &mut Q) {
        let Some(task_runner) = &self.params.task_runner else {
            return;
        };
        let session = self.params.session;
        if ready.len() < session.split_threshold.max(2) || !self.try_add_worker(session.max_workers)
        {
            return;
        }
        let split = ready.pop_half();
        tracing::trace!(num_nodes = split.len(), "handing ready nodes to a new worker");
        let state = Arc::clone(self);
        task_runner(Box::new(move || {
            state.execute_ready(split);
            state.workers.fetch_sub(1, Ordering::Relaxed);
        }));
    }

    fn try_add_worker(&self, max_workers: usize) -> bool {
        let mut workers = self.workers.load(Ordering::Relaxed);
        loop {
            if workers >= max_workers {
                return false;
            }
            match self.workers.compare_exchange_weak(
                workers,
                workers + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => workers = actual,
            }
        }
    }
}
