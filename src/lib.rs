//! Dependency-graph executor for sequences of buffer-operating thunks.
//!
//! A program arrives as a flat sequence of thunks, each declaring the buffer
//! slices and shared resources it reads or writes. This crate:
//! - Derives a dependency DAG from those declarations: a later thunk depends
//!   on an earlier one iff they touch the same data and at least one writes.
//! - Reduces the DAG transitively, so every remaining edge is necessary, and
//!   ranks each node by its longest path to a sink.
//! - Executes the graph either sequentially on the calling thread or
//!   concurrently, dispatching nodes as their predecessors complete and
//!   splitting ready work onto an external task runner.
//!
//! Key modules:
//! - `buffer`: slices, resources, their uses and conflict rules, and the
//!   memory table thunks operate on.
//! - `thunk`: the `Thunk` interface and the parameters passed to it.
//! - `graph`: dependency analysis, transitive reduction and priorities.
//! - `ready_queue`: FIFO and priority scheduling policies.
//! - `executor`: sequential and concurrent execution.
//! - `event`: the completion event returned by every execution.
//! - `config`: executor options and per-call session bounds.
//!
//! Quick start:
//! 1. Implement `Thunk` for your operations, declaring every slice they touch
//!    in `buffer_uses`.
//! 2. Call `Executor::create` with the thunk sequence and `Options`.
//! 3. Call `Executor::execute` with `ExecuteParams` and wait on (or chain
//!    onto) the returned `AsyncCompletionEvent`.
//!
//! Two thunks whose uses conflict never run concurrently, and the later one
//! always observes every write of the earlier one. The first thunk failure
//! stops the execution from starting further thunks and becomes the
//! execution's error.

/// Buffer slices, shared resources and the memory table.
///
/// Defines `BufferUse`/`ResourceUse` with their conflict predicates, and
/// `BufferAllocations`, which resolves slices to bytes during execution.
pub mod buffer;
/// Executor options and per-execution session bounds.
pub mod config;
/// Single-resolution completion events and the error they carry.
///
/// `AsyncCompletionEvent` supports callbacks and blocking waits;
/// `CountDownEvent` joins a fixed number of completions into one event.
pub mod event;
/// The thunk executor.
///
/// Builds the dependency graph once, then runs it per call either in program
/// order or through ready queues with atomic predecessor counters.
pub mod executor;
/// Dependency graph construction.
///
/// Conflict analysis between thunk uses, transitive reduction, and
/// longest-path priorities.
pub mod graph;
/// Scheduling policies for nodes whose dependencies are satisfied.
pub mod ready_queue;
mod sync;
/// The thunk interface and execution parameters.
pub mod thunk;
/// Identifiers shared across the crate.
pub mod types;
mod utils;

pub use crate::{
    buffer::{
        AccessKind, BufferAllocationSlice, BufferAllocations, BufferUse, Resource, ResourceKind,
        ResourceUse,
    },
    config::{ExecuteSession, Options},
    event::{AsyncCompletionEvent, CountDownEvent, ExecuteError},
    executor::Executor,
    graph::{Graph, GraphBuildError, NodeDef},
    ready_queue::{FifoReadyQueue, PriorityReadyQueue, ReadyQueue},
    thunk::{ExecuteParams, Task, TaskRunner, Thunk, ThunkSequence, rayon_task_runner},
    types::{NodeId, Priority},
};
