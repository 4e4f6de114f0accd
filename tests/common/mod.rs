#![allow(dead_code)]

use rand::{Rng, rngs::StdRng};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use thunk_executor::{
    AsyncCompletionEvent, BufferAllocationSlice, BufferAllocations, BufferUse, ExecuteError,
    ExecuteParams, ExecuteSession, Resource, ResourceUse, Thunk, ThunkSequence, rayon_task_runner,
};

pub const I32_SIZE: usize = size_of::<i32>();

/// Slice of `len` `i32` elements starting at element `start` of allocation 0.
pub fn i32_slice(start: usize, len: usize) -> BufferAllocationSlice {
    BufferAllocationSlice::new(0, start * I32_SIZE, len * I32_SIZE)
}

/// Thunk that only declares uses.
#[derive(Debug, Default)]
pub struct UsesThunk {
    pub name: String,
    pub buffer_uses: Vec<BufferUse>,
    pub resource_uses: Vec<ResourceUse>,
}

impl UsesThunk {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn reads(mut self, slice: BufferAllocationSlice) -> Self {
        self.buffer_uses.push(BufferUse::read(slice));
        self
    }

    pub fn writes(mut self, slice: BufferAllocationSlice) -> Self {
        self.buffer_uses.push(BufferUse::write(slice));
        self
    }

    pub fn reads_resource(mut self, resource: &Arc<Resource>) -> Self {
        self.resource_uses.push(ResourceUse::read(resource));
        self
    }

    pub fn writes_resource(mut self, resource: &Arc<Resource>) -> Self {
        self.resource_uses.push(ResourceUse::write(resource));
        self
    }

    pub fn boxed(self) -> Box<dyn Thunk> {
        Box::new(self)
    }
}

impl Thunk for UsesThunk {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer_uses(&self) -> Vec<BufferUse> {
        self.buffer_uses.clone()
    }

    fn resource_uses(&self) -> Vec<ResourceUse> {
        self.resource_uses.clone()
    }

    fn execute(&self, _params: &ExecuteParams) -> AsyncCompletionEvent {
        AsyncCompletionEvent::available()
    }
}

fn read_i32s(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(I32_SIZE)
        .map(|chunk| i32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// `dst[i] += src[i]` over `i32` elements, on the device when there is one.
#[derive(Debug, Clone)]
pub struct AddI32Thunk {
    pub src: BufferAllocationSlice,
    pub dst: BufferAllocationSlice,
    /// Fail with this error instead of computing.
    pub fail: Option<ExecuteError>,
    /// Fail with this error from the device, after a short delay, instead of
    /// computing.
    pub fail_on_device: Option<ExecuteError>,
}

impl AddI32Thunk {
    pub fn new(src: BufferAllocationSlice, dst: BufferAllocationSlice) -> Self {
        assert_eq!(src.size(), dst.size());
        Self {
            src,
            dst,
            fail: None,
            fail_on_device: None,
        }
    }
}

impl Thunk for AddI32Thunk {
    fn name(&self) -> &str {
        "add_i32"
    }

    fn buffer_uses(&self) -> Vec<BufferUse> {
        vec![BufferUse::read(self.src), BufferUse::write(self.dst)]
    }

    fn execute(&self, params: &ExecuteParams) -> AsyncCompletionEvent {
        if let Some(error) = &self.fail {
            return AsyncCompletionEvent::failed(error.clone());
        }
        let buffers = Arc::clone(&params.buffer_allocations);
        let (src, dst) = (self.src, self.dst);
        let fail_on_device = self.fail_on_device.clone();
        params.run_on_device(move || {
            if let Some(error) = fail_on_device {
                std::thread::sleep(std::time::Duration::from_millis(2));
                return Err(error);
            }
            // SAFETY: both slices are declared uses; the source is copied out
            // before the destination is borrowed.
            let src = read_i32s(unsafe { buffers.slice(src)? });
            let dst = unsafe { buffers.slice_mut(dst)? };
            for (chunk, value) in dst.chunks_exact_mut(I32_SIZE).zip(src) {
                let sum = i32::from_le_bytes((&*chunk).try_into().unwrap()).wrapping_add(value);
                chunk.copy_from_slice(&sum.to_le_bytes());
            }
            Ok(())
        })
    }
}

/// Thunk writing a shared resource: counts its executions and flags any
/// overlap with another execution of a thunk sharing `busy`.
#[derive(Debug, Clone)]
pub struct ResourceCounterThunk {
    pub resource: Arc<Resource>,
    pub buffer: BufferAllocationSlice,
    pub executions: Arc<AtomicUsize>,
    pub busy: Arc<AtomicBool>,
    pub overlaps: Arc<AtomicUsize>,
}

impl Thunk for ResourceCounterThunk {
    fn name(&self) -> &str {
        "resource_counter"
    }

    fn buffer_uses(&self) -> Vec<BufferUse> {
        vec![BufferUse::write(self.buffer)]
    }

    fn resource_uses(&self) -> Vec<ResourceUse> {
        vec![ResourceUse::write(&self.resource)]
    }

    fn execute(&self, params: &ExecuteParams) -> AsyncCompletionEvent {
        let this = self.clone();
        params.run_on_device(move || {
            if this.busy.swap(true, Ordering::AcqRel) {
                this.overlaps.fetch_add(1, Ordering::Relaxed);
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
            this.executions.fetch_add(1, Ordering::Relaxed);
            this.busy.store(false, Ordering::Release);
            Ok(())
        })
    }
}

/// Random `dst += src` thunks over a buffer of `num_elements` `i32`s.
///
/// Slices have random length and may overlap each other (and themselves).
pub fn random_add_thunks(
    rng: &mut StdRng,
    num_thunks: usize,
    num_elements: usize,
) -> Vec<AddI32Thunk> {
    (0..num_thunks)
        .map(|_| {
            let len = rng.gen_range(1..=8.min(num_elements));
            let src = rng.gen_range(0..=num_elements - len);
            let dst = rng.gen_range(0..=num_elements - len);
            AddI32Thunk::new(i32_slice(src, len), i32_slice(dst, len))
        })
        .collect()
}

pub fn boxed(thunks: impl IntoIterator<Item = impl Thunk + 'static>) -> ThunkSequence {
    thunks
        .into_iter()
        .map(|thunk| Box::new(thunk) as Box<dyn Thunk>)
        .collect()
}

/// Buffer of `num_elements` `i32`s holding `0, 1, 2, ...`.
pub fn counting_buffer(num_elements: usize) -> Arc<BufferAllocations> {
    let bytes = (0..num_elements as i32).flat_map(i32::to_le_bytes).collect();
    Arc::new(BufferAllocations::new([bytes]))
}

pub fn thread_pool(num_threads: usize) -> Arc<ThreadPool> {
    Arc::new(ThreadPoolBuilder::new().num_threads(num_threads).build().unwrap())
}

/// Parameters running thunks on `device` and split queues on `workers`.
pub fn concurrent_params(
    buffers: Arc<BufferAllocations>,
    device: &Arc<ThreadPool>,
    workers: &Arc<ThreadPool>,
) -> ExecuteParams {
    ExecuteParams::new(buffers)
        .with_device(Arc::clone(device))
        .with_task_runner(rayon_task_runner(Arc::clone(workers)))
        .with_session(ExecuteSession::new(4, 2))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
