use crate::{event::ExecuteError, types::SyncUnsafeCell};
use core::{cell::UnsafeCell, fmt};
use derive_more::Display;
use std::sync::Arc;

/// Index of an allocation inside [`BufferAllocations`].
pub type AllocationIndex = usize;

/// A contiguous byte range inside one buffer allocation.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("{{index:{index}, offset:{offset}, size:{size}}}")]
pub struct BufferAllocationSlice {
    index: AllocationIndex,
    offset: usize,
    size: usize,
}

impl BufferAllocationSlice {
    /// Slice of `size` bytes starting at `offset` in allocation `index`.
    pub const fn new(index: AllocationIndex, offset: usize, size: usize) -> Self {
        Self {
            index,
            offset,
            size,
        }
    }

    /// Allocation the slice lives in.
    pub const fn index(&self) -> AllocationIndex {
        self.index
    }

    /// First byte of the slice, relative to the allocation start.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// One past the last byte, or `None` if `offset + size` overflows.
    pub const fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.size)
    }

    /// Whether the two slices share at least one byte.
    ///
    /// Empty slices overlap nothing.
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.index != other.index || self.size == 0 || other.size == 0 {
            return false;
        }
        // Overflowing slices are rejected at graph build time.
        let self_end = self.offset.saturating_add(self.size);
        let other_end = other.offset.saturating_add(other.size);
        self.offset < other_end && other.offset < self_end
    }
}

/// Whether a use only observes data or may modify it.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// The thunk only reads.
    Read,
    /// The thunk may write.
    Write,
}

impl AccessKind {
    /// Whether two accesses to the same data must be ordered.
    #[inline]
    pub(crate) const fn conflicts_with(self, other: Self) -> bool {
        matches!(self, Self::Write) || matches!(other, Self::Write)
    }
}

/// A slice accessed by a thunk, together with the kind of access.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
#[display("{access}{slice}")]
pub struct BufferUse {
    slice: BufferAllocationSlice,
    access: AccessKind,
}

impl BufferUse {
    /// Use `slice` with the given access kind.
    pub const fn new(slice: BufferAllocationSlice, access: AccessKind) -> Self {
        Self { slice, access }
    }

    /// Read-only use of `slice`.
    pub const fn read(slice: BufferAllocationSlice) -> Self {
        Self::new(slice, AccessKind::Read)
    }

    /// Read-write use of `slice`.
    pub const fn write(slice: BufferAllocationSlice) -> Self {
        Self::new(slice, AccessKind::Write)
    }

    /// The accessed slice.
    pub const fn slice(&self) -> BufferAllocationSlice {
        self.slice
    }

    /// How the slice is accessed.
    pub const fn access(&self) -> AccessKind {
        self.access
    }

    /// Two uses conflict iff their slices overlap and at least one writes.
    pub fn conflicts(&self, other: &Self) -> bool {
        self.access.conflicts_with(other.access) && self.slice.overlaps(&other.slice)
    }
}

/// What an opaque shared resource stands for. Only used for diagnostics.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Ordering token threaded through side-effecting thunks.
    Token,
    /// Communicator shared by collective operations.
    CollectiveCommunicator,
}

/// Opaque shared token ordering thunks whose interaction is not visible
/// through buffer slices.
///
/// Identity is the allocation: two uses refer to the same resource iff they
/// hold clones of the same `Arc<Resource>`.
#[derive(Debug)]
pub struct Resource {
    kind: ResourceKind,
}

impl Resource {
    /// Create a fresh resource, distinct from every other one.
    pub fn create(kind: ResourceKind) -> Arc<Self> {
        Arc::new(Self { kind })
    }

    /// Diagnostic label of the resource.
    pub const fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// A resource accessed by a thunk, together with the kind of access.
#[derive(Debug, Clone)]
pub struct ResourceUse {
    resource: Arc<Resource>,
    access: AccessKind,
}

impl ResourceUse {
    /// Use `resource` with the given access kind.
    pub fn new(resource: &Arc<Resource>, access: AccessKind) -> Self {
        Self {
            resource: Arc::clone(resource),
            access,
        }
    }

    /// Read-only use of `resource`.
    pub fn read(resource: &Arc<Resource>) -> Self {
        Self::new(resource, AccessKind::Read)
    }

    /// Read-write use of `resource`.
    pub fn write(resource: &Arc<Resource>) -> Self {
        Self::new(resource, AccessKind::Write)
    }

    /// The accessed resource.
    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    /// How the resource is accessed.
    pub const fn access(&self) -> AccessKind {
        self.access
    }

    /// Two uses conflict iff they name the same resource and at least one
    /// writes.
    pub fn conflicts(&self, other: &Self) -> bool {
        self.access.conflicts_with(other.access) && Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl PartialEq for ResourceUse {
    fn eq(&self, other: &Self) -> bool {
        self.access == other.access && Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl Eq for ResourceUse {}

impl fmt::Display for ResourceUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{{{}@{:p}}}",
            self.access,
            self.resource.kind,
            Arc::as_ptr(&self.resource)
        )
    }
}

/// Backing memory of one allocation.
type Allocation = Box<[SyncUnsafeCell<u8>]>;

/// Table of buffer allocations that thunks resolve their slices against.
///
/// The table is shared by every thunk of an execution. Reads and writes go
/// through raw byte cells: exclusivity of writers is not checked here but
/// guaranteed by the dependency graph, which orders every pair of thunks
/// whose declared uses conflict.
#[derive(Debug, Default)]
pub struct BufferAllocations {
    allocations: Vec<Allocation>,
}

impl BufferAllocations {
    /// Take ownership of the given allocation contents, indexed in order.
    pub fn new(allocations: impl IntoIterator<Item = Vec<u8>>) -> Self {
        let allocations = allocations
            .into_iter()
            .map(|bytes| bytes.into_iter().map(SyncUnsafeCell::new).collect())
            .collect();
        Self { allocations }
    }

    /// Zero-initialized allocations of the given sizes.
    pub fn zeroed(sizes: impl IntoIterator<Item = usize>) -> Self {
        Self::new(sizes.into_iter().map(|size| vec![0; size]))
    }

    /// Number of allocations.
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    /// Whether the table has no allocations.
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Size in bytes of allocation `index`.
    pub fn allocation_size(&self, index: AllocationIndex) -> Option<usize> {
        self.allocations.get(index).map(|allocation| allocation.len())
    }

    fn resolve(&self, slice: BufferAllocationSlice) -> Result<*mut u8, ExecuteError> {
        let allocation =
            self.allocations
                .get(slice.index)
                .ok_or(ExecuteError::UnknownAllocation {
                    index: slice.index,
                })?;
        match slice.end() {
            Some(end) if end <= allocation.len() => {}
            _ => {
                return Err(ExecuteError::SliceOutOfBounds {
                    slice,
                    allocation_size: allocation.len(),
                });
            }
        }
        // `SyncUnsafeCell<u8>` is transparent over `UnsafeCell<u8>`, so the
        // cells form one contiguous byte array writable through a shared ref.
        let base = UnsafeCell::raw_get(allocation.as_ptr().cast::<UnsafeCell<u8>>());
        // SAFETY: `offset + size <= len`, so the pointer stays in bounds.
        Ok(unsafe { base.add(slice.offset) })
    }

    /// Shared view of the bytes of `slice`.
    ///
    /// # Safety
    ///
    /// No thunk may write an overlapping slice while the returned reference
    /// is alive. This holds inside [`Thunk::execute`](crate::thunk::Thunk::execute)
    /// for any slice the thunk declared as a use.
    pub unsafe fn slice(&self, slice: BufferAllocationSlice) -> Result<&[u8], ExecuteError> {
        let ptr = self.resolve(slice)?;
        // SAFETY: in bounds per `resolve`; absence of writers is the caller's
        // obligation.
        Ok(unsafe { core::slice::from_raw_parts(ptr, slice.size) })
    }

    /// Exclusive view of the bytes of `slice`.
    ///
    /// # Safety
    ///
    /// No other reference to an overlapping slice may be alive while the
    /// returned one is. This holds inside
    /// [`Thunk::execute`](crate::thunk::Thunk::execute) for any slice the
    /// thunk declared as a write use and does not reference otherwise.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(
        &self,
        slice: BufferAllocationSlice,
    ) -> Result<&mut [u8], ExecuteError> {
        let ptr = self.resolve(slice)?;
        // SAFETY: in bounds per `resolve`; exclusivity is the caller's
        // obligation.
        Ok(unsafe { core::slice::from_raw_parts_mut(ptr, slice.size) })
    }

    /// Copy out the contents of every allocation.
    ///
    /// # Safety
    ///
    /// No thunk may be writing any allocation concurrently, e.g. every
    /// execution using this table has resolved its completion event.
    pub unsafe fn snapshot(&self) -> Vec<Vec<u8>> {
        self.allocations
            .iter()
            .map(|allocation| {
                allocation
                    .iter()
                    // SAFETY: no concurrent writers per the caller's contract.
                    .map(|cell| unsafe { *cell.get() })
                    .collect()
            })
            .collect()
    }

    /// Consume the table and return the contents of every allocation.
    pub fn into_vecs(self) -> Vec<Vec<u8>> {
        self.allocations
            .into_iter()
            .map(|allocation| {
                allocation
                    .into_vec()
                    .into_iter()
                    .map(SyncUnsafeCell::into_inner)
                    .collect()
            })
            .collect()
    }
}
