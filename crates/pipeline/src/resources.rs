//! Per-module resource registry.
//!
//! Every allocation made on a module's behalf is registered here and
//! released in one sweep when the module is freed, which removes the
//! leak paths of per-call cleanup. Containers are drawn from fixed
//! chunks and recycled through a free list; usage counters feed the
//! diagnostics stream.
//!
//! All operations take `&mut self`: the registry is single-threaded
//! per module by construction.

use alloc::vec::Vec;

use crate::blob::BlobHandler;
use stream::CoreError;

/// Containers added per registry growth step.
pub const CONTAINER_CHUNK: usize = 8;

/// Handle to a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResourceId(usize);

#[derive(Debug)]
enum Slot {
    /// Recycled container, chained into the free list.
    Free { next: Option<usize> },
    /// Heap allocation owned by the module.
    Heap(Vec<u8>),
    /// Configuration-blob handler.
    Blob(BlobHandler),
    /// Local fast-memory mirror of a read-only far-memory region.
    FastGet(Vec<u8>),
}

/// Registry of every resource a module instance owns.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    slots: Vec<Slot>,
    free_head: Option<usize>,
    heap_usage: usize,
    heap_high_water_mark: usize,
}

fn alloc_zeroed(size: usize) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| CoreError::OutOfMemory)?;
    buf.resize(size, 0);
    Ok(buf)
}

impl ResourceRegistry {
    /// Empty registry.
    #[must_use]
    pub const fn new() -> Self {
        ResourceRegistry {
            slots: Vec::new(),
            free_head: None,
            heap_usage: 0,
            heap_high_water_mark: 0,
        }
    }

    /// Pop a free container, growing by one chunk when the free list
    /// is empty.
    fn take_container(&mut self) -> Result<usize, CoreError> {
        if self.free_head.is_none() {
            self.slots
                .try_reserve(CONTAINER_CHUNK)
                .map_err(|_| CoreError::OutOfMemory)?;
            for _ in 0..CONTAINER_CHUNK {
                let idx = self.slots.len();
                self.slots.push(Slot::Free {
                    next: self.free_head,
                });
                self.free_head = Some(idx);
            }
        }

        let idx = self.free_head.ok_or(CoreError::OutOfMemory)?;
        match self.slots[idx] {
            Slot::Free { next } => {
                self.free_head = next;
                Ok(idx)
            }
            // Free list corruption cannot happen with &mut discipline;
            // report rather than panic if it ever does.
            _ => Err(CoreError::InvalidState),
        }
    }

    fn put_container(&mut self, idx: usize) {
        self.slots[idx] = Slot::Free {
            next: self.free_head,
        };
        self.free_head = Some(idx);
    }

    /// Allocate a zeroed byte buffer registered to this module.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for a zero size,
    /// [`CoreError::OutOfMemory`] on allocation failure.
    pub fn alloc_bytes(&mut self, size: usize) -> Result<ResourceId, CoreError> {
        if size == 0 {
            return Err(CoreError::InvalidArg);
        }
        let idx = self.take_container()?;
        let buf = match alloc_zeroed(size) {
            Ok(buf) => buf,
            Err(e) => {
                self.put_container(idx);
                return Err(e);
            }
        };
        self.slots[idx] = Slot::Heap(buf);
        self.heap_usage += size;
        self.heap_high_water_mark = self.heap_high_water_mark.max(self.heap_usage);
        Ok(ResourceId(idx))
    }

    /// Borrow a registered byte buffer.
    #[must_use]
    pub fn bytes(&self, id: ResourceId) -> Option<&[u8]> {
        match self.slots.get(id.0) {
            Some(Slot::Heap(buf)) => Some(buf),
            _ => None,
        }
    }

    /// Mutably borrow a registered byte buffer.
    pub fn bytes_mut(&mut self, id: ResourceId) -> Option<&mut [u8]> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Heap(buf)) => Some(buf),
            _ => None,
        }
    }

    /// Create a blob handler that is released with the module.
    ///
    /// # Errors
    ///
    /// [`CoreError::OutOfMemory`] when no container can be drawn.
    pub fn new_blob_handler(&mut self, single_blob: bool) -> Result<ResourceId, CoreError> {
        let idx = self.take_container()?;
        let handler = if single_blob {
            BlobHandler::new_single_blob()
        } else {
            BlobHandler::new()
        };
        self.slots[idx] = Slot::Blob(handler);
        Ok(ResourceId(idx))
    }

    /// Borrow a registered blob handler.
    pub fn blob_mut(&mut self, id: ResourceId) -> Option<&mut BlobHandler> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Blob(handler)) => Some(handler),
            _ => None,
        }
    }

    /// Make a module-owned fast-memory copy of read-only data living
    /// in slow far memory.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for an empty region,
    /// [`CoreError::OutOfMemory`] on allocation failure.
    pub fn fast_get(&mut self, far_data: &[u8]) -> Result<ResourceId, CoreError> {
        if far_data.is_empty() {
            return Err(CoreError::InvalidArg);
        }
        let idx = self.take_container()?;
        let mut mirror = match alloc_zeroed(far_data.len()) {
            Ok(buf) => buf,
            Err(e) => {
                self.put_container(idx);
                return Err(e);
            }
        };
        mirror.copy_from_slice(far_data);
        self.slots[idx] = Slot::FastGet(mirror);
        Ok(ResourceId(idx))
    }

    /// Borrow a fast-get mirror.
    #[must_use]
    pub fn fast_slice(&self, id: ResourceId) -> Option<&[u8]> {
        match self.slots.get(id.0) {
            Some(Slot::FastGet(buf)) => Some(buf),
            _ => None,
        }
    }

    /// Release one resource, dispatching on its container type.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] for an unknown or already-freed id.
    pub fn free(&mut self, id: ResourceId) -> Result<(), CoreError> {
        match self.slots.get(id.0) {
            Some(Slot::Heap(buf)) => {
                self.heap_usage -= buf.len();
            }
            Some(Slot::Blob(_) | Slot::FastGet(_)) => {}
            Some(Slot::Free { .. }) | None => return Err(CoreError::InvalidArg),
        }
        self.put_container(id.0);
        Ok(())
    }

    /// Release every registered resource and reset the accounting.
    ///
    /// Called during module free; afterwards the registry is as new.
    pub fn free_all(&mut self) {
        self.slots.clear();
        self.slots.shrink_to_fit();
        self.free_head = None;
        self.heap_usage = 0;
        self.heap_high_water_mark = 0;
    }

    /// Bytes currently allocated through [`Self::alloc_bytes`].
    #[must_use]
    pub fn heap_usage(&self) -> usize {
        self.heap_usage
    }

    /// Largest `heap_usage` observed since the last [`Self::free_all`].
    #[must_use]
    pub fn heap_high_water_mark(&self) -> usize {
        self.heap_high_water_mark
    }
}
