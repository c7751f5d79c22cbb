//! The storage allocator itself: a circular singly linked list of free
//! blocks threaded through their headers, sorted by address. A permanent
//! zero sized sentinel anchors the circle so traversal never has to deal
//! with an empty list, and a rolling head cursor remembers where the
//! last search left off:
//!
//! ```text
//!              next                     next
//!   +------+ ------> +-----------+ ------> +-----------+
//!   | base |         | Free      |         | Free      |
//!   | size0|         | size 4    |         | size 9    | --+
//!   +------+         +-----------+         +-----------+   |
//!      ^                   ^                               | next
//!      |                   +--- head                       |
//!      +-------------------------------------------------- +
//! ```
//!
//! Allocation walks the circle from `head.next` taking the first block
//! that fits. An oversized block is split by carving the allocation off
//! its *tail*, which keeps the shrunken block's identity and list
//! position so nothing needs relinking:
//!
//! **Before**:
//!
//! ```text
//!         +-->  +-----------+
//!         |     |   Header  | <- 1 unit.
//! Block   |     +-----------+
//!         |     |  Payload  | <- 9 units.
//!         +-->  +-----------+
//! ```
//!
//! **After carving 3 units**:
//!
//! ```text
//!         +-->  +-----------+
//!         |     |   Header  | <- Still linked where it was.
//! Block   |     +-----------+
//!         |     |  Payload  | <- 6 units.
//!         +-->  +-----------+
//!         |     |   Header  | <- Fresh header, 3 units total.
//! Carved  |     +-----------+
//!         |     |  Payload  | <- Handed to the caller.
//!         +-->  +-----------+
//! ```
//!
//! Freeing reinserts the block at its address sorted position and merges
//! it with whichever neighbors touch it, so adjacent free blocks can
//! never sit side by side and large blocks stay reachable. When a full
//! loop finds no fit, one block of exactly the requested size is pulled
//! from the platform through the aligned facade and inserted like a
//! freed block, then the search runs again.

use std::ptr::NonNull;

use crate::{
    align,
    block::{Header, ALIGNMENT, UNIT},
    memory, ram, Error, Pointer,
};

/// K&R style free list allocator. Single threaded; wrap it yourself if
/// you need to share it. See [`crate::global`] for a process-wide
/// instance.
pub struct FreeListAllocator {
    /// Permanent zero sized sentinel anchoring the circular list.
    base: Pointer<Header>,
    /// Rolling cursor where the next first-fit search begins.
    head: Pointer<Header>,
}

/// One [`FreeListAllocator::records`] entry: header address, size in
/// units and successor address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRecord {
    pub address: usize,
    pub size: usize,
    pub next: usize,
}

impl FreeListAllocator {
    /// Builds an uninitialized allocator. No memory is touched until the
    /// first allocation or an explicit [`FreeListAllocator::initialize`].
    pub const fn new() -> Self {
        Self {
            base: None,
            head: None,
        }
    }

    /// Ensures the sentinel exists and the head points at it. Idempotent
    /// and safe to retry; fails only if the sentinel itself cannot be
    /// allocated.
    pub fn initialize(&mut self) -> Result<(), Error> {
        if self.base.is_some() {
            return Ok(());
        }

        let Some(address) = memory::alloc(UNIT, ALIGNMENT) else {
            log::error!("could not allocate the free list sentinel");
            return Err(Error::OutOfMemory);
        };

        let base = address.cast::<Header>();
        unsafe {
            base.as_ptr().write(Header {
                next: Some(base),
                size: 0,
            });
        }

        self.base = Some(base);
        self.head = Some(base);

        Ok(())
    }

    /// Walks the list returning every node to the platform, the sentinel
    /// last, and clears the allocator state. Every payload pointer still
    /// outstanding becomes invalid; callers are expected to have freed
    /// their blocks first. A later [`FreeListAllocator::initialize`]
    /// starts over from scratch.
    pub fn terminate(&mut self) -> Result<(), Error> {
        let Some(base) = self.base else {
            return Err(Error::Uninitialized);
        };

        unsafe {
            let mut current = base.as_ref().next.unwrap();
            while current != base {
                let next = current.as_ref().next.unwrap();
                memory::free(Some(current.cast()));
                current = next;
            }
            memory::free(Some(base.cast()));
        }

        self.base = None;
        self.head = None;

        Ok(())
    }

    /// Returns a pointer to at least `size` writable bytes whose address
    /// is a multiple of the header alignment, or `None` on a zero sized
    /// request, a request past [`ram::max`] or platform exhaustion. The
    /// list is left untouched on failure. Initializes the allocator on
    /// first use.
    pub fn malloc(&mut self, size: usize) -> Pointer<u8> {
        match self.request(size) {
            Ok(address) => Some(address),
            Err(error) => {
                log::debug!("allocation of {size} bytes failed: {error}");
                None
            }
        }
    }

    fn request(&mut self, size: usize) -> Result<NonNull<u8>, Error> {
        if size == 0 {
            return Err(Error::InvalidArgument);
        }
        if size > ram::max() {
            return Err(Error::OutOfRange);
        }

        self.initialize()?;

        // One unit of header plus however many units cover the payload.
        let units = align::unit_count(size, UNIT, ALIGNMENT) + 1;

        unsafe {
            let mut previous = self.head.unwrap();
            loop {
                let mut current = previous.as_ref().next.unwrap();

                if current.as_ref().size >= units {
                    if current.as_ref().size == units {
                        // Exact fit. Unlink the whole block and resume
                        // later searches at its predecessor.
                        previous.as_mut().next = current.as_ref().next;
                        self.head = Some(previous);
                    } else {
                        // Oversize fit. Carve the tail so the shrunken
                        // block keeps its size, identity and links.
                        current.as_mut().size -= units;
                        let tail = Header::end_address_of(current);
                        tail.as_ptr().write(Header {
                            next: None,
                            size: units,
                        });
                        self.head = Some(current);
                        current = tail;
                    }

                    return Ok(Header::payload_address_of(current));
                }

                if current == self.head.unwrap() {
                    // Full loop without a fit. Grow the heap and rescan;
                    // the new block may have merged into a neighbor, but
                    // either way something of at least `units` is now on
                    // the list.
                    self.grow(units)?;
                    previous = self.head.unwrap();
                    continue;
                }

                previous = current;
            }
        }
    }

    /// Returns the block owning `ptr` to the list, merging it with
    /// address-adjacent neighbors. Accepts `None` as a no-op.
    ///
    /// # Safety
    ///
    /// A present pointer must have been obtained from
    /// [`FreeListAllocator::malloc`] on this allocator and not freed
    /// since.
    pub unsafe fn free(&mut self, ptr: Pointer<u8>) {
        let Some(address) = ptr else { return };

        if self.base.is_none() {
            log::error!("free on an uninitialized allocator, ignoring {address:?}");
            return;
        }

        let block = Header::from_payload_address(address);
        self.insert(block);
    }

    /// Requests `units` fresh units from the platform and hands them to
    /// the list as one block.
    fn grow(&mut self, units: usize) -> Result<(), Error> {
        let bytes = units.checked_mul(UNIT).ok_or(Error::OutOfRange)?;

        let Some(address) = memory::alloc(bytes, ALIGNMENT) else {
            log::error!("heap growth of {bytes} bytes refused by the platform");
            return Err(Error::OutOfMemory);
        };

        let block = address.cast::<Header>();
        unsafe {
            block.as_ptr().write(Header {
                next: None,
                size: units,
            });
            self.insert(block);
        }

        Ok(())
    }

    /// Links `block` at its address sorted position, merging with either
    /// neighbor when address-adjacent. Leaves the head cursor on the
    /// predecessor.
    unsafe fn insert(&mut self, mut block: NonNull<Header>) {
        let base = self.base.unwrap();

        // Find the node the block belongs behind: either strictly
        // between a node and its successor, or on the single edge where
        // the addresses wrap around.
        let mut current = self.head.unwrap();
        loop {
            let next = current.as_ref().next.unwrap();
            if current < block && block < next {
                break;
            }
            if current >= next && (block > current || block < next) {
                break;
            }
            current = next;
        }

        let next = current.as_ref().next.unwrap();

        // Absorb the upper neighbor if the block ends right at its
        // header. The sentinel must survive every merge, so it stays out
        // even when a platform allocation happens to land flush against
        // it.
        if next != base && Header::end_address_of(block) == next {
            block.as_mut().size += next.as_ref().size;
            block.as_mut().next = next.as_ref().next;
        } else {
            block.as_mut().next = Some(next);
        }

        // Absorb the block into the lower neighbor if that one ends
        // right at the block. The sentinel never does, its size is 0.
        if Header::end_address_of(current) == block {
            current.as_mut().size += block.as_ref().size;
            current.as_mut().next = block.as_ref().next;
        } else {
            current.as_mut().next = Some(block);
        }

        self.head = Some(current);
    }

    /// Emits one record per node at debug severity, sentinel included.
    /// Diagnostics only; not on any correctness path.
    pub fn dump(&self) {
        for record in self.records() {
            log::debug!(
                "block {:#x}: {} units, next {:#x}",
                record.address,
                record.size,
                record.next
            );
        }
    }

    /// Snapshot of the list in traversal order starting at the sentinel.
    /// Empty when the allocator is not initialized.
    pub fn records(&self) -> Vec<BlockRecord> {
        let Some(base) = self.base else {
            return Vec::new();
        };

        let mut records = Vec::new();
        let mut current = base;
        loop {
            let next = unsafe { current.as_ref().next.unwrap() };
            records.push(BlockRecord {
                address: current.as_ptr() as usize,
                size: unsafe { current.as_ref().size },
                next: next.as_ptr() as usize,
            });
            current = next;
            if current == base {
                break;
            }
        }

        records
    }
}

impl Default for FreeListAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FreeListAllocator {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

// The allocator exclusively owns every block it tracks; nothing aliases
// the raw pointers from outside while they sit on the list.
unsafe impl Send for FreeListAllocator {}
