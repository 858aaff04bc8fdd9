//! Owned memory regions and the buffers carved from them.
//!
//! A [`Region`] is one heap allocation. [`Buffer`]s are non-overlapping
//! windows into a region, described by offsets instead of raw pointers:
//!
//! ```text
//!  region:  |.............................................|
//!  buffer:     start      pos         last           end
//!              |----------|###########|..............|
//!                consumed    filled       free
//! ```
//!
//! Free space of two buffers is contiguous when both live in the same
//! region and the first one's `end` equals the second one's `last` (two
//! back-to-back carves, the second still empty). The coalescer merges such
//! neighbours into a single scatter entry.
//!
//! Regions hand out each byte range at most once, so every `Buffer` has
//! exclusive access to `[start, end)`. That is what makes it sound to
//! turn free space into `&mut [u8]` while other buffers of the same region
//! are alive.

use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;

/// Identity of a region: the base address of its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub(crate) NonNull<u8>);

impl RegionId {
    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

/// One owned, zero-initialised allocation.
///
/// The bytes are reached only through raw pointers handed to the
/// buffers carved from it; no `&`/`&mut` to the whole allocation is ever
/// formed once buffers exist.
pub struct Region {
    ptr: NonNull<u8>,
    len: usize,
    /// Bump cursor for `carve()`.
    carved: Cell<usize>,
}

impl Region {
    /// Allocate a region of `len` bytes.
    pub fn new(len: usize) -> Rc<Self> {
        let boxed: Box<[u8]> = vec![0u8; len].into_boxed_slice();
        // Leaked here, reclaimed in Drop.
        let raw = Box::into_raw(boxed) as *mut u8;
        let ptr = NonNull::new(raw).unwrap_or(NonNull::dangling());
        Rc::new(Self {
            ptr,
            len,
            carved: Cell::new(0),
        })
    }

    #[inline]
    pub fn id(&self) -> RegionId {
        RegionId(self.ptr)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes not yet handed out to a buffer.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len - self.carved.get()
    }

    /// Hand out the next `len` bytes as an empty buffer.
    ///
    /// Consecutive carves are physically adjacent. Returns `None` once the
    /// region cannot cover `len` more bytes.
    pub fn carve(self: &Rc<Self>, len: usize) -> Option<Buffer> {
        let start = self.carved.get();
        let end = start.checked_add(len)?;
        if end > self.len {
            return None;
        }
        self.carved.set(end);
        Some(Buffer {
            region: Rc::clone(self),
            start,
            pos: start,
            last: start,
            end,
        })
    }

    /// Pointer to `offset` within the allocation.
    ///
    /// # Safety
    ///
    /// `offset` must be `<= self.len()`.
    #[inline]
    pub(crate) unsafe fn ptr_at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.len);
        self.ptr.as_ptr().add(offset)
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // Reconstruct the boxed slice and let it drop.
        unsafe {
            let slice = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
            drop(Box::from_raw(slice));
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("addr", &format_args!("{:#x}", self.id().addr()))
            .field("len", &self.len)
            .field("carved", &self.carved.get())
            .finish()
    }
}

/// A window `[start, end)` of a region with `pos`/`last` cursors.
///
/// Buffers are not `Clone`: each byte range has exactly one owner.
pub struct Buffer {
    region: Rc<Region>,
    start: usize,
    pos: usize,
    last: usize,
    end: usize,
}

impl Buffer {
    /// A standalone buffer backed by its own region.
    pub fn with_capacity(capacity: usize) -> Self {
        let region = Region::new(capacity);
        match region.carve(capacity) {
            Some(buf) => buf,
            None => unreachable!("fresh region covers its own length"),
        }
    }

    #[inline]
    pub fn region(&self) -> &Region {
        &self.region
    }

    #[inline]
    pub fn region_id(&self) -> RegionId {
        self.region.id()
    }

    /// Start of unconsumed data (region offset).
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// End of filled data (region offset).
    #[inline]
    pub fn last(&self) -> usize {
        self.last
    }

    /// End of the window (region offset).
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.end - self.start
    }

    /// Writable bytes, `end - last`.
    #[inline]
    pub fn free(&self) -> usize {
        self.end - self.last
    }

    /// Readable bytes, `last - pos`.
    #[inline]
    pub fn len(&self) -> usize {
        self.last - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.last
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.last == self.end
    }

    /// The bytes in `[pos, last)`.
    pub fn filled(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.region.ptr_at(self.pos), self.len()) }
    }

    /// The free space `[last, end)`.
    pub fn free_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.region.ptr_at(self.last), self.free()) }
    }

    /// Copy as much of `data` as fits into the free space. Returns the
    /// number of bytes taken.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());
        self.free_mut()[..n].copy_from_slice(&data[..n]);
        self.last += n;
        n
    }

    /// Mark `n` filled bytes as consumed (clamped to what is filled).
    pub fn consume(&mut self, n: usize) {
        self.pos += n.min(self.len());
    }

    /// Empty the buffer: `pos = last = start`.
    pub fn reset(&mut self) {
        self.pos = self.start;
        self.last = self.start;
    }

    /// Record `n` bytes written into the free space by a read.
    #[inline]
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.free());
        self.last += n.min(self.free());
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("region", &format_args!("{:#x}", self.region_id().addr()))
            .field("start", &self.start)
            .field("pos", &self.pos)
            .field("last", &self.last)
            .field("end", &self.end)
            .finish()
    }
}
