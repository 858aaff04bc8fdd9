//! Scatter list construction.
//!
//! [`coalesce`] walks a buffer chain front to back and turns the free space
//! of each buffer into [`ScatterEntry`]s, merging neighbours whose free
//! space is contiguous. The walk stops at the first of:
//!
//! - the end of the chain,
//! - `limit` bytes requested (`limit == 0` means unlimited),
//! - an entry vector holding `capacity` entries when a new entry is needed.
//!
//! The resulting [`Batch`] keeps the chain mutably borrowed until the read
//! is committed, so the free space it describes cannot change underneath
//! the system call.

use crate::buffer::{Buffer, RegionId};
use crate::constants::IOVS_PREALLOCATE;
use crate::error::{ReadError, Result};

use smallvec::SmallVec;
use std::io::IoSliceMut;

/// One contiguous writable span, `len` bytes at `offset` in `region`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScatterEntry {
    pub region: RegionId,
    pub offset: usize,
    pub len: usize,
}

impl ScatterEntry {
    /// Region offset one past the span.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Entries kept inline up to `IOVS_PREALLOCATE`, heap beyond that.
pub type EntryVec = SmallVec<[ScatterEntry; IOVS_PREALLOCATE]>;

/// A scatter list over a prefix of a buffer chain.
pub struct Batch<'a> {
    chain: &'a mut [Buffer],
    entries: EntryVec,
    /// Total bytes requested across all entries.
    size: usize,
    /// Index of the first buffer not covered by this batch.
    next: usize,
    limit: usize,
}

/// Build the scatter list for `chain`.
///
/// Buffers with no free space (or truncated to nothing) never open a new
/// entry, but they are still stepped over. Fails only when an entry vector
/// larger than the inline capacity cannot be reserved.
pub fn coalesce(chain: &mut [Buffer], capacity: usize, limit: usize) -> Result<Batch<'_>> {
    let mut entries = EntryVec::new();
    if capacity > entries.inline_size() {
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| ReadError::Alloc { entries: capacity })?;
    }

    let mut size = 0usize;
    let mut next = 0usize;

    for buf in chain.iter() {
        let mut n = buf.free();

        if limit > 0 {
            if size >= limit {
                break;
            }
            if size + n > limit {
                n = limit - size;
            }
        }

        let region = buf.region_id();
        match entries.last_mut() {
            Some(prev) if prev.region == region && prev.end() == buf.last() => {
                prev.len += n;
            }
            _ if n == 0 => {}
            _ => {
                if entries.len() == capacity {
                    break;
                }
                entries.push(ScatterEntry {
                    region,
                    offset: buf.last(),
                    len: n,
                });
            }
        }

        size += n;
        next += 1;
    }

    Ok(Batch {
        chain,
        entries,
        size,
        next,
        limit,
    })
}

impl<'a> Batch<'a> {
    #[inline]
    pub fn entries(&self) -> &[ScatterEntry] {
        &self.entries
    }

    /// Number of scatter entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes requested.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Index of the first chain element left for a later call.
    #[inline]
    pub fn next(&self) -> usize {
        self.next
    }

    /// Length of the final entry (0 when there is none).
    #[inline]
    pub fn last_len(&self) -> usize {
        self.entries.last().map_or(0, |e| e.len)
    }

    /// The entries as OS-ready slices, in chain order.
    pub fn io_slices(&mut self) -> SmallVec<[IoSliceMut<'_>; IOVS_PREALLOCATE]> {
        let mut out = SmallVec::with_capacity(self.entries.len());
        for e in self.entries.iter() {
            // Safety: every entry lies inside the free space of buffers in
            // `chain[..next]`, which this batch borrows exclusively. Buffers
            // own disjoint region ranges and entries never overlap, so the
            // slices are disjoint and live as long as the borrow of `self`.
            let slice = unsafe { std::slice::from_raw_parts_mut(e.region.0.as_ptr().add(e.offset), e.len) };
            out.push(IoSliceMut::new(slice));
        }
        out
    }

    /// Advance `last` markers for `n` bytes placed by the read.
    ///
    /// Bytes fill the requested spans in chain order; each buffer takes at
    /// most what it asked for and buffers past the fill point are left
    /// alone.
    pub fn commit(&mut self, n: usize) {
        let mut left = n.min(self.size);
        let mut size = 0usize;

        for buf in self.chain[..self.next].iter_mut() {
            if left == 0 {
                break;
            }
            let mut want = buf.free();
            if self.limit > 0 {
                want = want.min(self.limit - size);
            }
            let take = want.min(left);
            buf.advance(take);
            left -= take;
            size += want;
        }
    }

    /// The unconsumed tail of the chain.
    pub fn into_rest(self) -> &'a mut [Buffer] {
        let Batch { chain, next, .. } = self;
        &mut chain[next..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Region;

    fn lens(batch: &Batch<'_>) -> Vec<usize> {
        batch.entries().iter().map(|e| e.len).collect()
    }

    #[test]
    fn adjacent_free_space_merges() {
        let region = Region::new(100);
        let mut chain = vec![region.carve(40).unwrap(), region.carve(60).unwrap()];

        let batch = coalesce(&mut chain, 64, 0).unwrap();
        assert_eq!(lens(&batch), vec![100]);
        assert_eq!(batch.size(), 100);
        assert_eq!(batch.next(), 2);
    }

    #[test]
    fn partially_filled_head_still_merges() {
        let region = Region::new(100);
        let mut a = region.carve(40).unwrap();
        a.extend_from_slice(&[7u8; 10]);
        let b = region.carve(60).unwrap();
        let mut chain = vec![a, b];

        let batch = coalesce(&mut chain, 64, 0).unwrap();
        assert_eq!(batch.entries()[0].offset, 10);
        assert_eq!(lens(&batch), vec![90]);
    }

    #[test]
    fn separate_regions_stay_separate() {
        let mut chain = vec![Buffer::with_capacity(16), Buffer::with_capacity(32)];
        let batch = coalesce(&mut chain, 64, 0).unwrap();
        assert_eq!(lens(&batch), vec![16, 32]);
        assert_eq!(batch.size(), 48);
    }

    #[test]
    fn limit_truncates_last_span() {
        let mut chain: Vec<Buffer> = (0..3).map(|_| Buffer::with_capacity(50)).collect();

        {
            let batch = coalesce(&mut chain, 64, 120).unwrap();
            assert_eq!(lens(&batch), vec![50, 50, 20]);
            assert_eq!(batch.size(), 120);
            assert_eq!(batch.next(), 3);
        }
        {
            let batch = coalesce(&mut chain, 64, 75).unwrap();
            assert_eq!(lens(&batch), vec![50, 25]);
            assert_eq!(batch.size(), 75);
            assert_eq!(batch.next(), 2);
        }

        let batch = coalesce(&mut chain, 64, 100).unwrap();
        assert_eq!(lens(&batch), vec![50, 50]);
        assert_eq!(batch.next(), 2);
        assert_eq!(batch.into_rest().len(), 1);
    }

    #[test]
    fn capacity_stops_early() {
        let mut chain: Vec<Buffer> = (0..3).map(|_| Buffer::with_capacity(10)).collect();
        let third = chain[2].region_id();

        let batch = coalesce(&mut chain, 2, 0).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size(), 20);
        assert_eq!(batch.next(), 2);
        let rest = batch.into_rest();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].region_id(), third);
    }

    #[test]
    fn capacity_does_not_limit_merges() {
        let region = Region::new(30);
        let mut chain: Vec<Buffer> = (0..3).map(|_| region.carve(10).unwrap()).collect();
        let batch = coalesce(&mut chain, 1, 0).unwrap();
        assert_eq!(lens(&batch), vec![30]);
        assert_eq!(batch.next(), 3);
    }

    #[test]
    fn full_buffers_open_no_entry() {
        let mut full = Buffer::with_capacity(8);
        full.extend_from_slice(b"12345678");
        let mut chain = vec![full, Buffer::with_capacity(8)];

        let batch = coalesce(&mut chain, 1, 0).unwrap();
        assert_eq!(lens(&batch), vec![8]);
        assert_eq!(batch.next(), 2);
    }

    #[test]
    fn full_neighbour_then_adjacent_free_space() {
        let region = Region::new(20);
        let mut a = region.carve(10).unwrap();
        a.extend_from_slice(&[1u8; 10]);
        let b = region.carve(10).unwrap();
        let mut chain = vec![a, b];

        let batch = coalesce(&mut chain, 64, 0).unwrap();
        assert_eq!(batch.entries()[0].offset, 10);
        assert_eq!(lens(&batch), vec![10]);
    }

    #[test]
    fn empty_chain() {
        let mut chain: Vec<Buffer> = Vec::new();
        let batch = coalesce(&mut chain, 64, 0).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.size(), 0);
        assert_eq!(batch.last_len(), 0);
    }

    #[test]
    fn large_capacity_spills_to_heap() {
        let mut chain: Vec<Buffer> = (0..100).map(|_| Buffer::with_capacity(1)).collect();
        let batch = coalesce(&mut chain, 256, 0).unwrap();
        assert_eq!(batch.len(), 100);
        assert_eq!(batch.size(), 100);
    }

    #[test]
    fn commit_fills_in_chain_order() {
        let region = Region::new(100);
        let mut a = region.carve(40).unwrap();
        a.extend_from_slice(&[0u8; 10]);
        a.consume(10);
        let b = region.carve(60).unwrap();
        let mut chain = vec![a, b, Buffer::with_capacity(50)];

        let mut batch = coalesce(&mut chain, 64, 0).unwrap();
        assert_eq!(lens(&batch), vec![90, 50]);
        {
            let mut iov = batch.io_slices();
            let mut byte = 0u8;
            'fill: for slice in iov.iter_mut() {
                for b in slice.iter_mut() {
                    if byte == 50 {
                        break 'fill;
                    }
                    *b = byte;
                    byte += 1;
                }
            }
        }
        batch.commit(50);
        drop(batch);

        let expect: Vec<u8> = (0..50).collect();
        assert_eq!(chain[0].filled(), &expect[..30]);
        assert!(chain[0].is_full());
        assert_eq!(chain[1].filled(), &expect[30..]);
        assert_eq!(chain[1].free(), 40);
        assert!(chain[2].is_empty());
        assert_eq!(chain[2].free(), 50);
    }

    #[test]
    fn commit_respects_truncated_span() {
        let mut chain = vec![Buffer::with_capacity(10), Buffer::with_capacity(10)];
        let mut batch = coalesce(&mut chain, 64, 15).unwrap();
        batch.commit(15);
        drop(batch);
        assert_eq!(chain[0].len(), 10);
        assert_eq!(chain[1].len(), 5);
    }
}
