//! Thread-safe block dispatcher over the shared ray store.
//!
//! The dispatcher is a mutex-guarded cursor that peels disjoint contiguous
//! blocks off the front of the store's arrays. Each [`Block`] owns `&mut`
//! sub-slices split off under the lock, so exclusive write access to a
//! granted range is enforced by the borrow checker rather than by raw
//! pointer discipline. The union of all blocks ever issued covers
//! `[0, N)` exactly once: no overlap, no gaps, no duplicate issuance.

use std::mem;
use std::sync::Mutex;

use crate::store::{RayStore, DIM};
use crate::trajectory::TrajectorySink;

/// Default block size used when a worker requests `0` rays.
pub const DEFAULT_MAX_PER_BLOCK: usize = 256;

/// A contiguous range of rays granted to exactly one worker.
///
/// The slices are exclusively owned for the lifetime of the block; the
/// dispatcher never touches a granted range again.
#[derive(Debug)]
pub struct Block<'a> {
    /// Index of the first ray in the block, within the original store.
    pub offset: usize,
    /// Number of rays in the block.
    pub count: usize,
    /// Positions, `count * DIM` components.
    pub pos: &'a mut [f32],
    /// Directions, `count * DIM` components.
    pub dir: &'a mut [f32],
    /// Completion flags, `count` entries.
    pub finished: &'a mut [u32],
    /// Per-ray trajectory streams, when the run records trajectories.
    pub sinks: Option<&'a mut [TrajectorySink]>,
}

impl Block<'_> {
    /// Position components of ray `i` within the block.
    pub fn pos_of(&self, i: usize) -> &[f32] {
        &self.pos[i * DIM..(i + 1) * DIM]
    }

    /// Direction components of ray `i` within the block.
    pub fn dir_of(&self, i: usize) -> &[f32] {
        &self.dir[i * DIM..(i + 1) * DIM]
    }

    /// True once every ray in the block has reached its stopping condition.
    pub fn all_finished(&self) -> bool {
        self.finished.iter().all(|&f| f != 0)
    }

    /// Append one sample per ray at elapsed time `t` to the attached sinks.
    /// A no-op when the block has no sinks.
    pub fn write_samples(&mut self, t: f64) -> std::io::Result<()> {
        let Some(sinks) = self.sinks.as_deref_mut() else {
            return Ok(());
        };
        for i in 0..self.count {
            let pos = &self.pos[i * DIM..(i + 1) * DIM];
            let dir = &self.dir[i * DIM..(i + 1) * DIM];
            sinks[i].write_sample(self.finished[i] != 0, t, pos, dir)?;
        }
        Ok(())
    }
}

/// Remaining tail of the store, shrunk on every grant.
struct Cursor<'a> {
    num_completed: usize,
    num_objects: usize,
    pos: &'a mut [f32],
    dir: &'a mut [f32],
    finished: &'a mut [u32],
    sinks: Option<&'a mut [TrajectorySink]>,
}

/// Hands out non-overlapping blocks of the store to concurrent workers.
pub struct BlockDispatcher<'a> {
    max_per_block: usize,
    cursor: Mutex<Cursor<'a>>,
}

impl<'a> BlockDispatcher<'a> {
    /// Create a dispatcher over `store`, optionally with one trajectory sink
    /// per ray.
    ///
    /// # Panics
    /// Panics if `sinks` is present but its length differs from the store's
    /// ray count (a programming error, not a runtime condition).
    pub fn new(store: &'a mut RayStore, sinks: Option<&'a mut [TrajectorySink]>) -> Self {
        let num_objects = store.finished.len();
        if let Some(s) = &sinks {
            assert_eq!(s.len(), num_objects, "one trajectory sink per ray required");
        }
        debug_assert_eq!(store.pos.len(), num_objects * DIM);
        debug_assert_eq!(store.dir.len(), num_objects * DIM);

        Self {
            max_per_block: DEFAULT_MAX_PER_BLOCK,
            cursor: Mutex::new(Cursor {
                num_completed: 0,
                num_objects,
                pos: &mut store.pos,
                dir: &mut store.dir,
                finished: &mut store.finished,
                sinks,
            }),
        }
    }

    /// Override the default block size used for zero-sized requests.
    pub fn with_max_per_block(mut self, max_per_block: usize) -> Self {
        self.max_per_block = max_per_block;
        self
    }

    /// Hint that undistributed rays remain. The authoritative check is the
    /// return value of [`next_block`](Self::next_block).
    pub fn has_remaining(&self) -> bool {
        let cursor = self.cursor.lock().expect("dispatcher lock poisoned");
        cursor.num_completed < cursor.num_objects
    }

    /// Grant the next block of at most `requested` rays (`0` means the
    /// dispatcher default). Returns `None` once the store is exhausted,
    /// idempotently.
    pub fn next_block(&self, requested: usize) -> Option<Block<'a>> {
        let mut cursor = self.cursor.lock().expect("dispatcher lock poisoned");

        let want = if requested == 0 {
            self.max_per_block
        } else {
            requested
        };
        let count = want.min(cursor.num_objects - cursor.num_completed);
        if count == 0 {
            return None;
        }

        let offset = cursor.num_completed;

        let (pos, rest) = mem::take(&mut cursor.pos).split_at_mut(count * DIM);
        cursor.pos = rest;
        let (dir, rest) = mem::take(&mut cursor.dir).split_at_mut(count * DIM);
        cursor.dir = rest;
        let (finished, rest) = mem::take(&mut cursor.finished).split_at_mut(count);
        cursor.finished = rest;
        let sinks = cursor.sinks.take().map(|s| {
            let (head, rest) = s.split_at_mut(count);
            cursor.sinks = Some(rest);
            head
        });

        cursor.num_completed += count;

        Some(Block {
            offset,
            count,
            pos,
            dir,
            finished,
            sinks,
        })
    }
}
