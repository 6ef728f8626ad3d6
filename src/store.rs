//! Flat per-ray state arrays shared by every execution unit.
//!
//! All device-facing state is kept in flat `f32` arrays so blocks of it can
//! be uploaded with a single buffer write. Ray `i` owns
//! `pos[i*DIM..(i+1)*DIM]`, `dir[i*DIM..(i+1)*DIM]` and `finished[i]`.

/// Number of components per position/direction vector (spacetime is 4D).
pub const DIM: usize = 4;

/// Host-side state for the whole ray set.
///
/// Flags are `u32` (0 = active, 1 = finished) rather than `bool` so the same
/// layout round-trips through device buffers unchanged.
#[derive(Debug, Clone)]
pub struct RayStore {
    /// Positions, `DIM` components per ray.
    pub pos: Vec<f32>,
    /// Directions, `DIM` components per ray.
    pub dir: Vec<f32>,
    /// Completion flags, one per ray.
    pub finished: Vec<u32>,
}

impl RayStore {
    /// Create a store of `n` rays with zeroed state and all flags cleared.
    pub fn new(n: usize) -> Self {
        Self {
            pos: vec![0.0; n * DIM],
            dir: vec![0.0; n * DIM],
            finished: vec![0; n],
        }
    }

    /// Build a store from per-ray initial positions and directions.
    pub fn from_rays<I>(rays: I) -> Self
    where
        I: IntoIterator<Item = ([f32; DIM], [f32; DIM])>,
    {
        let mut store = Self::new(0);
        for (pos, dir) in rays {
            store.pos.extend_from_slice(&pos);
            store.dir.extend_from_slice(&dir);
            store.finished.push(0);
        }
        store
    }

    /// Number of rays in the store.
    pub fn len(&self) -> usize {
        self.finished.len()
    }

    /// True if the store holds no rays.
    pub fn is_empty(&self) -> bool {
        self.finished.is_empty()
    }

    /// Position components of ray `i`.
    pub fn pos_of(&self, i: usize) -> &[f32] {
        &self.pos[i * DIM..(i + 1) * DIM]
    }

    /// Direction components of ray `i`.
    pub fn dir_of(&self, i: usize) -> &[f32] {
        &self.dir[i * DIM..(i + 1) * DIM]
    }

    /// Whether ray `i` has reached its stopping condition.
    pub fn is_finished(&self, i: usize) -> bool {
        self.finished[i] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rays_layout() {
        let store = RayStore::from_rays([
            ([0.0, 1.0, 2.0, 3.0], [4.0, 5.0, 6.0, 7.0]),
            ([8.0, 9.0, 10.0, 11.0], [12.0, 13.0, 14.0, 15.0]),
        ]);

        assert_eq!(store.len(), 2);
        assert_eq!(store.pos.len(), 2 * DIM);
        assert_eq!(store.pos_of(1), &[8.0, 9.0, 10.0, 11.0]);
        assert_eq!(store.dir_of(0), &[4.0, 5.0, 6.0, 7.0]);
        assert!(!store.is_finished(0));
    }

    #[test]
    fn test_new_is_zeroed() {
        let store = RayStore::new(3);
        assert_eq!(store.len(), 3);
        assert!(store.pos.iter().all(|&v| v == 0.0));
        assert!(store.finished.iter().all(|&f| f == 0));
    }
}
