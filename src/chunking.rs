//! Contiguous location-index chunks for bounded-memory processing.
//!
//! The sample grid (samples x years x locations) can be far larger than
//! memory, so the combiner walks the location axis in contiguous ranges and
//! never materialises more than one chunk's worth of output at a time. Chunk
//! boundaries are a processing detail only: outputs are chunk-local and the
//! final assembly is a concatenation, so results are identical for any chunk
//! size.

use crate::errors::{SterodynError, SterodynResult};
use std::ops::Range;

/// Split `0..n_locations` into contiguous ranges of at most `chunksize`.
#[derive(Debug, Clone)]
pub struct LocationChunks {
    n_locations: usize,
    chunksize: usize,
}

impl LocationChunks {
    pub fn new(n_locations: usize, chunksize: usize) -> SterodynResult<Self> {
        if chunksize == 0 {
            return Err(SterodynError::Configuration(
                "chunk size must be positive".to_string(),
            ));
        }
        Ok(Self {
            n_locations,
            chunksize,
        })
    }

    /// Number of chunks the location axis splits into.
    pub fn len(&self) -> usize {
        self.n_locations.div_ceil(self.chunksize)
    }

    pub fn is_empty(&self) -> bool {
        self.n_locations == 0
    }

    /// The ranges, in location order. Each range is an independent unit of
    /// work reading only its own slice of the fit record.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        (0..self.len())
            .map(|i| {
                let start = i * self.chunksize;
                start..(start + self.chunksize).min(self.n_locations)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_cover_the_axis_without_overlap() {
        let chunks = LocationChunks::new(105, 50).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.ranges(), vec![0..50, 50..100, 100..105]);
    }

    #[test]
    fn oversized_chunks_collapse_to_one_range() {
        let chunks = LocationChunks::new(7, 1000).unwrap();
        assert_eq!(chunks.ranges(), vec![0..7]);
    }

    #[test]
    fn empty_axis_yields_no_ranges() {
        let chunks = LocationChunks::new(0, 50).unwrap();
        assert!(chunks.is_empty());
        assert!(chunks.ranges().is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(matches!(
            LocationChunks::new(10, 0),
            Err(SterodynError::Configuration(_))
        ));
    }
}
