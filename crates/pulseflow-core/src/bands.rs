//! Log-spaced frequency band mapping
//!
//! Splits the usable FFT bin range into `band_count` contiguous ranges whose
//! widths grow exponentially with frequency, so low bins (where musical
//! content concentrates) get fine resolution and high bins are pooled.
//!
//! The mapping depends only on `(band_count, fft_size)` and is cached; the
//! per-frame path never recomputes it.

/// Lowest FFT bin the mapping will read. Bins 0 and 1 carry DC and
/// near-DC content that swamps the visualization.
pub const MIN_BIN: usize = 2;

/// Half-open bin range `[start, end)` read by one visualizer bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandRange {
    /// First bin index, inclusive
    pub start: usize,
    /// End bin index, exclusive
    pub end: usize,
}

impl BandRange {
    /// Number of bins in the range
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when the range reads no bins. Never the case for ranges
    /// produced by [`BandMap`].
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Cached bin mapping for one `(band_count, fft_size)` pair
#[derive(Debug, Clone)]
pub struct BandMap {
    band_count: usize,
    fft_size: usize,
    ranges: Vec<BandRange>,
}

impl BandMap {
    /// Build the mapping for the given shape.
    pub fn new(band_count: usize, fft_size: usize) -> Self {
        Self {
            band_count,
            fft_size,
            ranges: compute_ranges(band_count, fft_size),
        }
    }

    /// Recompute only if the shape changed.
    pub fn ensure(&mut self, band_count: usize, fft_size: usize) {
        if self.band_count != band_count || self.fft_size != fft_size {
            self.band_count = band_count;
            self.fft_size = fft_size;
            self.ranges = compute_ranges(band_count, fft_size);
        }
    }

    /// The per-bar bin ranges, in ascending frequency order
    pub fn ranges(&self) -> &[BandRange] {
        &self.ranges
    }

    /// Number of bars this map was built for
    pub fn band_count(&self) -> usize {
        self.band_count
    }

    /// FFT size this map was built for
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
}

/// Exponential interpolation between `MIN_BIN` and `fft_size / 2 - 1`
/// in log10 space. `t = 0` lands on `MIN_BIN`, `t = 1` on the top bin.
fn scaled_bin(t: f32, max_bin: usize) -> f32 {
    let lo = (MIN_BIN as f32).log10();
    let hi = (max_bin as f32).log10();
    10f32.powf(lo + (hi - lo) * t)
}

fn compute_ranges(band_count: usize, fft_size: usize) -> Vec<BandRange> {
    debug_assert!(band_count >= 1);
    debug_assert!(fft_size >= 8);

    let max_bin = fft_size / 2 - 1;

    // Band boundaries. The endpoints are pinned rather than evaluated so
    // float rounding can never shave a bin off either edge.
    let boundary = |i: usize| -> usize {
        if i == 0 {
            MIN_BIN
        } else if i == band_count {
            max_bin
        } else {
            let t = i as f32 / band_count as f32;
            (scaled_bin(t, max_bin).floor() as usize).clamp(MIN_BIN, max_bin)
        }
    };

    (0..band_count)
        .map(|i| {
            // When band_count exceeds the available bins, neighbouring
            // boundaries collide; clamping keeps every range at least one
            // bin wide at the cost of overlap.
            let start = boundary(i).min(max_bin - 1);
            let end = boundary(i + 1).clamp(start + 1, max_bin);
            BandRange { start, end }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_36_bands_1024_fft_shape() {
        let map = BandMap::new(36, 1024);
        let ranges = map.ranges();
        assert_eq!(ranges.len(), 36);
        assert_eq!(ranges[0].start, 2, "first band must start at bin 2");
        assert_eq!(ranges[35].end, 511, "last band must end at bin 511");
    }

    #[test]
    fn test_every_range_reads_at_least_one_bin() {
        for fft_size in [256, 512, 1024, 2048] {
            for band_count in [1, 4, 9, 36, 128] {
                let map = BandMap::new(band_count, fft_size);
                for (i, range) in map.ranges().iter().enumerate() {
                    assert!(
                        range.end > range.start,
                        "band {} of {} (fft {}) is empty: {:?}",
                        i,
                        band_count,
                        fft_size,
                        range
                    );
                }
            }
        }
    }

    #[test]
    fn test_starts_are_monotonic() {
        let map = BandMap::new(36, 2048);
        for pair in map.ranges().windows(2) {
            assert!(
                pair[1].start >= pair[0].start,
                "band starts must not decrease: {:?} then {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_ranges_stay_in_bounds() {
        let map = BandMap::new(48, 512);
        let max_bin = 512 / 2 - 1;
        for range in map.ranges() {
            assert!(range.start >= MIN_BIN);
            assert!(range.end <= max_bin);
        }
    }

    #[test]
    fn test_more_bands_than_bins_degrades_gracefully() {
        // 256-point FFT leaves 125 usable bins for 200 bands; ranges must
        // overlap rather than go empty.
        let map = BandMap::new(200, 256);
        assert_eq!(map.ranges().len(), 200);
        for range in map.ranges() {
            assert!(range.end > range.start);
            assert!(range.end <= 127);
        }
    }

    #[test]
    fn test_single_band_covers_full_span() {
        let map = BandMap::new(1, 1024);
        assert_eq!(map.ranges()[0], BandRange { start: 2, end: 511 });
    }

    #[test]
    fn test_ensure_skips_recompute_for_same_shape() {
        let mut map = BandMap::new(36, 1024);
        let before = map.ranges().to_vec();
        map.ensure(36, 1024);
        assert_eq!(map.ranges(), &before[..]);

        map.ensure(9, 1024);
        assert_eq!(map.band_count(), 9);
        assert_eq!(map.ranges().len(), 9);
    }

    #[test]
    fn test_low_bands_are_narrower_than_high_bands() {
        let map = BandMap::new(12, 2048);
        let first = map.ranges()[0].len();
        let last = map.ranges()[11].len();
        assert!(
            last > first,
            "log spacing should widen toward high frequencies: first={}, last={}",
            first,
            last
        );
    }
}
