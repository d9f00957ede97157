//! tests/band_map_tests.rs
use pulseflow_core::BandMap;

#[test]
fn test_36_bands_over_1024_fft() {
    // The canonical display shape: 36 bars analyzing a 1024-point FFT.
    let map = BandMap::new(36, 1024);
    let ranges = map.ranges();

    assert_eq!(ranges.len(), 36);
    assert_eq!(ranges[0].start, 2, "first band starts above the DC bins");
    assert_eq!(ranges[35].end, 511, "last band reaches the top usable bin");
    for (i, range) in ranges.iter().enumerate() {
        assert!(!range.is_empty(), "band {} is empty: {:?}", i, range);
    }
}

#[test]
fn test_every_usable_bin_is_covered() {
    let map = BandMap::new(36, 1024);
    let mut covered = vec![false; 512];
    for range in map.ranges() {
        for bin in range.start..range.end {
            covered[bin] = true;
        }
    }

    for (bin, seen) in covered.iter().enumerate().take(511).skip(2) {
        assert!(*seen, "bin {} belongs to no band", bin);
    }
}

#[test]
fn test_log_spacing_widens_toward_treble() {
    let map = BandMap::new(36, 1024);
    let ranges = map.ranges();

    assert!(
        ranges[35].len() > ranges[0].len(),
        "log spacing should give the top band more bins than the bottom one"
    );
}

#[test]
fn test_all_supported_fft_sizes() {
    for fft_size in [256usize, 512, 1024, 2048] {
        let map = BandMap::new(36, fft_size);
        let max_bin = fft_size / 2 - 1;

        assert_eq!(map.ranges().len(), 36);
        assert_eq!(map.ranges()[0].start, 2);
        assert_eq!(map.ranges()[35].end, max_bin);
        for range in map.ranges() {
            assert!(range.start < range.end, "degenerate range at fft {}", fft_size);
            assert!(range.end <= max_bin);
        }
    }
}

#[test]
fn test_more_bands_than_bins_still_yields_valid_ranges() {
    // 126 usable bins split 200 ways forces heavy overlap at the low end,
    // but every band must still describe at least one real bin.
    let map = BandMap::new(200, 256);
    let max_bin = 256 / 2 - 1;

    for range in map.ranges() {
        assert!(range.start < range.end);
        assert!(range.end <= max_bin);
    }
    assert_eq!(map.ranges()[199].end, max_bin);
}
