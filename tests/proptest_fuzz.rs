//! Property-based tests for paging, version parsing and address handling.
//!
//! Uses proptest to generate random counts, page sizes and malformed inputs
//! and verify the invariants hold and nothing panics.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;

use allowlist_sync::fetcher::{BatchRange, BatchRanges, Direction};
use allowlist_sync::registry::parse_type_and_version;
use allowlist_sync::{Address, AllowlistCache};

// =============================================================================
// Batch Range Coverage
// =============================================================================

fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Ascending), Just(Direction::Descending)]
}

proptest! {
    /// Pages cover `[0, count-1]` exactly once, no gaps, no overlaps
    #[test]
    fn prop_pages_cover_every_index_once(
        count in 0u64..5_000,
        batch_size in 1u64..500,
        direction in direction_strategy(),
    ) {
        let mut pages: Vec<BatchRange> = BatchRanges::new(count, batch_size, direction).collect();
        pages.sort_by_key(|r| r.start);

        let mut next = 0u64;
        for page in &pages {
            prop_assert_eq!(page.start, next, "gap or overlap at {}", page);
            prop_assert!(page.end >= page.start);
            prop_assert!(page.size() <= batch_size);
            next = page.end + 1;
        }
        prop_assert_eq!(next, count);
        prop_assert_eq!(pages.len() as u64, count.div_ceil(batch_size));
    }

    /// Descending starts at the top and only the last page may be short
    #[test]
    fn prop_descending_pages_newest_first(
        count in 1u64..5_000,
        batch_size in 1u64..500,
    ) {
        let pages: Vec<BatchRange> = BatchRanges::new(count, batch_size, Direction::Descending).collect();

        prop_assert_eq!(pages[0].end, count - 1);
        prop_assert_eq!(pages[pages.len() - 1].start, 0);
        for pair in pages.windows(2) {
            prop_assert_eq!(pair[1].end + 1, pair[0].start);
            prop_assert_eq!(pair[0].size(), batch_size);
        }
    }

    /// Ascending starts at zero and only the last page may be short
    #[test]
    fn prop_ascending_pages_oldest_first(
        count in 1u64..5_000,
        batch_size in 1u64..500,
    ) {
        let pages: Vec<BatchRange> = BatchRanges::new(count, batch_size, Direction::Ascending).collect();

        prop_assert_eq!(pages[0].start, 0);
        prop_assert_eq!(pages[pages.len() - 1].end, count - 1);
        for pair in pages.windows(2) {
            prop_assert_eq!(pair[0].end + 1, pair[1].start);
            prop_assert_eq!(pair[0].size(), batch_size);
        }
    }

    /// size_hint is exact
    #[test]
    fn prop_size_hint_matches_page_count(
        count in 0u64..5_000,
        batch_size in 1u64..500,
        direction in direction_strategy(),
    ) {
        let ranges = BatchRanges::new(count, batch_size, direction);
        let (lower, upper) = ranges.size_hint();
        let actual = ranges.count();
        prop_assert_eq!(lower, actual);
        prop_assert_eq!(upper, Some(actual));
    }
}

// =============================================================================
// Version Parsing Fuzz Tests
// =============================================================================

proptest! {
    /// Arbitrary strings never panic, only return Err
    #[test]
    fn fuzz_type_and_version_never_panics(input in ".*") {
        let _ = parse_type_and_version(&input);
    }

    /// Any `<name> vX.Y.Z` string yields exactly X.Y.Z
    #[test]
    fn prop_type_and_version_extracts_version(
        name in "[A-Za-z]{1,30}",
        major in 0u64..100,
        minor in 0u64..100,
        patch in 0u64..100,
    ) {
        let parsed = parse_type_and_version(&format!("{} v{}.{}.{}", name, major, minor, patch)).unwrap();
        prop_assert_eq!(parsed, semver::Version::new(major, minor, patch));
    }
}

// =============================================================================
// Address Fuzz Tests
// =============================================================================

proptest! {
    /// Parsing arbitrary text never panics
    #[test]
    fn fuzz_address_from_random_string(input in ".{0,64}") {
        let _ = input.parse::<Address>();
    }

    /// Display output parses back to the same address
    #[test]
    fn prop_address_display_parses_back(bytes in prop::array::uniform20(any::<u8>())) {
        let address = Address::from(bytes);
        let parsed: Address = address.to_string().parse().unwrap();
        prop_assert_eq!(parsed, address);
    }
}

// =============================================================================
// Cache Semantics
// =============================================================================

proptest! {
    /// After update, membership is exactly the updated set
    #[test]
    fn prop_cache_update_is_full_replace(
        first in prop::collection::hash_set(any::<u64>(), 0..50),
        second in prop::collection::hash_set(any::<u64>(), 0..50),
    ) {
        let cache = AllowlistCache::new();
        cache.update(first.iter().copied().map(Address::from_low_u64));
        cache.update(second.iter().copied().map(Address::from_low_u64));

        prop_assert_eq!(cache.len(), second.len());
        for n in first.union(&second) {
            prop_assert_eq!(cache.allow(&Address::from_low_u64(*n)), second.contains(n));
        }
    }
}
