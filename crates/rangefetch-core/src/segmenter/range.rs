//! ByteRange type and range planning.

use thiserror::Error;

/// One unit's share of the resource: bytes `[start, end)` (half-open).
///
/// `index` is stable for the lifetime of the download and doubles as the
/// unit / thread number reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub index: usize,
    /// First byte offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl ByteRange {
    /// Length of this range in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Inclusive `(from, to)` offsets, or `None` for a degenerate empty range.
    pub fn inclusive(&self) -> Option<(u64, u64)> {
        if self.is_empty() {
            None
        } else {
            Some((self.start, self.end - 1))
        }
    }

    /// Value for curl's `CURLOPT_RANGE` ("from-to", no `bytes=` prefix).
    pub fn curl_range(&self) -> Option<String> {
        self.inclusive().map(|(from, to)| format!("{}-{}", from, to))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid input: thread count must be at least 1 (got {0})")]
    InvalidInput(usize),
}

/// Splits `total_size` bytes into `thread_count` contiguous ranges.
///
/// Every range but the last is `ceil(total_size / thread_count)` bytes; the
/// last one always closes at `total_size` and absorbs the rounding. Offsets
/// are clamped to `total_size`, so tiny resources with many threads yield
/// trailing empty ranges instead of overlapping ones. A zero-byte resource
/// yields a single empty range.
pub fn plan_ranges(total_size: u64, thread_count: usize) -> Result<Vec<ByteRange>, PlanError> {
    if thread_count == 0 {
        return Err(PlanError::InvalidInput(thread_count));
    }
    if total_size == 0 {
        return Ok(vec![ByteRange {
            index: 0,
            start: 0,
            end: 0,
        }]);
    }

    let count = thread_count as u64;
    let thread_size = total_size.div_ceil(count);

    let ranges = (0..count)
        .map(|i| {
            let start = i.saturating_mul(thread_size).min(total_size);
            let end = if i == count - 1 {
                total_size
            } else {
                (i + 1).saturating_mul(thread_size).min(total_size)
            };
            ByteRange {
                index: i as usize,
                start,
                end,
            }
        })
        .collect();

    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(ranges: &[ByteRange]) -> Vec<Option<(u64, u64)>> {
        ranges.iter().map(ByteRange::inclusive).collect()
    }

    #[test]
    fn plan_ranges_uneven_split() {
        let ranges = plan_ranges(1000, 3).unwrap();
        assert_eq!(
            bounds(&ranges),
            vec![Some((0, 333)), Some((334, 667)), Some((668, 999))]
        );
        assert_eq!(ranges[2].index, 2);
    }

    #[test]
    fn plan_ranges_last_range_absorbs_rounding() {
        let ranges = plan_ranges(999, 3).unwrap();
        assert_eq!(
            bounds(&ranges),
            vec![Some((0, 332)), Some((333, 665)), Some((666, 998))]
        );
        let ranges = plan_ranges(10, 4).unwrap();
        assert_eq!(
            bounds(&ranges),
            vec![Some((0, 2)), Some((3, 5)), Some((6, 8)), Some((9, 9))]
        );
    }

    #[test]
    fn plan_ranges_single_thread() {
        let ranges = plan_ranges(100, 1).unwrap();
        assert_eq!(bounds(&ranges), vec![Some((0, 99))]);
    }

    #[test]
    fn plan_ranges_more_threads_than_fill() {
        // ceil(5/4) = 2: [0,1] [2,3] [4,4] and an empty tail.
        let ranges = plan_ranges(5, 4).unwrap();
        assert_eq!(ranges.len(), 4);
        assert_eq!(
            bounds(&ranges),
            vec![Some((0, 1)), Some((2, 3)), Some((4, 4)), None]
        );
        assert_eq!(ranges.iter().map(ByteRange::len).sum::<u64>(), 5);
    }

    #[test]
    fn plan_ranges_zero_size_is_one_empty_range() {
        let ranges = plan_ranges(0, 4).unwrap();
        assert_eq!(ranges.len(), 1);
        assert!(ranges[0].is_empty());
        assert_eq!(ranges[0].curl_range(), None);
    }

    #[test]
    fn plan_ranges_rejects_zero_threads() {
        assert_eq!(plan_ranges(100, 0), Err(PlanError::InvalidInput(0)));
    }

    #[test]
    fn plan_ranges_partition_exactly() {
        for total in [1u64, 2, 7, 64, 999, 1000, 4096, 65_537] {
            for threads in 1..=17usize {
                let ranges = plan_ranges(total, threads).unwrap();
                assert_eq!(ranges.len(), threads, "total={} threads={}", total, threads);
                let mut expected_start = 0;
                for (i, r) in ranges.iter().enumerate() {
                    assert_eq!(r.index, i);
                    assert_eq!(r.start, expected_start, "gap or overlap at {}", i);
                    assert!(r.end >= r.start);
                    expected_start = r.end;
                }
                assert_eq!(expected_start, total);
            }
        }
    }

    #[test]
    fn curl_range_is_inclusive() {
        let r = ByteRange {
            index: 0,
            start: 42,
            end: 43,
        };
        assert_eq!(r.curl_range().as_deref(), Some("42-42"));
        assert_eq!(r.len(), 1);
    }
}
