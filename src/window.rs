//! Restrict an ordered time index to a half open window.

use std::ops::Range;

use chrono::NaiveDateTime;

/// Find the index range of `times` that falls in `[start, end)`.
///
/// `times` must be sorted in non-decreasing order, which holds for the time index of an
/// instrument day-file. Both ends are found by bisection, so a full day of high cadence samples
/// costs only a few dozen comparisons. A window with `end <= start` is empty.
pub fn time_window(times: &[NaiveDateTime], start: NaiveDateTime, end: NaiveDateTime) -> Range<usize> {
    if end <= start {
        let at = lower_bound(times, start);
        return at..at;
    }

    lower_bound(times, start)..lower_bound(times, end)
}

/// Index of the first element not less than `target`.
fn lower_bound(times: &[NaiveDateTime], target: NaiveDateTime) -> usize {
    times.partition_point(|time| *time < target)
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
