//! Last-write time comparison with FAT rounding and DST-shift detection

use std::cmp::Ordering;

use crate::record::{FileTime, TICKS_PER_SECOND};

const ONE_HOUR_SECS: u64 = 3600;
const TWO_HOURS_SECS: u64 = 2 * ONE_HOUR_SECS;
/// Differences this large are never treated as within resolution or as DST shifts.
const MAX_TOLERATED_DIFF_SECS: u64 = 100_000;

/// How two times are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimePolicy {
    /// Whole-second tolerance; `None` compares exactly.
    pub resolution: Option<u32>,
    /// Report DST shifts as equal in the effective result.
    pub ignore_dst_shifts: bool,
}

/// A timestamp together with whether its filesystem stores FAT times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub time: Option<FileTime>,
    pub fat: bool,
}

impl Stamp {
    pub fn new(time: Option<FileTime>, fat: bool) -> Self {
        Stamp { time, fat }
    }
}

/// Result of comparing two stamps.
///
/// `effective` decides selection and honours [`TimePolicy::ignore_dst_shifts`];
/// `raw` never does and is used to decide whether a DST shift is worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeComparison {
    pub effective: Ordering,
    pub raw: Ordering,
    /// The times differ by one or two hours, which is most likely a DST shift.
    pub dst_shift: bool,
}

impl TimeComparison {
    fn plain(order: Ordering) -> Self {
        TimeComparison {
            effective: order,
            raw: order,
            dst_shift: false,
        }
    }

    pub fn reverse(self) -> Self {
        TimeComparison {
            effective: self.effective.reverse(),
            raw: self.raw.reverse(),
            dst_shift: self.dst_shift,
        }
    }
}

/// Compares the last-write times of `left` and `right`.
///
/// A known time is newer than an unknown one.
pub fn compare_times(left: Stamp, right: Stamp, policy: &TimePolicy) -> TimeComparison {
    let (l, r) = match (left.time, right.time) {
        (Some(l), Some(r)) => (l, r),
        (Some(_), None) => return TimeComparison::plain(Ordering::Greater),
        (None, Some(_)) => return TimeComparison::plain(Ordering::Less),
        (None, None) => return TimeComparison::plain(Ordering::Equal),
    };

    match policy.resolution {
        Some(resolution) => compare_with_resolution(l, r, u64::from(resolution), policy),
        None => {
            let (l, r) = match (left.fat, right.fat) {
                (true, false) => (l, r.to_fat()),
                (false, true) => (l.to_fat(), r),
                _ => (l, r),
            };
            compare_exact(l, r, policy)
        }
    }
}

fn compare_exact(l: FileTime, r: FileTime, policy: &TimePolicy) -> TimeComparison {
    let raw = l.cmp(&r);
    let diff = l.ticks().abs_diff(r.ticks());
    let dst_shift =
        diff == ONE_HOUR_SECS * TICKS_PER_SECOND || diff == TWO_HOURS_SECS * TICKS_PER_SECOND;
    TimeComparison {
        effective: if dst_shift && policy.ignore_dst_shifts {
            Ordering::Equal
        } else {
            raw
        },
        raw,
        dst_shift,
    }
}

fn compare_with_resolution(
    l: FileTime,
    r: FileTime,
    resolution: u64,
    policy: &TimePolicy,
) -> TimeComparison {
    let (ls, rs) = (l.whole_seconds(), r.whole_seconds());
    let diff = ls.abs_diff(rs);
    let order = ls.cmp(&rs);
    if diff >= MAX_TOLERATED_DIFF_SECS {
        return TimeComparison::plain(order);
    }
    if diff <= resolution {
        return TimeComparison::plain(Ordering::Equal);
    }
    let dst_shift =
        diff.abs_diff(ONE_HOUR_SECS) <= resolution || diff.abs_diff(TWO_HOURS_SECS) <= resolution;
    TimeComparison {
        effective: if dst_shift && policy.ignore_dst_shifts {
            Ordering::Equal
        } else {
            order
        },
        raw: order,
        dst_shift,
    }
}
