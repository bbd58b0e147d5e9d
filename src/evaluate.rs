//! Pairwise evaluation of two files with the same name

use log::trace;
use std::cmp::Ordering;

use crate::config::{CompareCriteria, CompareOptions};
use crate::record::{Attributes, FileRecord};
use crate::source::ListingSource;
use crate::time::{Stamp, TimePolicy, compare_times};

/// Per-run facts the evaluator needs besides the two records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairContext {
    pub criteria: CompareCriteria,
    pub time_policy: TimePolicy,
    pub left_fat: bool,
    pub right_fat: bool,
    /// Both sources report attributes, so comparing them means something.
    pub attributes_valid: bool,
}

impl PairContext {
    pub fn new(
        options: &CompareOptions,
        left: &dyn ListingSource,
        right: &dyn ListingSource,
    ) -> Self {
        PairContext {
            criteria: options.criteria,
            time_policy: options.time_policy(),
            left_fat: left.is_fat(),
            right_fat: right.is_fat(),
            attributes_valid: left.attributes_valid() && right.attributes_valid(),
        }
    }

    fn has(&self, criteria: CompareCriteria) -> bool {
        self.criteria.contains(criteria)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentCheck {
    #[default]
    NotNeeded,
    /// The bytes must be compared; `combined` is the sum of both sizes.
    Required { combined: u64 },
}

/// What the cheap criteria decided about a pair.
///
/// A side ends up selected when it was marked dirty by size, attributes or
/// content, or when it is the newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairVerdict {
    pub select_left: bool,
    pub select_right: bool,
    pub left_newer: bool,
    pub right_newer: bool,
    /// Newer flags before DST shifts were ignored.
    pub raw_left_newer: bool,
    pub raw_right_newer: bool,
    pub dst_shift: bool,
    pub content: ContentCheck,
}

impl PairVerdict {
    pub fn marks_left(&self) -> bool {
        self.select_left || self.left_newer
    }

    pub fn marks_right(&self) -> bool {
        self.select_right || self.right_newer
    }

    pub fn differs(&self) -> bool {
        self.marks_left() || self.marks_right()
    }

    /// Records the result of the content comparison. A pair whose content
    /// could not be read is passed as different.
    pub fn apply_content(&mut self, different: bool) {
        if different {
            self.select_left = true;
            self.select_right = true;
        }
        self.content = ContentCheck::NotNeeded;
    }

    /// A DST shift is worth reporting only when the side it made newer is
    /// not already dirty for another reason.
    pub fn counts_dst_shift(&self) -> bool {
        self.dst_shift
            && ((self.raw_left_newer && !self.select_left)
                || (self.raw_right_newer && !self.select_right))
    }
}

/// Applies size, time, attribute and content-size criteria to a pair of files.
pub fn evaluate_pair(left: &FileRecord, right: &FileRecord, ctx: &PairContext) -> PairVerdict {
    let mut verdict = PairVerdict::default();

    if ctx.has(CompareCriteria::BY_SIZE) && left.size != right.size {
        verdict.select_left = true;
        verdict.select_right = true;
    }

    if ctx.has(CompareCriteria::BY_TIME) {
        let cmp = compare_times(
            Stamp::new(left.last_write, ctx.left_fat),
            Stamp::new(right.last_write, ctx.right_fat),
            &ctx.time_policy,
        );
        verdict.left_newer = cmp.effective == Ordering::Greater;
        verdict.right_newer = cmp.effective == Ordering::Less;
        verdict.raw_left_newer = cmp.raw == Ordering::Greater;
        verdict.raw_right_newer = cmp.raw == Ordering::Less;
        verdict.dst_shift = cmp.dst_shift;
    }

    if ctx.has(CompareCriteria::BY_ATTRIBUTES)
        && ctx.attributes_valid
        && (left.attributes & Attributes::DISPLAYED) != (right.attributes & Attributes::DISPLAYED)
    {
        verdict.select_left = true;
        verdict.select_right = true;
    }

    if ctx.has(CompareCriteria::BY_CONTENT) {
        if left.size != right.size {
            verdict.select_left = true;
            verdict.select_right = true;
        } else {
            let left_clean = !verdict.select_left && !verdict.left_newer;
            let right_clean = !verdict.select_right && !verdict.right_newer;
            // both dirty: reading would change nothing
            if (left_clean || right_clean) && left.size != 0 {
                verdict.content = ContentCheck::Required {
                    combined: left.size + right.size,
                };
            }
        }
    }

    trace!("{}: {verdict:?}", left.name);
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileTime;

    fn ctx(criteria: CompareCriteria) -> PairContext {
        PairContext {
            criteria,
            time_policy: TimePolicy {
                resolution: None,
                ignore_dst_shifts: false,
            },
            left_fat: false,
            right_fat: false,
            attributes_valid: true,
        }
    }

    fn file(size: u64, secs: i64) -> FileRecord {
        FileRecord::file("a.txt", size, FileTime::from_unix_secs(1_600_000_000 + secs))
    }

    #[test]
    fn test_size_selects_both() {
        let v = evaluate_pair(&file(10, 0), &file(20, 0), &ctx(CompareCriteria::BY_SIZE));
        assert!(v.marks_left() && v.marks_right());
        assert_eq!(v.content, ContentCheck::NotNeeded);
    }

    #[test]
    fn test_time_selects_newer_only() {
        let v = evaluate_pair(&file(10, 100), &file(10, 0), &ctx(CompareCriteria::BY_TIME));
        assert!(v.marks_left());
        assert!(!v.marks_right());
        assert!(!v.dst_shift);
    }

    #[test]
    fn test_attributes_need_valid_sources() {
        let left = file(1, 0).with_attributes(Attributes::READONLY);
        let right = file(1, 0).with_attributes(Attributes::ARCHIVE);
        let mut context = ctx(CompareCriteria::BY_ATTRIBUTES);
        assert!(evaluate_pair(&left, &right, &context).differs());
        context.attributes_valid = false;
        assert!(!evaluate_pair(&left, &right, &context).differs());
    }

    #[test]
    fn test_content_requirement() {
        let criteria = CompareCriteria::BY_CONTENT | CompareCriteria::BY_TIME;
        let v = evaluate_pair(&file(7, 0), &file(7, 0), &ctx(criteria));
        assert_eq!(v.content, ContentCheck::Required { combined: 14 });

        // one side newer, the other still clean
        let v = evaluate_pair(&file(7, 50), &file(7, 0), &ctx(criteria));
        assert_eq!(v.content, ContentCheck::Required { combined: 14 });

        let v = evaluate_pair(&file(0, 0), &file(0, 0), &ctx(criteria));
        assert_eq!(v.content, ContentCheck::NotNeeded);
        assert!(!v.differs());

        let v = evaluate_pair(&file(3, 0), &file(4, 0), &ctx(CompareCriteria::BY_CONTENT));
        assert!(v.select_left && v.select_right);
        assert_eq!(v.content, ContentCheck::NotNeeded);
    }

    #[test]
    fn test_content_skipped_when_both_dirty() {
        let left = file(5, 0).with_attributes(Attributes::HIDDEN);
        let right = file(5, 0);
        let v = evaluate_pair(
            &left,
            &right,
            &ctx(CompareCriteria::BY_CONTENT | CompareCriteria::BY_ATTRIBUTES),
        );
        assert_eq!(v.content, ContentCheck::NotNeeded);
        assert!(v.differs());
    }

    #[test]
    fn test_apply_content() {
        let mut v = evaluate_pair(&file(7, 0), &file(7, 0), &ctx(CompareCriteria::BY_CONTENT));
        v.apply_content(true);
        assert!(v.marks_left() && v.marks_right());
        assert_eq!(v.content, ContentCheck::NotNeeded);
    }

    #[test]
    fn test_dst_shift_counting() {
        let mut context = ctx(CompareCriteria::BY_TIME);
        context.time_policy.ignore_dst_shifts = true;
        let v = evaluate_pair(&file(1, 3600), &file(1, 0), &context);
        assert!(!v.differs());
        assert!(v.counts_dst_shift());

        context.time_policy.ignore_dst_shifts = false;
        let v = evaluate_pair(&file(1, 3600), &file(1, 0), &context);
        assert!(v.marks_left());
        assert!(v.counts_dst_shift());

        context.criteria |= CompareCriteria::BY_SIZE;
        let v = evaluate_pair(&file(1, 3600), &file(2, 0), &context);
        assert!(!v.counts_dst_shift());
    }
}
