//! Name-ordered merge of two listings

use std::cmp::Ordering;

use crate::mask::MaskMatcher;
use crate::record::FileRecord;
use crate::{Error, Result};

/// Case-insensitive comparison of whole names (extension included).
pub fn cmp_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Sort order: case-insensitive first, then exact bytes, so names differing
/// only in case still sort deterministically.
fn cmp_sort_key(a: &FileRecord, b: &FileRecord) -> Ordering {
    cmp_names(&a.name, &b.name).then_with(|| a.name.cmp(&b.name))
}

/// Indices of `records` in name order. The records themselves are not moved.
pub fn sorted_order(records: &[FileRecord]) -> Result<Vec<usize>> {
    let mut order = Vec::new();
    order
        .try_reserve_exact(records.len())
        .map_err(|_| Error::OutOfMemory)?;
    order.extend(0..records.len());
    order.sort_by(|&a, &b| cmp_sort_key(&records[a], &records[b]));
    Ok(order)
}

/// Sorts records in place by name.
pub fn sort_by_name(records: &mut [FileRecord]) {
    records.sort_by(cmp_sort_key);
}

/// One step of a merge: indices refer to the original record slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    LeftOnly(usize),
    RightOnly(usize),
    Paired(usize, usize),
}

/// Walks two name-sorted index views in lockstep.
///
/// Records covered by the mask are skipped on whichever side they appear.
pub struct MergeJoin<'a> {
    left: &'a [FileRecord],
    right: &'a [FileRecord],
    left_order: &'a [usize],
    right_order: &'a [usize],
    l: usize,
    r: usize,
    mask: Option<&'a dyn MaskMatcher>,
}

impl<'a> MergeJoin<'a> {
    pub fn new(
        left: &'a [FileRecord],
        left_order: &'a [usize],
        right: &'a [FileRecord],
        right_order: &'a [usize],
    ) -> Self {
        MergeJoin {
            left,
            right,
            left_order,
            right_order,
            l: 0,
            r: 0,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Option<&'a dyn MaskMatcher>) -> Self {
        self.mask = mask;
        self
    }

    fn is_masked(&self, record: &FileRecord) -> bool {
        self.mask.is_some_and(|mask| {
            let ext = if record.is_dir() {
                None
            } else {
                Some(record.extension())
            };
            mask.matches(&record.name, ext)
        })
    }

    fn skip_masked(&mut self) {
        while let Some(&i) = self.left_order.get(self.l) {
            if !self.is_masked(&self.left[i]) {
                break;
            }
            self.l += 1;
        }
        while let Some(&j) = self.right_order.get(self.r) {
            if !self.is_masked(&self.right[j]) {
                break;
            }
            self.r += 1;
        }
    }
}

impl Iterator for MergeJoin<'_> {
    type Item = MergeStep;

    fn next(&mut self) -> Option<MergeStep> {
        self.skip_masked();
        let left = self.left_order.get(self.l).copied();
        let right = self.right_order.get(self.r).copied();
        match (left, right) {
            (Some(li), Some(ri)) => match cmp_names(&self.left[li].name, &self.right[ri].name) {
                Ordering::Less => {
                    self.l += 1;
                    Some(MergeStep::LeftOnly(li))
                }
                Ordering::Greater => {
                    self.r += 1;
                    Some(MergeStep::RightOnly(ri))
                }
                Ordering::Equal => {
                    self.l += 1;
                    self.r += 1;
                    Some(MergeStep::Paired(li, ri))
                }
            },
            (Some(li), None) => {
                self.l += 1;
                Some(MergeStep::LeftOnly(li))
            }
            (None, Some(ri)) => {
                self.r += 1;
                Some(MergeStep::RightOnly(ri))
            }
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::NameMask;

    fn files(names: &[&str]) -> Vec<FileRecord> {
        names.iter().map(|n| FileRecord::file(*n, 0, None)).collect()
    }

    fn merge(
        left: &[FileRecord],
        right: &[FileRecord],
        mask: Option<&dyn MaskMatcher>,
    ) -> Vec<MergeStep> {
        let lo = sorted_order(left).unwrap();
        let ro = sorted_order(right).unwrap();
        MergeJoin::new(left, &lo, right, &ro).with_mask(mask).collect()
    }

    #[test]
    fn test_three_way_classification() {
        let left = files(&["b.txt", "A.txt", "d.txt"]);
        let right = files(&["c.txt", "a.TXT", "d.txt"]);
        let steps = merge(&left, &right, None);
        assert_eq!(
            steps,
            vec![
                MergeStep::Paired(1, 1),
                MergeStep::LeftOnly(0),
                MergeStep::RightOnly(0),
                MergeStep::Paired(2, 2),
            ]
        );
    }

    #[test]
    fn test_completeness() {
        let left = files(&["a", "c", "e", "g", "h", "z"]);
        let right = files(&["b", "c", "d", "g", "y"]);
        let steps = merge(&left, &right, None);
        let mut count = 0;
        for step in &steps {
            count += match step {
                MergeStep::Paired(..) => 2,
                _ => 1,
            };
        }
        assert_eq!(count, left.len() + right.len());

        let mut seen_left: Vec<_> = steps
            .iter()
            .filter_map(|s| match s {
                MergeStep::LeftOnly(i) | MergeStep::Paired(i, _) => Some(*i),
                MergeStep::RightOnly(_) => None,
            })
            .collect();
        seen_left.sort();
        assert_eq!(seen_left, (0..left.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_masks_apply_independently() {
        let left = files(&["a.bak", "b.txt"]);
        let right = files(&["b.txt", "c.bak"]);
        let mask = NameMask::new("*.bak").unwrap();
        let steps = merge(&left, &right, Some(&mask));
        assert_eq!(steps, vec![MergeStep::Paired(1, 0)]);
    }

    #[test]
    fn test_one_side_empty() {
        let left = files(&["x", "y"]);
        let steps = merge(&left, &[], None);
        assert_eq!(steps, vec![MergeStep::LeftOnly(0), MergeStep::LeftOnly(1)]);
        let steps = merge(&[], &left, None);
        assert_eq!(steps, vec![MergeStep::RightOnly(0), MergeStep::RightOnly(1)]);
    }

    #[test]
    fn test_case_only_duplicates_sort_deterministically() {
        let mut a = files(&["a", "A", "b"]);
        let mut b = files(&["b", "A", "a"]);
        sort_by_name(&mut a);
        sort_by_name(&mut b);
        assert_eq!(a, b);
    }
}
