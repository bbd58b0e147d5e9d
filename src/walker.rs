//! The directory comparison run: two passes over both panels and their subtrees

use log::{debug, trace, warn};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::config::{CompareCriteria, CompareOptions};
use crate::content::{ByteMeter, ContentComparator, ContentOutcome};
use crate::evaluate::{ContentCheck, PairContext, evaluate_pair};
use crate::interact::{BackgroundWork, ErrorAction, Interaction, PauseGuard};
use crate::mask::{MaskMatcher, NameMask};
use crate::merge::{MergeJoin, MergeStep, cmp_names, sort_by_name, sorted_order};
use crate::progress::ProgressSink;
use crate::record::{Attributes, EntryKind, FileRecord, Listing};
use crate::report::CompareOutcome;
use crate::source::{ListingSource, ReadFilter, check_path_len, read_listing};
use crate::time::{Stamp, compare_times};
use crate::{Error, Result};

/// Lifecycle of one comparison run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Pass 1: nothing is marked, content bytes are only summed up.
    ComputingTotals,
    /// Pass 2: the real comparison.
    Comparing,
    Done,
    Cancelled,
}

/// One panel taking part in a comparison.
pub struct Side<'a> {
    pub source: &'a dyn ListingSource,
    /// The panel's directory, relative to the source root.
    pub path: PathBuf,
    /// The panel's records; receives the selection when the run completes.
    pub listing: &'a mut Listing,
    pub background: Option<&'a dyn BackgroundWork>,
}

impl<'a> Side<'a> {
    pub fn new(source: &'a dyn ListingSource, listing: &'a mut Listing) -> Self {
        Side {
            source,
            path: PathBuf::new(),
            listing,
            background: None,
        }
    }

    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_background(mut self, work: &'a dyn BackgroundWork) -> Self {
        self.background = Some(work);
        self
    }
}

/// Compares the current directories of two panels and marks what differs.
///
/// ```no_run
/// use dircompare::{CompareOptions, Listing};
/// use dircompare::interact::SkipErrors;
/// use dircompare::progress::{CancelFlag, SilentProgress};
/// use dircompare::source::DiskSource;
/// use dircompare::walker::{DirComparer, Side};
///
/// # fn main() -> dircompare::Result<()> {
/// let (left, right) = (DiskSource::new("a"), DiskSource::new("b"));
/// let mut left_listing = Listing::new();
/// let mut right_listing = Listing::new();
/// let options = CompareOptions::default();
/// let mut progress = SilentProgress::new(CancelFlag::new());
/// let outcome = DirComparer::new(&options, &mut progress, &mut SkipErrors).compare(
///     Side::new(&left, &mut left_listing),
///     Side::new(&right, &mut right_listing),
/// )?;
/// println!("identical: {}", outcome.identical);
/// # Ok(())
/// # }
/// ```
pub struct DirComparer<'a> {
    options: &'a CompareOptions,
    progress: &'a mut dyn ProgressSink,
    interaction: &'a mut dyn Interaction,
}

impl<'a> DirComparer<'a> {
    pub fn new(
        options: &'a CompareOptions,
        progress: &'a mut dyn ProgressSink,
        interaction: &'a mut dyn Interaction,
    ) -> Self {
        DirComparer {
            options,
            progress,
            interaction,
        }
    }

    /// Runs the comparison.
    ///
    /// Both listings lose their previous selection. Unless the run is
    /// cancelled, every record that differs or has no counterpart is then
    /// selected. Running out of memory counts as a cancellation.
    pub fn compare(&mut self, left: Side<'_>, right: Side<'_>) -> Result<CompareOutcome> {
        let options = self.options;
        let by_content = options.has(CompareCriteria::BY_CONTENT);
        if by_content && !(left.source.is_filesystem() && right.source.is_filesystem()) {
            return Err(Error::UnsupportedSourceCombination);
        }
        let file_mask = compile_mask(
            options,
            CompareCriteria::IGNORE_FILE_NAMES,
            &options.ignore_file_masks,
        )?;
        let dir_mask =
            compile_mask(options, CompareCriteria::IGNORE_DIR_NAMES, &options.ignore_dir_masks)?;

        let _left_paused = PauseGuard::new(left.background);
        let _right_paused = PauseGuard::new(right.background);

        self.progress.set_source_label(&left.source.display_path(&left.path));
        self.progress.set_target_label(&right.source.display_path(&right.path));

        let mut run = Run {
            options,
            ctx: PairContext::new(options, left.source, right.source),
            left: left.source,
            right: right.source,
            left_root: &left.path,
            right_root: &right.path,
            file_mask: file_mask.as_ref(),
            dir_mask: dir_mask.as_ref(),
            progress: &mut *self.progress,
            interaction: &mut *self.interaction,
            comparator: None,
            state: RunState::default(),
        };

        let result = match PanelView::new(&*left.listing, &*right.listing) {
            Ok(mut view) => run.execute(&mut view).map(|flow| (flow, Some(view.into_marks()))),
            Err(e) => Err(e),
        };
        let marks = match result {
            Ok((ControlFlow::Continue(()), marks)) => marks,
            Ok((ControlFlow::Break(()), _)) => None,
            Err(Error::OutOfMemory) => {
                warn!("out of memory, comparison abandoned");
                None
            }
            Err(e) => {
                left.listing.clear_selection();
                right.listing.clear_selection();
                return Err(e);
            }
        };

        left.listing.clear_selection();
        right.listing.clear_selection();
        let state = &mut run.state;
        match marks {
            Some((left_marks, right_marks)) => {
                left_marks.apply(left.listing);
                right_marks.apply(right.listing);
                state.phase = Phase::Done;
            }
            None => state.phase = Phase::Cancelled,
        }
        debug!(
            "comparison finished: {:?}, identical={}, dst shifts={}",
            state.phase, state.identical, state.dst_shifts
        );
        Ok(CompareOutcome {
            identical: state.identical,
            cancelled: state.phase == Phase::Cancelled,
            dst_shifts: state.dst_shifts,
            content_compared: by_content,
            total_bytes: state.total_bytes,
        })
    }
}

fn compile_mask(
    options: &CompareOptions,
    flag: CompareCriteria,
    mask: &str,
) -> Result<Option<NameMask>> {
    if options.has(flag) {
        NameMask::new(mask).map(Some)
    } else {
        Ok(None)
    }
}

fn try_flags(len: usize) -> Result<Vec<bool>> {
    let mut flags = Vec::new();
    flags.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    flags.resize(len, false);
    Ok(flags)
}

/// Scratch selection of one panel; written back only when the run completes.
#[derive(Debug)]
struct Marks {
    files: Vec<bool>,
    dirs: Vec<bool>,
}

impl Marks {
    fn new(listing: &Listing) -> Result<Self> {
        Ok(Marks {
            files: try_flags(listing.files.len())?,
            dirs: try_flags(listing.dirs.len())?,
        })
    }

    fn apply(&self, listing: &mut Listing) {
        for (kind, flags) in [(EntryKind::File, &self.files), (EntryKind::Dir, &self.dirs)] {
            for (index, _) in flags.iter().enumerate().filter(|(_, selected)| **selected) {
                listing.set_selected(kind, index, true);
            }
        }
    }
}

/// Name-sorted view of both panels' records. The records stay where they are.
struct PanelView<'l> {
    left: &'l Listing,
    right: &'l Listing,
    left_files: Vec<usize>,
    left_dirs: Vec<usize>,
    right_files: Vec<usize>,
    right_dirs: Vec<usize>,
    left_marks: Marks,
    right_marks: Marks,
    /// Left directories pass 1 already found different; pass 2 does not walk them again.
    known_different: Vec<bool>,
}

fn dir_order(listing: &Listing) -> Result<Vec<usize>> {
    let mut order = sorted_order(&listing.dirs)?;
    order.retain(|&i| listing.dirs[i].name != "..");
    Ok(order)
}

impl<'l> PanelView<'l> {
    fn new(left: &'l Listing, right: &'l Listing) -> Result<Self> {
        Ok(PanelView {
            left,
            right,
            left_files: sorted_order(&left.files)?,
            left_dirs: dir_order(left)?,
            right_files: sorted_order(&right.files)?,
            right_dirs: dir_order(right)?,
            left_marks: Marks::new(left)?,
            right_marks: Marks::new(right)?,
            known_different: try_flags(left.dirs.len())?,
        })
    }

    fn into_marks(self) -> (Marks, Marks) {
        (self.left_marks, self.right_marks)
    }
}

#[derive(Debug)]
struct RunState {
    phase: Phase,
    /// Content bytes pass 1 found to compare.
    total_bytes: u64,
    dst_shifts: u32,
    identical: bool,
    /// Content bytes under each top-level subdirectory pair pass 2 walks, in walking order.
    dir_totals: Vec<u64>,
    dir_index: usize,
}

impl Default for RunState {
    fn default() -> Self {
        RunState {
            phase: Phase::Idle,
            total_bytes: 0,
            dst_shifts: 0,
            identical: true,
            dir_totals: Vec::new(),
            dir_index: 0,
        }
    }
}

/// What a subtree comparison found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subtree {
    Same { dst_shifts: u32 },
    Different { dst_shifts: u32 },
    /// A read failed and the user chose to go on.
    Failed,
    Cancelled,
}

/// Outcome of a step that can fail recoverably.
enum Attempt<T> {
    Done(T),
    Failed,
    Cancelled,
}

#[derive(Clone, Copy)]
enum Which {
    Left,
    Right,
}

struct Run<'r> {
    options: &'r CompareOptions,
    ctx: PairContext,
    left: &'r dyn ListingSource,
    right: &'r dyn ListingSource,
    left_root: &'r Path,
    right_root: &'r Path,
    file_mask: Option<&'r NameMask>,
    dir_mask: Option<&'r NameMask>,
    progress: &'r mut dyn ProgressSink,
    interaction: &'r mut dyn Interaction,
    /// Allocated on the first content comparison.
    comparator: Option<ContentComparator>,
    state: RunState,
}

impl<'r> Run<'r> {
    fn has(&self, criteria: CompareCriteria) -> bool {
        self.options.has(criteria)
    }

    fn totals_only(&self) -> bool {
        self.state.phase == Phase::ComputingTotals
    }

    fn source(&self, which: Which) -> &'r dyn ListingSource {
        match which {
            Which::Left => self.left,
            Which::Right => self.right,
        }
    }

    fn execute(&mut self, view: &mut PanelView<'_>) -> Result<ControlFlow<()>> {
        if self.has(CompareCriteria::BY_CONTENT) {
            self.state.phase = Phase::ComputingTotals;
            debug!("pass 1: computing content totals");
            let mut total = 0;
            if self.panel_pass(view, &mut total)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
            self.state.total_bytes = total;
            self.progress.set_total_bytes(total);
            self.progress.set_current_bytes(0);
            debug!("pass 1 done: {total} bytes to compare");
        }
        self.state.phase = Phase::Comparing;
        debug!("pass 2: comparing");
        let mut unused = 0;
        self.panel_pass(view, &mut unused)
    }

    /// What to do about a failed read: pass 1 never asks, it just skips.
    fn resolve(&mut self, err: Error) -> Result<ErrorAction> {
        if !err.is_recoverable() {
            return Err(err);
        }
        if self.totals_only() {
            debug!("pass 1: {err}");
            return Ok(ErrorAction::Skip);
        }
        let action = self.interaction.on_error(&err);
        debug!("{err}: {action:?}");
        Ok(action)
    }

    fn read_side(&mut self, which: Which, sub_path: &Path) -> Result<Attempt<Listing>> {
        let filter = ReadFilter {
            files: self.file_mask.map(|m| m as &dyn MaskMatcher),
            dirs: self.dir_mask.map(|m| m as &dyn MaskMatcher),
        };
        loop {
            let source = self.source(which);
            let progress = &mut *self.progress;
            let result = read_listing(source, sub_path, filter, &mut || progress.keep_going());
            match result {
                Ok(Some(listing)) => return Ok(Attempt::Done(listing)),
                Ok(None) => return Ok(Attempt::Cancelled),
                Err(e) => match self.resolve(e)? {
                    ErrorAction::Retry => continue,
                    ErrorAction::Skip => return Ok(Attempt::Failed),
                    ErrorAction::Cancel => return Ok(Attempt::Cancelled),
                },
            }
        }
    }

    fn file_path(&self, which: Which, sub_path: &Path, name: &str) -> Result<PathBuf> {
        let path = self
            .source(which)
            .file_path(sub_path, name)
            .ok_or(Error::UnsupportedSourceCombination)?;
        check_path_len(&path.to_string_lossy())?;
        Ok(path)
    }

    /// Compares two files byte for byte, asking the user about read errors.
    fn compare_content(
        &mut self,
        left: &Path,
        right: &Path,
        combined: u64,
    ) -> Result<Attempt<bool>> {
        let before = self.progress.current_bytes();
        loop {
            let mut meter = ByteMeter::new(combined);
            let comparator = self.comparator.get_or_insert_with(ContentComparator::new);
            match comparator.compare(left, right, &mut meter, &mut *self.progress) {
                Ok(ContentOutcome::Same) => return Ok(Attempt::Done(false)),
                Ok(ContentOutcome::Different) => return Ok(Attempt::Done(true)),
                Ok(ContentOutcome::Cancelled) => return Ok(Attempt::Cancelled),
                Err(e) => match self.resolve(e)? {
                    ErrorAction::Retry => self.progress.set_current_bytes(before),
                    ErrorAction::Skip => {
                        meter.finish(&mut *self.progress);
                        return Ok(Attempt::Failed);
                    }
                    ErrorAction::Cancel => return Ok(Attempt::Cancelled),
                },
            }
        }
    }

    fn attributes_differ(&self, left: &FileRecord, right: &FileRecord) -> bool {
        self.ctx.attributes_valid
            && (left.attributes & Attributes::DISPLAYED)
                != (right.attributes & Attributes::DISPLAYED)
    }

    /// One pass over the panels' own records.
    fn panel_pass(&mut self, view: &mut PanelView<'_>, total: &mut u64) -> Result<ControlFlow<()>> {
        let comparing = !self.totals_only();
        let (left, right) = (view.left, view.right);

        for step in MergeJoin::new(&left.files, &view.left_files, &right.files, &view.right_files)
            .with_mask(self.file_mask.map(|m| m as &dyn MaskMatcher))
        {
            match step {
                MergeStep::LeftOnly(i) => {
                    if comparing {
                        view.left_marks.files[i] = true;
                        self.state.identical = false;
                    }
                }
                MergeStep::RightOnly(j) => {
                    if comparing {
                        view.right_marks.files[j] = true;
                        self.state.identical = false;
                    }
                }
                MergeStep::Paired(i, j) => {
                    let (l, r) = (&left.files[i], &right.files[j]);
                    let mut verdict = evaluate_pair(l, r, &self.ctx);
                    if let ContentCheck::Required { combined } = verdict.content {
                        if comparing {
                            let left_path =
                                self.file_path(Which::Left, self.left_root, &l.name)?;
                            let right_path =
                                self.file_path(Which::Right, self.right_root, &r.name)?;
                            match self.compare_content(&left_path, &right_path, combined)? {
                                Attempt::Done(different) => verdict.apply_content(different),
                                Attempt::Failed => verdict.apply_content(true),
                                Attempt::Cancelled => return Ok(ControlFlow::Break(())),
                            }
                        } else {
                            *total += combined;
                        }
                    }
                    if comparing {
                        if verdict.counts_dst_shift() {
                            self.state.dst_shifts += 1;
                        }
                        if verdict.marks_left() {
                            view.left_marks.files[i] = true;
                            self.state.identical = false;
                        }
                        if verdict.marks_right() {
                            view.right_marks.files[j] = true;
                            self.state.identical = false;
                        }
                    }
                }
            }
        }

        if !self.has(CompareCriteria::SUBDIRS) && !self.has(CompareCriteria::ONE_PANEL_DIRS) {
            return Ok(ControlFlow::Continue(()));
        }

        for step in MergeJoin::new(&left.dirs, &view.left_dirs, &right.dirs, &view.right_dirs)
            .with_mask(self.dir_mask.map(|m| m as &dyn MaskMatcher))
        {
            match step {
                MergeStep::LeftOnly(i) => {
                    view.left_marks.dirs[i] = true;
                    self.state.identical = false;
                }
                MergeStep::RightOnly(j) => {
                    view.right_marks.dirs[j] = true;
                    self.state.identical = false;
                }
                MergeStep::Paired(i, j) => {
                    let (l, r) = (&left.dirs[i], &right.dirs[j]);
                    let mut select = self.has(CompareCriteria::SUBDIR_ATTRIBUTES)
                        && self.attributes_differ(l, r);
                    if self.has(CompareCriteria::SUBDIRS) && !select && !view.known_different[i] {
                        match self.top_subtree(l, r, total)? {
                            ControlFlow::Continue(differs) => select = differs,
                            ControlFlow::Break(()) => return Ok(ControlFlow::Break(())),
                        }
                        if select && !comparing {
                            view.known_different[i] = true;
                        }
                    }
                    if select {
                        view.left_marks.dirs[i] = true;
                        view.right_marks.dirs[j] = true;
                        self.state.identical = false;
                    }
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Walks one pair of top-level subdirectories; `Continue(true)` means they differ.
    fn top_subtree(
        &mut self,
        left: &FileRecord,
        right: &FileRecord,
        total: &mut u64,
    ) -> Result<ControlFlow<(), bool>> {
        let comparing = !self.totals_only();
        let before = self.progress.current_bytes();
        let mut sub_total = 0;
        let left_sub = self.left_root.join(&left.name);
        let right_sub = self.right_root.join(&right.name);
        let result = self.subtree(&left_sub, &right_sub, &mut sub_total)?;
        debug!("{}: {result:?}", left.name);

        let differs = match result {
            Subtree::Cancelled => return Ok(ControlFlow::Break(())),
            Subtree::Different { dst_shifts } => {
                self.state.dst_shifts += dst_shifts;
                if comparing {
                    self.skip_subtree_progress(before);
                }
                true
            }
            Subtree::Same { dst_shifts } => {
                if comparing {
                    self.state.dst_shifts += dst_shifts;
                    self.state.dir_index += 1;
                } else {
                    self.state.dir_totals.push(sub_total);
                    *total += sub_total;
                }
                false
            }
            Subtree::Failed => {
                if comparing {
                    self.state.dir_index += 1;
                    true
                } else {
                    // walked again in pass 2
                    self.state.dir_totals.push(sub_total);
                    false
                }
            }
        };
        Ok(ControlFlow::Continue(differs))
    }

    /// Moves the progress past the rest of a subtree that turned out different.
    fn skip_subtree_progress(&mut self, before: u64) {
        let index = self.state.dir_index;
        self.state.dir_index += 1;
        if !self.has(CompareCriteria::BY_CONTENT) {
            return;
        }
        match self.state.dir_totals.get(index) {
            Some(&recorded) => self.progress.set_current_bytes(before + recorded),
            None => warn!("no recorded total for subdirectory #{index}, progress may be off"),
        }
    }

    /// Compares two subtrees. Stops at the first difference.
    fn subtree(&mut self, left_sub: &Path, right_sub: &Path, total: &mut u64) -> Result<Subtree> {
        let comparing = !self.totals_only();
        if comparing && self.has(CompareCriteria::BY_CONTENT) {
            self.progress.set_file_current(0);
        }
        let left_label = self.left.display_path(left_sub);
        let right_label = self.right.display_path(right_sub);
        self.progress.set_source_label(&left_label);
        self.progress.set_target_label(&right_label);
        check_path_len(&left_label)?;
        check_path_len(&right_label)?;
        if !self.progress.keep_going() {
            return Ok(Subtree::Cancelled);
        }

        let mut left = match self.read_side(Which::Left, left_sub)? {
            Attempt::Done(listing) => listing,
            Attempt::Failed => return Ok(Subtree::Failed),
            Attempt::Cancelled => return Ok(Subtree::Cancelled),
        };
        let mut right = match self.read_side(Which::Right, right_sub)? {
            Attempt::Done(listing) => listing,
            Attempt::Failed => return Ok(Subtree::Failed),
            Attempt::Cancelled => return Ok(Subtree::Cancelled),
        };

        let different = Subtree::Different { dst_shifts: 0 };
        if left.files.len() != right.files.len() || left.dirs.len() != right.dirs.len() {
            trace!("{}: entry counts differ", left_label);
            return Ok(different);
        }
        sort_by_name(&mut left.files);
        sort_by_name(&mut left.dirs);
        sort_by_name(&mut right.files);
        sort_by_name(&mut right.dirs);

        let mut dst_here = 0;
        let mut dst_pending = false;
        for (l, r) in left.files.iter().zip(&right.files) {
            if cmp_names(&l.name, &r.name).is_ne() {
                return Ok(different);
            }
            if self.has(CompareCriteria::BY_SIZE) && l.size != r.size {
                return Ok(different);
            }
            if self.has(CompareCriteria::BY_ATTRIBUTES) && self.attributes_differ(l, r) {
                return Ok(different);
            }
            if self.has(CompareCriteria::BY_CONTENT) && l.size != r.size {
                return Ok(different);
            }
            // times last: a DST shift is reported only if nothing else differs
            if self.has(CompareCriteria::BY_TIME) {
                let cmp = compare_times(
                    Stamp::new(l.last_write, self.ctx.left_fat),
                    Stamp::new(r.last_write, self.ctx.right_fat),
                    &self.ctx.time_policy,
                );
                if cmp.effective.is_ne() {
                    if !cmp.dst_shift {
                        return Ok(different);
                    }
                    dst_pending = true;
                } else if cmp.dst_shift {
                    dst_here += 1;
                }
            }
        }

        for (l, r) in left.dirs.iter().zip(&right.dirs) {
            if cmp_names(&l.name, &r.name).is_ne() {
                return Ok(different);
            }
            if self.has(CompareCriteria::SUBDIR_ATTRIBUTES) && self.attributes_differ(l, r) {
                return Ok(different);
            }
        }

        if dst_pending {
            return Ok(Subtree::Different { dst_shifts: 1 });
        }

        if self.has(CompareCriteria::BY_CONTENT) {
            for (l, r) in left.files.iter().zip(&right.files) {
                if l.size == 0 {
                    continue;
                }
                let combined = l.size + r.size;
                if !comparing {
                    *total += combined;
                    continue;
                }
                let left_path = self.file_path(Which::Left, left_sub, &l.name)?;
                let right_path = self.file_path(Which::Right, right_sub, &r.name)?;
                match self.compare_content(&left_path, &right_path, combined)? {
                    Attempt::Done(false) => {}
                    Attempt::Done(true) => return Ok(different),
                    Attempt::Failed => return Ok(Subtree::Failed),
                    Attempt::Cancelled => return Ok(Subtree::Cancelled),
                }
            }
        }
        drop(left.files);
        drop(right.files);

        for (l, r) in left.dirs.iter().zip(&right.dirs) {
            match self.subtree(&left_sub.join(&l.name), &right_sub.join(&r.name), total)? {
                Subtree::Same { dst_shifts } => dst_here += dst_shifts,
                other => return Ok(other),
            }
        }
        Ok(Subtree::Same { dst_shifts: dst_here })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interact::SkipErrors;
    use crate::progress::{CancelFlag, SilentProgress};
    use crate::record::FileTime;
    use crate::source::{ArchiveEntry, ArchiveSource};

    fn at(secs: i64) -> Option<FileTime> {
        FileTime::from_unix_secs(1_600_000_000 + secs)
    }

    fn run(
        options: &CompareOptions,
        left: &ArchiveSource,
        right: &ArchiveSource,
    ) -> (CompareOutcome, Listing, Listing) {
        let mut left_listing = left.listing(Path::new("")).cloned().unwrap();
        let mut right_listing = right.listing(Path::new("")).cloned().unwrap();
        let mut progress = SilentProgress::new(CancelFlag::new());
        let outcome = DirComparer::new(options, &mut progress, &mut SkipErrors)
            .compare(
                Side::new(left, &mut left_listing),
                Side::new(right, &mut right_listing),
            )
            .unwrap();
        (outcome, left_listing, right_listing)
    }

    fn selected(listing: &Listing) -> Vec<&str> {
        listing.selected().map(|r| r.name.as_str()).collect()
    }

    fn tree(entries: Vec<ArchiveEntry>) -> ArchiveSource {
        ArchiveSource::from_entries("t.zip", entries)
    }

    #[test]
    fn test_one_sided_and_newer_files() {
        let left = tree(vec![
            ArchiveEntry::file("only-left.txt", 1, at(0)),
            ArchiveEntry::file("same.txt", 5, at(0)),
            ArchiveEntry::file("newer.txt", 5, at(100)),
        ]);
        let right = tree(vec![
            ArchiveEntry::file("SAME.TXT", 5, at(0)),
            ArchiveEntry::file("newer.txt", 5, at(0)),
            ArchiveEntry::file("only-right.txt", 1, at(0)),
        ]);
        let (outcome, l, r) = run(&CompareOptions::default(), &left, &right);
        assert!(!outcome.identical);
        assert_eq!(selected(&l), vec!["only-left.txt", "newer.txt"]);
        assert_eq!(selected(&r), vec!["only-right.txt"]);
    }

    #[test]
    fn test_previous_selection_is_replaced() {
        let left = tree(vec![ArchiveEntry::file("a", 1, at(0))]);
        let right = tree(vec![ArchiveEntry::file("a", 1, at(0))]);
        let mut left_listing = left.listing(Path::new("")).cloned().unwrap();
        left_listing.files[0].selected = true;
        let mut right_listing = right.listing(Path::new("")).cloned().unwrap();
        let mut progress = SilentProgress::new(CancelFlag::new());
        let outcome = DirComparer::new(&CompareOptions::default(), &mut progress, &mut SkipErrors)
            .compare(Side::new(&left, &mut left_listing), Side::new(&right, &mut right_listing))
            .unwrap();
        assert!(outcome.identical);
        assert_eq!(left_listing.selected().count(), 0);
    }

    #[test]
    fn test_directories_need_subdir_criteria() {
        let left = tree(vec![ArchiveEntry::dir("lonely", None)]);
        let right = tree(vec![]);
        let (outcome, l, _) = run(&CompareOptions::default(), &left, &right);
        assert!(outcome.identical);
        assert!(selected(&l).is_empty());

        let options = CompareOptions::with_criteria(CompareCriteria::ONE_PANEL_DIRS);
        let (outcome, l, _) = run(&options, &left, &right);
        assert!(!outcome.identical);
        assert_eq!(selected(&l), vec!["lonely"]);
    }

    #[test]
    fn test_subtree_difference_selects_both_dirs() {
        let left = tree(vec![
            ArchiveEntry::file("d/x/deep.txt", 10, at(0)),
            ArchiveEntry::file("e/same.txt", 3, at(0)),
        ]);
        let right = tree(vec![
            ArchiveEntry::file("D/x/deep.txt", 11, at(0)),
            ArchiveEntry::file("e/same.txt", 3, at(0)),
        ]);
        let options =
            CompareOptions::with_criteria(CompareCriteria::SUBDIRS | CompareCriteria::BY_SIZE);
        let (outcome, l, r) = run(&options, &left, &right);
        assert!(!outcome.identical);
        assert_eq!(selected(&l), vec!["d"]);
        assert_eq!(selected(&r), vec!["D"]);
    }

    #[test]
    fn test_subdir_attributes_checked_before_recursion() {
        let mut left = ArchiveSource::new("l.zip");
        let mut dir = ArchiveEntry::dir("d", None);
        dir.attributes = Attributes::DIRECTORY | Attributes::HIDDEN;
        left.add(dir);
        left.add(ArchiveEntry::file("d/f", 1, at(0)));
        let right = tree(vec![ArchiveEntry::file("d/f", 1, at(0))]);
        let options = CompareOptions::with_criteria(
            CompareCriteria::SUBDIRS | CompareCriteria::SUBDIR_ATTRIBUTES,
        );
        let (outcome, l, _) = run(&options, &left, &right);
        assert!(!outcome.identical);
        assert_eq!(selected(&l), vec!["d"]);
    }

    #[test]
    fn test_dst_shift_inside_subtree() {
        let left = tree(vec![ArchiveEntry::file("d/f.txt", 1, at(3600))]);
        let right = tree(vec![ArchiveEntry::file("d/f.txt", 1, at(0))]);
        let mut options =
            CompareOptions::with_criteria(CompareCriteria::SUBDIRS | CompareCriteria::BY_TIME);
        options.time_resolution = None;

        let (outcome, l, _) = run(&options, &left, &right);
        assert!(!outcome.identical);
        assert_eq!(outcome.dst_shifts, 1);
        assert_eq!(selected(&l), vec!["d"]);

        options.ignore_dst_shifts = true;
        let (outcome, _, _) = run(&options, &left, &right);
        assert!(outcome.identical);
        assert_eq!(outcome.dst_shifts, 1);
    }

    #[test]
    fn test_dst_not_reported_when_other_difference_exists() {
        let left = tree(vec![
            ArchiveEntry::file("d/a.txt", 1, at(3600)),
            ArchiveEntry::file("d/b.txt", 1, at(500)),
        ]);
        let right = tree(vec![
            ArchiveEntry::file("d/a.txt", 1, at(0)),
            ArchiveEntry::file("d/b.txt", 1, at(0)),
        ]);
        let mut options =
            CompareOptions::with_criteria(CompareCriteria::SUBDIRS | CompareCriteria::BY_TIME);
        options.time_resolution = None;
        let (outcome, _, _) = run(&options, &left, &right);
        assert!(!outcome.identical);
        assert_eq!(outcome.dst_shifts, 0);
    }

    #[test]
    fn test_masks_hide_names_everywhere() {
        let left = tree(vec![
            ArchiveEntry::file("keep.txt", 1, at(0)),
            ArchiveEntry::file("junk.bak", 1, at(0)),
            ArchiveEntry::file("d/inner.bak", 1, at(0)),
            ArchiveEntry::file(".git/HEAD", 1, at(0)),
        ]);
        let right = tree(vec![
            ArchiveEntry::file("keep.txt", 1, at(0)),
            ArchiveEntry::dir("d", None),
        ]);
        let mut options = CompareOptions::with_criteria(
            CompareCriteria::SUBDIRS
                | CompareCriteria::IGNORE_FILE_NAMES
                | CompareCriteria::IGNORE_DIR_NAMES,
        );
        options.ignore_file_masks = "*.bak".into();
        options.ignore_dir_masks = ".git".into();
        let (outcome, _, _) = run(&options, &left, &right);
        assert!(outcome.identical);
    }

    #[test]
    fn test_invalid_mask_refuses_to_start() {
        let left = tree(vec![]);
        let mut options = CompareOptions::with_criteria(CompareCriteria::IGNORE_FILE_NAMES);
        options.ignore_file_masks = "*.tmp|".into();
        let mut listing_l = Listing::new();
        let mut listing_r = Listing::new();
        let mut progress = SilentProgress::new(CancelFlag::new());
        let result = DirComparer::new(&options, &mut progress, &mut SkipErrors)
            .compare(Side::new(&left, &mut listing_l), Side::new(&left, &mut listing_r));
        assert!(matches!(result, Err(Error::InvalidMask { .. })));
    }

    #[test]
    fn test_content_on_archive_is_unsupported() {
        let left = tree(vec![ArchiveEntry::file("a", 1, at(0))]);
        let options = CompareOptions::with_criteria(CompareCriteria::BY_CONTENT);
        let mut listing_l = Listing::new();
        let mut listing_r = Listing::new();
        let mut progress = SilentProgress::new(CancelFlag::new());
        let result = DirComparer::new(&options, &mut progress, &mut SkipErrors)
            .compare(Side::new(&left, &mut listing_l), Side::new(&left, &mut listing_r));
        assert!(matches!(result, Err(Error::UnsupportedSourceCombination)));
    }

    #[test]
    fn test_parent_entry_is_skipped() {
        let source = tree(vec![]);
        let mut left_listing: Listing = [FileRecord::dir("..", None)].into_iter().collect();
        let mut right_listing = Listing::new();
        let options = CompareOptions::with_criteria(CompareCriteria::ONE_PANEL_DIRS);
        let mut progress = SilentProgress::new(CancelFlag::new());
        let outcome = DirComparer::new(&options, &mut progress, &mut SkipErrors)
            .compare(Side::new(&source, &mut left_listing), Side::new(&source, &mut right_listing))
            .unwrap();
        assert!(outcome.identical);
    }

    #[test]
    fn test_cancelled_run_leaves_nothing_selected() {
        let left = tree(vec![
            ArchiveEntry::file("d/f", 1, at(0)),
            ArchiveEntry::file("x", 1, at(0)),
        ]);
        let right = tree(vec![ArchiveEntry::file("d/f", 2, at(0))]);
        let mut left_listing = left.listing(Path::new("")).cloned().unwrap();
        let mut right_listing = right.listing(Path::new("")).cloned().unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut progress = SilentProgress::new(cancel);
        let options =
            CompareOptions::with_criteria(CompareCriteria::SUBDIRS | CompareCriteria::BY_SIZE);
        let outcome = DirComparer::new(&options, &mut progress, &mut SkipErrors)
            .compare(Side::new(&left, &mut left_listing), Side::new(&right, &mut right_listing))
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!(left_listing.selected().count(), 0);
    }
}
