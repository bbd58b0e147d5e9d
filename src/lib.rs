//! Core library for dircompare: compares the directories shown in two file-manager panels.
//!
//! Records that differ, or exist on one side only, end up selected in their
//! panel's [`Listing`]. Comparison criteria are names (always), sizes,
//! last-write times (with FAT rounding and daylight-saving tolerance),
//! attributes and contents, optionally descending into subdirectories.
//!
//! The engine lives in [`walker`]; [`compare_dirs`] is a shortcut for two
//! local directories with no user interaction.

use std::path::Path;

pub mod config;
pub mod content;
pub mod error;
pub mod evaluate;
pub mod interact;
pub mod mask;
pub mod merge;
pub mod progress;
pub mod record;
pub mod report;
pub mod source;
pub mod time;
pub mod walker;

pub use config::{CompareCriteria, CompareOptions, Preferences};
pub use error::Error;
pub use record::{Attributes, FileRecord, FileTime, Listing};
pub use report::CompareOutcome;

pub type Result<T> = std::result::Result<T, Error>;

use interact::SkipErrors;
use progress::{CancelFlag, SilentProgress};
use source::{DiskSource, ListingSource, ReadFilter, read_listing};
use walker::{DirComparer, Side};

/// Both panels after a comparison, with the differing records selected.
#[derive(Debug, Clone)]
pub struct DirComparison {
    pub left: Listing,
    pub right: Listing,
    pub outcome: CompareOutcome,
}

/// Reads the top level of `path` on `source`, the way a panel shows it.
pub fn load_listing(source: &dyn ListingSource, path: &Path) -> Result<Listing> {
    read_listing(source, path, ReadFilter::default(), &mut || true).map(Option::unwrap_or_default)
}

/// Compares two local directories, skipping unreadable items (they count as different).
pub fn compare_dirs(left: &Path, right: &Path, options: &CompareOptions) -> Result<DirComparison> {
    let left_source = DiskSource::new(left);
    let right_source = DiskSource::new(right);
    let mut left_listing = load_listing(&left_source, Path::new(""))?;
    let mut right_listing = load_listing(&right_source, Path::new(""))?;
    let mut progress = SilentProgress::new(CancelFlag::new());
    let outcome = DirComparer::new(options, &mut progress, &mut SkipErrors).compare(
        Side::new(&left_source, &mut left_listing),
        Side::new(&right_source, &mut right_listing),
    )?;
    Ok(DirComparison {
        left: left_listing,
        right: right_listing,
        outcome,
    })
}
