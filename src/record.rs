//! File records, timestamps and panel listings

use bitflags::bitflags;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

/// 100 ns ticks per second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;
/// Seconds between 1601-01-01 and 1970-01-01.
const UNIX_EPOCH_OFFSET_SECS: u64 = 11_644_473_600;

/// A UTC timestamp counted in 100 ns ticks since 1601-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileTime(u64);

impl FileTime {
    pub const fn from_ticks(ticks: u64) -> Self {
        FileTime(ticks)
    }

    pub const fn ticks(self) -> u64 {
        self.0
    }

    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        let secs = i64::try_from(UNIX_EPOCH_OFFSET_SECS).ok()?.checked_add(secs)?;
        let secs = u64::try_from(secs).ok()?;
        secs.checked_mul(TICKS_PER_SECOND).map(FileTime)
    }

    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let epoch = UNIX_EPOCH_OFFSET_SECS * TICKS_PER_SECOND;
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => {
                let ticks = after
                    .as_secs()
                    .checked_mul(TICKS_PER_SECOND)?
                    .checked_add(u64::from(after.subsec_nanos() / 100))?;
                epoch.checked_add(ticks).map(FileTime)
            }
            Err(before) => {
                let before = before.duration();
                let ticks = before
                    .as_secs()
                    .checked_mul(TICKS_PER_SECOND)?
                    .checked_add(u64::from(before.subsec_nanos().div_ceil(100)))?;
                epoch.checked_sub(ticks).map(FileTime)
            }
        }
    }

    /// Whole seconds since 1601-01-01.
    pub const fn whole_seconds(self) -> u64 {
        self.0 / TICKS_PER_SECOND
    }

    /// Rounds down to the 2-second granularity FAT stores times with.
    pub const fn to_fat(self) -> Self {
        let step = 2 * TICKS_PER_SECOND;
        FileTime(self.0 - self.0 % step)
    }

    /// Shifts the time by `secs`, saturating at the ends of the range.
    pub fn offset_secs(self, secs: i64) -> Self {
        let delta = secs.unsigned_abs().saturating_mul(TICKS_PER_SECOND);
        if secs >= 0 {
            FileTime(self.0.saturating_add(delta))
        } else {
            FileTime(self.0.saturating_sub(delta))
        }
    }
}

bitflags! {
    /// File attributes, using the Windows attribute bit values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u32 {
        const READONLY = 0x0000_0001;
        const HIDDEN = 0x0000_0002;
        const SYSTEM = 0x0000_0004;
        const DIRECTORY = 0x0000_0010;
        const ARCHIVE = 0x0000_0020;
        const TEMPORARY = 0x0000_0100;
        const COMPRESSED = 0x0000_0800;
        const OFFLINE = 0x0000_1000;
        const ENCRYPTED = 0x0000_4000;

        /// Attributes shown in a panel; DIRECTORY is not one of them.
        const DISPLAYED = Self::READONLY.bits()
            | Self::HIDDEN.bits()
            | Self::SYSTEM.bits()
            | Self::ARCHIVE.bits()
            | Self::ENCRYPTED.bits()
            | Self::TEMPORARY.bits()
            | Self::COMPRESSED.bits()
            | Self::OFFLINE.bits();
    }
}

/// One file or directory of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub size: u64,
    pub attributes: Attributes,
    /// `None` when the source does not know the time.
    pub last_write: Option<FileTime>,
    /// Set by the comparison when the record differs or is missing on the other side.
    pub selected: bool,
}

impl FileRecord {
    pub fn file(name: impl Into<String>, size: u64, last_write: Option<FileTime>) -> Self {
        FileRecord {
            name: name.into(),
            size,
            attributes: Attributes::ARCHIVE,
            last_write,
            selected: false,
        }
    }

    pub fn dir(name: impl Into<String>, last_write: Option<FileTime>) -> Self {
        FileRecord {
            name: name.into(),
            size: 0,
            attributes: Attributes::DIRECTORY,
            last_write,
            selected: false,
        }
    }

    /// Replaces the displayed attributes, keeping the directory bit.
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        let dir = self.attributes & Attributes::DIRECTORY;
        self.attributes = (attributes - Attributes::DIRECTORY) | dir;
        self
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    /// Text after the last dot; directories have no extension.
    pub fn extension(&self) -> &str {
        if self.is_dir() {
            return "";
        }
        match self.name.rfind('.') {
            Some(dot) => &self.name[dot + 1..],
            None => "",
        }
    }
}

/// Which half of a [`Listing`] an index points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// The contents of one directory, split into files and subdirectories.
///
/// A panel owns its listing; the comparison engine borrows it and writes
/// the outcome back through [`Listing::set_selected`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub files: Vec<FileRecord>,
    pub dirs: Vec<FileRecord>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: FileRecord) {
        if record.is_dir() {
            self.dirs.push(record);
        } else {
            self.files.push(record);
        }
    }

    /// Like [`push`](Self::push), but reports allocation failure instead of aborting.
    pub fn try_push(&mut self, record: FileRecord) -> Result<()> {
        let target = if record.is_dir() {
            &mut self.dirs
        } else {
            &mut self.files
        };
        target.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        target.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    pub fn records(&self, kind: EntryKind) -> &[FileRecord] {
        match kind {
            EntryKind::File => &self.files,
            EntryKind::Dir => &self.dirs,
        }
    }

    pub fn set_selected(&mut self, kind: EntryKind, index: usize, selected: bool) {
        let records = match kind {
            EntryKind::File => &mut self.files,
            EntryKind::Dir => &mut self.dirs,
        };
        if let Some(record) = records.get_mut(index) {
            record.selected = selected;
        }
    }

    pub fn clear_selection(&mut self) {
        for record in self.files.iter_mut().chain(self.dirs.iter_mut()) {
            record.selected = false;
        }
    }

    /// Selected records, directories first.
    pub fn selected(&self) -> impl Iterator<Item = &FileRecord> {
        self.dirs.iter().chain(self.files.iter()).filter(|r| r.selected)
    }
}

impl FromIterator<FileRecord> for Listing {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut listing = Listing::new();
        for record in iter {
            listing.push(record);
        }
        listing
    }
}
