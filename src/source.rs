//! Listing sources: where a panel's files come from

use ignore::WalkBuilder;
use log::trace;
use rustc_hash::FxHashMap;
use std::fs::Metadata;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::mask::MaskMatcher;
use crate::merge::cmp_names;
use crate::record::{Attributes, FileRecord, FileTime, Listing};
use crate::{Error, Result};

/// Longest path the comparison accepts.
#[cfg(windows)]
pub const MAX_PATH_LEN: usize = 260;
#[cfg(not(windows))]
pub const MAX_PATH_LEN: usize = 4096;

/// Entries read between two cancellation checks while listing a directory.
const ENTRIES_PER_POLL: usize = 200;

/// Produces directory listings for paths relative to the source's root.
pub trait ListingSource {
    /// Feeds every entry of `sub_path` (never `.` or `..`) to `visit` until
    /// it returns `Break`.
    fn read_dir(
        &self,
        sub_path: &Path,
        visit: &mut dyn FnMut(FileRecord) -> ControlFlow<()>,
    ) -> Result<()>;

    /// Human-readable location of `sub_path`, used for labels and messages.
    fn display_path(&self, sub_path: &Path) -> String;

    /// Path of a file that can be opened for reading, if the source lives on a filesystem.
    fn file_path(&self, sub_path: &Path, name: &str) -> Option<PathBuf>;

    fn is_filesystem(&self) -> bool;

    /// The filesystem stores times with FAT's 2-second granularity.
    fn is_fat(&self) -> bool {
        false
    }

    /// The source reports meaningful attributes.
    fn attributes_valid(&self) -> bool {
        true
    }
}

pub fn check_path_len(path: &str) -> Result<()> {
    if path.len() > MAX_PATH_LEN {
        Err(Error::PathTooLong {
            path: path.to_string(),
        })
    } else {
        Ok(())
    }
}

/// A directory tree on a local or network disk.
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
    fat: bool,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskSource {
            root: root.into(),
            fat: false,
        }
    }

    /// Marks the volume as FAT, so its times are compared with 2-second precision.
    pub fn with_fat(mut self, fat: bool) -> Self {
        self.fat = fat;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn walk_error(dir: &Path, err: ignore::Error) -> Error {
    let message = err.to_string();
    Error::DirectoryListingFailed {
        path: dir.display().to_string(),
        source: err.into_io_error().unwrap_or_else(|| io::Error::other(message)),
    }
}

#[cfg(windows)]
fn attributes_of(meta: &Metadata, _name: &str) -> Attributes {
    use std::os::windows::fs::MetadataExt;
    Attributes::from_bits_retain(meta.file_attributes())
}

#[cfg(not(windows))]
fn attributes_of(meta: &Metadata, name: &str) -> Attributes {
    let mut attributes = Attributes::empty();
    if meta.is_dir() {
        attributes |= Attributes::DIRECTORY;
    }
    if meta.permissions().readonly() {
        attributes |= Attributes::READONLY;
    }
    if name.starts_with('.') {
        attributes |= Attributes::HIDDEN;
    }
    attributes
}

fn record_from_metadata(name: String, meta: &Metadata) -> FileRecord {
    let attributes = attributes_of(meta, &name);
    let is_dir = attributes.contains(Attributes::DIRECTORY);
    FileRecord {
        size: if is_dir { 0 } else { meta.len() },
        attributes,
        last_write: meta.modified().ok().and_then(FileTime::from_system_time),
        selected: false,
        name,
    }
}

impl ListingSource for DiskSource {
    /// Symbolic links are left out of the listing: a link to a directory
    /// would otherwise be compared as a file, and following it could loop.
    fn read_dir(
        &self,
        sub_path: &Path,
        visit: &mut dyn FnMut(FileRecord) -> ControlFlow<()>,
    ) -> Result<()> {
        let dir = self.root.join(sub_path);
        let walker = WalkBuilder::new(&dir)
            .standard_filters(false)
            .follow_links(false)
            .max_depth(Some(1))
            .build();
        for result in walker {
            let entry = result.map_err(|e| walk_error(&dir, e))?;
            if entry.depth() == 0 {
                continue;
            }
            if entry.path_is_symlink() {
                trace!("skipping symlink {}", entry.path().display());
                continue;
            }
            let meta = entry.metadata().map_err(|e| walk_error(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if visit(record_from_metadata(name, &meta)).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn display_path(&self, sub_path: &Path) -> String {
        self.root.join(sub_path).display().to_string()
    }

    fn file_path(&self, sub_path: &Path, name: &str) -> Option<PathBuf> {
        Some(self.root.join(sub_path).join(name))
    }

    fn is_filesystem(&self) -> bool {
        true
    }

    fn is_fat(&self) -> bool {
        self.fat
    }
}

/// An entry as an archive directory lists it.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path inside the archive, `/` or `\` separated.
    pub path: String,
    pub size: u64,
    pub last_write: Option<FileTime>,
    pub attributes: Attributes,
    pub is_dir: bool,
}

impl ArchiveEntry {
    pub fn file(path: impl Into<String>, size: u64, last_write: Option<FileTime>) -> Self {
        ArchiveEntry {
            path: path.into(),
            size,
            last_write,
            attributes: Attributes::ARCHIVE,
            is_dir: false,
        }
    }

    pub fn dir(path: impl Into<String>, last_write: Option<FileTime>) -> Self {
        ArchiveEntry {
            path: path.into(),
            size: 0,
            last_write,
            attributes: Attributes::DIRECTORY,
            is_dir: true,
        }
    }
}

/// The already-loaded directory tree of an archive.
///
/// Directories are keyed by their lowercased path, so lookups ignore case.
/// Parents of added entries are created implicitly.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    archive: PathBuf,
    dirs: FxHashMap<String, Listing>,
    attributes_valid: bool,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}

fn dir_key(components: &[&str]) -> String {
    components.join("/").to_lowercase()
}

impl ArchiveSource {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        let mut dirs = FxHashMap::default();
        dirs.insert(String::new(), Listing::new());
        ArchiveSource {
            archive: archive.into(),
            dirs,
            attributes_valid: true,
        }
    }

    pub fn from_entries(
        archive: impl Into<PathBuf>,
        entries: impl IntoIterator<Item = ArchiveEntry>,
    ) -> Self {
        let mut source = ArchiveSource::new(archive);
        for entry in entries {
            source.add(entry);
        }
        source
    }

    /// Archive formats that store no attributes report them as invalid.
    pub fn with_attributes_valid(mut self, valid: bool) -> Self {
        self.attributes_valid = valid;
        self
    }

    pub fn add(&mut self, entry: ArchiveEntry) {
        let components = split_path(&entry.path);
        let Some((name, parents)) = components.split_last() else {
            return;
        };
        self.ensure_dir(parents);
        let mut record = if entry.is_dir {
            FileRecord::dir(*name, entry.last_write)
        } else {
            FileRecord::file(*name, entry.size, entry.last_write)
        };
        record = record.with_attributes(entry.attributes);

        let parent = self.dirs.entry(dir_key(parents)).or_default();
        let siblings = if entry.is_dir {
            &mut parent.dirs
        } else {
            &mut parent.files
        };
        match siblings
            .iter_mut()
            .find(|r| cmp_names(&r.name, name).is_eq())
        {
            Some(existing) => *existing = record,
            None => siblings.push(record),
        }
        if entry.is_dir {
            self.dirs.entry(dir_key(&components)).or_default();
        }
    }

    fn ensure_dir(&mut self, components: &[&str]) {
        for depth in 1..=components.len() {
            let key = dir_key(&components[..depth]);
            if self.dirs.contains_key(&key) {
                continue;
            }
            let name = components[depth - 1];
            self.dirs
                .entry(dir_key(&components[..depth - 1]))
                .or_default()
                .dirs
                .push(FileRecord::dir(name, None));
            self.dirs.insert(key, Listing::new());
        }
    }

    /// The listing of one archive directory, if it exists.
    pub fn listing(&self, sub_path: &Path) -> Option<&Listing> {
        let sub = sub_path.to_string_lossy();
        self.dirs.get(&dir_key(&split_path(&sub)))
    }
}

impl ListingSource for ArchiveSource {
    fn read_dir(
        &self,
        sub_path: &Path,
        visit: &mut dyn FnMut(FileRecord) -> ControlFlow<()>,
    ) -> Result<()> {
        let listing = self
            .listing(sub_path)
            .ok_or_else(|| Error::DirectoryListingFailed {
                path: self.display_path(sub_path),
                source: io::Error::from(io::ErrorKind::NotFound),
            })?;
        for record in listing.dirs.iter().chain(listing.files.iter()) {
            if visit(record.clone()).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn display_path(&self, sub_path: &Path) -> String {
        self.archive.join(sub_path).display().to_string()
    }

    fn file_path(&self, _sub_path: &Path, _name: &str) -> Option<PathBuf> {
        None
    }

    fn is_filesystem(&self) -> bool {
        false
    }

    fn attributes_valid(&self) -> bool {
        self.attributes_valid
    }
}

/// Names left out while reading a listing.
#[derive(Clone, Copy, Default)]
pub struct ReadFilter<'a> {
    pub files: Option<&'a dyn MaskMatcher>,
    pub dirs: Option<&'a dyn MaskMatcher>,
}

impl ReadFilter<'_> {
    fn excludes(&self, record: &FileRecord) -> bool {
        if record.is_dir() {
            self.dirs.is_some_and(|m| m.matches(&record.name, None))
        } else {
            self.files
                .is_some_and(|m| m.matches(&record.name, Some(record.extension())))
        }
    }
}

/// Reads one directory of `source` into a [`Listing`], leaving out masked names.
///
/// `keep_going` is polled every few hundred entries; `Ok(None)` means it
/// asked to stop.
pub fn read_listing(
    source: &dyn ListingSource,
    sub_path: &Path,
    filter: ReadFilter<'_>,
    keep_going: &mut dyn FnMut() -> bool,
) -> Result<Option<Listing>> {
    let mut listing = Listing::new();
    let mut counter = 0usize;
    let mut stopped = false;
    let mut failure = None;
    source.read_dir(sub_path, &mut |record| {
        counter += 1;
        if counter > ENTRIES_PER_POLL {
            counter = 0;
            if !keep_going() {
                stopped = true;
                return ControlFlow::Break(());
            }
        }
        if filter.excludes(&record) {
            trace!("ignoring {}", record.name);
            return ControlFlow::Continue(());
        }
        match listing.try_push(record) {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                failure = Some(e);
                ControlFlow::Break(())
            }
        }
    })?;
    if let Some(err) = failure {
        return Err(err);
    }
    Ok(if stopped { None } else { Some(listing) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::NameMask;
    use std::fs;
    use tempfile::tempdir;

    fn read_all(source: &dyn ListingSource, sub: &str) -> Listing {
        read_listing(source, Path::new(sub), ReadFilter::default(), &mut || true)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_disk_source_lists_one_level() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("deep.txt"), b"x").unwrap();

        let source = DiskSource::new(dir.path());
        let listing = read_all(&source, "");
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].name, "a.txt");
        assert_eq!(listing.files[0].size, 5);
        assert!(listing.files[0].last_write.is_some());
        assert_eq!(listing.dirs.len(), 1);
        assert_eq!(listing.dirs[0].name, "sub");

        let nested = read_all(&source, "sub");
        assert_eq!(nested.files[0].name, "deep.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_source_skips_symlinks() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real").join("f.txt"), b"x").unwrap();
        symlink(dir.path().join("real"), dir.path().join("linked")).unwrap();
        symlink(dir.path().join("real").join("f.txt"), dir.path().join("f.lnk")).unwrap();

        let listing = read_all(&DiskSource::new(dir.path()), "");
        assert!(listing.files.is_empty());
        assert_eq!(listing.dirs.len(), 1);
        assert_eq!(listing.dirs[0].name, "real");
    }

    #[test]
    fn test_disk_source_missing_directory() {
        let dir = tempdir().unwrap();
        let source = DiskSource::new(dir.path().join("nope"));
        let result = read_listing(&source, Path::new(""), ReadFilter::default(), &mut || true);
        assert!(matches!(result, Err(Error::DirectoryListingFailed { .. })));
    }

    #[test]
    fn test_read_filter_masks() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), b"1").unwrap();
        fs::write(dir.path().join("skip.bak"), b"1").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let files = NameMask::new("*.bak").unwrap();
        let dirs = NameMask::new(".git").unwrap();
        let filter = ReadFilter {
            files: Some(&files),
            dirs: Some(&dirs),
        };
        let source = DiskSource::new(dir.path());
        let listing = read_listing(&source, Path::new(""), filter, &mut || true)
            .unwrap()
            .unwrap();
        assert_eq!(listing.files.len(), 1);
        assert!(listing.dirs.is_empty());
    }

    #[test]
    fn test_read_listing_polls_for_cancel() {
        let mut archive = ArchiveSource::new("big.zip");
        for i in 0..500 {
            archive.add(ArchiveEntry::file(format!("f{i}"), 1, None));
        }
        let mut polls = 0;
        let result = read_listing(&archive, Path::new(""), ReadFilter::default(), &mut || {
            polls += 1;
            false
        })
        .unwrap();
        assert!(result.is_none());
        assert_eq!(polls, 1);
    }

    #[test]
    fn test_archive_tree_lookup() {
        let archive = ArchiveSource::from_entries(
            "backup.zip",
            [
                ArchiveEntry::file("Docs/readme.txt", 10, None),
                ArchiveEntry::file("docs\\guide\\intro.md", 20, None),
                ArchiveEntry::dir("docs/", FileTime::from_unix_secs(5)),
                ArchiveEntry::file("top.bin", 3, None),
            ],
        );
        let root = read_all(&archive, "");
        assert_eq!(root.files.len(), 1);
        assert_eq!(root.dirs.len(), 1);
        assert_eq!(root.dirs[0].last_write, FileTime::from_unix_secs(5));

        let docs = read_all(&archive, "DOCS");
        assert_eq!(docs.files[0].name, "readme.txt");
        assert_eq!(docs.dirs[0].name, "guide");

        let guide = read_all(&archive, "docs/guide");
        assert_eq!(guide.files[0].size, 20);

        assert!(!archive.is_filesystem());
        assert!(archive.file_path(Path::new(""), "top.bin").is_none());
        let missing =
            read_listing(&archive, Path::new("nope"), ReadFilter::default(), &mut || true);
        assert!(matches!(missing, Err(Error::DirectoryListingFailed { .. })));
    }

    #[test]
    fn test_path_length_check() {
        assert!(check_path_len("short").is_ok());
        let long = "x".repeat(MAX_PATH_LEN + 1);
        assert!(matches!(check_path_len(&long), Err(Error::PathTooLong { .. })));
    }
}
