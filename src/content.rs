//! Byte-for-byte comparison of two files

use log::debug;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::progress::ProgressSink;
use crate::{Error, Result};

/// Size of one read.
pub const BLOCK_SIZE: usize = 32 * 1024;
/// Bytes read from one file before switching to the other.
pub const BUFFER_SIZE: usize = 64 * BLOCK_SIZE;
/// Blocks read per call once a file proves fast.
pub const BLOCK_GROUP: usize = 8;
/// A full buffer read quicker than this (about 1 MiB/s) counts as fast.
const BUFFER_TIME_LIMIT: Duration = Duration::from_millis(2000);
/// A buffer whose reads take longer than this is cut short, so progress keeps moving.
const SLOW_BUFFER_LIMIT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOutcome {
    Same,
    Different,
    Cancelled,
}

/// Progress accounting for one file pair.
///
/// Never reports more than `declared` bytes, however many were read, and
/// [`finish`](Self::finish) tops the count up to exactly `declared`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteMeter {
    declared: u64,
    consumed: u64,
}

impl ByteMeter {
    pub fn new(declared: u64) -> Self {
        ByteMeter {
            declared,
            consumed: 0,
        }
    }

    pub fn declared(&self) -> u64 {
        self.declared
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn add(&mut self, progress: &mut dyn ProgressSink, bytes: u64) {
        let step = bytes.min(self.declared - self.consumed);
        if step > 0 {
            self.consumed += step;
            progress.add_bytes(step);
            progress.set_file_current(self.consumed);
        }
    }

    pub fn finish(&mut self, progress: &mut dyn ProgressSink) {
        self.add(progress, self.declared - self.consumed);
    }
}

/// Whether `bytes` read in `elapsed` beat the fast-reading threshold.
fn is_fast(elapsed: Duration, bytes: usize) -> bool {
    let limit_ms = bytes as u128 * BUFFER_TIME_LIMIT.as_millis() / BUFFER_SIZE as u128;
    elapsed.as_millis() < limit_ms
}

/// Fills `buf` unless the file ends first; returns the bytes read.
fn read_full(file: &mut File, buf: &mut [u8], path: &Path) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(Error::ContentReadFailed {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(filled)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::ContentReadFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Compares files block by block, adapting the read size to each file's speed.
///
/// A whole buffer is read from the left file, then the same range from the
/// right file one block (or group of blocks) at a time, comparing as it
/// goes. Each file starts with single-block reads and moves to
/// [`BLOCK_GROUP`] blocks per read after a buffer arrives fast enough;
/// it drops back when reading slows down again.
pub struct ContentComparator {
    left_buf: Vec<u8>,
    right_buf: Vec<u8>,
}

impl Default for ContentComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentComparator {
    pub fn new() -> Self {
        ContentComparator {
            left_buf: vec![0; BUFFER_SIZE],
            right_buf: vec![0; BLOCK_GROUP * BLOCK_SIZE],
        }
    }

    /// Compares `left` with `right`, adding the bytes read to `progress`
    /// through `meter`.
    ///
    /// Unless cancelled, `meter` is finished before returning `Ok`. On error
    /// the caller decides what to do with the unconsumed remainder.
    pub fn compare(
        &mut self,
        left: &Path,
        right: &Path,
        meter: &mut ByteMeter,
        progress: &mut dyn ProgressSink,
    ) -> Result<ContentOutcome> {
        progress.set_source_label(&left.display().to_string());
        progress.set_target_label(&right.display().to_string());
        progress.set_file_total(meter.declared());
        progress.set_file_current(meter.consumed());

        let outcome = self.compare_files(left, right, meter, progress)?;
        if outcome != ContentOutcome::Cancelled {
            meter.finish(progress);
        }
        debug!("{} vs {}: {outcome:?}", left.display(), right.display());
        Ok(outcome)
    }

    fn compare_files(
        &mut self,
        left: &Path,
        right: &Path,
        meter: &mut ByteMeter,
        progress: &mut dyn ProgressSink,
    ) -> Result<ContentOutcome> {
        let mut left_file = open(left)?;
        let mut right_file = open(right)?;
        let mut left_fast = false;
        let mut right_fast = false;

        loop {
            let mut block_count = BUFFER_SIZE / BLOCK_SIZE;

            let started = Instant::now();
            let mut left_read = 0;
            let mut block = 0;
            while block < block_count {
                let step = group_step(left_fast, block, block_count);
                let start = block * BLOCK_SIZE;
                let len = step * BLOCK_SIZE;
                let n = read_full(&mut left_file, &mut self.left_buf[start..start + len], left)?;
                meter.add(progress, n as u64);
                if !progress.keep_going() {
                    return Ok(ContentOutcome::Cancelled);
                }
                left_read += n;
                if n != len {
                    break;
                }
                if started.elapsed() > SLOW_BUFFER_LIMIT {
                    block_count = block + step;
                    break;
                }
                block += step;
            }
            left_fast = is_fast(started.elapsed(), left_read);

            let started = Instant::now();
            let mut right_read = 0;
            let mut block = 0;
            while block < block_count {
                let step = group_step(right_fast, block, block_count);
                let len = step * BLOCK_SIZE;
                let n = read_full(&mut right_file, &mut self.right_buf[..len], right)?;
                meter.add(progress, n as u64);
                if !progress.keep_going() {
                    return Ok(ContentOutcome::Cancelled);
                }
                right_read += n;
                let start = block * BLOCK_SIZE;
                if left_read < right_read
                    || self.left_buf[start..start + n] != self.right_buf[..n]
                {
                    return Ok(ContentOutcome::Different);
                }
                if n != len {
                    return Ok(if left_read == right_read {
                        ContentOutcome::Same
                    } else {
                        ContentOutcome::Different
                    });
                }
                block += step;
                if right_fast && !is_fast(started.elapsed(), right_read) {
                    right_fast = false;
                }
            }
            right_fast = is_fast(started.elapsed(), right_read);
        }
    }
}

/// Blocks to read at `block`: a whole group when the file is fast and the
/// group fits, one block otherwise.
fn group_step(fast: bool, block: usize, block_count: usize) -> usize {
    if fast && block % BLOCK_GROUP == 0 && block + BLOCK_GROUP <= block_count {
        BLOCK_GROUP
    } else {
        1
    }
}
