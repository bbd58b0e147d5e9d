//! Comparison criteria, options and persisted user preferences

use bitflags::bitflags;
use log::warn;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::time::TimePolicy;
use crate::{Error, Result};

pub const PROGRAM_NAME: &str = "dircompare";
pub const PROGRAM_LOG_LEVEL: &str = "DIRCOMPARE_LOG";
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

/// Largest accepted time resolution, in seconds.
pub const MAX_TIME_RESOLUTION: u32 = 3600;

bitflags! {
    /// What a comparison run looks at. Names are always compared.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CompareCriteria: u32 {
        const BY_TIME = 0x0001;
        const BY_CONTENT = 0x0002;
        const BY_ATTRIBUTES = 0x0004;
        /// Descend into subdirectories present on both sides.
        const SUBDIRS = 0x0008;
        /// Compare attributes of subdirectories.
        const SUBDIR_ATTRIBUTES = 0x0010;
        const BY_SIZE = 0x0020;
        /// Mark directories present in one panel only, without entering them.
        const ONE_PANEL_DIRS = 0x0040;
        const IGNORE_FILE_NAMES = 0x0080;
        const IGNORE_DIR_NAMES = 0x0100;
    }
}

impl Default for CompareCriteria {
    fn default() -> Self {
        CompareCriteria::BY_SIZE | CompareCriteria::BY_TIME
    }
}

/// Everything a comparison run is configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    pub criteria: CompareCriteria,
    /// Seconds two times may differ and still count as equal; `None` compares exactly.
    pub time_resolution: Option<u32>,
    /// Treat differences of exactly one or two hours as equal.
    pub ignore_dst_shifts: bool,
    /// Mask of file names left out when `IGNORE_FILE_NAMES` is set.
    pub ignore_file_masks: String,
    /// Mask of directory names left out when `IGNORE_DIR_NAMES` is set.
    pub ignore_dir_masks: String,
}

impl Default for CompareOptions {
    fn default() -> Self {
        CompareOptions {
            criteria: CompareCriteria::default(),
            time_resolution: Some(2),
            ignore_dst_shifts: false,
            ignore_file_masks: String::new(),
            ignore_dir_masks: String::new(),
        }
    }
}

impl CompareOptions {
    pub fn with_criteria(criteria: CompareCriteria) -> Self {
        CompareOptions {
            criteria,
            ..Self::default()
        }
    }

    pub fn has(&self, criteria: CompareCriteria) -> bool {
        self.criteria.contains(criteria)
    }

    pub fn time_policy(&self) -> TimePolicy {
        TimePolicy {
            resolution: self.time_resolution.map(|r| r.min(MAX_TIME_RESOLUTION)),
            ignore_dst_shifts: self.ignore_dst_shifts,
        }
    }

    /// Reads options from a JSON file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let mut options: CompareOptions =
            serde_json::from_str(&text).map_err(|e| Error::Config {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })?;
        if let Some(res) = options.time_resolution {
            if res > MAX_TIME_RESOLUTION {
                warn!("time resolution {res}s clamped to {MAX_TIME_RESOLUTION}s");
                options.time_resolution = Some(MAX_TIME_RESOLUTION);
            }
        }
        Ok(options)
    }
}

/// Answers to "don't show again" questions, kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Show the advisory when DST-shifted times were ignored.
    pub confirm_dst_shifts_ignored: bool,
    /// Show the advisory when DST-shifted times were found and not ignored.
    pub confirm_dst_shifts_occurred: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            confirm_dst_shifts_ignored: true,
            confirm_dst_shifts_occurred: true,
        }
    }
}

impl Preferences {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(PROGRAM_NAME).join(PREFERENCES_FILE_NAME))
    }

    /// Loads preferences, falling back to defaults when the file is missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("ignoring malformed preferences {}: {e}", path.display());
                Preferences::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                warn!("cannot read preferences {}: {e}", path.display());
                Preferences::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_err = |source| Error::Config {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(config_err)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| config_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        std::fs::write(path, text).map_err(config_err)
    }

    /// Whether the DST advisory for this mode is still wanted.
    pub fn wants_dst_advisory(&self, ignore_dst_shifts: bool) -> bool {
        if ignore_dst_shifts {
            self.confirm_dst_shifts_ignored
        } else {
            self.confirm_dst_shifts_occurred
        }
    }

    /// Records the "don't show again" checkbox of the DST advisory.
    pub fn apply_dont_show(&mut self, ignore_dst_shifts: bool, dont_show: bool) {
        if ignore_dst_shifts {
            self.confirm_dst_shifts_ignored = !dont_show;
        } else {
            self.confirm_dst_shifts_occurred = !dont_show;
        }
    }
}
