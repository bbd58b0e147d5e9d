//! What the user is told after a comparison

use serde::Serialize;

use crate::config::{CompareOptions, Preferences};

pub const ARE_IDENTICAL: &str = "The directories are identical.";
pub const SEEM_IDENTICAL: &str = "The directories seem to be identical.";

/// Result of a comparison run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompareOutcome {
    /// Nothing was selected on either side.
    pub identical: bool,
    pub cancelled: bool,
    /// File pairs whose times differ by exactly one or two hours.
    pub dst_shifts: u32,
    /// File contents were compared, not just names, sizes and times.
    pub content_compared: bool,
    /// Content bytes the run expected to read.
    pub total_bytes: u64,
}

/// The daylight-saving-time note shown after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstAdvisory {
    pub text: String,
    /// Label of the "don't show again" checkbox.
    pub checkbox: &'static str,
    /// The text already contains the verdict, so it must not be shown again.
    pub includes_verdict: bool,
}

fn files(n: u32) -> String {
    if n == 1 {
        "1 file".to_string()
    } else {
        format!("{n} files")
    }
}

impl CompareOutcome {
    /// The verdict for an identical, completed run.
    pub fn verdict(&self) -> Option<&'static str> {
        if self.cancelled || !self.identical {
            None
        } else if self.content_compared {
            Some(ARE_IDENTICAL)
        } else {
            Some(SEEM_IDENTICAL)
        }
    }

    /// The DST note, if any shifts were found and the user still wants to hear about them.
    pub fn dst_advisory(
        &self,
        options: &CompareOptions,
        prefs: &Preferences,
    ) -> Option<DstAdvisory> {
        if self.cancelled
            || self.dst_shifts == 0
            || !prefs.wants_dst_advisory(options.ignore_dst_shifts)
        {
            return None;
        }
        let n = self.dst_shifts;
        let advisory = match (options.ignore_dst_shifts, self.verdict()) {
            (true, Some(verdict)) => DstAdvisory {
                text: format!(
                    "{verdict}\n\nNote: the times of {} differ by exactly one or two hours. \
                     Such differences are usually caused by daylight saving time and were ignored.",
                    files(n)
                ),
                checkbox: "Don't show this note again",
                includes_verdict: true,
            },
            (true, None) => DstAdvisory {
                text: format!(
                    "The times of {} differ by exactly one or two hours. \
                     Such differences are usually caused by daylight saving time and were ignored.",
                    files(n)
                ),
                checkbox: "Don't show this message again",
                includes_verdict: false,
            },
            (false, verdict) => DstAdvisory {
                text: format!(
                    "{}The times of {} differ by exactly one or two hours. \
                     This is usually caused by daylight saving time; such differences \
                     can be ignored in the comparison options.",
                    verdict.map(|v| format!("{v}\n\nNote: ")).unwrap_or_default(),
                    files(n)
                ),
                checkbox: if verdict.is_some() {
                    "Don't show this note again"
                } else {
                    "Don't show this message again"
                },
                includes_verdict: verdict.is_some(),
            },
        };
        Some(advisory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(identical: bool, dst_shifts: u32) -> CompareOutcome {
        CompareOutcome {
            identical,
            cancelled: false,
            dst_shifts,
            content_compared: false,
            total_bytes: 0,
        }
    }

    #[test]
    fn test_verdicts() {
        assert_eq!(outcome(true, 0).verdict(), Some(SEEM_IDENTICAL));
        let mut by_content = outcome(true, 0);
        by_content.content_compared = true;
        assert_eq!(by_content.verdict(), Some(ARE_IDENTICAL));
        assert_eq!(outcome(false, 0).verdict(), None);
        let mut cancelled = outcome(true, 0);
        cancelled.cancelled = true;
        assert_eq!(cancelled.verdict(), None);
    }

    #[test]
    fn test_advisory_variants() {
        let prefs = Preferences::default();
        let mut options = CompareOptions::default();
        options.ignore_dst_shifts = true;

        let exact = outcome(true, 1).dst_advisory(&options, &prefs).unwrap();
        assert!(exact.includes_verdict);
        assert!(exact.text.starts_with(SEEM_IDENTICAL));
        assert!(exact.text.contains("1 file differ"));
        assert!(exact.text.contains("ignored"));

        let ignored = outcome(false, 3).dst_advisory(&options, &prefs).unwrap();
        assert!(!ignored.includes_verdict);
        assert!(ignored.text.contains("3 files"));

        options.ignore_dst_shifts = false;
        let found = outcome(false, 2).dst_advisory(&options, &prefs).unwrap();
        assert!(found.text.contains("can be ignored"));
        assert_eq!(found.checkbox, "Don't show this message again");
    }

    #[test]
    fn test_advisory_suppressed() {
        let options = CompareOptions::default();
        let mut prefs = Preferences::default();
        assert!(outcome(true, 0).dst_advisory(&options, &prefs).is_none());

        let mut cancelled = outcome(false, 4);
        cancelled.cancelled = true;
        assert!(cancelled.dst_advisory(&options, &prefs).is_none());

        prefs.apply_dont_show(options.ignore_dst_shifts, true);
        assert!(outcome(false, 4).dst_advisory(&options, &prefs).is_none());
    }
}
