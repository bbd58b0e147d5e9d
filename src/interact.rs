//! Questions the engine asks while it runs

use log::warn;

use crate::Error;

/// The answer to a failed listing or file read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Try the same operation again.
    Retry,
    /// Go on, treating the affected item as different.
    Skip,
    /// Stop the whole comparison.
    Cancel,
}

/// Whoever answers the engine's questions: a terminal prompt, a dialog, a test.
pub trait Interaction {
    /// Called for recoverable errors during the comparing pass only.
    fn on_error(&mut self, error: &Error) -> ErrorAction;
}

/// Answers every error with [`ErrorAction::Skip`], logging it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipErrors;

impl Interaction for SkipErrors {
    fn on_error(&mut self, error: &Error) -> ErrorAction {
        warn!("{error}; assuming the item differs");
        ErrorAction::Skip
    }
}

/// Background work touching a panel's records, e.g. icon loading.
///
/// The engine pauses it for the duration of a run.
pub trait BackgroundWork {
    fn pause(&self);
    fn resume(&self);
}

/// Pauses background work until dropped.
pub struct PauseGuard<'a> {
    work: Option<&'a dyn BackgroundWork>,
}

impl<'a> PauseGuard<'a> {
    pub fn new(work: Option<&'a dyn BackgroundWork>) -> Self {
        if let Some(work) = work {
            work.pause();
        }
        PauseGuard { work }
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        if let Some(work) = self.work {
            work.resume();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Loader {
        paused: Cell<bool>,
        resumes: Cell<u32>,
    }

    impl BackgroundWork for Loader {
        fn pause(&self) {
            self.paused.set(true);
        }

        fn resume(&self) {
            self.paused.set(false);
            self.resumes.set(self.resumes.get() + 1);
        }
    }

    #[test]
    fn test_pause_guard_resumes_on_drop() {
        let loader = Loader::default();
        {
            let _guard = PauseGuard::new(Some(&loader));
            assert!(loader.paused.get());
        }
        assert!(!loader.paused.get());
        assert_eq!(loader.resumes.get(), 1);

        let _nothing = PauseGuard::new(None);
    }

    #[test]
    fn test_skip_errors() {
        let mut skip = SkipErrors;
        assert_eq!(skip.on_error(&Error::OutOfMemory), ErrorAction::Skip);
    }
}
