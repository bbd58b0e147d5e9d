//! Progress reporting and cooperative cancellation

#[cfg(feature = "progress")]
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where the engine reports what it is doing.
///
/// `keep_going` is the only place a run can be interrupted: the engine polls
/// it after every listing read and every content block, and unwinds as soon
/// as it returns `false`.
pub trait ProgressSink {
    fn set_source_label(&mut self, text: &str);
    fn set_target_label(&mut self, text: &str);
    fn set_total_bytes(&mut self, total: u64);
    fn set_current_bytes(&mut self, current: u64);
    fn current_bytes(&self) -> u64;
    fn add_bytes(&mut self, bytes: u64);

    /// Size of the file pair being compared by content.
    fn set_file_total(&mut self, _total: u64) {}
    fn set_file_current(&mut self, _current: u64) {}

    fn keep_going(&mut self) -> bool;
}

/// A shared "stop now" switch, settable from another thread or a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancels on Ctrl-C.
    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.cancel())
    }
}

/// Counts bytes and honours the cancel flag without drawing anything.
#[derive(Debug, Default)]
pub struct SilentProgress {
    cancel: CancelFlag,
    total: u64,
    current: u64,
}

impl SilentProgress {
    pub fn new(cancel: CancelFlag) -> Self {
        SilentProgress {
            cancel,
            total: 0,
            current: 0,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total
    }
}

impl ProgressSink for SilentProgress {
    fn set_source_label(&mut self, _text: &str) {}

    fn set_target_label(&mut self, _text: &str) {}

    fn set_total_bytes(&mut self, total: u64) {
        self.total = total;
    }

    fn set_current_bytes(&mut self, current: u64) {
        self.current = current;
    }

    fn current_bytes(&self) -> u64 {
        self.current
    }

    fn add_bytes(&mut self, bytes: u64) {
        self.current = self.current.saturating_add(bytes);
    }

    fn keep_going(&mut self) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// Keeps progress bars off the terminal while something else uses it.
///
/// The default lock holds no bars and runs its closure straight away.
#[derive(Debug, Clone, Default)]
pub struct TerminalLock {
    #[cfg(feature = "progress")]
    bars: Option<MultiProgress>,
}

impl TerminalLock {
    /// Runs `f` with the bars cleared, redrawing them afterwards.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        #[cfg(feature = "progress")]
        if let Some(bars) = &self.bars {
            return bars.suspend(f);
        }
        f()
    }
}

/// Terminal progress: an overall byte bar plus a bar for the current file pair.
#[cfg(feature = "progress")]
pub struct BarProgress {
    cancel: CancelFlag,
    overall: ProgressBar,
    file: ProgressBar,
    bars: MultiProgress,
    source: String,
}

#[cfg(feature = "progress")]
fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

#[cfg(feature = "progress")]
impl BarProgress {
    pub fn new(cancel: CancelFlag) -> Self {
        Self::with_draw_target(cancel, ProgressDrawTarget::stderr())
    }

    /// A progress display that draws nowhere.
    pub fn hidden(cancel: CancelFlag) -> Self {
        Self::with_draw_target(cancel, ProgressDrawTarget::hidden())
    }

    fn with_draw_target(cancel: CancelFlag, target: ProgressDrawTarget) -> Self {
        let bars = MultiProgress::with_draw_target(target);
        let overall = bars.add(ProgressBar::new(0));
        overall.set_style(bar_style(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {percent}% {msg}",
        ));
        let file = bars.add(ProgressBar::new(0));
        file.set_style(bar_style("[file] [{bar:40.green/white}] {bytes}/{total_bytes} {msg}"));
        BarProgress {
            cancel,
            overall,
            file,
            bars,
            source: String::new(),
        }
    }

    /// A lock that hides these bars while a prompt is on screen.
    pub fn terminal_lock(&self) -> TerminalLock {
        TerminalLock {
            bars: Some(self.bars.clone()),
        }
    }

    pub fn finish(&self) {
        self.file.finish_and_clear();
        self.overall.finish_and_clear();
    }
}

#[cfg(feature = "progress")]
impl Drop for BarProgress {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(feature = "progress")]
impl ProgressSink for BarProgress {
    fn set_source_label(&mut self, text: &str) {
        self.source = text.to_string();
        self.overall.set_message(text.to_string());
    }

    fn set_target_label(&mut self, text: &str) {
        self.overall.set_message(format!("{}  <->  {text}", self.source));
    }

    fn set_total_bytes(&mut self, total: u64) {
        self.overall.set_length(total);
    }

    fn set_current_bytes(&mut self, current: u64) {
        self.overall.set_position(current);
    }

    fn current_bytes(&self) -> u64 {
        self.overall.position()
    }

    fn add_bytes(&mut self, bytes: u64) {
        self.overall.inc(bytes);
    }

    fn set_file_total(&mut self, total: u64) {
        self.file.set_length(total);
        self.file.set_position(0);
    }

    fn set_file_current(&mut self, current: u64) {
        self.file.set_position(current);
    }

    fn keep_going(&mut self) -> bool {
        !self.cancel.is_cancelled()
    }
}
