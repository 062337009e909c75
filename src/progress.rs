//! Progress bars for data file processing
//!
//! A run displays two bars: one counting data files as they are opened, and
//! one counting raw bytes as they are read. The size of a data file is only
//! known once it is opened, so the byte bar grows as files are opened.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::{
    borrow::Cow,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Set of progress bars drawn on stderr
///
/// Nothing else should be written to stderr while bars are displayed, which
/// is why per-file messages go to the logs and the run summary is only printed
/// once processing is over.
#[derive(Clone, Debug, Default)]
pub struct ProgressReport(MultiProgress);
//
impl ProgressReport {
    /// Draw progress bars on stderr
    pub fn new() -> Self {
        Self::default()
    }

    /// Track progress without drawing anything
    ///
    /// Used when stderr is not a terminal (e.g. redirected to a log file) and
    /// in tests, where only the tracked positions matter.
    pub fn hidden() -> Self {
        Self(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    /// Add a bar, e.g. "Opening data files" or "Reading data files"
    ///
    /// Bars without any initial work are only drawn once work is added.
    pub fn add(
        &self,
        what: impl Into<Cow<'static, str>>,
        config: ProgressConfig,
    ) -> ProgressTracker {
        let what = what.into();
        let ProgressConfig {
            initial_work,
            show_rate,
            can_add_work,
        } = config;
        let mut bar = ProgressBar::new(initial_work.into()).with_prefix(what);
        let style_header = "{prefix} {wide_bar} ";
        let style_trailer = match (initial_work, show_rate) {
            (Work::Steps(_), false) => "{pos}/{len}",
            (Work::Steps(_), true) => "{pos}/{len} ({per_sec})",
            (Work::Bytes(_), false) => "{decimal_bytes}/{decimal_total_bytes}",
            (Work::Bytes(_), true) => {
                "{decimal_bytes}/{decimal_total_bytes} ({decimal_bytes_per_sec})"
            }
        };
        bar = bar.with_style(
            ProgressStyle::with_template(&format!("{style_header}{style_trailer}"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let added = u64::from(initial_work) > 0;
        if added {
            self.0.add(bar.clone());
        }
        ProgressTracker {
            bar,
            report: self.0.clone(),
            added: Arc::new(AtomicBool::new(added)),
            upcoming: Arc::new(AtomicBool::new(can_add_work)),
        }
    }
}

/// Appearance and growth policy of a progress bar
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgressConfig {
    /// Initial length of the bar, e.g. the number of data files
    initial_work: Work,

    /// Show files/s or bytes/s next to the position
    show_rate: bool,

    /// Bar can grow after creation, as the byte bar does when files are opened
    can_add_work: bool,
}
//
impl ProgressConfig {
    /// Bar of fixed length showing a rate
    pub fn new(initial_work: Work) -> Self {
        Self {
            initial_work,
            show_rate: true,
            can_add_work: false,
        }
    }

    /// Don't show a rate, which is meaningless when opening a few files
    pub fn dont_show_rate(self) -> Self {
        Self {
            show_rate: false,
            ..self
        }
    }

    /// Let [`ProgressTracker::add_work()`] grow the bar
    pub fn allow_adding_work(self) -> Self {
        Self {
            can_add_work: true,
            ..self
        }
    }
}

/// Unit of the work tracked by a bar
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Work {
    /// Data files to be opened
    Steps(usize),

    /// Raw (possibly compressed) bytes to be read
    Bytes(usize),
}
//
impl From<Work> for u64 {
    fn from(value: Work) -> Self {
        let inner = match value {
            Work::Steps(s) => s,
            Work::Bytes(b) => b,
        };
        inner as u64
    }
}

/// Handle to a single progress bar, shared by the tasks that process files
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    /// Bar being updated
    bar: ProgressBar,

    /// Report that the bar is drawn in
    report: MultiProgress,

    /// Truth that the bar is currently part of the report
    added: Arc<AtomicBool>,

    /// Truth that more files may still grow this bar
    upcoming: Arc<AtomicBool>,
}
//
impl ProgressTracker {
    /// Record that some files were opened or some bytes were read
    ///
    /// Returns truth that the bar is complete, in which case it is removed
    /// from the report. For the file bar, this tells that every data file has
    /// been opened and the byte bar cannot grow anymore.
    pub fn make_progress(&self, progress: u64) -> bool {
        self.bar.inc(progress);
        let current = self.bar.position();
        let max = self.bar.length().unwrap_or(0);
        debug_assert!(current <= max, "recorded more progress than expected");

        let finished = current >= max && !self.upcoming.load(Ordering::Acquire);
        if finished {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
        finished
    }

    /// Grow the bar, typically by the size of a newly opened data file
    ///
    /// Must be enabled with [`ProgressConfig::allow_adding_work()`], and
    /// followed by `done_adding_work()` once all data files are open.
    pub fn add_work(&self, remaining: u64) {
        debug_assert!(
            self.upcoming.load(Ordering::Acquire),
            "should not add work after done_adding_work"
        );
        if remaining > 0 && !self.added.swap(true, Ordering::AcqRel) {
            self.report.add(self.bar.clone());
        }
        self.bar.inc_length(remaining);
    }

    /// Declare that the bar won't grow anymore, so it can be hidden once full
    pub fn done_adding_work(&self) {
        let was_upcoming = self.upcoming.swap(false, Ordering::Release);
        debug_assert!(was_upcoming, "should only stop adding work once");
        if self.bar.position() >= self.bar.length().unwrap_or(0) {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
    }

    /// Files opened or bytes read so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_bar_completes_once_every_file_is_open() {
        let report = ProgressReport::hidden();
        let files = report.add(
            "Opening files",
            ProgressConfig::new(Work::Steps(2)).dont_show_rate(),
        );
        assert!(!files.make_progress(1));
        assert!(files.make_progress(1));
        assert_eq!(files.position(), 2);
    }

    #[test]
    fn byte_bar_grows_with_opened_files() {
        let report = ProgressReport::hidden();
        let bytes = report.add(
            "Reading",
            ProgressConfig::new(Work::Bytes(0)).allow_adding_work(),
        );
        bytes.add_work(10);
        assert!(!bytes.make_progress(10));
        bytes.add_work(5);
        bytes.done_adding_work();
        assert!(bytes.make_progress(5));
    }
}
