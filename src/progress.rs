//! Optional progress reporting for long per-track loops.
//!
//! Compiled to a no-op unless the `progress` cargo feature is enabled, so call
//! sites look the same either way.

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) struct Progress {
    #[cfg(feature = "progress")]
    bar: ProgressBar,
}

impl Progress {
    #[cfg(feature = "progress")]
    pub(crate) fn new(len: usize) -> Self {
        let bar = ProgressBar::new(len.max(1) as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec}")
                .expect("indicatif template"),
        );
        Self { bar }
    }

    #[cfg(not(feature = "progress"))]
    pub(crate) fn new(_len: usize) -> Self {
        Self {}
    }

    pub(crate) fn tick(&self) {
        #[cfg(feature = "progress")]
        self.bar.inc(1);
    }

    pub(crate) fn finish(self) {
        #[cfg(feature = "progress")]
        self.bar.finish_and_clear();
    }
}
