//! Progress reporting and duration formatting for analysis runs.
//!
//! Components
//! -----------------
//! * [`fmt_dur`] – human-readable formatter for [`Duration`] values, producing strings like
//!   `"253µs"`, `"42ms"`, or `"3.14s"` depending on the scale. Used in the run logs.
//! * [`TargetProgress`] – progress bar over the targets of a run. With the `progress`
//!   feature it renders an `indicatif` bar; without it every method is a no-op, so the
//!   analysis loop has a single code path.
//!
//! The bar is shared by reference between workers; `indicatif` bars are internally
//! synchronised.
use std::time::Duration;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

#[inline]
pub fn fmt_dur(d: Duration) -> String {
    let us = d.as_micros();
    if us < 1_000 {
        format!("{us}µs")
    } else {
        let ms = d.as_millis();
        if ms < 1_000 {
            format!("{ms}ms")
        } else {
            let s = d.as_secs_f32();
            format!("{s:.2}s")
        }
    }
}

pub(crate) struct TargetProgress {
    #[cfg(feature = "progress")]
    bar: ProgressBar,
}

impl TargetProgress {
    #[cfg(feature = "progress")]
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total.max(1) as u64);
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise} | {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(200));
        TargetProgress { bar }
    }

    #[cfg(not(feature = "progress"))]
    pub fn new(_total: usize) -> Self {
        TargetProgress {}
    }

    #[inline]
    pub fn inc(&self) {
        #[cfg(feature = "progress")]
        self.bar.inc(1);
    }

    pub fn finish(&self, _elapsed: Duration, _interrupted: bool) {
        #[cfg(feature = "progress")]
        {
            let per_target = _elapsed / (self.bar.position().max(1) as u32);
            self.bar.set_message(if _interrupted {
                "Interrupted".to_string()
            } else {
                format!("avg: {}", fmt_dur(per_target))
            });
            self.bar.disable_steady_tick();
            self.bar.finish_and_clear();
        }
    }
}
