//! Scoped timing for the inference paths.
//!
//! A [`TimingGuard`] measures how long a region of code took and reports it
//! under the [`TELEMETRY_TARGET`] log target when it goes out of scope. Two
//! switches must agree before anything is logged: the runtime telemetry
//! settings (see [`configure`]) and the global log filter. With telemetry
//! off, a guard costs one `Instant::now()`.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicU8, Ordering},
    time::{Duration, Instant},
};

use log::{Level, LevelFilter, log, log_enabled};

/// Log target used for every timing record.
pub const TELEMETRY_TARGET: &str = "sentinel::telemetry";

// 0 means disabled; otherwise the maximum level index that may be reported.
static TELEMETRY_THRESHOLD: AtomicU8 = AtomicU8::new(0);

/// RAII helper that logs how long an operation took when dropped.
pub struct TimingGuard {
    label: Cow<'static, str>,
    level: Level,
    start: Instant,
    active: bool,
}

impl TimingGuard {
    /// Returns `true` when the guard will emit a log entry on drop.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Elapsed time since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the clock without logging and return the elapsed duration.
    pub fn finish(mut self) -> Duration {
        self.active = false;
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if self.active {
            log!(
                target: TELEMETRY_TARGET,
                self.level,
                "{} completed in {:.2?}",
                self.label,
                self.start.elapsed()
            );
        }
    }
}

/// Start timing `label`; reported at `level` if telemetry allows it.
pub fn timing_guard(label: impl Into<Cow<'static, str>>, level: Level) -> TimingGuard {
    timing_guard_if(label, level, true)
}

/// Like [`timing_guard`], with an extra caller-controlled switch.
pub fn timing_guard_if(
    label: impl Into<Cow<'static, str>>,
    level: Level,
    enabled: bool,
) -> TimingGuard {
    let active =
        enabled && telemetry_allows(level) && log_enabled!(target: TELEMETRY_TARGET, level);
    TimingGuard {
        label: label.into(),
        level,
        start: Instant::now(),
        active,
    }
}

/// Configure the global telemetry state from user settings.
pub fn configure(enabled: bool, level: LevelFilter) {
    let threshold = if enabled { level as u8 } else { 0 };
    TELEMETRY_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// Whether timing records are currently reported at all.
pub fn telemetry_enabled() -> bool {
    TELEMETRY_THRESHOLD.load(Ordering::Relaxed) > 0
}

/// The most verbose level currently reported.
pub fn telemetry_level() -> LevelFilter {
    match TELEMETRY_THRESHOLD.load(Ordering::Relaxed) {
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Returns `true` when telemetry is enabled and `level` is within the threshold.
pub fn telemetry_allows(level: Level) -> bool {
    let threshold = TELEMETRY_THRESHOLD.load(Ordering::Relaxed);
    threshold > 0 && (level as u8) <= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    // Telemetry state is process-global, so every assertion lives in one test.
    #[test]
    fn configure_controls_threshold() {
        configure(true, LevelFilter::Info);
        assert!(telemetry_enabled());
        assert_eq!(telemetry_level(), LevelFilter::Info);
        assert!(telemetry_allows(Level::Warn));
        assert!(telemetry_allows(Level::Info));
        assert!(!telemetry_allows(Level::Debug));

        configure(false, LevelFilter::Trace);
        assert!(!telemetry_enabled());
        assert_eq!(telemetry_level(), LevelFilter::Off);
        assert!(!telemetry_allows(Level::Error));

        let guard = timing_guard("unit", Level::Error);
        assert!(!guard.is_active());
        let _ = guard.finish();
    }
}
