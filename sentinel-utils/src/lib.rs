//! Common helpers shared across Sentinel crates.

/// Application configuration and settings management.
pub mod config;
/// Locating bundled test models, cascades and reference tables.
pub mod fixtures;
/// Image decoding, resizing, grayscale and tensor layout helpers.
pub mod image_utils;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use fixtures::{fixture_path, fixtures_dir};
pub use image_utils::{
    decode_image, load_image, luminance_bt601, resize_bilinear, resize_exact, rgb_to_bgr_nhwc,
};
pub use telemetry::{
    TELEMETRY_TARGET, TimingGuard, configure as configure_telemetry, telemetry_allows,
    telemetry_enabled, telemetry_level, timing_guard, timing_guard_if,
};

/// Initialize logging once for the CLI or an embedding service.
///
/// `RUST_LOG` wins when it is set; otherwise `default_filter` is used.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
