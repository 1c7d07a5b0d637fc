use anyhow::Result;
use std::{
    env,
    path::{Path, PathBuf},
};

const FIXTURE_ENV: &str = "SENTINEL_FIXTURE_ROOT";

/// Resolve the directory holding the test models, cascades and tables.
///
/// `SENTINEL_FIXTURE_ROOT` wins when set; otherwise the nearest `fixtures`
/// directory above this crate's manifest is used.
pub fn fixtures_dir() -> Result<PathBuf> {
    if let Ok(value) = env::var(FIXTURE_ENV) {
        return Ok(PathBuf::from(value));
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .map(|ancestor| ancestor.join("fixtures"))
        .find(|candidate| candidate.is_dir())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "fixtures directory not found starting from {}",
                manifest_dir.display()
            )
        })
}

/// Resolve a path inside the fixture folder, failing if it does not exist.
pub fn fixture_path<P: AsRef<Path>>(relative: P) -> Result<PathBuf> {
    let relative = relative.as_ref();
    let root = fixtures_dir()?;
    let full = root.join(relative);
    anyhow::ensure!(
        full.exists(),
        "fixture {} does not exist under {}",
        relative.display(),
        root.display()
    );
    Ok(full)
}
