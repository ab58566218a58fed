// Release tracking for the output directory
//
// Master files and the ledger belong to one upstream release. When the
// release changes, everything in the output directory is stale.

use gbmeta_common::Result;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Marker file holding the release the output directory was built from
pub const RELEASE_FILE: &str = ".current-release";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseStatus {
    /// No marker existed; it was written
    First,
    Unchanged,
    /// The output directory was cleared for the new release
    Changed { previous: String },
}

pub struct ReleaseMarker;

impl ReleaseMarker {
    /// Release recorded in `output_dir`, if any
    pub fn read(output_dir: &Path) -> Result<Option<String>> {
        match fs::read_to_string(output_dir.join(RELEASE_FILE)) {
            Ok(text) => Ok(Some(text.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Bring `output_dir` in line with `release`
    pub fn sync(output_dir: &Path, release: &str) -> Result<ReleaseStatus> {
        fs::create_dir_all(output_dir)?;
        let release = release.trim();

        let status = match Self::read(output_dir)? {
            None => ReleaseStatus::First,
            Some(previous) if previous == release => return Ok(ReleaseStatus::Unchanged),
            Some(previous) => {
                warn!(
                    "Release changed from {} to {}; clearing {}",
                    previous,
                    release,
                    output_dir.display()
                );
                clear_dir(output_dir)?;
                ReleaseStatus::Changed { previous }
            },
        };

        fs::write(output_dir.join(RELEASE_FILE), release)?;
        info!("Output directory now tracks release {}", release);
        Ok(status)
    }
}

fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
