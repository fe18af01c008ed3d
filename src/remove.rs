use crate::error::Error;
use std::path::{Path, PathBuf};

/// Outcome of a best-effort removal.
#[derive(Debug, Default)]
pub struct Removal {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<Error>,
}

/// Deletes every entry independently. A failure is logged and recorded but
/// never stops the remaining entries. Directories are only removed when
/// empty.
pub fn remove(entries: &[PathBuf]) -> Removal {
    let mut removal = Removal::default();
    for entry in entries {
        match remove_entry(entry) {
            Ok(()) => {
                info!("removed {}", entry.display());
                removal.removed.push(entry.clone());
            }
            Err(source) => {
                let err = Error::Deletion {
                    path: entry.clone(),
                    source,
                };
                warn!("{}", err);
                removal.failed.push(err);
            }
        }
    }
    removal
}

fn remove_entry(path: &Path) -> std::io::Result<()> {
    // symlink_metadata so a link to a directory is unlinked, not followed
    if std::fs::symlink_metadata(path)?.is_dir() {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    }
}
