//! Managed module folder
//!
//! When module management is on, opened files are copied into the music
//! folder so the playlist keeps working after the originals move.

use crate::error::{Error, Result};
use spindle_common::module_info::content_hash;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Copy `source` into `folder`, returning the managed path.
///
/// A file already in the folder with identical bytes is reused; a
/// different file with the same name gets the content hash appended.
pub fn import_module(source: &Path, folder: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| Error::NotAFile(source.to_path_buf()))?;

    if source.parent() == Some(folder) {
        return Ok(source.to_path_buf());
    }

    std::fs::create_dir_all(folder)?;
    let data = std::fs::read(source)?;
    let hash = content_hash(&data);

    let mut target = folder.join(name);
    if target.exists() {
        if content_hash(&std::fs::read(&target)?) == hash {
            debug!("{} already managed", target.display());
            return Ok(target);
        }
        target = folder.join(disambiguated_name(source, &hash));
        if target.exists() {
            return Ok(target);
        }
    }

    std::fs::write(&target, &data)?;
    info!("Copied {} to {}", source.display(), target.display());
    Ok(target)
}

/// `name-<hash8>.ext`
fn disambiguated_name(source: &Path, hash: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let short = &hash[..hash.len().min(8)];
    match source.extension() {
        Some(ext) => format!("{}-{}.{}", stem, short, ext.to_string_lossy()),
        None => format!("{}-{}", stem, short),
    }
}
