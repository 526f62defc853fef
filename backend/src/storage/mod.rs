pub mod scratch;
pub mod upload;

use std::path::Path;

/// Creates the uploads and static directories if they are missing.
pub fn ensure_directories(dirs: &[&Path]) -> std::io::Result<()> {
    for dir in dirs {
        std::fs::create_dir_all(dir)?;
        log::info!("Using directory {}", dir.display());
    }
    Ok(())
}
