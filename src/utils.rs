use std::path::Path;

use tracing::{info, warn};

/// Opens a file with the desktop's default application, falling back to
/// printing its path.
pub fn open_file(path: &Path) {
    match open::that(path) {
        Ok(()) => info!("Opened {}", path.display()),
        Err(e) => {
            warn!("Failed to open {}: {}", path.display(), e);
            println!("Open the report at: {}", path.display());
        }
    }
}
