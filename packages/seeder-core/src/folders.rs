//! The directory layout under the configuration root.
//!
//! ```text
//! <root>/config.json          the application configuration
//! <root>/torrents/            the watched directory of .torrent files
//! <root>/torrents/archived/   where retired torrent files end up
//! <root>/clients/             emulated-client fingerprint files
//! <root>/elapsed-times.json   persisted seed-time accounting
//! ```
use std::path::{Path, PathBuf};

pub const TORRENTS_DIR_NAME: &str = "torrents";
pub const ARCHIVE_DIR_NAME: &str = "archived";
pub const CLIENTS_DIR_NAME: &str = "clients";
pub const ELAPSED_TIMES_FILE_NAME: &str = "elapsed-times.json";

/// Resolves, stores & exposes the locations of the configuration file-paths.
#[derive(Debug, Clone)]
pub struct SeedFolders {
    conf_root: PathBuf,
    torrents_dir: PathBuf,
    archive_dir: PathBuf,
    clients_dir: PathBuf,
}

impl SeedFolders {
    #[must_use]
    pub fn new(conf_root: &Path) -> Self {
        let torrents_dir = conf_root.join(TORRENTS_DIR_NAME);
        let folders = Self {
            conf_root: conf_root.to_path_buf(),
            archive_dir: torrents_dir.join(ARCHIVE_DIR_NAME),
            clients_dir: conf_root.join(CLIENTS_DIR_NAME),
            torrents_dir,
        };

        if !folders.conf_root.is_dir() {
            tracing::warn!("No such directory: {}", folders.conf_root.display());
        }
        if !folders.torrents_dir.is_dir() {
            tracing::warn!(
                "Sub-folder '{TORRENTS_DIR_NAME}' is missing in the configuration folder: {}",
                folders.torrents_dir.display()
            );
        }
        if !folders.clients_dir.is_dir() {
            tracing::warn!(
                "Sub-folder '{CLIENTS_DIR_NAME}' is missing in the configuration folder: {}",
                folders.clients_dir.display()
            );
        }

        folders
    }

    #[must_use]
    pub fn conf_root(&self) -> &Path {
        &self.conf_root
    }

    #[must_use]
    pub fn torrents_dir(&self) -> &Path {
        &self.torrents_dir
    }

    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    #[must_use]
    pub fn clients_dir(&self) -> &Path {
        &self.clients_dir
    }

    #[must_use]
    pub fn elapsed_times_file(&self) -> PathBuf {
        self.conf_root.join(ELAPSED_TIMES_FILE_NAME)
    }
}
