//! Lists and loads the fingerprint files from the `clients` directory.
use std::path::{Path, PathBuf};

use crate::client::EmulatedClient;
use crate::Error;

pub const CLIENT_FILE_EXTENSION: &str = "client";

/// Access to the `clients/` directory of fingerprint files.
#[derive(Debug, Clone)]
pub struct ClientFileProvider {
    clients_dir: PathBuf,
}

impl ClientFileProvider {
    #[must_use]
    pub fn new(clients_dir: &Path) -> Self {
        Self {
            clients_dir: clients_dir.to_path_buf(),
        }
    }

    /// File names of all available fingerprints, sorted.
    #[must_use]
    pub fn list_client_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.clients_dir) else {
            tracing::warn!("Unable to list client files in {}", self.clients_dir.display());
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == CLIENT_FILE_EXTENSION))
            .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
            .collect();

        names.sort();
        names
    }

    /// Loads the fingerprint file with the given name.
    ///
    /// # Errors
    ///
    /// Returns an [`enum@Error`] when the file is missing, unreadable or
    /// malformed.
    pub fn load(&self, file_name: &str) -> Result<EmulatedClient, Error> {
        let path = self.clients_dir.join(file_name);

        if !path.is_file() {
            return Err(Error::MissingClientFile { path });
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| Error::UnreadableClientFile {
            path: path.clone(),
            source,
        })?;

        EmulatedClient::from_json(&contents)
    }
}
