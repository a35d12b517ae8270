//! The torrent file provider: the in-memory view of the watched directory.
//!
//! The provider owns the path → torrent map, fans file churn out to
//! registered listeners, retires files into the archive folder and hands out
//! random not-yet-seeded torrents for promotion.
//!
//! Listeners are always invoked without any provider lock held; a listener is
//! free to call back into the provider.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use ghostseed_primitives::info_hash::InfoHash;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::event::{self, Event};
use crate::folders::SeedFolders;
use crate::torrent::metainfo::SeededTorrent;

pub const TORRENT_FILE_EXTENSION: &str = "torrent";

/// Callbacks fired when the watched directory changes.
pub trait TorrentFileChangeListener: Send + Sync {
    fn on_torrent_file_added(&self, torrent: &Arc<SeededTorrent>);
    fn on_torrent_file_removed(&self, torrent: &Arc<SeededTorrent>);
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("torrent folder not found: {path}")]
    TorrentsFolderMissing { path: PathBuf },

    #[error("archive folder exists, but is not a directory: {path}")]
    ArchiveFolderNotADirectory { path: PathBuf },

    #[error("failed to create archive folder {path}: {source}")]
    CreateArchiveFolder {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no more torrent files available")]
    NoMoreTorrentsAvailable,
}

#[derive(Debug, Clone)]
struct KnownTorrentFile {
    torrent: Arc<SeededTorrent>,
    modified: Option<SystemTime>,
}

/// The set of known torrent files and their listeners.
pub struct TorrentFileProvider {
    torrents_dir: PathBuf,
    archive_dir: PathBuf,
    known: Mutex<HashMap<PathBuf, KnownTorrentFile>>,
    listeners: Mutex<Vec<Arc<dyn TorrentFileChangeListener>>>,
    event_sender: event::sender::Sender,
}

impl TorrentFileProvider {
    /// # Errors
    ///
    /// Returns [`ProviderError::TorrentsFolderMissing`] when the watched
    /// directory does not exist.
    pub fn new(folders: &SeedFolders, event_sender: event::sender::Sender) -> Result<Self, ProviderError> {
        if !folders.torrents_dir().is_dir() {
            return Err(ProviderError::TorrentsFolderMissing {
                path: folders.torrents_dir().to_path_buf(),
            });
        }

        Ok(Self {
            torrents_dir: folders.torrents_dir().to_path_buf(),
            archive_dir: folders.archive_dir().to_path_buf(),
            known: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            event_sender,
        })
    }

    /// Creates the archive folder when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the path exists but is not a
    /// directory, or when it cannot be created.
    pub fn init(&self) -> Result<(), ProviderError> {
        if self.archive_dir.is_dir() {
            return Ok(());
        }

        if self.archive_dir.exists() {
            return Err(ProviderError::ArchiveFolderNotADirectory {
                path: self.archive_dir.clone(),
            });
        }

        std::fs::create_dir_all(&self.archive_dir).map_err(|source| ProviderError::CreateArchiveFolder {
            path: self.archive_dir.clone(),
            source,
        })
    }

    pub fn register_listener(&self, listener: Arc<dyn TorrentFileChangeListener>) {
        self.listeners
            .lock()
            .expect("the listeners lock is poisoned")
            .push(listener);
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn TorrentFileChangeListener>) {
        self.listeners
            .lock()
            .expect("the listeners lock is poisoned")
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Diffs the watched directory against the known set and fires the
    /// corresponding listener callbacks. A modified file fires a
    /// delete-then-create pair.
    ///
    /// Errors scanning or parsing never escape: unreadable meta-info is moved
    /// to the archive folder and reported through the event bus.
    pub fn scan(&self) {
        let on_disk = self.list_torrent_files_on_disk();

        let mut removed: Vec<Arc<SeededTorrent>> = Vec::new();
        let mut added: Vec<Arc<SeededTorrent>> = Vec::new();
        let mut unparsable: Vec<PathBuf> = Vec::new();

        {
            let mut known = self.known.lock().expect("the torrent file map lock is poisoned");

            let vanished: Vec<PathBuf> = known.keys().filter(|path| !on_disk.contains_key(*path)).cloned().collect();
            for path in vanished {
                if let Some(entry) = known.remove(&path) {
                    tracing::info!("Torrent file deletion detected: {}", path.display());
                    removed.push(entry.torrent);
                }
            }

            for (path, modified) in &on_disk {
                let changed = match known.get(path) {
                    Some(entry) => entry.modified != *modified,
                    None => true,
                };
                if !changed {
                    continue;
                }

                if let Some(previous) = known.remove(path) {
                    tracing::info!("Torrent file change detected, hot reloading: {}", path.display());
                    removed.push(previous.torrent);
                } else {
                    tracing::info!("Torrent file addition detected: {}", path.display());
                }

                match Self::parse_torrent_file(path) {
                    Ok(torrent) => {
                        known.insert(
                            path.clone(),
                            KnownTorrentFile {
                                torrent: torrent.clone(),
                                modified: *modified,
                            },
                        );
                        added.push(torrent);
                    }
                    Err(reason) => {
                        tracing::warn!("Failed to read torrent file {}: {reason}", path.display());
                        unparsable.push(path.clone());
                        event::publish(
                            &self.event_sender,
                            Event::FailedToAddTorrentFile {
                                file_name: file_name_of(path),
                                reason,
                            },
                        );
                    }
                }
            }
        }

        for path in unparsable {
            self.archive_file(&path);
        }

        for torrent in removed {
            self.notify_removed(&torrent);
        }
        for torrent in added {
            self.notify_added(&torrent);
        }
    }

    /// A uniformly random known torrent whose info-hash is not in `excluded`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NoMoreTorrentsAvailable`] when every known
    /// torrent is excluded.
    pub fn get_torrent_not_in(&self, excluded: &HashSet<InfoHash>) -> Result<Arc<SeededTorrent>, ProviderError> {
        let known = self.known.lock().expect("the torrent file map lock is poisoned");

        let candidates: Vec<&KnownTorrentFile> = known
            .values()
            .filter(|entry| !excluded.contains(entry.torrent.info_hash()))
            .collect();

        candidates
            .choose(&mut rand::rng())
            .map(|entry| entry.torrent.clone())
            .ok_or(ProviderError::NoMoreTorrentsAvailable)
    }

    /// All known torrents not in `excluded`, shuffled.
    #[must_use]
    pub fn get_all_torrents_not_in(&self, excluded: &HashSet<InfoHash>) -> Vec<Arc<SeededTorrent>> {
        let known = self.known.lock().expect("the torrent file map lock is poisoned");

        let mut candidates: Vec<Arc<SeededTorrent>> = known
            .values()
            .filter(|entry| !excluded.contains(entry.torrent.info_hash()))
            .map(|entry| entry.torrent.clone())
            .collect();
        drop(known);

        candidates.shuffle(&mut rand::rng());
        candidates
    }

    /// Retires the file backing `info_hash`: fires the removed callback, then
    /// moves the file into the archive folder, replacing any previous archive
    /// of the same name.
    pub fn move_to_archive(&self, info_hash: &InfoHash) {
        let entry = {
            let mut known = self.known.lock().expect("the torrent file map lock is poisoned");

            let path = known
                .iter()
                .find(|(_, entry)| entry.torrent.info_hash() == info_hash)
                .map(|(path, _)| path.clone());

            path.and_then(|path| known.remove(&path).map(|entry| (path, entry.torrent)))
        };

        let Some((path, torrent)) = entry else {
            tracing::warn!("Cannot archive torrent {info_hash}: it is not registered in the provider");
            return;
        };

        self.notify_removed(&torrent);
        self.archive_file(&path);
    }

    #[must_use]
    pub fn torrent_count(&self) -> usize {
        self.known.lock().expect("the torrent file map lock is poisoned").len()
    }

    /// Snapshot of all known torrents.
    #[must_use]
    pub fn torrents(&self) -> Vec<Arc<SeededTorrent>> {
        self.known
            .lock()
            .expect("the torrent file map lock is poisoned")
            .values()
            .map(|entry| entry.torrent.clone())
            .collect()
    }

    fn list_torrent_files_on_disk(&self) -> HashMap<PathBuf, Option<SystemTime>> {
        let Ok(entries) = std::fs::read_dir(&self.torrents_dir) else {
            tracing::warn!("Unable to list the torrents directory {}", self.torrents_dir.display());
            return HashMap::new();
        };

        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == TORRENT_FILE_EXTENSION))
            .map(|path| {
                let modified = std::fs::metadata(&path).and_then(|meta| meta.modified()).ok();
                (path, modified)
            })
            .collect()
    }

    fn parse_torrent_file(path: &Path) -> Result<Arc<SeededTorrent>, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        SeededTorrent::from_bytes(&bytes).map_err(|e| e.to_string())
    }

    fn archive_file(&self, path: &Path) {
        if !path.exists() {
            return;
        }

        let target = self.archive_dir.join(path.file_name().unwrap_or_default());

        if target.exists() {
            if let Err(e) = std::fs::remove_file(&target) {
                tracing::error!("Failed to replace archived file {}: {e}", target.display());
                return;
            }
        }

        match std::fs::rename(path, &target) {
            Ok(()) => tracing::info!("Successfully moved file {} to the archive folder", path.display()),
            Err(e) => tracing::error!(
                "Failed to archive file {}, it won't be used anymore for the current session, but it remains in the folder: {e}",
                path.display()
            ),
        }
    }

    fn notify_added(&self, torrent: &Arc<SeededTorrent>) {
        for listener in self.listeners_snapshot() {
            listener.on_torrent_file_added(torrent);
        }
    }

    fn notify_removed(&self, torrent: &Arc<SeededTorrent>) {
        for listener in self.listeners_snapshot() {
            listener.on_torrent_file_removed(torrent);
        }
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn TorrentFileChangeListener>> {
        self.listeners.lock().expect("the listeners lock is poisoned").clone()
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use super::{ProviderError, TorrentFileChangeListener, TorrentFileProvider};
    use crate::folders::SeedFolders;
    use crate::test_helpers::{torrent_bytes, TorrentSpec};
    use crate::torrent::metainfo::SeededTorrent;

    #[derive(Default)]
    struct RecordingListener {
        added: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
    }

    impl TorrentFileChangeListener for RecordingListener {
        fn on_torrent_file_added(&self, torrent: &Arc<SeededTorrent>) {
            self.added.lock().unwrap().push(torrent.name().to_string());
        }

        fn on_torrent_file_removed(&self, torrent: &Arc<SeededTorrent>) {
            self.removed.lock().unwrap().push(torrent.name().to_string());
        }
    }

    struct Setup {
        _dir: tempfile::TempDir,
        folders: SeedFolders,
        provider: TorrentFileProvider,
        listener: Arc<RecordingListener>,
    }

    fn setup() -> Setup {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("torrents")).unwrap();

        let folders = SeedFolders::new(dir.path());
        let provider = TorrentFileProvider::new(&folders, None).unwrap();
        provider.init().unwrap();

        let listener = Arc::new(RecordingListener::default());
        provider.register_listener(listener.clone());

        Setup {
            _dir: dir,
            folders,
            provider,
            listener,
        }
    }

    fn write_torrent(setup: &Setup, file_name: &str, torrent_name: &'static str) {
        std::fs::write(
            setup.folders.torrents_dir().join(file_name),
            torrent_bytes(&TorrentSpec {
                name: torrent_name.to_string(),
                ..TorrentSpec::default()
            }),
        )
        .unwrap();
    }

    #[test]
    fn it_should_notify_listeners_when_a_torrent_file_appears() {
        let setup = setup();
        write_torrent(&setup, "first.torrent", "first");

        setup.provider.scan();

        assert_eq!(*setup.listener.added.lock().unwrap(), vec!["first"]);
        assert_eq!(setup.provider.torrent_count(), 1);
    }

    #[test]
    fn it_should_notify_listeners_when_a_torrent_file_disappears() {
        let setup = setup();
        write_torrent(&setup, "first.torrent", "first");
        setup.provider.scan();

        std::fs::remove_file(setup.folders.torrents_dir().join("first.torrent")).unwrap();
        setup.provider.scan();

        assert_eq!(*setup.listener.removed.lock().unwrap(), vec!["first"]);
        assert_eq!(setup.provider.torrent_count(), 0);
    }

    #[test]
    fn it_should_treat_a_modified_file_as_a_delete_then_create_pair() {
        let setup = setup();
        write_torrent(&setup, "swap.torrent", "before");
        setup.provider.scan();

        // A same-second overwrite can keep the mtime; push it forward explicitly.
        let path = setup.folders.torrents_dir().join("swap.torrent");
        write_torrent(&setup, "swap.torrent", "after");
        let bumped = std::time::SystemTime::now() + std::time::Duration::from_secs(2);
        let file = std::fs::File::open(&path).unwrap();
        file.set_modified(bumped).unwrap();

        setup.provider.scan();

        assert_eq!(*setup.listener.removed.lock().unwrap(), vec!["before"]);
        assert_eq!(*setup.listener.added.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn it_should_archive_an_unparsable_file_without_notifying_listeners() {
        let setup = setup();
        std::fs::write(setup.folders.torrents_dir().join("broken.torrent"), b"junk").unwrap();

        setup.provider.scan();

        assert!(setup.listener.added.lock().unwrap().is_empty());
        assert!(setup.folders.archive_dir().join("broken.torrent").is_file());
    }

    #[test]
    fn it_should_move_an_archived_torrent_out_of_the_watched_directory() {
        let setup = setup();
        write_torrent(&setup, "first.torrent", "first");
        setup.provider.scan();

        let info_hash = *setup.provider.torrents()[0].info_hash();
        setup.provider.move_to_archive(&info_hash);

        assert!(setup.folders.archive_dir().join("first.torrent").is_file());
        assert!(!setup.folders.torrents_dir().join("first.torrent").is_file());
        assert_eq!(*setup.listener.removed.lock().unwrap(), vec!["first"]);
        assert_eq!(setup.provider.torrent_count(), 0);
    }

    #[test]
    fn it_should_hand_out_a_random_torrent_not_in_the_excluded_set() {
        let setup = setup();
        write_torrent(&setup, "first.torrent", "first");
        write_torrent(&setup, "second.torrent", "second");
        setup.provider.scan();

        let torrents = setup.provider.torrents();
        let excluded: HashSet<_> = [*torrents[0].info_hash()].into();

        let picked = setup.provider.get_torrent_not_in(&excluded).unwrap();

        assert_eq!(picked.info_hash(), torrents[1].info_hash());
    }

    #[test]
    fn it_should_fail_when_every_torrent_is_excluded() {
        let setup = setup();
        write_torrent(&setup, "first.torrent", "first");
        setup.provider.scan();

        let excluded: HashSet<_> = setup.provider.torrents().iter().map(|t| *t.info_hash()).collect();

        assert!(matches!(
            setup.provider.get_torrent_not_in(&excluded),
            Err(ProviderError::NoMoreTorrentsAvailable)
        ));
    }

    #[test]
    fn it_should_refuse_to_init_when_the_archive_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("torrents")).unwrap();
        std::fs::write(dir.path().join("torrents").join("archived"), b"oops").unwrap();

        let folders = SeedFolders::new(dir.path());
        let provider = TorrentFileProvider::new(&folders, None).unwrap();

        assert!(matches!(
            provider.init(),
            Err(ProviderError::ArchiveFolderNotADirectory { .. })
        ));
    }
}
