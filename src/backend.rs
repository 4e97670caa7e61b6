use crate::fragment::FragmentId;
use crate::SearchError;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Keyed blob storage for fragment payloads.
///
/// The fragment store owns every id it writes; a backend never sees the
/// same id written by two owners.
pub trait FragmentBackend: Send {
    fn write(&mut self, id: FragmentId, bytes: &[u8]) -> Result<(), SearchError>;
    fn read(&self, id: FragmentId) -> Result<Vec<u8>, SearchError>;
    fn delete(&mut self, id: FragmentId) -> Result<(), SearchError>;
}

#[derive(Default)]
pub struct MemoryBackend {
    blobs: FxHashMap<FragmentId, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl FragmentBackend for MemoryBackend {
    fn write(&mut self, id: FragmentId, bytes: &[u8]) -> Result<(), SearchError> {
        self.blobs.insert(id, bytes.to_vec());
        Ok(())
    }

    fn read(&self, id: FragmentId) -> Result<Vec<u8>, SearchError> {
        self.blobs
            .get(&id)
            .cloned()
            .ok_or(SearchError::MissingFragment(id))
    }

    fn delete(&mut self, id: FragmentId) -> Result<(), SearchError> {
        self.blobs
            .remove(&id)
            .map(|_| ())
            .ok_or(SearchError::MissingFragment(id))
    }
}

/// One file per fragment under a private directory.
pub struct DiskBackend {
    dir: PathBuf,
    // Held so a temporary directory lives exactly as long as the backend.
    _temp: Option<TempDir>,
}

impl DiskBackend {
    /// Use `dir` for fragment files. Anything already there is discarded:
    /// the frontier does not survive restarts.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, SearchError> {
        let dir = dir.as_ref().to_path_buf();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, _temp: None })
    }

    /// Backend rooted in a fresh temporary directory, removed on drop.
    pub fn temporary() -> Result<Self, SearchError> {
        let temp = tempfile::Builder::new().prefix("flipsearch_frontier").tempdir()?;
        Ok(Self {
            dir: temp.path().to_path_buf(),
            _temp: Some(temp),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.dir
    }

    pub fn fragment_path(&self, id: FragmentId) -> PathBuf {
        self.dir.join(format!("fragment_{:08}.bin", id))
    }

    /// Number of fragment files currently on disk.
    pub fn file_count(&self) -> Result<usize, SearchError> {
        let mut count = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "bin") {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl FragmentBackend for DiskBackend {
    fn write(&mut self, id: FragmentId, bytes: &[u8]) -> Result<(), SearchError> {
        let file = File::create(self.fragment_path(id))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    fn read(&self, id: FragmentId) -> Result<Vec<u8>, SearchError> {
        fs::read(self.fragment_path(id)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SearchError::MissingFragment(id),
            _ => SearchError::Io(e),
        })
    }

    fn delete(&mut self, id: FragmentId) -> Result<(), SearchError> {
        fs::remove_file(self.fragment_path(id)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SearchError::MissingFragment(id),
            _ => SearchError::Io(e),
        })
    }
}
