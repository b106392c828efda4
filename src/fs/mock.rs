// src/fs/mock.rs

use super::{FileSystem, Metadata};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

type Entries = HashMap<PathBuf, MockEntry>;

/// In-memory filesystem for tests.
///
/// Paths are expected to be absolute. `/` and the temp dir (`/tmp`) exist
/// from the start.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    files: Arc<Mutex<Entries>>,
}

fn not_found(path: &Path) -> anyhow::Error {
    anyhow::Error::new(io::Error::new(
        io::ErrorKind::NotFound,
        format!("not found: {:?}", path),
    ))
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileSystem {
    pub const TEMP_DIR: &'static str = "/tmp";

    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("/"), MockEntry::Dir(Vec::new()));

        let fs = Self {
            files: Arc::new(Mutex::new(files)),
        };
        fs.add_dir(Self::TEMP_DIR);
        fs
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut files = self.lock();
        if let Some(parent) = path.parent() {
            Self::ensure_dir_entry(&mut files, parent);
        }
        Self::insert_entry(&mut files, path, MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut files = self.lock();
        Self::ensure_dir_entry(&mut files, path.as_ref());
    }

    /// Contents of a file, if present.
    pub fn file_contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().get(path.as_ref()) {
            Some(MockEntry::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    fn insert_entry(files: &mut Entries, path: &Path, entry: MockEntry) {
        files.insert(path.to_path_buf(), entry);
        Self::link_to_parent(files, path);
    }

    fn link_to_parent(files: &mut Entries, path: &Path) {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
        else {
            return;
        };
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            if !children.iter().any(|c| c == name) {
                children.push(name.to_string());
            }
        }
    }

    fn unlink_from_parent(files: &mut Entries, path: &Path) {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
        else {
            return;
        };
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            children.retain(|c| c != name);
        }
    }

    fn ensure_dir_entry(files: &mut Entries, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        if let Some(parent) = path.parent() {
            if parent != path {
                // Avoid infinite loop at root
                Self::ensure_dir_entry(files, parent);
            }
        }
        Self::insert_entry(files, path, MockEntry::Dir(Vec::new()));
    }

    fn subtree(files: &Entries, path: &Path) -> Vec<PathBuf> {
        files
            .keys()
            .filter(|k| k.starts_with(path))
            .cloned()
            .collect()
    }
}

/// Writer returned by [`MockFileSystem::create`]; every write lands in the
/// shared map immediately.
struct MockWriter {
    path: PathBuf,
    files: Arc<Mutex<Entries>>,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        match files.get_mut(&self.path) {
            Some(MockEntry::File(content)) => {
                content.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file removed while writing: {:?}", self.path),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileSystem for MockFileSystem {
    fn metadata(&self, path: &Path) -> Result<Metadata> {
        match self.lock().get(path) {
            Some(MockEntry::File(content)) => Ok(Metadata {
                is_dir: false,
                len: content.len() as u64,
            }),
            Some(MockEntry::Dir(_)) => Ok(Metadata { is_dir: true, len: 0 }),
            None => Err(not_found(path)),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.lock();
        let mut cursor = Some(path);
        while let Some(p) = cursor {
            if let Some(MockEntry::File(_)) = files.get(p) {
                return Err(anyhow!("not a directory: {:?}", p));
            }
            cursor = p.parent();
        }
        Self::ensure_dir_entry(&mut files, path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.lock();
        match files.get(path) {
            Some(MockEntry::Dir(_)) => {}
            Some(MockEntry::File(_)) => return Err(anyhow!("not a directory: {:?}", path)),
            None => return Err(not_found(path)),
        }
        for key in Self::subtree(&files, path) {
            files.remove(&key);
        }
        Self::unlink_from_parent(&mut files, path);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut files = self.lock();
        match files.get(path) {
            Some(MockEntry::File(_)) => {
                files.remove(path);
                Self::unlink_from_parent(&mut files, path);
                Ok(())
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("is a directory: {:?}", path)),
            None => Err(not_found(path)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.lock();
        if !files.contains_key(from) {
            return Err(not_found(from));
        }
        match to.parent() {
            Some(parent) if matches!(files.get(parent), Some(MockEntry::Dir(_))) => {}
            _ => return Err(not_found(to)),
        }
        if let Some(MockEntry::Dir(_)) = files.get(to) {
            return Err(anyhow!("destination is a directory: {:?}", to));
        }

        for key in Self::subtree(&files, from) {
            if let Some(entry) = files.remove(&key) {
                let suffix = key.strip_prefix(from).unwrap_or(Path::new(""));
                let new_key = if suffix.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(suffix)
                };
                files.insert(new_key, entry);
            }
        }
        Self::unlink_from_parent(&mut files, from);
        Self::link_to_parent(&mut files, to);
        Ok(())
    }

    fn temp_dir(&self) -> PathBuf {
        PathBuf::from(Self::TEMP_DIR)
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let files = self.lock();
        match files.get(path) {
            Some(MockEntry::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(not_found(path)),
        }
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        let mut files = self.lock();
        match path.parent().and_then(|p| files.get(p)) {
            Some(MockEntry::Dir(_)) => {}
            _ => return Err(not_found(path)),
        }
        if let Some(MockEntry::Dir(_)) = files.get(path) {
            return Err(anyhow!("Is a directory: {:?}", path));
        }
        Self::insert_entry(&mut files, path, MockEntry::File(Vec::new()));
        Ok(Box::new(MockWriter {
            path: path.to_path_buf(),
            files: Arc::clone(&self.files),
        }))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.file_contents(path).ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.lock();
        match files.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            Some(MockEntry::File(_)) => Err(anyhow!("Not a directory: {:?}", path)),
            None => Err(not_found(path)),
        }
    }
}
