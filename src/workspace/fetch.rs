// src/workspace/fetch.rs

//! Source fetchers, selected by [`ProjectStorage`](crate::types::ProjectStorage).

use std::fmt::Debug;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::fs::FileSystem;
use crate::project::Project;
use crate::types::ProjectStorage;

use super::registry::Registry;

/// Copies a project's source into a working directory.
pub trait SourceFetcher: Send + Sync + Debug {
    fn fetch(&self, project: &Project, dest: &Path) -> Result<()>;
}

pub type FetcherRegistry = Registry<dyn SourceFetcher>;

impl FetcherRegistry {
    /// Registry with every built-in fetcher.
    pub fn with_defaults(fs: Arc<dyn FileSystem>) -> Self {
        Registry::new("fetcher").register(
            ProjectStorage::Local.as_str(),
            Arc::new(LocalFetcher::new(fs)) as Arc<dyn SourceFetcher>,
        )
    }
}

/// Fetcher for projects stored on the local filesystem.
///
/// A directory reference has its *contents* copied into `dest`; a file
/// reference (an archive) is copied into `dest` under its own name.
#[derive(Debug)]
pub struct LocalFetcher {
    fs: Arc<dyn FileSystem>,
}

impl LocalFetcher {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> Result<u64> {
        let mut reader = self.fs.open_read(src)?;
        let mut writer = self.fs.create(dst)?;
        let n = io::copy(&mut reader, &mut writer)
            .with_context(|| format!("copying {:?} to {:?}", src, dst))?;
        writer.flush()?;
        Ok(n)
    }

    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<u64> {
        let mut copied = 0;
        for entry in self.fs.read_dir(src)? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let target = dst.join(name);
            if self.fs.is_dir(&entry) {
                self.fs.create_dir_all(&target)?;
                copied += self.copy_tree(&entry, &target)?;
            } else {
                copied += self.copy_file(&entry, &target)?;
            }
        }
        Ok(copied)
    }
}

impl SourceFetcher for LocalFetcher {
    fn fetch(&self, project: &Project, dest: &Path) -> Result<()> {
        let src = project.reference.as_path();
        let md = self
            .fs
            .metadata(src)
            .with_context(|| format!("project '{}' source {:?}", project.name, src))?;

        let bytes = if md.is_dir {
            self.copy_tree(src, dest)?
        } else {
            let Some(name) = src.file_name() else {
                bail!("project '{}' reference {:?} has no file name", project.name, src);
            };
            self.copy_file(src, &dest.join(name))?
        };

        debug!(project = %project.name, src = ?src, dest = ?dest, bytes, "project source fetched");
        Ok(())
    }
}
