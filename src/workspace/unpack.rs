// src/workspace/unpack.rs

//! Source unpackers, selected by [`ProjectFormat`](crate::types::ProjectFormat).

use std::fmt::Debug;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fs::FileSystem;
use crate::project::Project;
use crate::types::{ProjectFormat, ARCHIVE_SUFFIX};

use super::registry::Registry;

/// Turns fetched source in a working directory into a usable tree, in place.
pub trait SourceUnpacker: Send + Sync + Debug {
    fn unpack(&self, project: &Project, dest: &Path) -> Result<()>;
}

pub type UnpackerRegistry = Registry<dyn SourceUnpacker>;

impl UnpackerRegistry {
    /// Registry with every built-in unpacker.
    pub fn with_defaults(fs: Arc<dyn FileSystem>) -> Self {
        Registry::new("unpacker")
            .register(
                ProjectFormat::Plain.as_str(),
                Arc::new(PlainUnpacker) as Arc<dyn SourceUnpacker>,
            )
            .register(
                ProjectFormat::Targz.as_str(),
                Arc::new(TarGzUnpacker::new(fs)) as Arc<dyn SourceUnpacker>,
            )
    }
}

/// Plain trees are usable as fetched.
#[derive(Debug, Default)]
pub struct PlainUnpacker;

impl SourceUnpacker for PlainUnpacker {
    fn unpack(&self, _project: &Project, _dest: &Path) -> Result<()> {
        Ok(())
    }
}

/// Extracts a fetched `.tar.gz` archive into the working directory and
/// removes the archive afterwards.
///
/// Only directories and regular files are extracted. Entries whose path
/// would land outside the working directory abort the unpack; links and
/// special files are skipped.
#[derive(Debug)]
pub struct TarGzUnpacker {
    fs: Arc<dyn FileSystem>,
}

impl TarGzUnpacker {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<usize> {
        let reader = self.fs.open_read(archive_path)?;
        let mut archive = Archive::new(GzDecoder::new(reader));

        let mut files = 0;
        for entry in archive.entries().context("reading archive entries")? {
            let mut entry = entry.context("reading archive entry")?;
            let raw_path = entry.path()?.into_owned();
            let Some(relative) = contained_path(&raw_path)? else {
                continue;
            };
            let target = dest.join(&relative);

            match entry.header().entry_type() {
                EntryType::Directory => {
                    self.fs.create_dir_all(&target)?;
                }
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = target.parent() {
                        self.fs.create_dir_all(parent)?;
                    }
                    let mut writer = self.fs.create(&target)?;
                    io::copy(&mut entry, &mut writer)
                        .with_context(|| format!("extracting {:?}", relative))?;
                    writer.flush()?;
                    files += 1;
                }
                other => {
                    warn!(path = ?relative, entry_type = ?other, "skipping unsupported archive entry");
                }
            }
        }
        Ok(files)
    }
}

/// Normalise an archive entry path relative to the extraction root.
///
/// `Ok(None)` for entries that name the root itself (e.g. `./`); an error for
/// absolute paths and `..` components.
fn contained_path(path: &Path) -> Result<Option<PathBuf>> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("archive entry {:?} escapes the working directory", path);
            }
        }
    }
    Ok((!out.as_os_str().is_empty()).then_some(out))
}

impl SourceUnpacker for TarGzUnpacker {
    fn unpack(&self, project: &Project, dest: &Path) -> Result<()> {
        let Some(name) = project.reference.file_name() else {
            bail!("project '{}' reference {:?} has no file name", project.name, project.reference);
        };
        let fetched = dest.join(name);

        // Move the archive aside so no entry can overwrite it mid-read.
        let archive_path = dest.join(format!(".playbookd-{}{}", Uuid::new_v4().simple(), ARCHIVE_SUFFIX));
        self.fs
            .rename(&fetched, &archive_path)
            .with_context(|| format!("fetched archive {:?} missing", fetched))?;

        let files = self
            .extract(&archive_path, dest)
            .with_context(|| format!("unpacking project '{}'", project.name))?;
        self.fs.remove_file(&archive_path)?;

        debug!(project = %project.name, dest = ?dest, files, "project archive unpacked");
        Ok(())
    }
}
