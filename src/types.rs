use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Suffix identifying a packed project inside the projects root.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// How a project's source is packaged.
///
/// - `Plain`: the reference is a directory tree, copied as-is.
/// - `Targz`: the reference is a gzip-compressed tarball that is extracted
///   into the working directory after fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectFormat {
    Plain,
    Targz,
}

impl ProjectFormat {
    /// Registry key used to resolve a [`SourceUnpacker`](crate::workspace::SourceUnpacker).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectFormat::Plain => "plain",
            ProjectFormat::Targz => "targz",
        }
    }
}

impl fmt::Display for ProjectFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(ProjectFormat::Plain),
            "targz" => Ok(ProjectFormat::Targz),
            other => Err(format!(
                "invalid project format: {other} (expected \"plain\" or \"targz\")"
            )),
        }
    }
}

/// Where a project's source lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStorage {
    /// On the local filesystem; the reference is a path.
    Local,
}

impl ProjectStorage {
    /// Registry key used to resolve a [`SourceFetcher`](crate::workspace::SourceFetcher).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStorage::Local => "local",
        }
    }
}

impl Default for ProjectStorage {
    fn default() -> Self {
        ProjectStorage::Local
    }
}

impl fmt::Display for ProjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(ProjectStorage::Local),
            other => Err(format!("invalid project storage: {other} (expected \"local\")")),
        }
    }
}
