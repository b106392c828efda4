#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

pub use playbookd_test_utils::builders;
pub use playbookd_test_utils::init_tracing;

/// Create `<root>/<name>/` with the given files.
pub fn write_plain_project(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for (rel, contents) in files {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

/// Create `<root>/<name>.tar.gz` holding the given files.
pub fn write_targz_project(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let path = root.join(format!("{name}.tar.gz"));
    let file = fs::File::create(&path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (rel, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, rel, contents.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
    path
}
