#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test fixture paths
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures");

        Self { fixtures_dir }
    }

    pub fn xml_dir(&self) -> PathBuf {
        self.fixtures_dir.join("xml")
    }

    /// Default namespace plus a prefixed Dublin Core namespace
    pub fn catalog(&self) -> PathBuf {
        self.xml_dir().join("catalog.xml")
    }

    /// Default namespace where `ns` and `ns_` are already declared
    pub fn taken_prefix(&self) -> PathBuf {
        self.xml_dir().join("taken_prefix.xml")
    }

    pub fn no_default(&self) -> PathBuf {
        self.xml_dir().join("no_default.xml")
    }

    /// `section` contains itself directly and through `list/item`
    pub fn recursive(&self) -> PathBuf {
        self.xml_dir().join("recursive.xml")
    }

    pub fn latin1(&self) -> PathBuf {
        self.xml_dir().join("latin1.xml")
    }

    pub fn malformed(&self) -> PathBuf {
        self.xml_dir().join("malformed.xml")
    }
}

/// Write `content` to `name` inside a fresh temporary directory
pub fn write_temp_xml(name: &str, content: &str) -> std::io::Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join(name);
    std::fs::write(&path, content)?;
    Ok((temp_dir, path))
}

pub fn read_to_string(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|err| panic!("{}: {}", path.display(), err))
}
