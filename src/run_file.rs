use std::path::{Path, PathBuf};

/// A sorted run written by the split phase, consumed once by the merge phase.
#[derive(Debug, Clone)]
pub(crate) struct RunFile {
    path: PathBuf,
    records: usize,
    length: u64,
}

impl RunFile {
    pub(crate) fn new(path: PathBuf, records: usize, length: u64) -> RunFile {
        RunFile {
            path,
            records,
            length,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn records(&self) -> usize {
        self.records
    }

    pub(crate) fn length(&self) -> u64 {
        self.length
    }
}
