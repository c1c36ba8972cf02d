use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Generates unique run file paths `<name>-<counter><extension>` in a working directory.
#[derive(Debug)]
pub(crate) struct FileNameAllocator {
    directory: PathBuf,
    name: String,
    extension: String,
    counter: AtomicU64,
}

impl FileNameAllocator {
    /// Names derive from `source`. Files go to `working_directory`, or next to `source` when
    /// no working directory is given.
    pub(crate) fn new(source: &Path, working_directory: Option<&Path>) -> FileNameAllocator {
        let directory = match working_directory {
            Some(directory) => directory.to_path_buf(),
            None => source.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        FileNameAllocator {
            directory,
            name,
            extension,
            counter: AtomicU64::new(0),
        }
    }

    pub(crate) fn next_path(&self) -> PathBuf {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.directory.join(format!("{}-{}{}", self.name, index, self.extension))
    }
}
