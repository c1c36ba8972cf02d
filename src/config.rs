use std::path::{Path, PathBuf};

use crate::cancellation::Cancellation;
use crate::encoding::Encoding;

#[derive(Clone)]
pub(crate) struct Config {
    input: PathBuf,
    working_directory: Option<PathBuf>,
    output: Option<PathBuf>,
    encoding: Encoding,
    chunk_capacity: usize,
    chunk_buffers: usize,
    read_buffer_size: usize,
    write_buffer_size: usize,
    merge_read_buffer_size: usize,
    merge_write_buffer_size: usize,
    open_concurrency: usize,
    detect_preamble: bool,
    cancellation: Cancellation,
}

impl Config {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        input: PathBuf,
        working_directory: Option<PathBuf>,
        output: Option<PathBuf>,
        encoding: Encoding,
        chunk_capacity: usize,
        chunk_buffers: usize,
        read_buffer_size: usize,
        write_buffer_size: usize,
        merge_read_buffer_size: usize,
        merge_write_buffer_size: usize,
        open_concurrency: usize,
        detect_preamble: bool,
        cancellation: Cancellation,
    ) -> Config {
        Config {
            input,
            working_directory,
            output,
            encoding,
            chunk_capacity: chunk_capacity.max(1),
            chunk_buffers: chunk_buffers.max(1),
            read_buffer_size: read_buffer_size.max(1),
            write_buffer_size: write_buffer_size.max(1),
            merge_read_buffer_size: merge_read_buffer_size.max(1),
            merge_write_buffer_size: merge_write_buffer_size.max(1),
            open_concurrency: open_concurrency.max(1),
            detect_preamble,
            cancellation,
        }
    }

    pub(crate) fn input(&self) -> &Path {
        &self.input
    }

    pub(crate) fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub(crate) fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub(crate) fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub(crate) fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub(crate) fn chunk_buffers(&self) -> usize {
        self.chunk_buffers
    }

    pub(crate) fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub(crate) fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    pub(crate) fn merge_read_buffer_size(&self) -> usize {
        self.merge_read_buffer_size
    }

    pub(crate) fn merge_write_buffer_size(&self) -> usize {
        self.merge_write_buffer_size
    }

    pub(crate) fn open_concurrency(&self) -> usize {
        self.open_concurrency
    }

    pub(crate) fn detect_preamble(&self) -> bool {
        self.detect_preamble
    }

    pub(crate) fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }
}
