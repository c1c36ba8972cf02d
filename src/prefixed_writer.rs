use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::arena::{Arena, Lease};
use crate::cancellation::Cancellation;
use crate::encoding::Encoding;
use crate::error::{IoContext, SortError};

#[derive(Clone, Copy, Debug)]
pub(crate) struct WriterOptions {
    /// Emit the encoding preamble in front of the first record.
    pub(crate) write_preamble: bool,
    pub(crate) buffer_size: usize,
    /// Final length of the file, declared up front.
    pub(crate) required_length: Option<u64>,
}

impl WriterOptions {
    pub(crate) fn new(buffer_size: usize) -> WriterOptions {
        WriterOptions {
            write_preamble: false,
            buffer_size,
            required_length: None,
        }
    }

    pub(crate) fn with_preamble(mut self, write_preamble: bool) -> WriterOptions {
        self.write_preamble = write_preamble;
        self
    }

    pub(crate) fn with_required_length(mut self, required_length: u64) -> WriterOptions {
        self.required_length = Some(required_length);
        self
    }
}

/// Append only record writer.
///
/// The terminator goes in front of every record but the first, so nothing follows the last
/// record unless [PrefixedWriter::write_new_line] is called. The first record is preceded
/// by the preamble when requested.
pub(crate) struct PrefixedWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    encoding: Encoding,
    options: WriterOptions,
    // holds the prefix and the encoded record
    buffer: Lease<Vec<u8>>,
    first: bool,
    written: u64,
}

impl PrefixedWriter {
    /// Create or truncate `path`. The encode buffer is borrowed from `buffers` for the life
    /// of the writer and goes back on every failure.
    pub(crate) async fn create(
        path: &Path,
        encoding: Encoding,
        options: WriterOptions,
        buffers: &Arena<Vec<u8>>,
        cancellation: &Cancellation,
    ) -> Result<PrefixedWriter, SortError> {
        let buffer = buffers.acquire(cancellation).await?;
        let file = cancellation
            .run(async {
                File::create(path)
                    .await
                    .io_context(|| format!("create: {}", path.display()))
            })
            .await?;

        if let Some(length) = options.required_length {
            cancellation
                .run(async {
                    file.set_len(length)
                        .await
                        .io_context(|| format!("set length {}: {}", length, path.display()))
                })
                .await?;
        }

        Ok(
            PrefixedWriter {
                path: path.to_path_buf(),
                writer: BufWriter::with_capacity(options.buffer_size.max(1), file),
                encoding,
                options,
                buffer,
                first: true,
                written: 0,
            }
        )
    }

    /// Write one record with its prefix. Returns the bytes written, prefix included.
    pub(crate) async fn write_record(&mut self, record: &str, cancellation: &Cancellation) -> Result<u64, SortError> {
        self.buffer.clear();
        if self.first {
            self.first = false;
            if self.options.write_preamble {
                self.buffer.extend_from_slice(self.encoding.preamble());
            }
        } else {
            self.buffer.extend_from_slice(self.encoding.new_line());
        }
        self.encoding.encode_into(record, &mut self.buffer)?;
        self.write_buffer(cancellation).await
    }

    /// Write a bare terminator, to reproduce a source that ends with one.
    pub(crate) async fn write_new_line(&mut self, cancellation: &Cancellation) -> Result<u64, SortError> {
        self.buffer.clear();
        self.buffer.extend_from_slice(self.encoding.new_line());
        self.write_buffer(cancellation).await
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and close. A requested preamble is still written when no record was, and a
    /// declared length is trimmed to the bytes actually written. Returns the file length.
    pub(crate) async fn finish(mut self, cancellation: &Cancellation) -> Result<u64, SortError> {
        if self.first && self.options.write_preamble {
            self.first = false;
            self.buffer.clear();
            self.buffer.extend_from_slice(self.encoding.preamble());
            self.write_buffer(cancellation).await?;
        }

        let path = self.path.clone();
        let written = self.written;
        let required_length = self.options.required_length;
        let writer = &mut self.writer;
        cancellation
            .run(async {
                writer.flush()
                    .await
                    .io_context(|| format!("flush: {}", path.display()))?;
                if required_length.is_some_and(|length| length != written) {
                    log::debug!("Trim {} from {:?} to {} bytes", path.display(), required_length, written);
                    writer.get_ref()
                        .set_len(written)
                        .await
                        .io_context(|| format!("set length {}: {}", written, path.display()))?;
                }
                Ok(())
            })
            .await?;
        Ok(written)
    }

    async fn write_buffer(&mut self, cancellation: &Cancellation) -> Result<u64, SortError> {
        let writer = &mut self.writer;
        let bytes = self.buffer.as_slice();
        let path = &self.path;
        cancellation
            .run(async move {
                writer.write_all(bytes)
                    .await
                    .io_context(|| format!("write: {}", path.display()))
            })
            .await?;
        let len = bytes.len() as u64;
        self.written += len;
        Ok(len)
    }
}
