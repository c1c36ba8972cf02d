use std::path::{Path, PathBuf};
use std::sync::Arc;

use memchr::memmem;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::arena::{Arena, Lease};
use crate::cancellation::Cancellation;
use crate::encoding::{Encoding, NEW_LINE};
use crate::error::{IoContext, SortError};
use crate::record::Record;

/// A batch of records read from the source. Chunks live in an [Arena] and are reused.
pub(crate) type Chunk = Vec<Record>;

/// Reads a record file as a sequence of chunks of at most `chunk_capacity` records.
///
/// Bytes are scanned for the line terminator incrementally: a window is only extended with
/// more bytes from the file when it holds no terminator, and bytes already scanned are not
/// scanned again. A chunk is taken from the arena before it is filled, so reading stalls
/// while every chunk is still being sorted and written.
pub(crate) struct ChunkReader {
    path: PathBuf,
    file: File,
    encoding: Encoding,
    detect_preamble: bool,
    chunk_capacity: usize,
    chunks: Arc<Arena<Chunk>>,
    buffer: Vec<u8>,
    // consumed bytes end here
    start: usize,
    // start..scanned holds no terminator
    scanned: usize,
    // valid bytes end here
    end: usize,
    preamble_checked: bool,
    eof: bool,
    finished: bool,
    has_preamble: bool,
    ends_with_new_line: bool,
    lines: u64,
}

impl ChunkReader {
    pub(crate) async fn open(
        path: &Path,
        encoding: Encoding,
        chunk_capacity: usize,
        buffer_size: usize,
        detect_preamble: bool,
        chunks: Arc<Arena<Chunk>>,
    ) -> Result<ChunkReader, SortError> {
        let file = File::open(path)
            .await
            .io_context(|| format!("path: {}", path.display()))?;
        Ok(
            ChunkReader {
                path: path.to_path_buf(),
                file,
                encoding,
                detect_preamble,
                chunk_capacity: chunk_capacity.max(1),
                chunks,
                buffer: vec![0; buffer_size.max(16)],
                start: 0,
                scanned: 0,
                end: 0,
                preamble_checked: false,
                eof: false,
                finished: false,
                has_preamble: false,
                ends_with_new_line: false,
                lines: 0,
            }
        )
    }

    /// The next chunk, or `None` once the source is exhausted. Never yields an empty chunk.
    ///
    /// The final chunk may hold a few more than `chunk_capacity` records when the bytes
    /// after the last terminator split into several records.
    pub(crate) async fn next_chunk(&mut self, cancellation: &Cancellation) -> Result<Option<Lease<Chunk>>, SortError> {
        if self.finished {
            return Ok(None);
        }

        let mut chunk = self.chunks.acquire(cancellation).await?;
        chunk.reserve(self.chunk_capacity);

        if !self.preamble_checked {
            self.read_preamble(cancellation).await?;
        }

        while chunk.len() < self.chunk_capacity {
            if let Some(line) = self.next_line()? {
                let record = self.record(line)?;
                chunk.push(record);
            } else if self.eof {
                self.read_residual(&mut chunk)?;
                self.finished = true;
                break;
            } else {
                self.fill(cancellation).await?;
            }
        }

        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }

    /// True when the source started with the encoding preamble.
    pub(crate) fn has_preamble(&self) -> bool {
        self.has_preamble
    }

    /// True when the last bytes of the source were a line terminator.
    pub(crate) fn ends_with_new_line(&self) -> bool {
        self.ends_with_new_line
    }

    pub(crate) fn lines(&self) -> u64 {
        self.lines
    }

    async fn read_preamble(&mut self, cancellation: &Cancellation) -> Result<(), SortError> {
        self.preamble_checked = true;
        let preamble = self.encoding.preamble();
        if !self.detect_preamble || preamble.is_empty() {
            return Ok(());
        }

        while self.end - self.start < preamble.len() && !self.eof {
            self.fill(cancellation).await?;
        }

        if self.buffer[self.start..self.end].starts_with(preamble) {
            self.start += preamble.len();
            self.scanned = self.start;
            self.has_preamble = true;
        }
        Ok(())
    }

    fn next_line(&mut self) -> Result<Option<String>, SortError> {
        let new_line = self.encoding.new_line();
        match memmem::find(&self.buffer[self.scanned..self.end], new_line) {
            Some(index) => {
                let at = self.scanned + index;
                let line = self.encoding.decode(&self.buffer[self.start..at])?;
                self.start = at + new_line.len();
                self.scanned = self.start;
                self.ends_with_new_line = true;
                Ok(Some(line))
            }
            None => {
                // a terminator may straddle the end of the window
                self.scanned = self.start.max(self.end.saturating_sub(new_line.len() - 1));
                Ok(None)
            }
        }
    }

    // Bytes after the last terminator. Split on the terminator characters, dropping empty
    // fragments.
    fn read_residual(&mut self, chunk: &mut Chunk) -> Result<(), SortError> {
        if self.start < self.end {
            self.ends_with_new_line = false;
            let text = self.encoding.decode(&self.buffer[self.start..self.end])?;
            self.start = self.end;
            self.scanned = self.end;
            for part in text.split(|c: char| NEW_LINE.contains(c)).filter(|part| !part.is_empty()) {
                let record = self.record(part.to_string())?;
                chunk.push(record);
            }
        }
        Ok(())
    }

    async fn fill(&mut self, cancellation: &Cancellation) -> Result<(), SortError> {
        if self.start > 0 {
            self.buffer.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.scanned -= self.start;
            self.start = 0;
        }

        if self.end == self.buffer.len() {
            // a single record does not fit
            let len = self.buffer.len();
            self.buffer.resize(len * 2, 0);
        }

        let file = &mut self.file;
        let window = &mut self.buffer[self.end..];
        let path = &self.path;
        let read = cancellation
            .run(async move {
                file.read(window)
                    .await
                    .io_context(|| format!("path: {}", path.display()))
            })
            .await?;

        if read == 0 {
            self.eof = true;
        } else {
            self.end += read;
        }
        Ok(())
    }

    fn record(&mut self, line: String) -> Result<Record, SortError> {
        self.lines += 1;
        let line_number = self.lines;
        let path = &self.path;
        Record::new(line).map_err(|e| match e {
            SortError::Format { record, reason } => {
                SortError::Format {
                    record,
                    reason: format!("{}, file: {}, line: {}", reason, path.display(), line_number),
                }
            }
            other => other,
        })
    }
}
