use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cancellation::Cancellation;
use crate::encoding::Encoding;
use crate::error::{IoContext, SortError};
use crate::prefixed_writer::PrefixedWriter;
use crate::record::Record;

/// Outcome of opening or advancing a cursor.
pub(crate) enum Advance {
    /// The cursor holds an unread record.
    Current(MergeCursor),
    /// The run file is exhausted and closed. Its path is ready for deletion.
    Exhausted(PathBuf),
}

/// Read position over one open run file during the merge.
///
/// A cursor always holds a current record. Its separator index and number are cached in
/// the [Record], so comparing cursors never rescans a line.
#[derive(Debug)]
pub(crate) struct MergeCursor {
    path: PathBuf,
    reader: BufReader<File>,
    encoding: Encoding,
    current: Record,
    line: Vec<u8>,
}

impl MergeCursor {
    /// Open `path` and read its first record. An empty run file never becomes a cursor.
    pub(crate) async fn open(
        path: PathBuf,
        encoding: Encoding,
        buffer_size: usize,
        cancellation: &Cancellation,
    ) -> Result<Advance, SortError> {
        let file = cancellation
            .run(async {
                File::open(&path)
                    .await
                    .io_context(|| format!("open: {}", path.display()))
            })
            .await?;
        let mut reader = BufReader::with_capacity(buffer_size.max(1), file);
        let mut line = Vec::new();
        match Self::read_record(&mut reader, &mut line, encoding, &path, cancellation).await? {
            Some(current) => {
                Ok(
                    Advance::Current(
                        MergeCursor {
                            path,
                            reader,
                            encoding,
                            current,
                            line,
                        }
                    )
                )
            }
            None => Ok(Advance::Exhausted(path)),
        }
    }

    pub(crate) fn current(&self) -> &Record {
        &self.current
    }

    /// Write the current record to `writer` while reading the next one.
    ///
    /// Returns the bytes written and the advanced cursor, or the path of the closed run file
    /// when it had no more records.
    pub(crate) async fn emit(
        mut self,
        writer: &mut PrefixedWriter,
        cancellation: &Cancellation,
    ) -> Result<(u64, Advance), SortError> {
        let MergeCursor {
            path,
            reader,
            encoding,
            current,
            line,
        } = &mut self;
        let (written, next) = tokio::join!(
            writer.write_record(current.line(), cancellation),
            Self::read_record(reader, line, *encoding, path.as_path(), cancellation)
        );
        let written = written?;
        match next? {
            Some(record) => {
                self.current = record;
                Ok((written, Advance::Current(self)))
            }
            None => Ok((written, Advance::Exhausted(self.close()))),
        }
    }

    /// Close the run file and give back its path.
    pub(crate) fn close(self) -> PathBuf {
        self.path
    }

    async fn read_record(
        reader: &mut BufReader<File>,
        line: &mut Vec<u8>,
        encoding: Encoding,
        path: &Path,
        cancellation: &Cancellation,
    ) -> Result<Option<Record>, SortError> {
        line.clear();
        let read = cancellation
            .run(async {
                reader.read_until(b'\n', line)
                    .await
                    .io_context(|| format!("read: {}", path.display()))
            })
            .await?;
        if read == 0 {
            return Ok(None);
        }

        let new_line = encoding.new_line();
        let bytes = line.strip_suffix(new_line).unwrap_or(line.as_slice());
        let record = Record::new(encoding.decode(bytes)?).map_err(|e| match e {
            SortError::Format { record, reason } => {
                SortError::Format {
                    record,
                    reason: format!("{}, file: {}", reason, path.display()),
                }
            }
            other => other,
        })?;
        Ok(Some(record))
    }
}

impl Eq for MergeCursor {}

impl PartialEq<Self> for MergeCursor {
    fn eq(&self, other: &Self) -> bool {
        self.current().eq(other.current())
    }
}

impl PartialOrd<Self> for MergeCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.current().cmp(other.current())
    }
}
