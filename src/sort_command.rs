use std::sync::Arc;

use crate::arena::{Arena, Lease};
use crate::cancellation::Cancellation;
use crate::chunk_reader::Chunk;
use crate::encoding::Encoding;
use crate::error::{join_error, SortError};
use crate::file_names::FileNameAllocator;
use crate::prefixed_writer::{PrefixedWriter, WriterOptions};
use crate::run_file::RunFile;

/// Sorts one chunk and persists it as a run file.
///
/// The chunk goes back to its arena once its records are on disk, which lets the reader
/// fill the next one.
pub(crate) struct SortCommand {
    chunk: Lease<Chunk>,
    encoding: Encoding,
    buffer_size: usize,
    file_names: Arc<FileNameAllocator>,
    buffers: Arc<Arena<Vec<u8>>>,
    cancellation: Cancellation,
}

impl SortCommand {
    pub(crate) fn new(
        chunk: Lease<Chunk>,
        encoding: Encoding,
        buffer_size: usize,
        file_names: Arc<FileNameAllocator>,
        buffers: Arc<Arena<Vec<u8>>>,
        cancellation: Cancellation,
    ) -> SortCommand {
        SortCommand {
            chunk,
            encoding,
            buffer_size,
            file_names,
            buffers,
            cancellation,
        }
    }

    pub(crate) async fn execute(self) -> Result<RunFile, SortError> {
        let SortCommand {
            chunk,
            encoding,
            buffer_size,
            file_names,
            buffers,
            cancellation,
        } = self;

        let chunk = tokio::task::spawn_blocking(move || {
            let mut chunk = chunk;
            chunk.sort_unstable();
            chunk
        })
            .await
            .map_err(join_error)?;

        let path = file_names.next_path();
        let records = chunk.len();
        let written = async {
            let mut writer = PrefixedWriter::create(&path, encoding, WriterOptions::new(buffer_size), &buffers, &cancellation).await?;
            for record in chunk.iter() {
                writer.write_record(record.line(), &cancellation).await?;
            }
            writer.finish(&cancellation).await
        }
            .await;
        drop(chunk);

        match written {
            Ok(length) => {
                log::debug!("Saved {} records to {}, {} bytes", records, path.display(), length);
                Ok(RunFile::new(path, records, length))
            }
            Err(e) => {
                if let Err(remove_error) = tokio::fs::remove_file(&path).await {
                    log::warn!("Failed to remove incomplete run file {}: {}", path.display(), remove_error);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::arena::Arena;
    use crate::cancellation::Cancellation;
    use crate::chunk_reader::Chunk;
    use crate::encoding::{Encoding, NEW_LINE};
    use crate::file_names::FileNameAllocator;
    use crate::record::Record;
    use crate::sort_command::SortCommand;

    #[tokio::test]
    async fn test_execute() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let cancellation = Cancellation::new();
        let chunks: Arc<Arena<Chunk>> = Arc::new(Arena::new(1, Vec::new));
        let buffers: Arc<Arena<Vec<u8>>> = Arc::new(Arena::new(1, Vec::new));
        let file_names = Arc::new(FileNameAllocator::new(&dir.path().join("input.txt"), None));

        let mut chunk = chunks.acquire(&cancellation).await?;
        for line in ["5. banana", "9. apple", "1. apple"] {
            chunk.push(Record::new(line.to_string())?);
        }
        let command = SortCommand::new(chunk, Encoding::Utf8, 64, file_names, buffers.clone(), cancellation.clone());
        let run_file = command.execute().await?;

        assert_eq!(run_file.path(), dir.path().join("input-1.txt"));
        assert_eq!(run_file.records(), 3);
        let content = std::fs::read_to_string(run_file.path())?;
        assert_eq!(content, ["1. apple", "9. apple", "5. banana"].join(NEW_LINE));
        assert_eq!(run_file.length(), content.len() as u64);
        assert_eq!(chunks.available(), 1);
        assert_eq!(buffers.available(), 1);
        Ok(())
    }
}
