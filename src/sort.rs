use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::arena::Arena;
use crate::cancellation::Cancellation;
use crate::chunk_reader::{Chunk, ChunkReader};
use crate::config::Config;
use crate::encoding::{Encoding, NEW_LINE};
use crate::error::{join_error, IoContext, SortError};
use crate::file_names::FileNameAllocator;
use crate::merge_cursor::{Advance, MergeCursor};
use crate::prefixed_writer::{PrefixedWriter, WriterOptions};
use crate::record::{compare_at, Record, MAX_RECORD_LENGTH};
use crate::run_file::RunFile;
use crate::sort_command::SortCommand;
use crate::working_set::WorkingSet;

/// Outcome of a successful sort.
#[derive(Debug, Clone)]
pub struct SortReport {
    output: PathBuf,
    run_files: usize,
    records: u64,
}

impl SortReport {
    /// The sorted file.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Number of sorted runs written by the split phase.
    pub fn run_files(&self) -> usize {
        self.run_files
    }

    /// Number of records in the input.
    pub fn records(&self) -> u64 {
        self.records
    }
}

/// Sort a record file larger than memory.
///
/// The input is read in chunks of [Sort::with_chunk_capacity] records. Each chunk is sorted
/// and written to a run file in the working directory while the next chunk is read. All
/// run files are then merged into a single output file and deleted.
///
/// # Examples
/// ```no_run
/// use std::path::PathBuf;
/// use record_file_sort::sort::Sort;
///
/// async fn sort_records(input: PathBuf, tmp: PathBuf) -> Result<PathBuf, anyhow::Error> {
///     let mut sort = Sort::new(input);
///     // records per run file
///     sort.with_chunk_capacity(1_000_000);
///     // run files and the output go here, preferably on the same file system as the input
///     sort.with_working_dir(tmp);
///     Ok(sort.sort().await?)
/// }
/// ```
pub struct Sort {
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

impl Sort {
    /// Create a default Sort definition.
    ///
    /// * run files and the output go to the directory of the input
    /// * input is UTF-8, a leading byte order mark is detected and reproduced
    /// * 100 000 records per run file
    /// * one chunk buffer per CPU core, which also bounds the number of concurrent chunk sorts
    /// * read buffer and run file write buffer of 1 MiB
    /// * merge read buffer of 64 KiB per run file, merge write buffer of 16 MiB
    /// * run files are opened for the merge 16 at a time
    ///
    /// The merge holds every run file open at once. The soft limit on open files is raised
    /// for the duration of the merge to accommodate them.
    pub fn new(input: PathBuf) -> Sort {
        Sort {
            input,
            working_directory: None,
            output: None,
            encoding: Encoding::Utf8,
            chunk_capacity: 100_000,
            chunk_buffers: num_cpus::get(),
            read_buffer_size: 0x100_000,
            write_buffer_size: 0x100_000,
            merge_read_buffer_size: 0x10_000,
            merge_write_buffer_size: 0x1_000_000,
            open_concurrency: 16,
            detect_preamble: true,
            cancellation: Cancellation::new(),
        }
    }

    /// Set the directory for run files and the merged output. The directory must exist.
    pub fn with_working_dir(&mut self, working_directory: PathBuf) {
        self.working_directory = Some(working_directory);
    }

    /// Rename the merged output to `output` once the sort succeeds.
    pub fn with_output(&mut self, output: PathBuf) {
        self.output = Some(output);
    }

    pub fn with_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    /// Set the number of records sorted in memory and written to one run file.
    pub fn with_chunk_capacity(&mut self, chunk_capacity: usize) {
        self.chunk_capacity = chunk_capacity;
    }

    /// Set the number of chunks in circulation. Reading stalls while all of them are being
    /// sorted or written. Memory use is roughly `chunk_buffers * chunk_capacity` records.
    pub fn with_chunk_buffers(&mut self, chunk_buffers: usize) {
        self.chunk_buffers = chunk_buffers;
    }

    pub fn with_read_buffer_size(&mut self, read_buffer_size: usize) {
        self.read_buffer_size = read_buffer_size;
    }

    pub fn with_write_buffer_size(&mut self, write_buffer_size: usize) {
        self.write_buffer_size = write_buffer_size;
    }

    pub fn with_merge_read_buffer_size(&mut self, merge_read_buffer_size: usize) {
        self.merge_read_buffer_size = merge_read_buffer_size;
    }

    pub fn with_merge_write_buffer_size(&mut self, merge_write_buffer_size: usize) {
        self.merge_write_buffer_size = merge_write_buffer_size;
    }

    /// Set how many run files are opened concurrently before the merge.
    pub fn with_open_concurrency(&mut self, open_concurrency: usize) {
        self.open_concurrency = open_concurrency;
    }

    /// Treat a leading byte order mark as a preamble rather than record data.
    pub fn with_detect_preamble(&mut self, detect_preamble: bool) {
        self.detect_preamble = detect_preamble;
    }

    pub fn with_cancellation(&mut self, cancellation: Cancellation) {
        self.cancellation = cancellation;
    }

    /// Handle to cancel a running sort.
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Sort the input and return the path of the sorted file.
    pub async fn sort(&self) -> Result<PathBuf, SortError> {
        self.sort_with_report().await.map(|report| report.output)
    }

    /// Same as [Sort::sort], with statistics.
    pub async fn sort_with_report(&self) -> Result<SortReport, SortError> {
        let config = self.create_config();
        Self::internal_sort(&config).await
    }

    /// Check that the input is sorted.
    pub async fn check(&self) -> Result<bool, SortError> {
        let config = self.create_config();
        let chunks: Arc<Arena<Chunk>> = Arc::new(Arena::new(1, Vec::new));
        let mut reader = ChunkReader::open(
            config.input(),
            config.encoding(),
            config.chunk_capacity(),
            config.read_buffer_size(),
            config.detect_preamble(),
            chunks,
        )
            .await?;

        let mut previous: Option<Record> = None;
        while let Some(mut chunk) = reader.next_chunk(config.cancellation()).await? {
            for record in chunk.drain(..) {
                if let Some(previous) = &previous {
                    let ordering = compare_at(previous.line(), previous.separator(), record.line(), record.separator())?;
                    if ordering.is_gt() {
                        return Ok(false);
                    }
                }
                previous = Some(record);
            }
        }
        Ok(true)
    }

    fn create_config(&self) -> Config {
        Config::new(
            self.input.clone(),
            self.working_directory.clone(),
            self.output.clone(),
            self.encoding,
            self.chunk_capacity,
            self.chunk_buffers,
            self.read_buffer_size,
            self.write_buffer_size,
            self.merge_read_buffer_size,
            self.merge_write_buffer_size,
            self.open_concurrency,
            self.detect_preamble,
            self.cancellation.clone(),
        )
    }

    async fn internal_sort(config: &Config) -> Result<SortReport, SortError> {
        log::info!("Start sort of {}", config.input().display());
        let source_length = tokio::fs::metadata(config.input())
            .await
            .io_context(|| format!("path: {}", config.input().display()))?
            .len();
        let file_names = Arc::new(FileNameAllocator::new(config.input(), config.working_directory()));

        let (deletions, pending_deletions) = mpsc::unbounded_channel();
        let cleanup = tokio::spawn(Self::delete_files(pending_deletions));

        let mut run_files = Vec::new();
        let started = Instant::now();
        let result = match Self::split(config, &file_names, source_length, &mut run_files).await {
            Ok(framing) => {
                log::info!(
                    "Split to {} files / {} lines in {:?}",
                    run_files.len(),
                    framing.lines,
                    started.elapsed()
                );
                let started = Instant::now();
                let merged = Self::merge(config, &file_names, &run_files, &framing, source_length, &deletions).await;
                if merged.is_ok() {
                    log::info!("Merge {} files in {:?}", run_files.len(), started.elapsed());
                }
                merged.map(|output| (output, framing.lines))
            }
            Err(e) => Err(e),
        };

        if result.is_err() {
            for run_file in &run_files {
                let _ = deletions.send(run_file.path().to_path_buf());
            }
        }
        drop(deletions);
        cleanup.await.map_err(join_error)?;

        let (mut output, records) = result?;
        if let Some(target) = config.output() {
            let renamed = tokio::fs::rename(&output, target)
                .await
                .io_context(|| format!("rename {} to {}", output.display(), target.display()));
            if let Err(e) = renamed {
                if let Err(remove_error) = tokio::fs::remove_file(&output).await {
                    log::warn!("Failed to remove output {}: {}", output.display(), remove_error);
                }
                return Err(e);
            }
            output = target.to_path_buf();
        }
        log::info!("Finish sort of {}, sorted as {}", config.input().display(), output.display());
        Ok(
            SortReport {
                output,
                run_files: run_files.len(),
                records,
            }
        )
    }

    async fn split(
        config: &Config,
        file_names: &Arc<FileNameAllocator>,
        source_length: u64,
        run_files: &mut Vec<RunFile>,
    ) -> Result<Framing, SortError> {
        let cancellation = config.cancellation();
        let chunks: Arc<Arena<Chunk>> = Arc::new(Arena::new(config.chunk_buffers(), Vec::new));
        let buffers: Arc<Arena<Vec<u8>>> = Arc::new(
            Arena::new(chunks.capacity(), || Vec::with_capacity(MAX_RECORD_LENGTH + NEW_LINE.len()))
        );
        let mut reader = ChunkReader::open(
            config.input(),
            config.encoding(),
            config.chunk_capacity(),
            config.read_buffer_size(),
            config.detect_preamble(),
            chunks,
        )
            .await?;

        let mut progress = Progress::new(source_length);
        let mut workers = JoinSet::new();
        let result = async {
            while let Some(chunk) = reader.next_chunk(cancellation).await? {
                let command = SortCommand::new(
                    chunk,
                    config.encoding(),
                    config.write_buffer_size(),
                    file_names.clone(),
                    buffers.clone(),
                    cancellation.clone(),
                );
                workers.spawn(command.execute());
                // sort and save while the next chunk is read
                while let Some(joined) = workers.try_join_next() {
                    Self::saved(joined, run_files, &mut progress)?;
                }
            }
            while let Some(joined) = workers.join_next().await {
                Self::saved(joined, run_files, &mut progress)?;
            }
            Ok::<(), SortError>(())
        }
            .await;

        if let Err(e) = result {
            // let the stragglers finish so that their run files get cleaned up
            while let Some(joined) = workers.join_next().await {
                if let Ok(Ok(run_file)) = joined {
                    run_files.push(run_file);
                }
            }
            return Err(e);
        }

        Ok(
            Framing {
                has_preamble: reader.has_preamble(),
                ends_with_new_line: reader.ends_with_new_line(),
                lines: reader.lines(),
            }
        )
    }

    fn saved(
        joined: Result<Result<RunFile, SortError>, JoinError>,
        run_files: &mut Vec<RunFile>,
        progress: &mut Progress,
    ) -> Result<(), SortError> {
        let run_file = joined.map_err(join_error)??;
        if let Some(percent) = progress.advance(run_file.length()) {
            log::info!(
                "Saved [{:>3}%] {} [{} records, {} bytes]",
                percent,
                run_file.path().display(),
                run_file.records(),
                run_file.length()
            );
        }
        run_files.push(run_file);
        Ok(())
    }

    async fn merge(
        config: &Config,
        file_names: &FileNameAllocator,
        run_files: &[RunFile],
        framing: &Framing,
        source_length: u64,
        deletions: &UnboundedSender<PathBuf>,
    ) -> Result<PathBuf, SortError> {
        let limits = raise_open_files_limit(run_files.len())?;
        let merged = Self::internal_merge(config, file_names, run_files, framing, source_length, deletions).await;
        if let Err(e) = restore_open_files_limit(limits) {
            log::warn!("{}", e);
        }
        merged
    }

    async fn internal_merge(
        config: &Config,
        file_names: &FileNameAllocator,
        run_files: &[RunFile],
        framing: &Framing,
        source_length: u64,
        deletions: &UnboundedSender<PathBuf>,
    ) -> Result<PathBuf, SortError> {
        let cancellation = config.cancellation();
        let cursors = Self::open_cursors(config, run_files, deletions).await?;
        let mut working_set = WorkingSet::new(cursors);
        log::info!("Merging {} sorted files", working_set.len());

        let output = file_names.next_path();
        let buffers: Arena<Vec<u8>> = Arena::new(1, || Vec::with_capacity(MAX_RECORD_LENGTH + NEW_LINE.len()));
        // the output is a permutation of the input
        let options = WriterOptions::new(config.merge_write_buffer_size())
            .with_preamble(framing.has_preamble)
            .with_required_length(source_length);
        let mut writer = PrefixedWriter::create(&output, config.encoding(), options, &buffers, cancellation).await?;

        let merged = async {
            let mut progress = Progress::new(source_length);
            while let Some(cursor) = working_set.pop_min() {
                let (written, advance) = cursor.emit(&mut writer, cancellation).await?;
                match advance {
                    Advance::Current(cursor) => working_set.insert(cursor),
                    Advance::Exhausted(path) => {
                        let _ = deletions.send(path);
                    }
                }
                if let Some(percent) = progress.advance(written) {
                    if percent % 10 == 0 {
                        log::info!("Merged {:>3}%", percent);
                    }
                }
            }
            if framing.ends_with_new_line {
                writer.write_new_line(cancellation).await?;
            }
            log::debug!("Merged {} bytes into {}", writer.written(), writer.path().display());
            writer.finish(cancellation).await
        }
            .await;

        match merged {
            Ok(_) => Ok(output),
            Err(e) => {
                drop(working_set);
                if let Err(remove_error) = tokio::fs::remove_file(&output).await {
                    log::warn!("Failed to remove incomplete output {}: {}", output.display(), remove_error);
                }
                Err(e)
            }
        }
    }

    async fn open_cursors(
        config: &Config,
        run_files: &[RunFile],
        deletions: &UnboundedSender<PathBuf>,
    ) -> Result<Vec<MergeCursor>, SortError> {
        let permits = Arc::new(Semaphore::new(config.open_concurrency()));
        let mut opening = JoinSet::new();
        for run_file in run_files {
            let permits = permits.clone();
            let path = run_file.path().to_path_buf();
            let encoding = config.encoding();
            let buffer_size = config.merge_read_buffer_size();
            let cancellation = config.cancellation().clone();
            opening.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|_| SortError::Cancelled)?;
                MergeCursor::open(path, encoding, buffer_size, &cancellation).await
            });
        }

        let mut cursors = Vec::with_capacity(run_files.len());
        while let Some(joined) = opening.join_next().await {
            match joined.map_err(join_error)?? {
                Advance::Current(cursor) => cursors.push(cursor),
                Advance::Exhausted(path) => {
                    let _ = deletions.send(path);
                }
            }
        }
        Ok(cursors)
    }

    async fn delete_files(mut paths: UnboundedReceiver<PathBuf>) {
        while let Some(path) = paths.recv().await {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => log::debug!("Deleted {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Error deleting file {}: {}", path.display(), e),
            }
        }
    }
}

/// What the output needs to reproduce from the input framing.
struct Framing {
    has_preamble: bool,
    ends_with_new_line: bool,
    lines: u64,
}

/// Percent of `total` bytes processed.
struct Progress {
    total: u64,
    current: u64,
    percent: u64,
}

impl Progress {
    fn new(total: u64) -> Progress {
        Progress {
            total,
            current: 0,
            percent: 0,
        }
    }

    /// Add `bytes`, returning the new percentage when it changed.
    fn advance(&mut self, bytes: u64) -> Option<u64> {
        self.current += bytes;
        let percent = if self.current < self.total {
            self.current * 100 / self.total
        } else {
            100
        };
        if percent > self.percent {
            self.percent = percent;
            Some(percent)
        } else {
            None
        }
    }
}

#[cfg(unix)]
fn raise_open_files_limit(files: usize) -> Result<Option<(u64, u64)>, SortError> {
    use rlimit::{getrlimit, setrlimit, Resource};

    let (current_soft, current_hard) = getrlimit(Resource::NOFILE).io_context(|| "getrlimit NOFILE")?;
    let new_soft = ((files + 256) as u64).max(current_soft).min(current_hard);
    if new_soft == current_soft {
        return Ok(None);
    }
    log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
    setrlimit(Resource::NOFILE, new_soft, current_hard)
        .io_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard))?;
    Ok(Some((current_soft, current_hard)))
}

#[cfg(unix)]
fn restore_open_files_limit(limits: Option<(u64, u64)>) -> Result<(), SortError> {
    if let Some((soft, hard)) = limits {
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", soft, hard);
        rlimit::setrlimit(rlimit::Resource::NOFILE, soft, hard)
            .io_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn raise_open_files_limit(_files: usize) -> Result<Option<(u64, u64)>, SortError> {
    Ok(None)
}

#[cfg(not(unix))]
fn restore_open_files_limit(_limits: Option<(u64, u64)>) -> Result<(), SortError> {
    Ok(())
}
