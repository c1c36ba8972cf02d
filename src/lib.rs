//! This crate implements an external merge sort for files of numbered text records.
//!
//! Each line of the input is a record of the form `<number>. <text>`, for example
//! `415. Apple`. Records are ordered by their text, compared ordinally byte by byte, and
//! records with equal text are ordered by their number. The number is an unsigned 64 bit
//! integer and the text is at most 1024 characters long.
//!
//! Inputs are expected to be much larger than memory. The input is split into chunks that
//! are sorted concurrently and persisted as run files, which are then merged into the output
//! with a k-way merge. Memory use is bounded by the number and capacity of chunk buffers in
//! circulation.
//!
//! # Examples
//! ```no_run
//! use std::path::PathBuf;
//! use record_file_sort::sort::Sort;
//!
//! // optimized for use with Jemalloc
//! use tikv_jemallocator::Jemalloc;
//! #[global_allocator]
//! static GLOBAL: Jemalloc = Jemalloc;
//!
//! fn sort_records(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut sort = Sort::new(input);
//!
//!     // set the number of records sorted in memory at once. Larger chunks produce fewer
//!     // run files and a cheaper merge.
//!     sort.with_chunk_capacity(1_000_000);
//!
//!     // set the number of chunks in circulation, which also bounds the number of chunks
//!     // sorted concurrently. The default is the number of CPU cores.
//!     sort.with_chunk_buffers(4);
//!
//!     // set the directory for run files. The default is the directory of the input. For large
//!     // files it is recommended to use a directory on the same file system as the output.
//!     sort.with_working_dir(tmp);
//!     sort.with_output(output);
//!
//!     let runtime = tokio::runtime::Runtime::new()?;
//!     runtime.block_on(sort.sort())?;
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod arena;
pub(crate) mod chunk_reader;
pub(crate) mod config;
pub(crate) mod file_names;
pub(crate) mod merge_cursor;
pub(crate) mod prefixed_writer;
pub(crate) mod run_file;
pub(crate) mod sort_command;
pub(crate) mod working_set;

pub mod cancellation;
pub mod encoding;
pub mod error;
pub mod record;
pub mod sort;
