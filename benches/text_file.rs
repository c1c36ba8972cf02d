use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Error};
use benchmark_rs::benchmarks::Benchmarks;
use benchmark_rs::stopwatch::StopWatch;
use data_encoding::HEXLOWER;
use rand::Rng;
use simple_logger::SimpleLogger;

use record_file_sort::encoding::NEW_LINE;
use record_file_sort::sort::Sort;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const WORDS: [&str; 8] = [
    "Apple", "Banana is yellow", "Cherry is the best", "Something something something",
    "apple", "Zebra", "zebra crossing", "Ωmega",
];

#[derive(Clone)]
pub struct BenchmarkConfig {
    files: BTreeMap<usize, PathBuf>,
    bench_results_dir: PathBuf,
    chunk_buffers: usize,
    chunk_capacity: usize,
    description: String,
}

impl BenchmarkConfig {
    pub fn new(files: BTreeMap<usize, PathBuf>, bench_results_dir: PathBuf, chunk_buffers: usize, chunk_capacity: usize, description: &str) -> BenchmarkConfig {
        BenchmarkConfig {
            files,
            bench_results_dir,
            chunk_buffers,
            chunk_capacity,
            description: description.to_string(),
        }
    }

    pub fn get_input_path(&self, key: usize) -> PathBuf {
        self.files.get(&key).unwrap().clone()
    }

    pub fn bench_results_dir(&self) -> &PathBuf {
        &self.bench_results_dir
    }

    pub fn chunk_buffers(&self) -> usize {
        self.chunk_buffers
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }
}

impl Display for BenchmarkConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "chunk buffers: {}, chunk capacity: {}, description: {}",
                 self.chunk_buffers,
                 self.chunk_capacity,
                 self.description,
        )
    }
}

fn temp_file_name(dir: &PathBuf) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

fn cleanup(bench_results_dir: &PathBuf) -> Result<(), anyhow::Error> {
    if bench_results_dir.exists() {
        fs::remove_dir_all(bench_results_dir.clone()).with_context(|| anyhow!("{}", bench_results_dir.to_string_lossy()))?;
    }
    Ok(())
}

fn setup(bench_input_dir: &PathBuf, bench_results_dir: &PathBuf) -> Result<(), anyhow::Error> {
    cleanup(bench_results_dir)?;

    if !bench_input_dir.exists() {
        fs::create_dir_all(bench_input_dir.clone())?;
    }

    if !bench_results_dir.exists() {
        fs::create_dir_all(bench_results_dir.clone())
            .with_context(|| anyhow!("{}", bench_results_dir.to_string_lossy()))?;
    }

    Ok(())
}

fn create_input_files(count: usize, factor: usize, base_path: PathBuf) -> Result<BTreeMap<usize, PathBuf>, anyhow::Error> {
    let mut files: BTreeMap<usize, PathBuf> = BTreeMap::new();
    let mut rng = rand::thread_rng();
    for i in 1..=count {
        let number_of_lines = i * factor;
        let path = base_path.join(PathBuf::from(number_of_lines.to_string()));
        if !path.exists() {
            let mut writer = BufWriter::new(
                File::create(&path)
                    .with_context(|| anyhow!("path: {}", path.to_string_lossy()))?);
            for _j in 0..number_of_lines {
                let number: u64 = rng.gen_range(0..1_000_000);
                let word = WORDS[rng.gen_range(0..WORDS.len())];
                write!(writer, "{}. {} {}{}", number, word, rng.gen_range(0..100_000), NEW_LINE)?;
            }
            writer.flush()?;
        }
        files.insert(number_of_lines, path);
    }
    Ok(files)
}

fn sort(stop_watch: &mut StopWatch, config: BenchmarkConfig, work: usize) -> Result<(), anyhow::Error> {
    stop_watch.pause();
    let input_path = config.get_input_path(work);
    let output_path = temp_file_name(config.bench_results_dir());
    let runtime = tokio::runtime::Runtime::new()?;
    log::info!("Start sorting {}", input_path.to_string_lossy());
    stop_watch.resume();
    let mut record_file_sort = Sort::new(input_path.clone());
    record_file_sort.with_working_dir(config.bench_results_dir().clone());
    record_file_sort.with_output(output_path.clone());
    record_file_sort.with_chunk_buffers(config.chunk_buffers());
    record_file_sort.with_chunk_capacity(config.chunk_capacity());
    runtime.block_on(record_file_sort.sort())?;
    stop_watch.pause();
    log::info!("Finish sorting {}", input_path.to_string_lossy());
    fs::remove_file(output_path.clone())
        .with_context(|| anyhow!("{}", output_path.to_string_lossy()))?;
    Ok(())
}

#[test]
fn record_file_sort_bench() -> Result<(), Error> {
    SimpleLogger::new().init().unwrap();
    log::info!("Started record_file_sort_bench.");

    let bench_input_dir = PathBuf::from("./target/benchmarks/input");
    let bench_results_dir = PathBuf::from("./target/benchmarks/results");
    setup(&bench_input_dir, &bench_results_dir)?;

    let small_files = create_input_files(10, 100_000, bench_input_dir.clone())?;
    let large_files = create_input_files(5, 2_000_000, bench_input_dir.clone())?;

    let mut benchmarks = Benchmarks::new("record-file-sort");

    for chunk_buffers in [1, 2, 4, 8] {
        benchmarks.add(
            &format!("small-files-{}-buffers", chunk_buffers),
            sort,
            BenchmarkConfig::new(
                small_files.clone(),
                bench_results_dir.clone(),
                chunk_buffers,
                100_000,
                "small files",
            ),
            small_files.keys().cloned().collect(),
            3,
            0,
        )?;
    }

    for chunk_capacity in [100_000, 1_000_000] {
        benchmarks.add(
            &format!("large-files-{}-records", chunk_capacity),
            sort,
            BenchmarkConfig::new(
                large_files.clone(),
                bench_results_dir.clone(),
                num_cpus::get(),
                chunk_capacity,
                "large files",
            ),
            large_files.keys().cloned().collect(),
            3,
            0,
        )?;
    }

    benchmarks.run()?;
    benchmarks.save_to_csv(PathBuf::from("./target/benchmarks/"), true, true)?;
    benchmarks.save_to_json(PathBuf::from("./target/benchmarks/"))?;
    cleanup(&bench_results_dir)?;

    log::info!("Finished record_file_sort_bench.");
    Ok(())
}
