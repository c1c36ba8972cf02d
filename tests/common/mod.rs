use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::io::{BufRead, BufReader};
use std::fs::File;
use data_encoding::HEXLOWER;
use rand::Rng;
use rand::seq::SliceRandom;
use record_file_sort::encoding::NEW_LINE;

const WORDS: [&str; 12] = [
    "Apple", "Banana", "Cherry", "apple", "Something something something", "Zebra",
    "banana split", "", "a", "Apple pie", "Ωmega", "zebra crossing",
];

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();
    let parallel_results_dir_path = PathBuf::from_str("./target/parallel-results/").unwrap();

    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    }

    if !parallel_results_dir_path.exists() {
        fs::create_dir_all(&parallel_results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create parallel results directory: {:?}", parallel_results_dir_path)
        );
    }
}

#[allow(dead_code)]
pub fn read_lines(path: &Path) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

/// A fresh, empty directory under `dir`. Each test sorts in its own directory so that left
/// over run files can be detected.
#[allow(dead_code)]
pub fn temp_dir(dir: &str) -> Result<PathBuf, anyhow::Error> {
    let result = temp_file_name(dir);
    fs::create_dir_all(&result)?;
    Ok(result)
}

#[allow(dead_code)]
pub fn dir_entries(dir: &Path) -> Result<Vec<PathBuf>, anyhow::Error> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

/// `count` random records with plenty of duplicate texts and some duplicate numbers.
#[allow(dead_code)]
pub fn random_records(count: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let number: u64 = if rng.gen_bool(0.1) {
                rng.gen_range(0..10)
            } else {
                rng.gen()
            };
            let word = WORDS.choose(&mut rng).unwrap();
            let text = if rng.gen_bool(0.5) {
                word.to_string()
            } else {
                format!("{} {}", word, rng.gen_range(0..1000))
            };
            format!("{}. {}", number, text)
        })
        .collect()
}

/// Reference ordering: text ordinally, then number.
#[allow(dead_code)]
pub fn sorted(records: &[String]) -> Vec<String> {
    let mut result = records.to_vec();
    result.sort_by(|a, b| {
        let (a_number, a_text) = a.split_once(". ").unwrap();
        let (b_number, b_text) = b.split_once(". ").unwrap();
        a_text.as_bytes().cmp(b_text.as_bytes())
            .then(a_number.parse::<u64>().unwrap().cmp(&b_number.parse::<u64>().unwrap()))
    });
    result
}

#[allow(dead_code)]
pub fn write_records(path: &Path, records: &[String], final_new_line: bool) -> Result<(), anyhow::Error> {
    fs::write(path, join_records(records, final_new_line))?;
    Ok(())
}

#[allow(dead_code)]
pub fn join_records(records: &[String], final_new_line: bool) -> String {
    let mut content = records.join(NEW_LINE);
    if final_new_line && !records.is_empty() {
        content.push_str(NEW_LINE);
    }
    content
}
