//! Merge and dedup of per-source record files into canonical sets.
//!
//! Every per-source file is first sorted and deduplicated on its own, then a
//! streaming k-way merge drops adjacent duplicates. Only one source file is
//! held in memory at a time.

use anyhow::{Context, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::record::SourceResult;
use crate::utils::format_count;

/// A sorted, duplicate-free record file
#[derive(Debug, Clone)]
pub struct CanonicalSet {
    pub path: PathBuf,
    pub count: usize,
}

impl CanonicalSet {
    /// Iterate over the records in order
    pub fn lines(&self) -> Result<impl Iterator<Item = std::io::Result<String>>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {:?}", self.path))?;
        Ok(BufReader::new(file).lines())
    }
}

/// The canonical domain and IP sets of a run
#[derive(Debug, Clone)]
pub struct MergedSets {
    pub domains: CanonicalSet,
    pub ips: CanonicalSet,
}

/// Sort and dedup `input` into `output`, skipping blank lines.
///
/// Returns the number of records written.
pub fn sort_unique_file(input: &Path, output: &Path) -> Result<usize> {
    let content =
        fs::read_to_string(input).with_context(|| format!("Failed to read {:?}", input))?;

    let mut lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.sort_unstable();
    lines.dedup();

    let file = File::create(output).with_context(|| format!("Failed to create {:?}", output))?;
    let mut writer = BufWriter::new(file);
    for line in &lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(lines.len())
}

/// k-way merge of sorted files into `output`, dropping duplicates.
///
/// Returns the number of records written.
pub fn merge_sorted_files(inputs: &[PathBuf], output: &Path) -> Result<usize> {
    let mut readers: Vec<Lines<BufReader<File>>> = Vec::with_capacity(inputs.len());
    for path in inputs {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        readers.push(BufReader::new(file).lines());
    }

    let mut heap = BinaryHeap::new();
    for (index, reader) in readers.iter_mut().enumerate() {
        if let Some(line) = reader.next() {
            heap.push(Reverse((line?, index)));
        }
    }

    let file = File::create(output).with_context(|| format!("Failed to create {:?}", output))?;
    let mut writer = BufWriter::new(file);
    let mut last: Option<String> = None;
    let mut count = 0;

    while let Some(Reverse((line, index))) = heap.pop() {
        if let Some(next) = readers[index].next() {
            heap.push(Reverse((next?, index)));
        }

        if line.is_empty() || last.as_deref() == Some(line.as_str()) {
            continue;
        }

        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        count += 1;
        last = Some(line);
    }
    writer.flush()?;

    Ok(count)
}

/// Build one canonical set from unsorted per-source files.
///
/// Intermediate sorted files are written next to `output`.
pub fn merge_files(inputs: &[PathBuf], output: &Path) -> Result<CanonicalSet> {
    let scratch = output.with_extension("parts");
    fs::create_dir_all(&scratch)
        .with_context(|| format!("Failed to create directory {:?}", scratch))?;

    let mut sorted = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let part = scratch.join(format!("{}.sorted", i));
        let n = sort_unique_file(input, &part)?;
        debug!("Sorted {:?}: {} records", input, n);
        sorted.push(part);
    }

    let count = merge_sorted_files(&sorted, output)?;
    remove_scratch(&scratch);

    Ok(CanonicalSet {
        path: output.to_path_buf(),
        count,
    })
}

/// Remove an intermediate directory, logging instead of failing the merge
fn remove_scratch(dir: &Path) -> bool {
    match fs::remove_dir_all(dir) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to remove scratch directory {:?}: {}", dir, e);
            false
        }
    }
}

/// Merge every source result into the run's canonical sets.
pub fn merge_results(results: &[SourceResult], merged_dir: &Path) -> Result<MergedSets> {
    let domain_files: Vec<PathBuf> = results.iter().map(|r| r.domains_file.clone()).collect();
    let ip_files: Vec<PathBuf> = results.iter().map(|r| r.ips_file.clone()).collect();

    let domains = merge_files(&domain_files, &merged_dir.join("domains.list"))?;
    let ips = merge_files(&ip_files, &merged_dir.join("ips.list"))?;

    info!(
        "Merged {} unique domains and {} unique IPs",
        format_count(domains.count),
        format_count(ips.count)
    );

    Ok(MergedSets { domains, ips })
}
