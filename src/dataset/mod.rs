//! Directory loading and (input, target) pattern pairing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::image::ImageTensor;

/// Tensors of one directory keyed by file name.
pub type DataSet = BTreeMap<String, ImageTensor>;

/// A training example: an input tensor and the tensor it should map to.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    /// File name shared by both directories.
    pub key: String,
    pub input: ImageTensor,
    pub target: ImageTensor,
}

/// List the names of the regular files in `dir`, sorted.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_files<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|source| Error::io(dir, source))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::io(dir, source))?;
        if !entry.path().is_file() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => tracing::warn!("Skipping non UTF-8 file name {name:?}"),
        }
    }

    names.sort();
    Ok(names)
}

/// Decode every file in `dir` with `decode`.
///
/// Files that fail to decode are logged and left out. With `parallel` the
/// files are decoded on the rayon pool; results are merged into one map.
///
/// # Errors
///
/// Returns an error only if the directory itself cannot be listed.
pub fn load_directory<P, F>(dir: P, decode: F, parallel: bool) -> Result<DataSet>
where
    P: AsRef<Path>,
    F: Fn(&Path) -> Result<ImageTensor> + Sync,
{
    let dir = dir.as_ref();
    let names = list_files(dir)?;

    tracing::info!("Loading {} files from {}", names.len(), dir.display());

    let pb = ProgressBar::new(names.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Decoding [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let load = |name: &String| -> Option<(String, ImageTensor)> {
        let path = dir.join(name);
        let result = decode(&path);
        pb.inc(1);

        match result {
            Ok(tensor) => Some((name.clone(), tensor)),
            Err(err) => {
                tracing::warn!("{} can't be decoded, skipping: {err}", path.display());
                None
            }
        }
    };

    let set: DataSet = if parallel {
        names.par_iter().filter_map(load).collect()
    } else {
        names.iter().filter_map(load).collect()
    };

    pb.finish_and_clear();

    tracing::info!(
        "Decoded {}/{} files from {}",
        set.len(),
        names.len(),
        dir.display()
    );

    Ok(set)
}

/// Pair the entries of `learn` and `answer` that share a file name.
///
/// Patterns come out in ascending key order. Keys present in only one set
/// are logged and dropped.
#[must_use]
pub fn pair(learn: DataSet, mut answer: DataSet) -> Vec<Pattern> {
    let mut patterns = Vec::with_capacity(learn.len().min(answer.len()));

    for (key, input) in learn {
        let Some(target) = answer.remove(&key) else {
            tracing::warn!("can't find answer for {key}");
            continue;
        };

        patterns.push(Pattern { key, input, target });
    }

    for key in answer.keys() {
        tracing::warn!("can't find input for {key}");
    }

    tracing::info!("Built {} patterns", patterns.len());
    patterns
}
