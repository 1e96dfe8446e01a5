//! On-disk format for an index/metadata pair.
//!
//! Both files are JSON. Writes go to temporary files in the destination
//! directory and are renamed into place. The index file is the commit point:
//! it records the SHA-256 of the metadata bytes it was built with, so a reader
//! that catches the swap between the two renames sees a digest mismatch
//! instead of text attached to the wrong vectors.

use super::{FlatIndex, MetadataRecord};
use crate::error::{CoachError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Current index file layout version.
pub const INDEX_FORMAT_VERSION: u32 = 2;

/// Reads that land between the metadata and index renames are retried this often.
const SWAP_RETRIES: usize = 5;
const SWAP_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Serialized form of a [`FlatIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub format_version: u32,
    pub dimension: usize,
    /// Embedding model that produced the vectors.
    pub model: String,
    pub built_at: DateTime<Utc>,
    /// Hex SHA-256 of the metadata file written by the same build.
    pub metadata_sha256: String,
    pub vectors: Vec<Vec<f32>>,
}

/// A validated pair read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedPair {
    pub index: FlatIndex,
    pub metadata: Vec<MetadataRecord>,
    pub model: String,
    pub built_at: DateTime<Utc>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn write_temp(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".prev");
    PathBuf::from(name)
}

/// Keep the current metadata reachable under `backup` until the index swap succeeds.
fn backup_metadata(metadata_path: &Path, backup: &Path) -> Result<bool> {
    if !metadata_path.exists() {
        return Ok(false);
    }
    let _ = std::fs::remove_file(backup);
    if std::fs::hard_link(metadata_path, backup).is_err() {
        std::fs::copy(metadata_path, backup)?;
    }
    Ok(true)
}

/// Persist an index and its metadata, replacing any previous pair.
///
/// Both payloads are fully written before either destination is touched.
/// Metadata is renamed first and the index last; if the index rename fails
/// the previous metadata is put back.
pub fn save_pair(
    index_path: &Path,
    metadata_path: &Path,
    index: &FlatIndex,
    metadata: &[MetadataRecord],
    model: &str,
) -> Result<()> {
    if index.len() != metadata.len() {
        return Err(CoachError::InvalidInput(format!(
            "refusing to save {} vectors with {} metadata records",
            index.len(),
            metadata.len()
        )));
    }

    let metadata_bytes = serde_json::to_vec(metadata)?;
    let file = IndexFile {
        format_version: INDEX_FORMAT_VERSION,
        dimension: index.dimension(),
        model: model.to_string(),
        built_at: Utc::now(),
        metadata_sha256: sha256_hex(&metadata_bytes),
        vectors: index.vectors().to_vec(),
    };

    let index_tmp = write_temp(index_path, &serde_json::to_vec(&file)?)?;
    let metadata_tmp = write_temp(metadata_path, &metadata_bytes)?;

    let backup = backup_path(metadata_path);
    let had_previous = backup_metadata(metadata_path, &backup)?;

    if let Err(e) = metadata_tmp.persist(metadata_path) {
        if had_previous {
            let _ = std::fs::remove_file(&backup);
        }
        return Err(e.error.into());
    }

    if let Err(e) = index_tmp.persist(index_path) {
        warn!(
            "Index swap failed for {}; restoring previous metadata",
            index_path.display()
        );
        let restored = if had_previous {
            std::fs::rename(&backup, metadata_path)
        } else {
            std::fs::remove_file(metadata_path)
        };
        if let Err(restore_err) = restored {
            warn!("Could not restore {}: {}", metadata_path.display(), restore_err);
        }
        return Err(e.error.into());
    }

    if had_previous {
        let _ = std::fs::remove_file(&backup);
    }

    info!(
        "Saved {} vectors ({} dims) to {}",
        index.len(),
        index.dimension(),
        index_path.display()
    );
    Ok(())
}

/// Outcome of one attempt at reading both files.
enum Attempt {
    Loaded(LoadedPair),
    /// The metadata on disk belongs to a different build than the index.
    Swapping,
}

fn read_once(selector: &str, index_path: &Path, metadata_path: &Path) -> Result<Attempt> {
    for path in [index_path, metadata_path] {
        if !path.exists() {
            debug!("Missing {} for selector {}", path.display(), selector);
            return Err(CoachError::NotFound(format!(
                "{} ({} does not exist)",
                selector,
                path.display()
            )));
        }
    }

    let index_bytes = std::fs::read(index_path)?;
    let metadata_bytes = std::fs::read(metadata_path)?;

    let file: IndexFile = serde_json::from_slice(&index_bytes)
        .map_err(|e| CoachError::corrupt(selector, format!("{}: {}", index_path.display(), e)))?;

    if file.format_version != INDEX_FORMAT_VERSION {
        return Err(CoachError::corrupt(
            selector,
            format!("unsupported index format version {}", file.format_version),
        ));
    }

    if sha256_hex(&metadata_bytes) != file.metadata_sha256 {
        return Ok(Attempt::Swapping);
    }

    let metadata: Vec<MetadataRecord> = serde_json::from_slice(&metadata_bytes).map_err(|e| {
        CoachError::corrupt(selector, format!("{}: {}", metadata_path.display(), e))
    })?;

    if file.vectors.len() != metadata.len() {
        return Err(CoachError::corrupt(
            selector,
            format!(
                "index has {} vectors but metadata has {} records",
                file.vectors.len(),
                metadata.len()
            ),
        ));
    }

    let index = FlatIndex::from_vectors(file.dimension, file.vectors)
        .map_err(|e| CoachError::corrupt(selector, e.to_string()))?;

    Ok(Attempt::Loaded(LoadedPair {
        index,
        metadata,
        model: file.model,
        built_at: file.built_at,
    }))
}

/// Load and validate the pair for `selector`.
///
/// Fails with `NotFound` when either file is missing and with `CorruptIndex`
/// when the files cannot be parsed, disagree in length or dimension, or keep
/// belonging to different builds after a few retries.
pub fn load_pair(selector: &str, index_path: &Path, metadata_path: &Path) -> Result<LoadedPair> {
    for attempt in 0..SWAP_RETRIES {
        match read_once(selector, index_path, metadata_path)? {
            Attempt::Loaded(pair) => return Ok(pair),
            Attempt::Swapping => {
                debug!("Pair for {} is mid-swap (attempt {})", selector, attempt + 1);
                std::thread::sleep(SWAP_RETRY_DELAY);
            }
        }
    }
    Err(CoachError::corrupt(
        selector,
        "metadata does not belong to the same build as the index",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(filename: &str, text: &str) -> MetadataRecord {
        MetadataRecord {
            filename: filename.to_string(),
            text: text.to_string(),
        }
    }

    fn sample_pair() -> (FlatIndex, Vec<MetadataRecord>) {
        let index =
            FlatIndex::from_vectors(3, vec![vec![0.1, 0.2, 0.3], vec![-1.5, 2.25, 1e-7]]).unwrap();
        let metadata = vec![record("a.txt", "first"), record("b.txt", "second")];
        (index, metadata)
    }

    #[test]
    fn test_roundtrip_preserves_vectors_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("nested/index_x.json");
        let metadata_path = dir.path().join("nested/metadata_x.json");

        let (index, metadata) = sample_pair();
        save_pair(&index_path, &metadata_path, &index, &metadata, "test-model").unwrap();

        let loaded = load_pair("x", &index_path, &metadata_path).unwrap();
        assert_eq!(loaded.index, index);
        assert_eq!(loaded.metadata, metadata);
        assert_eq!(loaded.model, "test-model");

        let origin = [0.0, 0.0, 0.0];
        assert_eq!(
            loaded.index.search(&origin, 2).unwrap(),
            index.search(&origin, 2).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.json");

        let (index, metadata) = sample_pair();
        save_pair(&index_path, &metadata_path, &index, &metadata, "m").unwrap();
        std::fs::remove_file(&metadata_path).unwrap();

        assert!(matches!(
            load_pair("x", &index_path, &metadata_path),
            Err(CoachError::NotFound(_))
        ));
    }

    fn write_raw(
        index_path: &Path,
        metadata_path: &Path,
        vectors: Vec<Vec<f32>>,
        metadata: &[MetadataRecord],
    ) {
        let metadata_bytes = serde_json::to_vec(metadata).unwrap();
        let file = IndexFile {
            format_version: INDEX_FORMAT_VERSION,
            dimension: 2,
            model: "m".to_string(),
            built_at: Utc::now(),
            metadata_sha256: sha256_hex(&metadata_bytes),
            vectors,
        };
        std::fs::write(index_path, serde_json::to_vec(&file).unwrap()).unwrap();
        std::fs::write(metadata_path, metadata_bytes).unwrap();
    }

    #[test]
    fn test_foreign_metadata_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.json");

        let (index, metadata) = sample_pair();
        save_pair(&index_path, &metadata_path, &index, &metadata, "m").unwrap();
        std::fs::write(&metadata_path, serde_json::to_string(&metadata[..1]).unwrap()).unwrap();

        assert!(matches!(
            load_pair("x", &index_path, &metadata_path),
            Err(CoachError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_ragged_vectors_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.json");

        write_raw(
            &index_path,
            &metadata_path,
            vec![vec![1.0, 2.0], vec![1.0]],
            &[record("a", "a"), record("b", "b")],
        );

        assert!(matches!(
            load_pair("x", &index_path, &metadata_path),
            Err(CoachError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_length_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.json");
        write_raw(
            &index_path,
            &metadata_path,
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            &[record("a", "a")],
        );

        assert!(matches!(
            load_pair("x", &index_path, &metadata_path),
            Err(CoachError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.json");
        std::fs::write(&index_path, "not json").unwrap();
        std::fs::write(&metadata_path, "[]").unwrap();

        assert!(matches!(
            load_pair("x", &index_path, &metadata_path),
            Err(CoachError::CorruptIndex { .. })
        ));
    }

    #[test]
    fn test_save_rejects_mismatched_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let (index, metadata) = sample_pair();
        let result = save_pair(
            &dir.path().join("i.json"),
            &dir.path().join("m.json"),
            &index,
            &metadata[..1],
            "m",
        );
        assert!(matches!(result, Err(CoachError::InvalidInput(_))));
        assert!(!dir.path().join("i.json").exists());
    }

    #[test]
    fn test_overwrite_replaces_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.json");

        let (index, metadata) = sample_pair();
        save_pair(&index_path, &metadata_path, &index, &metadata, "m").unwrap();

        let smaller = FlatIndex::from_vectors(3, vec![vec![9.0, 9.0, 9.0]]).unwrap();
        save_pair(&index_path, &metadata_path, &smaller, &metadata[..1], "m").unwrap();

        let loaded = load_pair("x", &index_path, &metadata_path).unwrap();
        assert_eq!(loaded.index.len(), 1);
        assert_eq!(loaded.metadata.len(), 1);

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 2);
    }

    #[test]
    fn test_failed_index_swap_restores_previous_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.json");

        let (index, metadata) = sample_pair();
        save_pair(&index_path, &metadata_path, &index, &metadata, "m").unwrap();
        let previous_metadata = std::fs::read(&metadata_path).unwrap();

        // A directory in place of the index file makes the final rename fail.
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), "x").unwrap();
        std::fs::rename(&index_path, dir.path().join("index.saved")).unwrap();
        std::fs::rename(&blocked, &index_path).unwrap();

        let smaller = FlatIndex::from_vectors(3, vec![vec![9.0, 9.0, 9.0]]).unwrap();
        let result = save_pair(&index_path, &metadata_path, &smaller, &metadata[..1], "m");
        assert!(result.is_err());
        assert_eq!(std::fs::read(&metadata_path).unwrap(), previous_metadata);
        assert!(!backup_path(&metadata_path).exists());
    }

    #[test]
    fn test_readers_never_see_mixed_builds() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.json");

        let build_a = FlatIndex::from_vectors(2, vec![vec![1.0, 0.0], vec![1.0, 1.0]]).unwrap();
        let meta_a = vec![record("a.txt", "A0"), record("a.txt", "A1")];
        let build_b = FlatIndex::from_vectors(2, vec![vec![2.0, 0.0], vec![2.0, 2.0]]).unwrap();
        let meta_b = vec![record("b.txt", "B0"), record("b.txt", "B1")];
        save_pair(&index_path, &metadata_path, &build_a, &meta_a, "m").unwrap();

        let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let reader = {
            let done = done.clone();
            let index_path = index_path.clone();
            let metadata_path = metadata_path.clone();
            std::thread::spawn(move || {
                let mut mixed = 0;
                let mut loaded = 0;
                loop {
                    let finished = done.load(std::sync::atomic::Ordering::Relaxed);
                    if let Ok(pair) = load_pair("x", &index_path, &metadata_path) {
                        loaded += 1;
                        let marker = if pair.index.get(0) == Some(&[1.0, 0.0][..]) {
                            "A"
                        } else {
                            "B"
                        };
                        if pair.metadata.iter().any(|r| !r.text.starts_with(marker)) {
                            mixed += 1;
                        }
                    }
                    if finished {
                        break;
                    }
                }
                (loaded, mixed)
            })
        };

        for round in 0..200 {
            let (index, metadata) = if round % 2 == 0 {
                (&build_b, &meta_b)
            } else {
                (&build_a, &meta_a)
            };
            save_pair(&index_path, &metadata_path, index, metadata, "m").unwrap();
        }
        done.store(true, std::sync::atomic::Ordering::Relaxed);

        let (loaded, mixed) = reader.join().unwrap();
        assert!(loaded > 0);
        assert_eq!(mixed, 0);
    }
}
