use crate::model::DocumentRecord;
use crate::scope::has_dedupe_marker;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const HASH_CHUNK_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeCandidate {
    pub source_path: String,
    pub abs_path: PathBuf,
}

/// Paths sharing one content digest. Recomputed every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeGroup {
    pub digest: String,
    pub paths: Vec<String>,
}

impl DedupeGroup {
    #[must_use]
    pub fn size(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.paths.len() > 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeOutcome {
    pub candidates: usize,
    pub failed: usize,
    /// Digest per hashed path, ordered by path.
    pub digests: BTreeMap<String, String>,
    /// Every digest group, ordered by digest.
    pub groups: Vec<DedupeGroup>,
}

impl DedupeOutcome {
    #[must_use]
    pub fn hashed(&self) -> usize {
        self.digests.len()
    }

    #[must_use]
    pub fn duplicate_groups_total(&self) -> usize {
        self.groups.iter().filter(|g| g.is_duplicate()).count()
    }

    /// Redundant copies, i.e. members beyond the first of each duplicate group.
    #[must_use]
    pub fn duplicate_docs_total(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| g.is_duplicate())
            .map(|g| g.size() - 1)
            .sum()
    }
}

/// Whether a document is worth hashing at all, before size and budget limits.
#[must_use]
pub fn is_dedupe_eligible(source_path: &str, is_text: bool, bytes: u64, priority_weight: i64) -> bool {
    if !is_text || bytes == 0 {
        return false;
    }
    priority_weight > 0 || has_dedupe_marker(source_path)
}

/// Picks the bounded, path-sorted subset of documents to hash.
///
/// The same inputs always select the same subset, so truncation never makes
/// grouping flap between runs.
#[must_use]
pub fn select_candidates(
    docs: &[DocumentRecord],
    root: &Path,
    max_bytes: u64,
    max_files: usize,
) -> Vec<DedupeCandidate> {
    let mut candidates: Vec<DedupeCandidate> = docs
        .iter()
        .filter(|doc| doc.bytes <= max_bytes)
        .filter(|doc| {
            is_dedupe_eligible(&doc.source_path, doc.is_text, doc.bytes, doc.priority_weight)
        })
        .filter_map(|doc| {
            let abs_path = root.join(&doc.source_path);
            is_plain_file(&abs_path).then(|| DedupeCandidate {
                source_path: doc.source_path.clone(),
                abs_path,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    if candidates.len() > max_files {
        log::info!(
            "Dedupe budget keeps {} of {} candidates",
            max_files,
            candidates.len()
        );
        candidates.truncate(max_files);
    }
    candidates
}

/// Regular file, not reached through a symlink.
fn is_plain_file(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => meta.file_type().is_file(),
        Err(_) => false,
    }
}

/// Streams a file through SHA-256 and returns the lower-case hex digest.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex_encode_lower(&hasher.finalize()))
}

fn hex_encode_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Hashes candidates on blocking tasks, at most `concurrency` at a time.
///
/// Unreadable files are dropped from the outcome; they never abort the run.
pub async fn hash_candidates(candidates: Vec<DedupeCandidate>, concurrency: usize) -> DedupeOutcome {
    let total = candidates.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for candidate in candidates {
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let err = std::io::Error::other("hash semaphore closed");
                    return (candidate.source_path, Err(err));
                }
            };
            let abs_path = candidate.abs_path;
            let result = tokio::task::spawn_blocking(move || hash_file(&abs_path))
                .await
                .unwrap_or_else(|err| Err(std::io::Error::other(err.to_string())));
            (candidate.source_path, result)
        });
    }

    let mut digests = BTreeMap::new();
    let mut failed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((path, Ok(digest))) => {
                digests.insert(path, digest);
            }
            Ok((path, Err(err))) => {
                failed += 1;
                log::debug!("Skipping unreadable dedupe candidate {path}: {err}");
            }
            Err(err) => {
                failed += 1;
                log::warn!("Hash task failed: {err}");
            }
        }
    }

    let groups = group_by_digest(&digests);
    let outcome = DedupeOutcome {
        candidates: total,
        failed,
        digests,
        groups,
    };
    log::info!(
        "Hashed {} of {} dedupe candidates ({} failed, {} duplicate groups)",
        outcome.hashed(),
        total,
        failed,
        outcome.duplicate_groups_total()
    );
    outcome
}

#[must_use]
pub fn group_by_digest(digests: &BTreeMap<String, String>) -> Vec<DedupeGroup> {
    let mut by_digest: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (path, digest) in digests {
        by_digest.entry(digest.as_str()).or_default().push(path.clone());
    }
    by_digest
        .into_iter()
        .map(|(digest, paths)| DedupeGroup {
            digest: digest.to_string(),
            paths,
        })
        .collect()
}

/// Writes digests and group sizes back onto the records. Documents outside any
/// duplicate group keep size 1.
pub fn apply_dedupe(docs: &mut [DocumentRecord], outcome: &DedupeOutcome) {
    let mut size_by_digest: BTreeMap<&str, usize> = BTreeMap::new();
    for group in &outcome.groups {
        size_by_digest.insert(group.digest.as_str(), group.size());
    }
    for doc in docs.iter_mut() {
        doc.duplicate_group_size = 1;
        doc.dedupe_hash = outcome.digests.get(&doc.source_path).cloned();
        if let Some(digest) = doc.dedupe_hash.as_deref() {
            let size = size_by_digest.get(digest).copied().unwrap_or(1);
            if size > 1 {
                doc.duplicate_group_size = size;
            }
        }
    }
}
