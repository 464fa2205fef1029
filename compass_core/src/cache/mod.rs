//! Durable, fingerprinted store of per-sample penalty results
//!
//! Layout under the cache root:
//!
//! ```text
//! <fingerprint>/manifest.json          what the directory was built for
//! <fingerprint>/reaction_maxima.json   reference fluxes
//! <fingerprint>/samples/<sample>.jsonl append-only result records
//! <fingerprint>/ledger/<sample>.json   progress marker
//! ```
//!
//! Results are only ever read from the directory of the current fingerprint. Each sample
//! has its own files, so workers on different samples never touch the same file.
pub mod fingerprint;
pub mod ledger;
mod records;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::fingerprint::{CacheFingerprint, CACHE_FORMAT_VERSION};
use crate::cache::ledger::{LedgerEntry, Progress};
use crate::io::media::MediaConstraints;
use crate::metabolic_model::model::Model;
use crate::optimize::network::NetworkProblem;
use crate::penalty::{PenaltyResult, ReferenceFluxes};
use crate::utils::files::{escape_file_name, write_atomic};

const MANIFEST_FILE: &str = "manifest.json";
const MAXIMA_FILE: &str = "reaction_maxima.json";
const SAMPLES_DIR: &str = "samples";
const LEDGER_DIR: &str = "ledger";

/// Description of what a fingerprint directory holds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub format_version: u32,
    pub fingerprint: CacheFingerprint,
    pub model_id: Option<String>,
    pub model_version: Option<String>,
    pub media: String,
    /// Directional reaction ids a complete sample has results for
    pub reactions: Vec<String>,
}

impl CacheManifest {
    pub fn new(
        fingerprint: CacheFingerprint,
        model: &Model,
        media: &MediaConstraints,
        network: &NetworkProblem,
    ) -> Self {
        CacheManifest {
            format_version: CACHE_FORMAT_VERSION,
            fingerprint,
            model_id: model.id.clone(),
            model_version: model.version.clone(),
            media: media.name.clone(),
            reactions: network.directions().iter().map(|d| d.id.clone()).collect(),
        }
    }
}

/// Per-sample result store for one fingerprint
#[derive(Debug, Clone)]
pub struct SampleCache {
    root: PathBuf,
    directory: PathBuf,
    fingerprint: CacheFingerprint,
    reactions: IndexSet<String>,
}

impl SampleCache {
    /// Open (creating if needed) the directory for `manifest`'s fingerprint under `root`
    ///
    /// A directory whose manifest is missing or disagrees is considered corrupt and is
    /// emptied.
    pub fn open<P: AsRef<Path>>(root: P, manifest: CacheManifest) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        let directory = root.join(manifest.fingerprint.as_str());
        let manifest_path = directory.join(MANIFEST_FILE);
        let reusable = match read_json::<CacheManifest>(&manifest_path) {
            Ok(existing) => existing == manifest,
            Err(_) => false,
        };
        if reusable {
            debug!(fingerprint = %manifest.fingerprint, "reusing cache directory");
        } else {
            if directory.exists() {
                warn!(
                    directory = %directory.display(),
                    "cache directory does not match its manifest, discarding it"
                );
                fs::remove_dir_all(&directory).map_err(io_error(&directory))?;
            }
            let content = serde_json::to_vec_pretty(&manifest)?;
            write_atomic(&manifest_path, &content).map_err(io_error(&manifest_path))?;
        }
        for sub in [SAMPLES_DIR, LEDGER_DIR] {
            let path = directory.join(sub);
            fs::create_dir_all(&path).map_err(io_error(&path))?;
        }
        Ok(SampleCache {
            root,
            directory,
            fingerprint: manifest.fingerprint,
            reactions: manifest.reactions.into_iter().collect(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn fingerprint(&self) -> &CacheFingerprint {
        &self.fingerprint
    }

    /// Directional reaction ids every complete sample has
    pub fn reactions(&self) -> &IndexSet<String> {
        &self.reactions
    }

    /// Whether results in this store may be used for `current`
    ///
    /// Checks the manifest on disk as well, so a directory swapped underneath the store
    /// is not trusted.
    pub fn fingerprint_matches(&self, current: &CacheFingerprint) -> bool {
        if self.fingerprint != *current {
            return false;
        }
        match read_json::<CacheManifest>(&self.directory.join(MANIFEST_FILE)) {
            Ok(manifest) => manifest.fingerprint == *current,
            Err(_) => false,
        }
    }

    // region Sample results
    /// Whether the sample is marked complete and every reaction result is present
    pub fn has(&self, sample: &str) -> bool {
        if self.progress(sample) != Progress::Complete {
            return false;
        }
        match self.load(sample) {
            Ok(Some(results)) => self.is_complete(&results),
            Ok(None) => false,
            Err(err) => {
                warn!(sample, %err, "unable to read cached results, treating as missing");
                false
            }
        }
    }

    /// Every durable result of a sample, `None` if nothing was ever stored
    ///
    /// Unreadable lines and records for other samples or unknown reactions are skipped.
    pub fn load(&self, sample: &str) -> Result<Option<IndexMap<String, PenaltyResult>>, CacheError> {
        let path = self.sample_path(sample);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&path)(err)),
        };
        let mut results = IndexMap::new();
        for record in records::replay(&content) {
            match record {
                Ok(record) if record.sample != sample => {
                    warn!(sample, found = %record.sample, "skipping record for another sample");
                }
                Ok(record) if !self.reactions.contains(&record.reaction) => {
                    warn!(sample, reaction = %record.reaction, "skipping record for unknown reaction");
                }
                Ok(record) => {
                    results.insert(record.reaction, record.result);
                }
                Err(line) => {
                    warn!(sample, line, "skipping unreadable cache record");
                }
            }
        }
        Ok(Some(results))
    }

    /// Durably record one result, returning once it is on disk
    ///
    /// Storing the same result again is harmless.
    pub fn store(&self, sample: &str, reaction: &str, result: &PenaltyResult) -> Result<(), CacheError> {
        if !self.reactions.contains(reaction) {
            return Err(CacheError::UnknownReaction(reaction.to_string()));
        }
        let path = self.sample_path(sample);
        records::append_record(&path, sample, reaction, result).map_err(io_error(&path))
    }

    /// Whether `results` covers every reaction
    pub fn is_complete(&self, results: &IndexMap<String, PenaltyResult>) -> bool {
        self.reactions.iter().all(|reaction| results.contains_key(reaction))
    }
    // endregion Sample results

    // region Ledger
    /// Progress recorded for a sample; unreadable markers count as not started
    pub fn progress(&self, sample: &str) -> Progress {
        let path = self.ledger_path(sample);
        if !path.exists() {
            return Progress::NotStarted;
        }
        match read_json::<LedgerEntry>(&path) {
            Ok(entry) if entry.sample == sample => entry.state,
            Ok(entry) => {
                warn!(sample, found = %entry.sample, "ledger entry names another sample");
                Progress::NotStarted
            }
            Err(err) => {
                warn!(sample, %err, "unreadable ledger entry");
                Progress::NotStarted
            }
        }
    }

    /// Claim a sample for a worker
    pub fn mark_in_progress(&self, sample: &str) -> Result<(), CacheError> {
        self.write_ledger(sample, Progress::InProgress)
    }

    /// Mark a sample complete if, and only if, every reaction result is durable
    ///
    /// Returns whether the sample was marked.
    pub fn mark_complete(&self, sample: &str) -> Result<bool, CacheError> {
        let complete = match self.load(sample)? {
            Some(results) => self.is_complete(&results),
            None => false,
        };
        if complete {
            self.write_ledger(sample, Progress::Complete)?;
        }
        Ok(complete)
    }

    /// Drop a worker's in-progress claim, stored results are kept
    pub fn discard_claim(&self, sample: &str) -> Result<(), CacheError> {
        if self.progress(sample) == Progress::Complete {
            return Ok(());
        }
        let path = self.ledger_path(sample);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&path)(err)),
        }
    }

    fn write_ledger(&self, sample: &str, state: Progress) -> Result<(), CacheError> {
        let path = self.ledger_path(sample);
        let content = serde_json::to_vec(&LedgerEntry {
            sample: sample.to_string(),
            state,
        })?;
        write_atomic(&path, &content).map_err(io_error(&path))
    }
    // endregion Ledger

    // region Reference fluxes
    /// Stored reference fluxes, `None` if missing or unreadable
    pub fn load_reference_fluxes(&self) -> Option<ReferenceFluxes> {
        let path = self.directory.join(MAXIMA_FILE);
        if !path.exists() {
            return None;
        }
        match read_json(&path) {
            Ok(fluxes) => Some(fluxes),
            Err(err) => {
                warn!(%err, "unreadable reaction maxima, recomputing");
                None
            }
        }
    }

    pub fn store_reference_fluxes(&self, fluxes: &ReferenceFluxes) -> Result<(), CacheError> {
        let path = self.directory.join(MAXIMA_FILE);
        let content = serde_json::to_vec_pretty(fluxes)?;
        write_atomic(&path, &content).map_err(io_error(&path))
    }
    // endregion Reference fluxes

    /// Delete the directories of every other fingerprint under the cache root
    pub fn purge_stale(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        let entries = fs::read_dir(&self.root).map_err(io_error(&self.root))?;
        for entry in entries {
            let entry = entry.map_err(io_error(&self.root))?;
            let path = entry.path();
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name == self.fingerprint.as_str()
                || !CacheFingerprint::looks_like(name)
                || !path.join(MANIFEST_FILE).exists()
            {
                continue;
            }
            fs::remove_dir_all(&path).map_err(io_error(&path))?;
            removed += 1;
        }
        if removed > 0 {
            info!(removed, "purged stale cache directories");
        }
        Ok(removed)
    }

    fn sample_path(&self, sample: &str) -> PathBuf {
        self.directory
            .join(SAMPLES_DIR)
            .join(format!("{}.jsonl", escape_file_name(sample)))
    }

    fn ledger_path(&self, sample: &str) -> PathBuf {
        self.directory
            .join(LEDGER_DIR)
            .join(format!("{}.json", escape_file_name(sample)))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, CacheError> {
    let content = fs::read(path).map_err(io_error(path))?;
    Ok(serde_json::from_slice(&content)?)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Errors raised by the cache store
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error at {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("unable to (de)serialize cache entry: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reaction {0} is not part of this cache")]
    UnknownReaction(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penalty::UnsolvedReason;

    fn manifest(fingerprint: &str, reactions: &[&str]) -> CacheManifest {
        CacheManifest {
            format_version: CACHE_FORMAT_VERSION,
            fingerprint: serde_json::from_value(serde_json::json!(fingerprint)).unwrap(),
            model_id: Some("toy".to_string()),
            model_version: None,
            media: "m".to_string(),
            reactions: reactions.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn hex(c: char) -> String {
        std::iter::repeat(c).take(64).collect()
    }

    #[test]
    fn store_load_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward", "R2_forward"])).unwrap();
        assert_eq!(cache.load("cell/1").unwrap(), None);
        assert_eq!(cache.progress("cell/1"), Progress::NotStarted);

        cache.mark_in_progress("cell/1").unwrap();
        cache.store("cell/1", "R1_forward", &PenaltyResult::Penalty(1.)).unwrap();
        assert_eq!(cache.progress("cell/1"), Progress::InProgress);
        assert!(!cache.mark_complete("cell/1").unwrap());
        assert!(!cache.has("cell/1"));

        cache
            .store("cell/1", "R2_forward", &PenaltyResult::Unsolved(UnsolvedReason::Blocked))
            .unwrap();
        // idempotent re-store
        cache.store("cell/1", "R1_forward", &PenaltyResult::Penalty(1.)).unwrap();
        assert!(cache.mark_complete("cell/1").unwrap());
        assert!(cache.has("cell/1"));
        let results = cache.load("cell/1").unwrap().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results["R1_forward"], PenaltyResult::Penalty(1.));
        assert!(matches!(
            cache.store("cell/1", "R9_forward", &PenaltyResult::Penalty(1.)),
            Err(CacheError::UnknownReaction(_))
        ));
    }

    #[test]
    fn complete_marker_without_results_is_not_trusted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward"])).unwrap();
        cache.store("cell", "R1_forward", &PenaltyResult::Penalty(3.)).unwrap();
        assert!(cache.mark_complete("cell").unwrap());
        fs::remove_file(cache.sample_path("cell")).unwrap();
        assert!(!cache.has("cell"));
    }

    #[test]
    fn discard_claim_keeps_results() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward", "R2_forward"])).unwrap();
        cache.mark_in_progress("cell").unwrap();
        cache.store("cell", "R1_forward", &PenaltyResult::Penalty(3.)).unwrap();
        cache.discard_claim("cell").unwrap();
        assert_eq!(cache.progress("cell"), Progress::NotStarted);
        assert_eq!(cache.load("cell").unwrap().unwrap().len(), 1);
    }

    #[test]
    fn reopen_keeps_matching_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward"])).unwrap();
        cache.store("cell", "R1_forward", &PenaltyResult::Penalty(3.)).unwrap();
        cache.mark_complete("cell").unwrap();
        let reopened = SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward"])).unwrap();
        assert!(reopened.has("cell"));
        assert!(reopened.fingerprint_matches(cache.fingerprint()));
    }

    #[test]
    fn mismatched_manifest_purges_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward"])).unwrap();
        cache.store("cell", "R1_forward", &PenaltyResult::Penalty(3.)).unwrap();
        cache.mark_complete("cell").unwrap();
        let reopened =
            SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward", "R2_forward"])).unwrap();
        assert!(!reopened.has("cell"));
        assert_eq!(reopened.load("cell").unwrap(), None);
    }

    #[test]
    fn stale_fingerprints_are_isolated_and_purged() {
        let dir = tempfile::tempdir().unwrap();
        let old = SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward"])).unwrap();
        old.store("cell", "R1_forward", &PenaltyResult::Penalty(3.)).unwrap();
        old.mark_complete("cell").unwrap();
        fs::create_dir_all(dir.path().join("unrelated")).unwrap();

        let current = SampleCache::open(dir.path(), manifest(&hex('b'), &["R1_forward"])).unwrap();
        assert!(!current.has("cell"));
        assert!(!current.fingerprint_matches(old.fingerprint()));
        assert_eq!(current.purge_stale().unwrap(), 1);
        assert!(!old.directory().exists());
        assert!(dir.path().join("unrelated").exists());
    }

    #[test]
    fn reference_fluxes_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SampleCache::open(dir.path(), manifest(&hex('a'), &["R1_forward"])).unwrap();
        assert!(cache.load_reference_fluxes().is_none());
        let fluxes: ReferenceFluxes =
            serde_json::from_str(r#"{"maxima": {"R1_forward": {"maximum": 10.0}}}"#).unwrap();
        cache.store_reference_fluxes(&fluxes).unwrap();
        assert_eq!(cache.load_reference_fluxes(), Some(fluxes));
        fs::write(cache.directory().join(MAXIMA_FILE), b"{").unwrap();
        assert!(cache.load_reference_fluxes().is_none());
    }
}
