//! A [`Store`] backed by a directory of JSON documents.
//!
//! Layout under the data directory:
//!
//! ```text
//! snapshots/<owner>@<name>.jsonl   one snapshot per line, append-only
//! daily/<project>@<owner>@<name>@<date>.json   one aggregate per document
//! contributors/<username>.json     one contributor per document
//! ```
//!
//! Documents are written to a temporary sibling and renamed into place, so a reader
//! never observes a partially written aggregate or contributor.

use super::path_utils::{daily_file_stem, repo_file_stem, sanitize_path_component};
use super::{Store, select_for_update};
use crate::Result;
use crate::model::{ContributorRecord, DailyAggregate, DailyKey, RepoKey, StatsSnapshot};
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     store";

const SNAPSHOTS_DIR: &str = "snapshots";
const DAILY_DIR: &str = "daily";
const CONTRIBUTORS_DIR: &str = "contributors";

#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `root`, creating its directory layout as needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [SNAPSHOTS_DIR, DAILY_DIR, CONTRIBUTORS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).into_app_err_with(|| format!("creating store directory '{}'", path.display()))?;
        }

        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, owner: &str, name: &str) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR).join(format!("{}.jsonl", repo_file_stem(owner, name)))
    }

    fn daily_path(&self, key: &DailyKey) -> PathBuf {
        self.root.join(DAILY_DIR).join(format!("{}.json", daily_file_stem(key)))
    }

    fn contributor_path(&self, username: &str) -> PathBuf {
        self.root.join(CONTRIBUTORS_DIR).join(format!("{}.json", sanitize_path_component(username)))
    }

    /// Read every parseable line of a snapshot log. Corrupt lines are skipped.
    fn read_snapshot_log(path: &Path) -> Result<Vec<StatsSnapshot>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).into_app_err_with(|| format!("opening snapshot log '{}'", path.display())),
        };

        let mut snapshots = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.into_app_err_with(|| format!("reading snapshot log '{}'", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Skipping corrupt line {} of '{}': {e:#}", index + 1, path.display());
                }
            }
        }

        Ok(snapshots)
    }

    /// Load every document in a directory. Unreadable documents are skipped.
    fn read_documents<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
        let mut paths: Vec<_> = fs::read_dir(dir)
            .into_app_err_with(|| format!("listing store directory '{}'", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut docs = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(doc) = read_document(&path)? {
                docs.push(doc);
            }
        }

        Ok(docs)
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).into_app_err_with(|| format!("opening store document '{}'", path.display())),
    };

    match serde_json::from_reader(BufReader::new(file)) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            log::warn!(target: LOG_TARGET, "Ignoring unreadable store document '{}': {e:#}", path.display());
            Ok(None)
        }
    }
}

fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");

    {
        let file = File::create(&tmp_path).into_app_err_with(|| format!("creating store document '{}'", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);

        #[cfg(debug_assertions)]
        let result = serde_json::to_writer_pretty(&mut writer, doc);
        #[cfg(not(debug_assertions))]
        let result = serde_json::to_writer(&mut writer, doc);

        result.into_app_err_with(|| format!("writing store document '{}'", tmp_path.display()))?;
        writer
            .flush()
            .into_app_err_with(|| format!("flushing store document '{}'", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, path).into_app_err_with(|| format!("replacing store document '{}'", path.display()))
}

impl Store for JsonStore {
    fn append_snapshot(&self, snapshot: &StatsSnapshot) -> Result<()> {
        let path = self.snapshot_path(&snapshot.repo.owner, &snapshot.repo.name);
        let mut line = serde_json::to_string(snapshot).into_app_err("serializing snapshot")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .into_app_err_with(|| format!("opening snapshot log '{}'", path.display()))?;
        file.write_all(line.as_bytes())
            .into_app_err_with(|| format!("appending to snapshot log '{}'", path.display()))?;

        log::debug!(target: LOG_TARGET, "Appended snapshot of '{}' at {}", snapshot.repo_key(), snapshot.timestamp);
        Ok(())
    }

    fn latest_snapshot(&self, repo: &RepoKey) -> Result<Option<StatsSnapshot>> {
        let path = self.snapshot_path(&repo.owner, &repo.name);
        Ok(Self::read_snapshot_log(&path)?.pop())
    }

    fn snapshots_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<StatsSnapshot>> {
        let dir = self.root.join(SNAPSHOTS_DIR);
        let mut paths: Vec<_> = fs::read_dir(&dir)
            .into_app_err_with(|| format!("listing snapshot directory '{}'", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        paths.sort();

        let mut result = Vec::new();
        for path in paths {
            result.extend(
                Self::read_snapshot_log(&path)?
                    .into_iter()
                    .filter(|s| s.timestamp >= start && s.timestamp < end),
            );
        }

        result.sort_by_key(|s| s.timestamp);
        Ok(result)
    }

    fn upsert_daily(&self, aggregate: &DailyAggregate) -> Result<()> {
        write_document(&self.daily_path(&aggregate.key()), aggregate)
    }

    fn daily_aggregate(&self, key: &DailyKey) -> Result<Option<DailyAggregate>> {
        read_document(&self.daily_path(key))
    }

    fn daily_aggregates(&self) -> Result<Vec<DailyAggregate>> {
        let mut aggregates: Vec<DailyAggregate> = Self::read_documents(&self.root.join(DAILY_DIR))?;
        aggregates.sort_by_key(DailyAggregate::key);
        Ok(aggregates)
    }

    fn contributor(&self, username: &str) -> Result<Option<ContributorRecord>> {
        read_document(&self.contributor_path(username))
    }

    fn upsert_contributor(&self, record: &ContributorRecord) -> Result<()> {
        write_document(&self.contributor_path(&record.username), record)
    }

    fn contributors_needing_update(&self, limit: usize) -> Result<Vec<ContributorRecord>> {
        Ok(select_for_update(self.contributors()?, limit))
    }

    fn contributors(&self) -> Result<Vec<ContributorRecord>> {
        let mut records: Vec<ContributorRecord> = Self::read_documents(&self.root.join(CONTRIBUTORS_DIR))?;
        records.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(records)
    }
}
