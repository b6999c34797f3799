//! Job enumeration.
//!
//! Walks `root/collection/<folder>/<file>`, fingerprints every candidate
//! file by its path components, and decides from the stored status whether
//! it still needs a worker. Newly seen files are recorded as
//! [`LeakStatus::Indexed`] together with their line count.
//!
//! Only a failure to list the collection directory itself is fatal. An
//! unreadable folder is logged and skipped, and so is a file whose status
//! cannot be read or written.

use anyhow::{Context, Result};
use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use leak_indexer_core::fingerprint;
use leak_indexer_core::models::{LeakStatus, NewLeakFile};
use leak_indexer_core::store::LeakStore;

use crate::config::SourceConfig;

/// One unit of dispatch: a leak file that still needs processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakJob {
    pub leak_id: i64,
    pub parent: String,
    pub folder: String,
    pub file: String,
    pub path: PathBuf,
}

/// Counters describing what enumeration found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationStats {
    /// Candidate files seen on disk.
    pub discovered: u64,
    /// Files recorded for the first time in this run.
    pub new: u64,
    /// Known files that were not yet `Done`.
    pub resumed: u64,
    /// Known files already `Done`, left out of the job list.
    pub already_done: u64,
    /// Folders or files that could not be listed or recorded.
    pub skipped: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    pub jobs: Vec<LeakJob>,
    pub stats: EnumerationStats,
}

struct Candidate {
    folder: String,
    file: String,
    path: PathBuf,
}

/// Build the ordered job list for one collection.
pub async fn enumerate_jobs(store: &dyn LeakStore, source: &SourceConfig) -> Result<Enumeration> {
    let collection_dir = source.collection_dir();
    let candidates = {
        let include = build_globset(&source.include_globs)?;
        let exclude = build_globset(&source.exclude_globs)?;
        let dir = collection_dir.clone();
        tokio::task::spawn_blocking(move || list_candidates(&dir, &include, &exclude))
            .await
            .context("candidate listing task panicked")??
    };

    let mut out = Enumeration::default();
    out.stats.skipped = candidates.skipped;

    for candidate in candidates.files {
        out.stats.discovered += 1;
        let fp = fingerprint::leak_file(&source.collection, &candidate.folder, &candidate.file);

        let existing = match store.find_leak(&fp).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(path = %candidate.path.display(), error = %e, "could not look up leak file, skipping");
                out.stats.skipped += 1;
                continue;
            }
        };

        let leak_id = match existing {
            Some(leak) if !leak.status.needs_processing() => {
                out.stats.already_done += 1;
                continue;
            }
            Some(leak) => {
                debug!(path = %candidate.path.display(), status = %leak.status, "resuming leak file");
                out.stats.resumed += 1;
                leak.id
            }
            None => {
                let line_count = count_lines_tolerant(&candidate.path).await;
                let leak = NewLeakFile {
                    name: candidate.folder.clone(),
                    parent: source.collection.clone(),
                    filename: candidate.file.clone(),
                    fingerprint: fp,
                    discovered_at: Utc::now().timestamp(),
                    source: source.label.clone(),
                    line_count,
                    status: LeakStatus::Indexed,
                };
                match store.insert_leak(&leak).await {
                    Ok(id) => {
                        debug!(path = %candidate.path.display(), id, line_count, "indexed new leak file");
                        out.stats.new += 1;
                        id
                    }
                    Err(e) => {
                        warn!(path = %candidate.path.display(), error = %e, "could not record leak file, skipping");
                        out.stats.skipped += 1;
                        continue;
                    }
                }
            }
        };

        out.jobs.push(LeakJob {
            leak_id,
            parent: source.collection.clone(),
            folder: candidate.folder,
            file: candidate.file,
            path: candidate.path,
        });
    }

    Ok(out)
}

struct Listing {
    files: Vec<Candidate>,
    skipped: u64,
}

/// List `<folder>/<file>` candidates below `dir`, sorted by name.
fn list_candidates(dir: &Path, include: &GlobSet, exclude: &GlobSet) -> Result<Listing> {
    // The collection directory must be listable; everything below it is best effort.
    std::fs::read_dir(dir)
        .with_context(|| format!("Could not open collection directory: {}", dir.display()))?;

    let mut listing = Listing {
        files: Vec::new(),
        skipped: 0,
    };

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !exclude.is_match(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    return Err(e).with_context(|| {
                        format!("Could not open collection directory: {}", dir.display())
                    });
                }
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                warn!(path = %path, error = %e, "could not open directory, skipping");
                listing.skipped += 1;
                continue;
            }
        };

        if entry.depth() != 2 || !entry.file_type().is_file() {
            continue;
        }
        if !include.is_match(entry.file_name()) {
            continue;
        }

        let path = entry.path().to_path_buf();
        let folder = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file = entry.file_name().to_string_lossy().to_string();

        listing.files.push(Candidate { folder, file, path });
    }

    Ok(listing)
}

/// Count `\n` bytes in a file.
pub fn count_lines(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut count = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(count);
        }
        count += memchr::memchr_iter(b'\n', &buf[..n]).count() as u64;
    }
}

/// Line count for the leak record; any failure is logged and counts as zero.
async fn count_lines_tolerant(path: &Path) -> i64 {
    let owned = path.to_path_buf();
    let counted = tokio::task::spawn_blocking(move || count_lines(&owned)).await;
    match counted {
        Ok(Ok(n)) => n as i64,
        Ok(Err(e)) => {
            warn!(path = %path.display(), error = %e, "could not count lines");
            0
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "line count task failed");
            0
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leak_indexer_core::store::memory::InMemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn source(root: &Path) -> SourceConfig {
        SourceConfig {
            root: root.to_path_buf(),
            collection: "Collection 1".to_string(),
            label: "test".to_string(),
            include_globs: vec!["*.txt".to_string()],
            exclude_globs: vec!["*.tar*".to_string()],
        }
    }

    fn write_tree(root: &Path) {
        let coll = root.join("Collection 1");
        fs::create_dir_all(coll.join("dump-a")).unwrap();
        fs::create_dir_all(coll.join("dump-b")).unwrap();
        fs::create_dir_all(coll.join("archive.tar.gz")).unwrap();
        fs::write(coll.join("dump-a/1.txt"), "a@x.com:pw1\nb@y.com:pw2\n").unwrap();
        fs::write(coll.join("dump-a/notes.md"), "ignored\n").unwrap();
        fs::write(coll.join("dump-b/2.txt"), "c@z.com;pw3\n").unwrap();
        fs::write(coll.join("archive.tar.gz/3.txt"), "d@w.com:pw4\n").unwrap();
        fs::write(coll.join("loose.txt"), "e@v.com:pw5\n").unwrap();
    }

    #[test]
    fn counts_newlines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        fs::write(&path, "one\ntwo\nthree").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 2);
        assert!(count_lines(&tmp.path().join("missing.txt")).is_err());
    }

    #[tokio::test]
    async fn lists_only_folder_level_text_files() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path());
        let store = InMemoryStore::new();

        let found = enumerate_jobs(&store, &source(tmp.path())).await.unwrap();
        let names: Vec<(&str, &str)> = found
            .jobs
            .iter()
            .map(|j| (j.folder.as_str(), j.file.as_str()))
            .collect();
        assert_eq!(names, vec![("dump-a", "1.txt"), ("dump-b", "2.txt")]);
        assert_eq!(found.stats.new, 2);
        assert_eq!(store.leak_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn done_files_are_excluded_on_rerun() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path());
        let store = InMemoryStore::new();
        let src = source(tmp.path());

        let first = enumerate_jobs(&store, &src).await.unwrap();
        store
            .update_status(first.jobs[0].leak_id, LeakStatus::Done)
            .await
            .unwrap();
        store
            .update_status(first.jobs[1].leak_id, LeakStatus::Processing)
            .await
            .unwrap();

        let second = enumerate_jobs(&store, &src).await.unwrap();
        assert_eq!(second.jobs.len(), 1);
        assert_eq!(second.jobs[0].leak_id, first.jobs[1].leak_id);
        assert_eq!(second.stats.already_done, 1);
        assert_eq!(second.stats.resumed, 1);
        assert_eq!(second.stats.new, 0);
        assert_eq!(store.leak_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_collection_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let err = enumerate_jobs(&store, &source(tmp.path())).await.unwrap_err();
        assert!(err.to_string().contains("Could not open collection directory"));
    }
}
