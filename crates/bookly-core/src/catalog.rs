//! The catalog: fingerprint-keyed records, optionally persisted.
//!
//! Matching, merging, and the store write happen under one exclusive
//! lock so the similarity scan always sees a consistent view and no
//! duplicate can slip in between scan and insert.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OpenFlags};

use crate::matching::Fingerprint;
use crate::merger::{is_match, match_score, merge_into, MergeOutcome, MergePolicy};
use crate::BookRecord;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to open catalog database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("catalog storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct Catalog {
    inner: Mutex<CatalogInner>,
}

struct CatalogInner {
    records: BTreeMap<Fingerprint, BookRecord>,
    store: Option<SqliteStore>,
}

impl Catalog {
    /// A catalog that lives and dies with the process.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(CatalogInner {
                records: BTreeMap::new(),
                store: None,
            }),
        }
    }

    /// Open (or create) a persistent catalog and load every stored
    /// record into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let store = SqliteStore::open(path).map_err(|source| CatalogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let records = store.load_all()?;
        tracing::info!(path = %path.display(), records = records.len(), "opened catalog");
        Ok(Self {
            inner: Mutex::new(CatalogInner {
                records,
                store: Some(store),
            }),
        })
    }

    /// Insert a record, merging it into an existing entry when the two
    /// describe the same book.
    ///
    /// When a merge changes the canonical fingerprint the record is
    /// re-keyed, and if the new key collides with another entry the two
    /// are merged as well, so each upsert leaves at most one record per
    /// fingerprint. The loop is bounded: every round removes an entry.
    pub fn upsert(
        &self,
        record: BookRecord,
        policy: &MergePolicy,
    ) -> Result<MergeOutcome, CatalogError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let fingerprint = Fingerprint::of_record(&record);

        let matched = match inner.records.get(&fingerprint) {
            // equal fingerprints are the same book by definition
            Some(existing) => Some((
                fingerprint.clone(),
                match_score(&record, existing).combined,
            )),
            None => {
                let mut best: Option<(Fingerprint, f64)> = None;
                for (fp, existing) in &inner.records {
                    let score = match_score(&record, existing);
                    if is_match(&score, policy)
                        && best.as_ref().map_or(true, |(_, c)| score.combined > *c)
                    {
                        best = Some((fp.clone(), score.combined));
                    }
                }
                best
            }
        };

        let Some((first_match, similarity)) = matched else {
            if let Some(store) = &inner.store {
                store.insert(&fingerprint, &record)?;
            }
            tracing::debug!(fingerprint = %fingerprint, title = %record.title, "inserted record");
            inner.records.insert(fingerprint.clone(), record);
            return Ok(MergeOutcome::Inserted { fingerprint });
        };

        let mut merged = record;
        let mut doomed: Vec<Fingerprint> = Vec::new();
        let mut target = Some(first_match);
        while let Some(fp) = target.take() {
            if let Some(existing) = inner.records.remove(&fp) {
                let incoming = std::mem::replace(&mut merged, existing);
                merge_into(&mut merged, &incoming);
                doomed.push(fp);
            }
            let next = Fingerprint::of_record(&merged);
            if inner.records.contains_key(&next) {
                target = Some(next);
            }
        }

        let fingerprint = Fingerprint::of_record(&merged);
        if let Some(store) = &inner.store {
            for stale in doomed.iter().filter(|fp| **fp != fingerprint) {
                store.delete(stale)?;
            }
            store.insert(&fingerprint, &merged)?;
        }
        tracing::debug!(
            fingerprint = %fingerprint,
            similarity,
            absorbed = doomed.len(),
            "merged record into catalog"
        );
        inner.records.insert(fingerprint.clone(), merged);
        Ok(MergeOutcome::Merged {
            fingerprint,
            similarity,
        })
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<BookRecord> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.records.get(fingerprint).cloned()
    }

    /// All records, ordered by fingerprint.
    pub fn records(&self) -> Vec<BookRecord> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.records.values().cloned().collect()
    }

    /// Fingerprint and record pairs, ordered by fingerprint.
    pub fn entries(&self) -> Vec<(Fingerprint, BookRecord)> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .records
            .iter()
            .map(|(fp, record)| (fp.clone(), record.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_persistence(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.store.is_some()
    }
}

struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                fingerprint TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    fn load_all(&self) -> Result<BTreeMap<Fingerprint, BookRecord>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT fingerprint, record FROM records")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut records = BTreeMap::new();
        for row in rows {
            let (fingerprint, json) = row?;
            match serde_json::from_str::<BookRecord>(&json) {
                Ok(record) => {
                    records.insert(Fingerprint::from_raw(fingerprint), record);
                }
                Err(e) => {
                    tracing::warn!(
                        fingerprint = %fingerprint,
                        error = %e,
                        "skipping undecodable catalog row"
                    );
                }
            }
        }
        Ok(records)
    }

    fn insert(&self, fingerprint: &Fingerprint, record: &BookRecord) -> Result<(), CatalogError> {
        let json = serde_json::to_string(record)?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO records (fingerprint, record, updated_at)
             VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute(params![
            fingerprint.as_str(),
            json,
            chrono::Utc::now().timestamp()
        ])?;
        Ok(())
    }

    fn delete(&self, fingerprint: &Fingerprint) -> Result<(), rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM records WHERE fingerprint = ?1")?;
        stmt.execute(params![fingerprint.as_str()])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Provenance;
    use chrono::Utc;

    fn record(title: &str, authors: &[&str], confidence: f64, doc: &str) -> BookRecord {
        BookRecord {
            title: title.to_string(),
            subtitle: None,
            authors: authors.iter().map(|s| s.to_string()).collect(),
            source: format!("{doc}.pdf"),
            confidence,
            low_confidence: false,
            provenance: vec![Provenance {
                document_id: doc.to_string(),
                extracted_at: Utc::now(),
            }],
        }
    }

    fn policy() -> MergePolicy {
        MergePolicy::default()
    }

    // ===== in-memory =====

    #[test]
    fn insert_then_get() {
        let catalog = Catalog::in_memory();
        let outcome = catalog
            .upsert(record("The Great Novel", &["Jane Doe"], 0.8, "d1"), &policy())
            .unwrap();
        assert!(!outcome.was_merged());
        let stored = catalog.get(outcome.fingerprint()).unwrap();
        assert_eq!(stored.title, "The Great Novel");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn unrelated_records_are_both_kept() {
        let catalog = Catalog::in_memory();
        catalog
            .upsert(record("The Great Novel", &["Jane Doe"], 0.8, "d1"), &policy())
            .unwrap();
        catalog
            .upsert(record("A Cookbook", &["John Smith"], 0.8, "d2"), &policy())
            .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn identical_fingerprint_merges_instead_of_duplicating() {
        let catalog = Catalog::in_memory();
        catalog
            .upsert(record("The Great Novel", &["Jane Doe"], 0.8, "d1"), &policy())
            .unwrap();
        let outcome = catalog
            .upsert(record("The Great Novel", &["Jane Doe"], 0.6, "d2"), &policy())
            .unwrap();
        assert!(outcome.was_merged());
        assert_eq!(catalog.len(), 1);
        let stored = catalog.get(outcome.fingerprint()).unwrap();
        assert_eq!(stored.provenance.len(), 2);
        assert!((stored.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn strong_title_match_rekeys_with_unioned_authors() {
        let catalog = Catalog::in_memory();
        let first = catalog
            .upsert(record("The Great Novel", &["Jane Doe"], 0.8, "d1"), &policy())
            .unwrap();
        let outcome = catalog
            .upsert(
                record("The Great Novel", &["John Smith"], 0.7, "d2"),
                &policy(),
            )
            .unwrap();
        assert!(outcome.was_merged());
        assert_eq!(catalog.len(), 1);
        // old key is gone, the merged record sits under the new one
        assert!(catalog.get(first.fingerprint()).is_none());
        let stored = catalog.get(outcome.fingerprint()).unwrap();
        assert_eq!(stored.authors, vec!["Jane Doe", "John Smith"]);
    }

    #[test]
    fn merged_similarity_reflects_the_match() {
        let catalog = Catalog::in_memory();
        catalog
            .upsert(record("The Great Novel", &["Jane Doe"], 0.8, "d1"), &policy())
            .unwrap();
        let outcome = catalog
            .upsert(
                record("The Great Novel", &["Jane Doe", "John Smith"], 0.7, "d2"),
                &policy(),
            )
            .unwrap();
        match outcome {
            MergeOutcome::Merged { similarity, .. } => {
                // title 1.0, author jaccard 0.5
                assert!((similarity - 0.85).abs() < 1e-9);
            }
            other => panic!("expected a merge, got {other:?}"),
        }
    }

    #[test]
    fn records_come_back_ordered_by_fingerprint() {
        let catalog = Catalog::in_memory();
        catalog
            .upsert(record("Zebra Stories", &[], 0.8, "d1"), &policy())
            .unwrap();
        catalog
            .upsert(record("Aardvark Tales", &[], 0.8, "d2"), &policy())
            .unwrap();
        let entries = catalog.entries();
        assert!(entries[0].0 < entries[1].0);
        assert_eq!(entries[0].1.title, "Aardvark Tales");
    }

    #[test]
    fn empty_titles_with_different_authors_stay_apart() {
        let catalog = Catalog::in_memory();
        catalog
            .upsert(record("", &["Jane Doe"], 0.1, "d1"), &policy())
            .unwrap();
        catalog
            .upsert(record("", &["John Smith"], 0.1, "d2"), &policy())
            .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    // ===== persistence =====

    #[test]
    fn persisted_catalog_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        let catalog = Catalog::open(&path).unwrap();
        assert!(catalog.has_persistence());
        catalog
            .upsert(record("The Great Novel", &["Jane Doe"], 0.8, "d1"), &policy())
            .unwrap();
        catalog
            .upsert(record("A Cookbook", &["John Smith"], 0.6, "d2"), &policy())
            .unwrap();
        drop(catalog);

        let reopened = Catalog::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        let titles: Vec<_> = reopened.records().into_iter().map(|r| r.title).collect();
        assert!(titles.contains(&"The Great Novel".to_string()));
        assert!(titles.contains(&"A Cookbook".to_string()));
    }

    #[test]
    fn rekeying_merge_deletes_the_stale_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        let catalog = Catalog::open(&path).unwrap();
        catalog
            .upsert(record("The Great Novel", &["Jane Doe"], 0.8, "d1"), &policy())
            .unwrap();
        catalog
            .upsert(
                record("The Great Novel", &["John Smith"], 0.7, "d2"),
                &policy(),
            )
            .unwrap();
        drop(catalog);

        let reopened = Catalog::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        let stored = &reopened.records()[0];
        assert_eq!(stored.authors, vec!["Jane Doe", "John Smith"]);
        assert_eq!(stored.provenance.len(), 2);
    }

    #[test]
    fn undecodable_rows_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .conn
                .execute(
                    "INSERT INTO records (fingerprint, record, updated_at)
                     VALUES ('bad|row', 'not json', 0)",
                    [],
                )
                .unwrap();
        }

        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.len(), 0);
    }

    #[test]
    fn in_memory_catalog_reports_no_persistence() {
        assert!(!Catalog::in_memory().has_persistence());
    }
}
