use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extractor;
use crate::job::{self, JobRecord};
use crate::storage::{self, StorageError};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("'{0}' is not a link that can be recorded as applied")]
    Untrackable(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub link: String,
    pub title: String,
    pub company: String,
    pub applied_at: NaiveDateTime,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    applied: Vec<LedgerEntry>,
}

/// Durable record of postings already applied to, keyed by canonical link.
///
/// Entries are only ever appended. Each mutation rewrites the whole document before it is
/// acknowledged.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    doc: LedgerDocument,
    links: HashSet<String>,
}

impl Ledger {
    /// Opens the ledger at `path`. A missing file starts an empty ledger; an unreadable one is an
    /// error so it is never overwritten with an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let doc: LedgerDocument = match storage::read_json(&path)? {
            Some(doc) => {
                info!("Loaded ledger {}", path.display());
                doc
            }
            None => {
                info!("No ledger at {}. Starting fresh.", path.display());
                LedgerDocument::default()
            }
        };

        let links = doc.applied.iter().map(|e| ledger_key(&e.link)).collect();
        let ledger = Ledger { path, doc, links };
        info!("Already applied to {} jobs", ledger.count());
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_applied(&self, link: &str) -> bool {
        self.links.contains(&ledger_key(link))
    }

    /// Records an application. Returns `Ok(false)` if the link was already recorded.
    ///
    /// Blank and placeholder links are refused. Absolute http(s) links are stored without query
    /// string or fragment, the same identity the scraper produces.
    pub fn mark_applied(
        &mut self,
        link: &str,
        title: &str,
        company: &str,
        notes: &str,
    ) -> Result<bool, LedgerError> {
        if !job::is_trackable_link(link) {
            return Err(LedgerError::Untrackable(link.to_string()));
        }
        let link = ledger_key(link);
        if self.links.contains(&link) {
            info!("Already applied to: {} at {}", title, company);
            return Ok(false);
        }

        self.doc.applied.push(LedgerEntry {
            link: link.clone(),
            title: title.to_string(),
            company: company.to_string(),
            applied_at: job::now(),
            notes: notes.to_string(),
        });

        if let Err(e) = storage::write_json(&self.path, &self.doc) {
            self.doc.applied.pop();
            return Err(e.into());
        }

        self.links.insert(link);
        info!("Marked as applied: {} at {}", title, company);
        Ok(true)
    }

    /// Keeps the postings not yet applied to, in input order. Records without a usable link are
    /// always kept.
    pub fn filter_new(&self, jobs: Vec<JobRecord>) -> Vec<JobRecord> {
        jobs.into_iter()
            .filter(|job| {
                if !job.is_trackable() {
                    warn!("Job '{}' has no usable link; it cannot be tracked", job.title);
                    return true;
                }
                let applied = self.has_applied(&job.link);
                if applied {
                    info!("Skipping already applied: {} at {}", job.title, job.company);
                }
                !applied
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.doc.applied.len()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.doc.applied
    }

    /// Dumps the full ledger document to `path`.
    pub fn export_report(&self, path: &Path) -> Result<(), StorageError> {
        storage::write_json(path, &self.doc)?;
        info!("Report exported to {}", path.display());
        Ok(())
    }
}

fn ledger_key(link: &str) -> String {
    extractor::canonical_url(link).unwrap_or_else(|_| link.trim().to_string())
}
