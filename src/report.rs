//! Ingestion result reporting.
//!
//! Callers poll for a plain string, so an [`IngestOutcome`] always renders
//! to one: counts on success, the error description on failure.

use serde::Serialize;
use std::fmt;

use crate::error::IngestError;

/// Counts for one ingestion invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Pages fetched with at least one entry.
    pub pages: u32,
    /// Products that survived normalization, duplicates included.
    pub scraped: usize,
    /// Entries dropped as undecodable or rejected by normalization.
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed: {} | New: {} | Updated: {}",
            self.scraped, self.created, self.updated
        )
    }
}

#[derive(Debug)]
pub enum IngestOutcome {
    Completed(IngestSummary),
    /// The invocation failed. `partial` holds what was written from pages
    /// fetched before a fetch error.
    Failed {
        error: IngestError,
        partial: Option<IngestSummary>,
    },
}

impl IngestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, IngestOutcome::Completed(_))
    }

    pub fn summary(&self) -> Option<&IngestSummary> {
        match self {
            IngestOutcome::Completed(s) => Some(s),
            IngestOutcome::Failed { partial, .. } => partial.as_ref(),
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestOutcome::Completed(summary) => write!(f, "{}", summary),
            IngestOutcome::Failed {
                error,
                partial: None,
            } => write!(f, "Ingestion failed: {}", error),
            IngestOutcome::Failed {
                error,
                partial: Some(summary),
            } => write!(
                f,
                "Ingestion failed: {} (kept earlier pages: {})",
                error, summary
            ),
        }
    }
}
