//! Per-cycle refresh outcomes.

use std::fmt;

use crate::cache::Resource;

/// What happened on the network side for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Cached copy was fresh; nothing was fetched
    Fresh,
    /// New content was downloaded and persisted
    Downloaded { bytes: u64 },
    /// Fetch or persist failed; the cached copy (if any) was kept
    Failed(String),
}

/// What happened to the in-memory structure for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// A new structure was built and installed
    Installed { entries: usize, rejected: usize },
    /// Cached data could not be read; the previous structure stays installed
    KeptPrevious(String),
    /// Nothing cached and nothing installed before
    Missing(String),
}

/// Outcome of refreshing a single resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOutcome {
    pub resource: Resource,
    pub fetch: FetchOutcome,
    pub install: InstallOutcome,
}

impl ResourceOutcome {
    /// Check if either step failed.
    pub fn is_failure(&self) -> bool {
        matches!(self.fetch, FetchOutcome::Failed(_))
            || !matches!(self.install, InstallOutcome::Installed { .. })
    }
}

impl fmt::Display for ResourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.resource)?;
        match &self.fetch {
            FetchOutcome::Fresh => write!(f, "cache fresh")?,
            FetchOutcome::Downloaded { bytes } => write!(f, "downloaded {} bytes", bytes)?,
            FetchOutcome::Failed(e) => write!(f, "fetch failed ({})", e)?,
        }
        match &self.install {
            InstallOutcome::Installed { entries, rejected } => {
                write!(f, ", installed {} entries", entries)?;
                if *rejected > 0 {
                    write!(f, " ({} rejected)", rejected)?;
                }
                Ok(())
            }
            InstallOutcome::KeptPrevious(e) => write!(f, ", kept previous ({})", e),
            InstallOutcome::Missing(e) => write!(f, ", not installed ({})", e),
        }
    }
}

/// Outcomes of one refresh cycle, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub outcomes: Vec<ResourceOutcome>,
}

impl RefreshReport {
    /// Outcome for a given resource.
    pub fn get(&self, resource: &Resource) -> Option<&ResourceOutcome> {
        self.outcomes.iter().find(|o| &o.resource == resource)
    }

    /// Number of resources with any failure.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    /// Number of resources that were downloaded.
    pub fn downloads(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.fetch, FetchOutcome::Downloaded { .. }))
            .count()
    }

    /// Check if every resource was installed from fresh or downloaded data.
    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

impl fmt::Display for RefreshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resources, {} downloaded, {} failed",
            self.outcomes.len(),
            self.downloads(),
            self.failures()
        )
    }
}
