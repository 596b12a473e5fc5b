//! On-disk snapshot store for zone files and the exclusion list.
//!
//! Every cached resource is a plain newline-delimited text file under one
//! directory. Freshness comes from the file's modification time; there is no
//! separate metadata file.

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::Result;

/// Suffix of per-country zone files.
pub const ZONE_SUFFIX: &str = "-aggregated.zone";

/// File name of the cached anonymizer exit list.
pub const EXCLUSION_FILE: &str = "anonymizer-exits.list";

/// Default zone freshness (160 hours).
pub const DEFAULT_ZONE_MAX_AGE: Duration = Duration::from_secs(160 * 60 * 60);

/// Default exit-list freshness (1 hour).
pub const DEFAULT_EXCLUSION_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// A cached resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Aggregated CIDR zone of one country (lower-case code)
    Zone(String),
    /// Anonymizer exit addresses
    Exclusion,
}

impl Resource {
    /// Zone resource for `country`, normalized to lower case.
    pub fn zone(country: &str) -> Self {
        Resource::Zone(country.trim().to_ascii_lowercase())
    }

    /// File name of this resource inside the cache directory.
    pub fn file_name(&self) -> String {
        match self {
            Resource::Zone(country) => format!("{}{}", country, ZONE_SUFFIX),
            Resource::Exclusion => EXCLUSION_FILE.to_string(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Zone(country) => write!(f, "zone {}", country),
            Resource::Exclusion => write!(f, "anonymizer exit list"),
        }
    }
}

/// CacheStore owns the cache directory and the staleness policy.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    zone_max_age: Duration,
    exclusion_max_age: Duration,
}

impl CacheStore {
    /// Create a store rooted at `dir` with the default freshness thresholds.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            zone_max_age: DEFAULT_ZONE_MAX_AGE,
            exclusion_max_age: DEFAULT_EXCLUSION_MAX_AGE,
        }
    }

    /// Set the zone freshness threshold.
    pub fn with_zone_max_age(mut self, max_age: Duration) -> Self {
        self.zone_max_age = max_age;
        self
    }

    /// Set the exit-list freshness threshold.
    pub fn with_exclusion_max_age(mut self, max_age: Duration) -> Self {
        self.exclusion_max_age = max_age;
        self
    }

    /// Get the cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the path of a resource's cached file.
    pub fn path(&self, resource: &Resource) -> PathBuf {
        self.dir.join(resource.file_name())
    }

    /// Freshness threshold that applies to `resource`.
    pub fn max_age(&self, resource: &Resource) -> Duration {
        match resource {
            Resource::Zone(_) => self.zone_max_age,
            Resource::Exclusion => self.exclusion_max_age,
        }
    }

    /// Modification time of the cached file, if it exists.
    pub fn last_modified(&self, resource: &Resource) -> Option<SystemTime> {
        fs::metadata(self.path(resource))
            .and_then(|meta| meta.modified())
            .ok()
    }

    /// Age of the cached file. A modification time in the future counts as zero.
    pub fn age(&self, resource: &Resource) -> Option<Duration> {
        self.last_modified(resource).map(|modified| {
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO)
        })
    }

    /// Check whether `resource` should be fetched again.
    ///
    /// Returns `true` if:
    /// - the file does not exist or its metadata cannot be read
    /// - the file is older than the resource's threshold
    pub fn is_stale(&self, resource: &Resource) -> bool {
        match self.age(resource) {
            None => true,
            Some(age) => age > self.max_age(resource),
        }
    }

    /// Write fetched content for `resource`.
    ///
    /// Content goes to a temporary file in the cache directory which is then
    /// renamed over the target, so on failure the previous file is untouched.
    /// Returns the number of bytes written.
    pub fn persist(&self, resource: &Resource, data: &[u8]) -> Result<u64> {
        fs::create_dir_all(&self.dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;

        let path = self.path(resource);
        temp.persist(&path).map_err(|e| e.error)?;

        log::debug!("Persisted {} ({} bytes) to {:?}", resource, data.len(), path);
        Ok(data.len() as u64)
    }

    /// Read back the cached lines of `resource`.
    ///
    /// Returns `Ok(None)` if nothing is cached and an error if the file exists
    /// but cannot be read.
    pub fn load(&self, resource: &Resource) -> Result<Option<Vec<String>>> {
        let path = self.path(resource);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content.lines().map(str::to_string).collect())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
