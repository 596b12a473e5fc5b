//! Keeps the installed zones and exit list in step with the remote sources.
//!
//! A refresh cycle walks every tracked resource through the same steps:
//! check staleness, fetch if needed, persist, rebuild from the cache, and
//! install. Each step's result is recorded in a [`RefreshReport`]; no failure
//! escapes a resource or aborts the cycle.

mod report;
mod scheduler;

pub use report::{FetchOutcome, InstallOutcome, RefreshReport, ResourceOutcome};
pub use scheduler::Scheduler;

use std::sync::Arc;

use crate::cache::{CacheStore, Resource};
use crate::config::Config;
use crate::fetch::{self, Fetcher, HttpFetcher, DEFAULT_ANONYMIZER_URL, DEFAULT_ZONE_BASE_URL};
use crate::index::{AddressSet, ExclusionList, RangeIndex};
use crate::store::ZoneStore;

/// Refresher downloads, caches, and installs zone data.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use zoneauth::{cache::CacheStore, fetch::HttpFetcher, refresh::Refresher, store::ZoneStore};
///
/// let store = Arc::new(ZoneStore::new());
/// let refresher = Refresher::new(
///     CacheStore::new("/var/cache/zoneauth"),
///     Arc::new(HttpFetcher::new()),
///     Arc::clone(&store),
/// );
///
/// let report = refresher.refresh_all(&["us".to_string()], true);
/// println!("{}", report);
/// ```
pub struct Refresher {
    cache: CacheStore,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<ZoneStore>,
    zone_base_url: String,
    anonymizer_url: String,
}

impl Refresher {
    /// Create a refresher using the default remote URLs.
    pub fn new(cache: CacheStore, fetcher: Arc<dyn Fetcher>, store: Arc<ZoneStore>) -> Self {
        Self {
            cache,
            fetcher,
            store,
            zone_base_url: DEFAULT_ZONE_BASE_URL.to_string(),
            anonymizer_url: DEFAULT_ANONYMIZER_URL.to_string(),
        }
    }

    /// Create a refresher with an HTTP fetcher, cache, and URLs taken from `config`.
    pub fn from_config(config: &Config, store: Arc<ZoneStore>) -> Self {
        let fetcher = Arc::new(HttpFetcher::with_timeout(config.fetch_timeout()));
        Self::new(config.cache_store(), fetcher, store)
            .with_zone_base_url(&config.zone_base_url)
            .with_anonymizer_url(&config.anonymizer_url)
    }

    /// Set the base URL of the zone files.
    pub fn with_zone_base_url(mut self, url: &str) -> Self {
        self.zone_base_url = url.to_string();
        self
    }

    /// Set the URL of the anonymizer exit list.
    pub fn with_anonymizer_url(mut self, url: &str) -> Self {
        self.anonymizer_url = url.to_string();
        self
    }

    /// Get the cache store.
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Get the store this refresher installs into.
    pub fn store(&self) -> &Arc<ZoneStore> {
        &self.store
    }

    /// Refresh every country in `countries` and, if `block_anonymizers` is
    /// set, the exit list.
    pub fn refresh_all(&self, countries: &[String], block_anonymizers: bool) -> RefreshReport {
        log::info!(
            "Refreshing {} countries (anonymizer blocking: {})",
            countries.len(),
            block_anonymizers
        );

        let mut report = RefreshReport::default();
        for country in countries {
            report.outcomes.push(self.refresh_zone(country));
        }
        if block_anonymizers {
            report.outcomes.push(self.refresh_exclusions());
        }

        if report.is_success() {
            log::info!("Refresh complete: {}", report);
        } else {
            log::warn!("Refresh complete with failures: {}", report);
        }
        report
    }

    /// Refresh a single country's zone.
    pub fn refresh_zone(&self, country: &str) -> ResourceOutcome {
        let country = ZoneStore::normalize(country);
        let resource = Resource::Zone(country.clone());
        let url = fetch::zone_url(&self.zone_base_url, &country);

        let fetch = self.fetch_if_stale(&resource, &url);
        let had_previous = self.store.get(&country).is_some();
        let install = match self.cache.load(&resource) {
            Ok(Some(lines)) => {
                let index = RangeIndex::build(&lines);
                let outcome = InstallOutcome::Installed {
                    entries: index.block_count(),
                    rejected: index.rejected_count(),
                };
                self.store.install(&country, index);
                outcome
            }
            Ok(None) => not_installed(had_previous, "no cached data".to_string()),
            Err(e) => not_installed(had_previous, e.to_string()),
        };

        finish(resource, fetch, install)
    }

    /// Refresh the anonymizer exit list.
    pub fn refresh_exclusions(&self) -> ResourceOutcome {
        let resource = Resource::Exclusion;

        let fetch = self.fetch_if_stale(&resource, &self.anonymizer_url);
        let had_previous = self.store.exclusions().is_some();
        let install = match self.cache.load(&resource) {
            Ok(Some(lines)) => {
                let list = ExclusionList::build(&lines);
                let outcome = InstallOutcome::Installed {
                    entries: list.len(),
                    rejected: list.rejected_count(),
                };
                self.store.install_exclusions(list);
                outcome
            }
            Ok(None) => not_installed(had_previous, "no cached data".to_string()),
            Err(e) => not_installed(had_previous, e.to_string()),
        };

        finish(resource, fetch, install)
    }

    /// Fetch and persist `resource` if the cached copy is stale.
    fn fetch_if_stale(&self, resource: &Resource, url: &str) -> FetchOutcome {
        if !self.cache.is_stale(resource) {
            log::info!("{} is fresh, not downloading", resource);
            return FetchOutcome::Fresh;
        }

        log::info!("Downloading {} from {}", resource, url);
        let result = self
            .fetcher
            .fetch(url)
            .and_then(|raw| fetch::decode_body(url, raw))
            .and_then(|body| self.cache.persist(resource, &body));

        match result {
            Ok(bytes) => FetchOutcome::Downloaded { bytes },
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }
}

fn not_installed(had_previous: bool, reason: String) -> InstallOutcome {
    if had_previous {
        InstallOutcome::KeptPrevious(reason)
    } else {
        InstallOutcome::Missing(reason)
    }
}

fn finish(resource: Resource, fetch: FetchOutcome, install: InstallOutcome) -> ResourceOutcome {
    let outcome = ResourceOutcome {
        resource,
        fetch,
        install,
    };
    if outcome.is_failure() {
        log::warn!("{}", outcome);
    } else {
        log::info!("{}", outcome);
    }
    outcome
}
