//! Installed lookup structures with lock-free reads and atomic replacement.

use ahash::AHashMap;
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::index::{ExclusionList, RangeIndex};

type CountryMap = AHashMap<String, Arc<RangeIndex>>;

/// ZoneStore holds the currently installed country indexes and exclusion list.
///
/// Readers load a snapshot pointer and never block. An install publishes a
/// new map that shares every untouched country's `Arc`, so replacing one
/// country never disturbs lookups against another.
///
/// # Example
///
/// ```
/// use zoneauth::index::RangeIndex;
/// use zoneauth::store::ZoneStore;
///
/// let store = ZoneStore::new();
/// store.install("US", RangeIndex::build(["203.0.113.0/24"]));
/// assert!(store.get("us").is_some());
/// assert!(store.get("de").is_none());
/// ```
pub struct ZoneStore {
    countries: ArcSwap<CountryMap>,
    exclusions: ArcSwapOption<ExclusionList>,
    /// Incremented on every install
    generation: AtomicU64,
}

impl ZoneStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            countries: ArcSwap::from_pointee(CountryMap::default()),
            exclusions: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
        }
    }

    /// Normalize a country code for use as a key.
    pub fn normalize(country: &str) -> String {
        country.trim().to_ascii_lowercase()
    }

    /// Get the installed index for `country`.
    ///
    /// `None` means the country was never installed, which is distinct from
    /// an installed index with no blocks.
    pub fn get(&self, country: &str) -> Option<Arc<RangeIndex>> {
        let key = Self::normalize(country);
        self.countries.load().get(&key).cloned()
    }

    /// Atomically install `index` for `country`, replacing any prior entry.
    pub fn install(&self, country: &str, index: RangeIndex) {
        let key = Self::normalize(country);
        let index = Arc::new(index);
        self.countries.rcu(|current| {
            let mut next = CountryMap::clone(current);
            next.insert(key.clone(), Arc::clone(&index));
            next
        });
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Currently installed exclusion list, if one was ever installed.
    pub fn exclusions(&self) -> Option<Arc<ExclusionList>> {
        self.exclusions.load_full()
    }

    /// Atomically replace the exclusion list.
    pub fn install_exclusions(&self, list: ExclusionList) {
        self.exclusions.store(Some(Arc::new(list)));
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Installed country codes, sorted.
    pub fn countries(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.countries.load().keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Get the current generation (incremented on each install).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for ZoneStore {
    fn default() -> Self {
        Self::new()
    }
}
