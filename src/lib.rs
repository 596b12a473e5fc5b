//! zoneauth - country-zone IP access control for reverse-proxy auth subrequests.
//!
//! Given a country code and a client IP, zoneauth answers whether the IP lies
//! inside the address space allocated to that country, optionally also
//! requiring that it is not a known anonymizer exit address.
//!
//! # Features
//!
//! - **Range index**: per-country CIDR sets flattened into merged intervals,
//!   answered with a single binary search
//! - **Exclusion list**: exact-match set of anonymizer exit addresses
//! - **Disk cache**: one file per resource, refetched when older than a
//!   freshness threshold
//! - **Hot reload**: rebuilt structures are swapped in atomically; lookups
//!   never block on a refresh
//! - **HTTP front end**: `GET /allowbycountry/{country}/{ip}` → 200 or 403
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use zoneauth::{DecisionEngine, ExclusionList, RangeIndex, ZoneStore};
//!
//! let store = Arc::new(ZoneStore::new());
//! store.install("us", RangeIndex::build(["198.51.100.0/24"]));
//! store.install_exclusions(ExclusionList::build(["198.51.100.7"]));
//!
//! let engine = DecisionEngine::new(Arc::clone(&store), true);
//! assert!(engine.decide("us", "198.51.100.1"));
//! assert!(!engine.decide("us", "198.51.100.7")); // exit node
//! assert!(!engine.decide("de", "198.51.100.1")); // country not tracked
//! ```
//!
//! # Keeping data current
//!
//! ```ignore
//! use std::sync::Arc;
//! use zoneauth::{Config, Refresher, ZoneStore};
//!
//! let config = Config::load("zoneauth.json")?;
//! let store = Arc::new(ZoneStore::new());
//! let refresher = Refresher::from_config(&config, Arc::clone(&store));
//!
//! // Downloads stale or missing zones, then installs everything cached.
//! let report = refresher.refresh_all(&config.allowed_countries, config.block_anonymizers);
//! println!("{}", report);
//! ```

mod error;

pub mod cache;
pub mod config;
pub mod decision;
pub mod fetch;
pub mod index;
pub mod refresh;
pub mod server;
pub mod store;

// Re-export core types
pub use error::{Error, ExclusionError, IndexError, Result};

pub use cache::{CacheStore, Resource};
pub use config::Config;
pub use decision::{DecisionEngine, Reason, Verdict};
pub use fetch::{Fetcher, HttpFetcher};
pub use index::{AddressSet, ExclusionList, RangeIndex};
pub use refresh::{RefreshReport, Refresher, Scheduler};
pub use store::ZoneStore;
