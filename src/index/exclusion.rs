//! Exact-match set of anonymizer exit addresses.

use ahash::AHashSet;
use std::net::IpAddr;

use super::{significant, AddressSet};
use crate::error::ExclusionError;

/// ExclusionList holds individual IP addresses that must never be authorized.
///
/// # Examples
/// ```
/// use zoneauth::index::{AddressSet, ExclusionList};
///
/// let list = ExclusionList::build(["# exit nodes", "198.51.100.7", "bogus"]);
/// assert!(list.contains_str("198.51.100.7"));
/// assert_eq!(list.len(), 1);
/// assert_eq!(list.rejected_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    addresses: AHashSet<IpAddr>,
    rejected: usize,
}

impl ExclusionList {
    /// Create a list that excludes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a list from exit-list lines.
    ///
    /// Blank lines and `#` comments are ignored; invalid tokens are counted
    /// and skipped.
    pub fn build<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addresses = AHashSet::new();
        let mut rejected = 0;

        for line in lines {
            let Some(line) = significant(line.as_ref()) else {
                continue;
            };
            match Self::parse_address(line) {
                Ok(ip) => {
                    addresses.insert(ip);
                }
                Err(e) => {
                    log::trace!("Skipping exclusion entry: {}", e);
                    rejected += 1;
                }
            }
        }

        Self {
            addresses,
            rejected,
        }
    }

    /// Parse one exit-list entry into its canonical address.
    pub fn parse_address(entry: &str) -> Result<IpAddr, ExclusionError> {
        let entry = entry.trim();
        entry
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical())
            .map_err(|_| ExclusionError::InvalidIp(entry.to_string()))
    }

    /// Number of lines rejected during build.
    pub fn rejected_count(&self) -> usize {
        self.rejected
    }
}

impl AddressSet for ExclusionList {
    fn contains(&self, ip: IpAddr) -> bool {
        self.addresses.contains(&ip.to_canonical())
    }

    fn len(&self) -> usize {
        self.addresses.len()
    }
}
