//! Address lookup structures and the trait they share.

mod exclusion;
mod range;

pub use exclusion::ExclusionList;
pub use range::RangeIndex;

use std::net::IpAddr;

/// AddressSet answers membership queries for IP addresses.
///
/// Implementations are immutable after construction, so a built set can be
/// shared across threads and swapped out wholesale on refresh.
pub trait AddressSet: Send + Sync {
    /// Check whether `ip` is a member of this set.
    fn contains(&self, ip: IpAddr) -> bool;

    /// Parse `ip` and check membership.
    ///
    /// Malformed input is never a member.
    fn contains_str(&self, ip: &str) -> bool {
        match ip.trim().parse::<IpAddr>() {
            Ok(addr) => self.contains(addr),
            Err(_) => false,
        }
    }

    /// Number of entries accepted when the set was built.
    fn len(&self) -> usize;

    /// Check if the set has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strip whitespace and drop blank and `#` comment lines.
pub(crate) fn significant(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        None
    } else {
        Some(line)
    }
}
