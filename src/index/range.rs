//! Per-country CIDR range index.

use ipnet::{IpNet, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::{significant, AddressSet};
use crate::error::IndexError;

/// RangeIndex answers point-containment queries over a static set of CIDR blocks.
///
/// Blocks are flattened into inclusive numeric intervals, sorted, and merged
/// where they overlap or touch. A lookup is a single binary search, so its
/// cost does not depend on how the blocks were written in the zone file.
///
/// # Examples
/// ```
/// use zoneauth::index::{AddressSet, RangeIndex};
///
/// let index = RangeIndex::build(["203.0.113.0/24", "2001:db8::/32", "garbage"]);
/// assert!(index.contains_str("203.0.113.5"));
/// assert!(index.contains_str("2001:db8::1"));
/// assert!(!index.contains_str("8.8.8.8"));
/// assert_eq!(index.rejected_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RangeIndex {
    /// Disjoint IPv4 intervals sorted by start
    v4: Vec<(u32, u32)>,
    /// Disjoint IPv6 intervals sorted by start
    v6: Vec<(u128, u128)>,
    /// Blocks accepted during build
    blocks: usize,
    /// Lines rejected during build
    rejected: usize,
}

impl RangeIndex {
    /// Create an index that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from zone-file lines.
    ///
    /// Blank lines and `#` comments are ignored. Lines that do not parse as a
    /// CIDR block are counted in [`rejected_count`](Self::rejected_count) and
    /// skipped; they never abort the build.
    pub fn build<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut networks = Vec::new();
        let mut rejected = 0;

        for line in lines {
            let Some(line) = significant(line.as_ref()) else {
                continue;
            };
            match Self::parse_block(line) {
                Ok(net) => networks.push(net),
                Err(e) => {
                    log::trace!("Skipping zone entry: {}", e);
                    rejected += 1;
                }
            }
        }

        let mut index = Self::from_networks(networks);
        index.rejected = rejected;
        index
    }

    /// Build an index from already parsed networks.
    pub fn from_networks<I>(networks: I) -> Self
    where
        I: IntoIterator<Item = IpNet>,
    {
        let mut v4 = Vec::new();
        let mut v6 = Vec::new();
        let mut blocks = 0;

        for net in networks {
            blocks += 1;
            match net {
                IpNet::V4(n) => v4.push((u32::from(n.network()), u32::from(n.broadcast()))),
                IpNet::V6(n) => {
                    let mapped = mapped_v4_range(&n);
                    let inside_mapped = n.prefix_len() >= 96 && mapped.is_some();
                    if let Some(range) = mapped {
                        v4.push(range);
                    }
                    if !inside_mapped {
                        v6.push((u128::from(n.network()), u128::from(n.broadcast())));
                    }
                }
            }
        }

        Self {
            v4: merge(v4),
            v6: merge(v6),
            blocks,
            rejected: 0,
        }
    }

    /// Parse one zone entry.
    ///
    /// Accepts standard CIDR notation and bare addresses (treated as a single
    /// host). Host bits below the prefix are ignored.
    pub fn parse_block(entry: &str) -> Result<IpNet, IndexError> {
        let entry = entry.trim();
        if entry.contains('/') {
            entry
                .parse::<IpNet>()
                .map(|net| net.trunc())
                .map_err(|_| IndexError::InvalidCidr(entry.to_string()))
        } else {
            entry
                .parse::<IpAddr>()
                .map(IpNet::from)
                .map_err(|_| IndexError::InvalidCidr(entry.to_string()))
        }
    }

    /// Number of blocks accepted during build (before merging).
    pub fn block_count(&self) -> usize {
        self.blocks
    }

    /// Number of lines rejected during build.
    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    /// Number of disjoint intervals after merging.
    pub fn interval_count(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    fn contains_v4(&self, ip: Ipv4Addr) -> bool {
        lookup(&self.v4, u32::from(ip))
    }

    fn contains_v6(&self, ip: Ipv6Addr) -> bool {
        lookup(&self.v6, u128::from(ip))
    }
}

impl AddressSet for RangeIndex {
    fn contains(&self, ip: IpAddr) -> bool {
        match ip.to_canonical() {
            IpAddr::V4(v4) => self.contains_v4(v4),
            IpAddr::V6(v6) => self.contains_v6(v6),
        }
    }

    fn len(&self) -> usize {
        self.blocks
    }
}

/// IPv4 interval covered by the part of `net` inside `::ffff:0:0/96`.
///
/// Queries are canonicalized before lookup, so mapped addresses must live in
/// the IPv4 table to be reachable.
fn mapped_v4_range(net: &Ipv6Net) -> Option<(u32, u32)> {
    if net.prefix_len() < 96 {
        return net
            .contains(&Ipv4Addr::UNSPECIFIED.to_ipv6_mapped())
            .then_some((0, u32::MAX));
    }
    let start = net.network().to_ipv4_mapped()?;
    let end = net.broadcast().to_ipv4_mapped()?;
    Some((u32::from(start), u32::from(end)))
}

/// Integer address types the interval table is built over.
trait Bound: Copy + Ord {
    fn successor(self) -> Option<Self>;
}

impl Bound for u32 {
    fn successor(self) -> Option<Self> {
        self.checked_add(1)
    }
}

impl Bound for u128 {
    fn successor(self) -> Option<Self> {
        self.checked_add(1)
    }
}

/// Sort intervals and coalesce the ones that overlap or are adjacent.
fn merge<T: Bound>(mut intervals: Vec<(T, T)>) -> Vec<(T, T)> {
    intervals.sort_unstable();

    let mut merged: Vec<(T, T)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        if let Some(last) = merged.last_mut() {
            // A last interval ending at the type's max swallows everything after it.
            let touches = last.1.successor().map_or(true, |next| start <= next);
            if touches {
                if end > last.1 {
                    last.1 = end;
                }
                continue;
            }
        }
        merged.push((start, end));
    }
    merged.shrink_to_fit();
    merged
}

/// Find the last interval starting at or below `x` and check its end.
fn lookup<T: Bound>(intervals: &[(T, T)], x: T) -> bool {
    let idx = intervals.partition_point(|&(start, _)| start <= x);
    idx > 0 && intervals[idx - 1].1 >= x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    /// Linear scan used as the reference for lookups.
    fn naive_contains(blocks: &[IpNet], addr: IpAddr) -> bool {
        blocks.iter().any(|net| net.contains(&addr))
    }

    /// Small deterministic generator so failures are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next_u32(&mut self) -> u32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 32) as u32
        }
    }

    #[test]
    fn test_ipv4_match() {
        let index = RangeIndex::build(["192.168.0.0/16", "10.0.0.0/8"]);

        assert!(index.contains(ip("192.168.1.1")));
        assert!(index.contains(ip("192.168.255.255")));
        assert!(index.contains(ip("10.0.0.1")));
        assert!(!index.contains(ip("8.8.8.8")));
        assert!(!index.contains(ip("192.169.0.0")));
    }

    #[test]
    fn test_ipv6_match() {
        let index = RangeIndex::build(["fc00::/7", "2001:db8::/32"]);

        assert!(index.contains(ip("fc00::1")));
        assert!(index.contains(ip("fd00::1")));
        assert!(index.contains(ip("2001:db8::1")));
        assert!(!index.contains(ip("2001:4860::1")));
        assert!(!index.contains(ip("10.0.0.1")));
    }

    #[test]
    fn test_block_boundaries() {
        let index = RangeIndex::build(["203.0.113.0/24"]);

        assert!(index.contains(ip("203.0.113.0")));
        assert!(index.contains(ip("203.0.113.255")));
        assert!(!index.contains(ip("203.0.112.255")));
        assert!(!index.contains(ip("203.0.114.0")));
    }

    #[test]
    fn test_empty_index_matches_nothing() {
        let empty = RangeIndex::build(Vec::<String>::new());
        assert!(empty.is_empty());
        assert_eq!(empty.interval_count(), 0);
        for addr in ["0.0.0.0", "255.255.255.255", "8.8.8.8", "::", "::1"] {
            assert!(!empty.contains(ip(addr)));
        }
        assert!(!RangeIndex::empty().contains(ip("1.2.3.4")));
    }

    #[test]
    fn test_full_address_space() {
        let index = RangeIndex::build(["0.0.0.0/0", "10.0.0.0/8"]);
        assert_eq!(index.interval_count(), 1);
        assert!(index.contains(ip("0.0.0.0")));
        assert!(index.contains(ip("255.255.255.255")));
        assert!(!index.contains(ip("::1")));
    }

    #[test]
    fn test_overlapping_and_adjacent_blocks_merge() {
        let index = RangeIndex::build([
            "10.0.0.0/24",
            "10.0.1.0/24",
            "10.0.0.128/25",
            "10.0.0.0/16",
            "172.16.0.0/12",
        ]);
        assert_eq!(index.block_count(), 5);
        assert_eq!(index.interval_count(), 2);
        assert!(index.contains(ip("10.0.200.1")));
        assert!(index.contains(ip("172.31.255.255")));
        assert!(!index.contains(ip("10.1.0.0")));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let valid = ["198.51.100.0/24", "203.0.113.0/24", "2001:db8::/48"];
        let mixed = [
            "198.51.100.0/24",
            "not a cidr",
            "203.0.113.0/24",
            "300.1.1.1/8",
            "10.0.0.0/33",
            "",
            "# comment",
            "2001:db8::/48",
        ];

        let clean = RangeIndex::build(valid);
        let noisy = RangeIndex::build(mixed);

        assert_eq!(noisy.block_count(), 3);
        assert_eq!(noisy.rejected_count(), 3);
        assert_eq!(clean.rejected_count(), 0);

        for addr in [
            "198.51.100.1",
            "203.0.113.200",
            "2001:db8::5",
            "10.0.0.1",
            "300.1.1.1",
            "8.8.8.8",
        ] {
            assert_eq!(clean.contains_str(addr), noisy.contains_str(addr), "{}", addr);
        }
    }

    #[test]
    fn test_bare_address_is_host_block() {
        let index = RangeIndex::build(["203.0.113.9", "2001:db8::7"]);
        assert!(index.contains(ip("203.0.113.9")));
        assert!(!index.contains(ip("203.0.113.10")));
        assert!(index.contains(ip("2001:db8::7")));
        assert!(!index.contains(ip("2001:db8::8")));
    }

    #[test]
    fn test_host_bits_truncated() {
        let net = RangeIndex::parse_block("10.1.2.3/8").unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/8");
        assert!(RangeIndex::parse_block("10.0.0.0/").is_err());
        assert!(RangeIndex::parse_block("/8").is_err());
    }

    #[test]
    fn test_mapped_ipv4_query() {
        let index = RangeIndex::build(["203.0.113.0/24"]);
        assert!(index.contains(ip("::ffff:203.0.113.5")));
        assert!(!index.contains(ip("::ffff:8.8.8.8")));
    }

    #[test]
    fn test_mapped_ipv4_block() {
        let lines = ["::ffff:203.0.113.0/120", "2001:db8::/32", "::/64"];
        let blocks: Vec<IpNet> = lines
            .iter()
            .map(|l| RangeIndex::parse_block(l).unwrap())
            .collect();
        let index = RangeIndex::build(lines);

        for query in [
            "::ffff:203.0.113.5",
            "::ffff:203.0.113.255",
            "::ffff:203.0.114.1",
            "::ffff:8.8.8.8",
            "2001:db8::1",
            "::1",
            "1::",
        ] {
            let addr = ip(query);
            assert_eq!(index.contains(addr), naive_contains(&blocks, addr), "{}", query);
        }

        // Plain IPv4 queries see the same block.
        assert!(index.contains(ip("203.0.113.5")));
    }

    #[test]
    fn test_mapped_block_outside_wide_prefix() {
        let index = RangeIndex::build(["::ffff:198.51.100.0/120"]);
        assert!(index.contains(ip("198.51.100.7")));
        assert!(!index.contains(ip("198.51.101.7")));
        assert_eq!(index.interval_count(), 1);
    }

    #[test]
    fn test_malformed_query_is_false() {
        let index = RangeIndex::build(["0.0.0.0/0", "::/0"]);
        assert!(!index.contains_str(""));
        assert!(!index.contains_str("not-an-ip"));
        assert!(!index.contains_str("1.2.3"));
        assert!(!index.contains_str("1.2.3.4/24"));
        assert!(index.contains_str(" 1.2.3.4 "));
    }

    #[test]
    fn test_matches_naive_scan() {
        let mut rng = Lcg(0x5eed);
        let mut blocks = Vec::new();
        let mut lines = Vec::new();

        for _ in 0..500 {
            let prefix = 8 + (rng.next_u32() % 25) as u8;
            let addr = Ipv4Addr::from(rng.next_u32());
            let net = IpNet::new(IpAddr::V4(addr), prefix).unwrap().trunc();
            lines.push(format!("{}/{}", addr, prefix));
            blocks.push(net);
        }

        let index = RangeIndex::build(&lines);
        assert_eq!(index.block_count(), 500);

        for _ in 0..20_000 {
            let addr = IpAddr::V4(Ipv4Addr::from(rng.next_u32()));
            assert_eq!(index.contains(addr), naive_contains(&blocks, addr), "{}", addr);
        }
        // Probe the edges of every block as well.
        for net in &blocks {
            for addr in [net.network(), net.broadcast()] {
                assert!(index.contains(addr), "{}", addr);
            }
        }
    }

    #[test]
    fn test_matches_naive_scan_ipv6() {
        let mut rng = Lcg(42);
        let mut blocks = Vec::new();

        for _ in 0..200 {
            // Keep blocks in a narrow slice of the space so queries hit often.
            let high = 0x2001_0db8u128 << 96;
            let low = (u128::from(rng.next_u32()) << 64) | u128::from(rng.next_u32());
            let prefix = 40 + (rng.next_u32() % 60) as u8;
            let addr = Ipv6Addr::from(high | low);
            blocks.push(IpNet::new(IpAddr::V6(addr), prefix).unwrap().trunc());
        }

        let index = RangeIndex::from_networks(blocks.clone());

        for _ in 0..10_000 {
            let high = 0x2001_0db8u128 << 96;
            let low = (u128::from(rng.next_u32()) << 64) | u128::from(rng.next_u32());
            let addr = IpAddr::V6(Ipv6Addr::from(high | low));
            assert_eq!(index.contains(addr), naive_contains(&blocks, addr), "{}", addr);
        }
    }
}
