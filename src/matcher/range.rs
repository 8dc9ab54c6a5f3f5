//! IP range (CIDR) matcher.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::io::BufRead;
use std::net::IpAddr;

use super::{for_each_line, IpTrie, ListMatcher, LoadSummary};
use crate::error::CidrLineError;
use crate::Result;

/// RangeMatcher matches addresses against IPv4 and IPv6 networks.
///
/// Each list line is either a bare address (stored as a /32 or /128 host
/// route) or CIDR notation. Host bits in CIDR entries are ignored, so
/// `10.0.0.7/24` is stored as `10.0.0.0/24`.
///
/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) and networks inside
/// `::ffff:0:0/96` are treated as IPv4, both in lists and in lookups.
///
/// # Examples
/// ```
/// use k2filter::matcher::RangeMatcher;
///
/// let mut ranges = RangeMatcher::new();
/// ranges.add("10.0.0.0/24").unwrap();
/// ranges.add("2001:db8::1").unwrap();
///
/// assert!(ranges.contains("10.0.0.255".parse().unwrap()));
/// assert!(!ranges.contains("10.0.1.0".parse().unwrap()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RangeMatcher {
    v4: IpTrie<Ipv4Net>,
    v6: IpTrie<Ipv6Net>,
}

impl RangeMatcher {
    /// Create an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one cleaned entry into a network.
    pub fn parse_entry(entry: &str) -> std::result::Result<IpNet, CidrLineError> {
        if let Ok(ip) = entry.parse::<IpAddr>() {
            return Ok(IpNet::from(unmap(ip)));
        }
        let network = entry
            .parse::<IpNet>()
            .map_err(|_| CidrLineError::InvalidCidr(entry.to_string()))?
            .trunc();
        Ok(unmap_net(network))
    }

    /// Register one raw list line.
    ///
    /// Returns `Ok(false)` for comments, blank lines and duplicates.
    pub fn add(&mut self, line: &str) -> std::result::Result<bool, CidrLineError> {
        match super::clean_line(line) {
            Some(entry) => Ok(self.insert(Self::parse_entry(entry)?)),
            None => Ok(false),
        }
    }

    /// Register a network. Returns `false` if already present.
    pub fn insert(&mut self, network: IpNet) -> bool {
        match unmap_net(network) {
            IpNet::V4(net) => self.v4.insert(net),
            IpNet::V6(net) => self.v6.insert(net),
        }
    }

    /// Check if `ip` falls inside any stored network.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.longest_match(ip).is_some()
    }

    /// The most specific stored network containing `ip`.
    pub fn longest_match(&self, ip: IpAddr) -> Option<IpNet> {
        match unmap(ip) {
            IpAddr::V4(v4) => self.v4.longest_match(v4).map(IpNet::V4),
            IpAddr::V6(v6) => self.v6.longest_match(v6).map(IpNet::V6),
        }
    }

    /// Get the number of IPv4 networks.
    pub fn v4_count(&self) -> usize {
        self.v4.len()
    }

    /// Get the number of IPv6 networks.
    pub fn v6_count(&self) -> usize {
        self.v6.len()
    }

    /// Get the total number of networks.
    pub fn len(&self) -> usize {
        self.v4_count() + self.v6_count()
    }

    /// Check if no networks are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fold an IPv4-mapped IPv6 address into IPv4.
fn unmap(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        v4 => v4,
    }
}

/// Fold a network inside `::ffff:0:0/96` into the IPv4 network it covers.
fn unmap_net(network: IpNet) -> IpNet {
    let IpNet::V6(net) = network else {
        return network;
    };
    if net.prefix_len() < 96 {
        return network;
    }
    match net.network().to_ipv4_mapped() {
        Some(v4) => Ipv4Net::new(v4, net.prefix_len() - 96).map_or(network, IpNet::V4),
        None => network,
    }
}

impl ListMatcher for RangeMatcher {
    /// Load networks. Malformed lines are logged and skipped.
    fn load(&mut self, reader: &mut dyn BufRead) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();
        for_each_line(reader, |entry| {
            match Self::parse_entry(entry) {
                Ok(network) => {
                    if self.insert(network) {
                        summary.added += 1;
                    } else {
                        summary.duplicates += 1;
                    }
                }
                Err(e) => {
                    log::warn!("Skipping CIDR entry: {}", e);
                    summary.skipped += 1;
                }
            }
            Ok(())
        })?;
        Ok(summary)
    }

    fn len(&self) -> usize {
        RangeMatcher::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_ipv4_cidr_match() {
        let mut ranges = RangeMatcher::new();
        ranges.add("192.168.0.0/16").unwrap();
        ranges.add("10.0.0.0/8").unwrap();

        assert!(ranges.contains(ip("192.168.1.1")));
        assert!(ranges.contains(ip("192.168.255.255")));
        assert!(ranges.contains(ip("10.0.0.1")));
        assert!(!ranges.contains(ip("8.8.8.8")));
    }

    #[test]
    fn test_cidr_boundary() {
        let mut ranges = RangeMatcher::new();
        ranges.add("10.0.0.0/24").unwrap();

        assert!(ranges.contains(ip("10.0.0.255")));
        assert!(!ranges.contains(ip("10.0.1.0")));
    }

    #[test]
    fn test_bare_address_is_host_route() {
        let mut ranges = RangeMatcher::new();
        ranges.add("203.0.113.7").unwrap();
        ranges.add("2001:db8::53").unwrap();

        assert!(ranges.contains(ip("203.0.113.7")));
        assert!(!ranges.contains(ip("203.0.113.8")));
        assert!(ranges.contains(ip("2001:db8::53")));
        assert!(!ranges.contains(ip("2001:db8::54")));
        assert_eq!(ranges.v4_count(), 1);
        assert_eq!(ranges.v6_count(), 1);
    }

    #[test]
    fn test_host_bits_are_truncated() {
        let mut ranges = RangeMatcher::new();
        ranges.add("10.0.0.7/24").unwrap();

        assert_eq!(
            ranges.longest_match(ip("10.0.0.200")),
            Some("10.0.0.0/24".parse().unwrap())
        );
    }

    #[test]
    fn test_mapped_address_hits_v4_range() {
        let mut ranges = RangeMatcher::new();
        ranges.add("10.0.0.0/8").unwrap();

        assert!(ranges.contains(ip("::ffff:10.0.0.1")));
        assert_eq!(
            ranges.longest_match(ip("::ffff:10.9.9.9")),
            Some("10.0.0.0/8".parse().unwrap())
        );
        assert!(!ranges.contains(ip("::ffff:11.0.0.1")));
        // Only the mapped prefix folds; other v6 addresses stay v6
        assert!(!ranges.contains(ip("::10.0.0.1")));
        assert!(!ranges.contains(ip("2001:db8::a00:1")));
    }

    #[test]
    fn test_mapped_entries_are_stored_as_v4() {
        let mut ranges = RangeMatcher::new();
        ranges.add("::ffff:192.0.2.7").unwrap();
        ranges.add("::ffff:198.51.100.0/120").unwrap();

        assert_eq!(ranges.v4_count(), 2);
        assert_eq!(ranges.v6_count(), 0);
        assert!(ranges.contains(ip("192.0.2.7")));
        assert!(ranges.contains(ip("198.51.100.200")));
        assert!(!ranges.contains(ip("198.51.101.0")));
        assert_eq!(
            RangeMatcher::parse_entry("::ffff:198.51.100.0/120"),
            Ok("198.51.100.0/24".parse().unwrap())
        );
    }

    #[test]
    fn test_families_are_separate() {
        let mut ranges = RangeMatcher::new();
        ranges.add("0.0.0.0/0").unwrap();

        assert!(ranges.contains(ip("198.51.100.1")));
        assert!(!ranges.contains(ip("2001:db8::1")));
    }

    #[test]
    fn test_invalid_entries() {
        let mut ranges = RangeMatcher::new();

        assert!(ranges.add("invalid").is_err());
        assert!(ranges.add("192.168.1.1/33").is_err());
        assert!(ranges.add("10.0.0.0/").is_err());
        assert_eq!(ranges.add("# comment"), Ok(false));
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let text = "\
# sinkhole ranges
10.0.0.0/8
not-an-ip
192.0.2.1   # single host
10.0.0.0/8
fc00::/7
";
        let mut ranges = RangeMatcher::new();
        let summary = ranges.load(&mut text.as_bytes()).unwrap();

        assert_eq!(summary, LoadSummary { added: 3, duplicates: 1, skipped: 1 });
        assert!(ranges.contains(ip("10.20.30.40")));
        assert!(ranges.contains(ip("192.0.2.1")));
        assert!(ranges.contains(ip("fd12::1")));
    }
}
