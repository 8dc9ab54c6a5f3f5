//! Binary prefix trie for longest-prefix IP network lookups.

use ipnet::{Ipv4Net, Ipv6Net};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Network types that can be stored in an [`IpTrie`].
pub trait TrieKey: Copy {
    /// Address type looked up against stored networks.
    type Addr: Copy;

    /// Address width in bits.
    const WIDTH: u8;

    /// Network address bits, right-aligned.
    fn network_bits(&self) -> u128;

    /// Prefix length in bits.
    fn prefix_bits(&self) -> u8;

    /// Address bits, right-aligned.
    fn addr_bits(addr: Self::Addr) -> u128;
}

impl TrieKey for Ipv4Net {
    type Addr = Ipv4Addr;
    const WIDTH: u8 = 32;

    fn network_bits(&self) -> u128 {
        u32::from(self.network()) as u128
    }

    fn prefix_bits(&self) -> u8 {
        self.prefix_len()
    }

    fn addr_bits(addr: Ipv4Addr) -> u128 {
        u32::from(addr) as u128
    }
}

impl TrieKey for Ipv6Net {
    type Addr = Ipv6Addr;
    const WIDTH: u8 = 128;

    fn network_bits(&self) -> u128 {
        u128::from(self.network())
    }

    fn prefix_bits(&self) -> u8 {
        self.prefix_len()
    }

    fn addr_bits(addr: Ipv6Addr) -> u128 {
        u128::from(addr)
    }
}

/// Index 0 is the root, which is never a child, so 0 doubles as "no child".
#[derive(Debug, Clone)]
struct Node<N> {
    children: [u32; 2],
    network: Option<N>,
}

impl<N> Node<N> {
    fn empty() -> Self {
        Self {
            children: [0, 0],
            network: None,
        }
    }
}

/// IpTrie stores networks of one address family and returns the most
/// specific stored network containing a queried address.
#[derive(Debug, Clone)]
pub struct IpTrie<N> {
    nodes: Vec<Node<N>>,
    len: usize,
}

#[inline]
fn bit_at(bits: u128, width: u8, i: u8) -> usize {
    ((bits >> (width - 1 - i)) & 1) as usize
}

impl<N: TrieKey> IpTrie<N> {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty()],
            len: 0,
        }
    }

    /// Number of stored networks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no networks are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a network. Returns `false` if it was already present.
    pub fn insert(&mut self, network: N) -> bool {
        let bits = network.network_bits();
        let mut current = 0usize;

        for i in 0..network.prefix_bits() {
            let b = bit_at(bits, N::WIDTH, i);
            let next = self.nodes[current].children[b];
            current = if next != 0 {
                next as usize
            } else {
                let idx = self.nodes.len();
                self.nodes.push(Node::empty());
                self.nodes[current].children[b] = idx as u32;
                idx
            };
        }

        let node = &mut self.nodes[current];
        if node.network.is_some() {
            return false;
        }
        node.network = Some(network);
        self.len += 1;
        true
    }

    /// The most specific stored network containing `addr`.
    pub fn longest_match(&self, addr: N::Addr) -> Option<N> {
        let bits = N::addr_bits(addr);
        let mut current = 0usize;
        let mut best = self.nodes[0].network;

        for i in 0..N::WIDTH {
            let next = self.nodes[current].children[bit_at(bits, N::WIDTH, i)];
            if next == 0 {
                break;
            }
            current = next as usize;
            if let Some(network) = self.nodes[current].network {
                best = Some(network);
            }
        }
        best
    }

    /// Check if any stored network contains `addr`.
    pub fn contains(&self, addr: N::Addr) -> bool {
        self.longest_match(addr).is_some()
    }
}

impl<N: TrieKey> Default for IpTrie<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn test_v4_boundaries() {
        let mut trie = IpTrie::new();
        trie.insert(v4("10.0.0.0/24"));

        assert!(trie.contains("10.0.0.0".parse().unwrap()));
        assert!(trie.contains("10.0.0.255".parse().unwrap()));
        assert!(!trie.contains("10.0.1.0".parse().unwrap()));
        assert!(!trie.contains("9.255.255.255".parse().unwrap()));
    }

    #[test]
    fn test_longest_match_prefers_specific() {
        let mut trie = IpTrie::new();
        trie.insert(v4("10.0.0.0/8"));
        trie.insert(v4("10.1.0.0/16"));
        trie.insert(v4("10.1.2.3/32"));

        let lookup = |s: &str| trie.longest_match(s.parse().unwrap());
        assert_eq!(lookup("10.9.9.9"), Some(v4("10.0.0.0/8")));
        assert_eq!(lookup("10.1.9.9"), Some(v4("10.1.0.0/16")));
        assert_eq!(lookup("10.1.2.3"), Some(v4("10.1.2.3/32")));
        assert_eq!(lookup("11.0.0.1"), None);
    }

    #[test]
    fn test_duplicate_insert() {
        let mut trie = IpTrie::new();
        assert!(trie.insert(v4("192.168.0.0/16")));
        assert!(!trie.insert(v4("192.168.0.0/16")));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_default_route() {
        let mut trie = IpTrie::new();
        trie.insert(v4("0.0.0.0/0"));

        assert!(trie.contains("1.2.3.4".parse().unwrap()));
        assert!(trie.contains("255.255.255.255".parse().unwrap()));
    }

    #[test]
    fn test_v6() {
        let mut trie: IpTrie<Ipv6Net> = IpTrie::new();
        trie.insert("2001:db8::/32".parse().unwrap());
        trie.insert("::1/128".parse().unwrap());

        assert!(trie.contains("2001:db8::1".parse().unwrap()));
        assert!(trie.contains("2001:db8:ffff:ffff::".parse().unwrap()));
        assert!(!trie.contains("2001:db9::".parse().unwrap()));
        assert!(trie.contains("::1".parse().unwrap()));
        assert!(!trie.contains("::2".parse().unwrap()));
    }
}
