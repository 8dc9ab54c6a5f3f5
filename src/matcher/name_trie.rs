//! Byte-keyed prefix trie for wildcard name patterns.
//!
//! Prefix patterns are stored as-is; suffix patterns are stored reversed so
//! that a suffix lookup becomes a prefix lookup over the reversed name.

/// Arena node. Children are kept sorted by edge byte for binary search.
#[derive(Debug, Clone, Default)]
struct Node {
    children: Vec<(u8, u32)>,
    terminal: bool,
}

impl Node {
    fn child(&self, byte: u8) -> Option<u32> {
        self.children
            .binary_search_by_key(&byte, |&(b, _)| b)
            .ok()
            .map(|i| self.children[i].1)
    }
}

/// NameTrie answers "which stored keys are a prefix of this input" queries.
#[derive(Debug, Clone)]
pub struct NameTrie {
    nodes: Vec<Node>,
    len: usize,
}

impl NameTrie {
    /// Create an empty trie.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            len: 0,
        }
    }

    /// Number of distinct keys stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a key. Returns `false` if it was already present.
    pub fn insert(&mut self, key: &[u8]) -> bool {
        let mut current = 0usize;
        for &byte in key {
            current = match self.nodes[current].child(byte) {
                Some(next) => next as usize,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node::default());
                    let children = &mut self.nodes[current].children;
                    let pos = children
                        .binary_search_by_key(&byte, |&(b, _)| b)
                        .unwrap_or_else(|e| e);
                    children.insert(pos, (byte, next as u32));
                    next
                }
            };
        }

        let node = &mut self.nodes[current];
        if node.terminal {
            return false;
        }
        node.terminal = true;
        self.len += 1;
        true
    }

    /// Exact key lookup.
    pub fn contains(&self, key: &[u8]) -> bool {
        let mut current = 0usize;
        for &byte in key {
            match self.nodes[current].child(byte) {
                Some(next) => current = next as usize,
                None => return false,
            }
        }
        self.nodes[current].terminal
    }

    /// Length of the longest stored key that is a prefix of `input`.
    pub fn longest_prefix(&self, input: &[u8]) -> Option<usize> {
        self.longest_match(input.iter().copied(), |_| true)
    }

    /// Length of the longest stored key that is a prefix of the byte
    /// sequence `bytes` and whose length `n` satisfies `accept(n)`.
    ///
    /// Feeding `name.bytes().rev()` turns this into a suffix lookup
    /// against reversed keys.
    pub fn longest_match<I, F>(&self, bytes: I, accept: F) -> Option<usize>
    where
        I: IntoIterator<Item = u8>,
        F: Fn(usize) -> bool,
    {
        let mut best = None;
        let mut current = 0usize;

        if self.nodes[current].terminal && accept(0) {
            best = Some(0);
        }
        for (i, byte) in bytes.into_iter().enumerate() {
            match self.nodes[current].child(byte) {
                Some(next) => current = next as usize,
                None => break,
            }
            if self.nodes[current].terminal && accept(i + 1) {
                best = Some(i + 1);
            }
        }
        best
    }
}

impl Default for NameTrie {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut trie = NameTrie::new();
        assert!(trie.insert(b"ads."));
        assert!(!trie.insert(b"ads."));
        assert!(trie.insert(b"ad"));

        assert_eq!(trie.len(), 2);
        assert!(trie.contains(b"ads."));
        assert!(trie.contains(b"ad"));
        assert!(!trie.contains(b"ads"));
    }

    #[test]
    fn test_longest_prefix() {
        let mut trie = NameTrie::new();
        trie.insert(b"ad");
        trie.insert(b"ads.");

        assert_eq!(trie.longest_prefix(b"ads.example.com"), Some(4));
        assert_eq!(trie.longest_prefix(b"adserver.net"), Some(2));
        assert_eq!(trie.longest_prefix(b"a"), None);
        assert_eq!(trie.longest_prefix(b"tracker.com"), None);
    }

    fn label_suffix(trie: &NameTrie, name: &str) -> Option<usize> {
        let bytes = name.as_bytes();
        trie.longest_match(bytes.iter().rev().copied(), |n| {
            n == bytes.len() || bytes[bytes.len() - n - 1] == b'.'
        })
    }

    #[test]
    fn test_reversed_label_boundary() {
        let mut trie = NameTrie::new();
        trie.insert(b"moc.elpmaxe");

        assert_eq!(label_suffix(&trie, "ads.example.com"), Some(11));
        assert_eq!(label_suffix(&trie, "example.com"), Some(11));
        assert_eq!(label_suffix(&trie, "notexample.com"), None);
        assert_eq!(label_suffix(&trie, "com"), None);
    }
}
