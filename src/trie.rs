//! In-memory CIDR trie with longest-prefix-match lookups.

use std::collections::HashMap;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::addr::Octets;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::node::{LabelId, TrieNode};

/// Longest-prefix-match index over IPv4 and IPv6 CIDR blocks.
///
/// Prefixes are stored in a flat array of binary trie nodes, the root at
/// index 0. Each inserted CIDR stamps the node at the end of its bit path
/// with a label id and the prefix length; lookups walk the bits of a query
/// address and report the label of the deepest stamped node on the path.
///
/// `S` selects the label id width: `i16` (the default, up to 32,767
/// distinct labels, 11-byte node records on disk) or `i32` for very large
/// label spaces such as per-ASN tables (13-byte records).
///
/// # Examples
///
/// ```
/// use lpmtrie::CidrIndex;
///
/// let mut idx = CidrIndex::new();
/// idx.add_cidr("192.168.0.0/16", "lan").unwrap();
/// idx.add_cidr("2001:db8::/32", "doc").unwrap();
///
/// assert_eq!(idx.lookup("192.168.1.100"), Some("lan"));
/// assert_eq!(idx.lookup("2001:db8::1"), Some("doc"));
/// assert_eq!(idx.lookup("8.8.8.8"), None);
/// ```
#[derive(Debug, Clone)]
pub struct CidrIndex<S: LabelId = i16> {
    pub(crate) meta: Metadata,

    pub(crate) nodes: Vec<TrieNode<S>>,
    pub(crate) labels: Vec<String>,
    pub(crate) total: usize,

    pub(crate) id_by_label: HashMap<String, S>,
}

impl CidrIndex<i16> {
    /// Create an empty narrow-id index.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CidrIndex<i32> {
    /// Create an empty wide-id index for label spaces beyond 32,767
    /// entries.
    pub fn new_large() -> Self {
        Self::default()
    }
}

impl<S: LabelId> Default for CidrIndex<S> {
    fn default() -> Self {
        Self {
            meta: Metadata::default(),
            nodes: vec![TrieNode::EMPTY],
            labels: Vec::new(),
            total: 0,
            id_by_label: HashMap::new(),
        }
    }
}

impl<S: LabelId> CidrIndex<S> {
    /// Metadata attached to this index.
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Mutable access to the metadata, for producers to fill in.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    /// Number of inserted prefixes.
    pub fn len(&self) -> usize {
        self.total
    }

    /// True when no prefix has been inserted.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of distinct labels.
    pub fn len_labels(&self) -> usize {
        self.labels.len()
    }

    /// Number of trie nodes, including the root.
    pub fn len_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn intern(&mut self, label: &str) -> S {
        if let Some(&id) = self.id_by_label.get(label) {
            return id;
        }

        self.labels.push(label.to_string());
        let id = S::from_position(self.labels.len());
        self.id_by_label.insert(label.to_string(), id);
        id
    }

    /// Insert a CIDR block, associating it with `label`.
    ///
    /// Accepts `a.b.c.d/n` and IPv6 forms; host bits below the prefix are
    /// ignored. Re-inserting a prefix overwrites its label.
    pub fn add_cidr(&mut self, cidr: &str, label: &str) -> Result<()> {
        let net = parse_cidr(cidr, label)?;
        self.add_net(net, label);

        Ok(())
    }

    /// Insert a parsed CIDR block, associating it with `label`.
    ///
    /// Re-inserting a prefix overwrites its label.
    pub fn add_net(&mut self, net: IpNet, label: &str) {
        let (octets, mask_len) = Octets::from_net(&net);
        let id = self.intern(label);

        let mut cur = 0usize;
        for i in 0..mask_len {
            let bit = octets.bit(i);
            let mut next = self.nodes[cur].children[bit];
            if next == -1 {
                next = self.nodes.len() as i32;
                self.nodes[cur].children[bit] = next;
                self.nodes.push(TrieNode::EMPTY);
            }
            cur = next as usize;
        }

        self.nodes[cur].id = id;
        self.nodes[cur].mask_len = mask_len as i8;
        self.total += 1;
    }

    /// Insert a CIDR block, rejecting prefixes already covered.
    ///
    /// Fails with [`Error::Overlap`] when the prefix itself, or a shorter
    /// prefix containing it, is already stamped; nothing is modified in
    /// that case.
    pub fn add_cidr_strict(&mut self, cidr: &str, label: &str) -> Result<()> {
        let net = parse_cidr(cidr, label)?;
        self.add_net_strict(net, label)
    }

    /// Insert a parsed CIDR block, rejecting prefixes already covered.
    pub fn add_net_strict(&mut self, net: IpNet, label: &str) -> Result<()> {
        let (octets, mask_len) = Octets::from_net(&net);

        // Detection pass; the trie is untouched until it completes.
        let mut cur = Some(0usize);
        for i in 0..mask_len {
            let Some(c) = cur else { break };
            if let Some(pos) = self.nodes[c].id.index() {
                return Err(self.overlap(&net, pos, label));
            }
            let next = self.nodes[c].children[octets.bit(i)];
            cur = (next != -1).then(|| next as usize);
        }
        if let Some(c) = cur {
            if let Some(pos) = self.nodes[c].id.index() {
                return Err(self.overlap(&net, pos, label));
            }
        }

        self.add_net(net, label);

        Ok(())
    }

    fn overlap(&self, net: &IpNet, existing_pos: usize, incoming: &str) -> Error {
        Error::Overlap {
            cidr: net.to_string(),
            existing: self.labels[existing_pos].clone(),
            incoming: incoming.to_string(),
        }
    }

    /// Find the label of the longest prefix containing the given address
    /// text. Invalid text yields `None`, never an error.
    pub fn lookup(&self, ip_str: &str) -> Option<&str> {
        let ip: IpAddr = ip_str.parse().ok()?;
        self.lookup_ip(ip)
    }

    /// Find the label of the longest prefix containing `ip`.
    pub fn lookup_ip(&self, ip: IpAddr) -> Option<&str> {
        if self.nodes.is_empty() {
            return None;
        }

        let octets = Octets::from_ip(ip);

        let mut cur = 0usize;
        let mut best = S::NONE;
        let mut best_mask = -1i8;

        for i in 0..octets.max_bits() {
            let node = &self.nodes[cur];
            if node.is_terminal() && node.mask_len > best_mask {
                best = node.id;
                best_mask = node.mask_len;
            }

            let next = node.children[octets.bit(i)];
            if next == -1 {
                break;
            }
            cur = next as usize;
        }

        // The node the walk ended on has not been compared yet when the
        // full bit budget was spent.
        let node = &self.nodes[cur];
        if node.is_terminal() && node.mask_len > best_mask {
            best = node.id;
        }

        best.index().map(|pos| self.labels[pos].as_str())
    }

    /// Collapse structurally identical subtrees into shared nodes,
    /// turning the trie into a DAWG.
    ///
    /// Cuts the node count by well over half on real-world geographic
    /// tables. Call once, after all insertions: inserting into a
    /// minimized index would mutate shared subtrees and is not supported.
    /// Lookups are unaffected; calling again is a no-op in effect.
    pub fn minimize(&mut self) {
        if self.nodes.is_empty() {
            return;
        }

        let old = std::mem::take(&mut self.nodes);

        let mut remap = vec![-1i32; old.len()];
        let mut canon: HashMap<(i32, i32, S, i8), i32> = HashMap::with_capacity(old.len());
        let mut out: Vec<TrieNode<S>> = Vec::with_capacity(old.len());

        // Post-order walk from the root: children are canonicalized before
        // their parent, so child entries of `remap` are final when the
        // parent's signature is formed.
        let mut stack = vec![(0usize, false)];
        while let Some((i, expanded)) = stack.pop() {
            if remap[i] != -1 {
                continue;
            }
            if !expanded {
                stack.push((i, true));
                for &c in &old[i].children {
                    if c != -1 && remap[c as usize] == -1 {
                        stack.push((c as usize, false));
                    }
                }
                continue;
            }

            let node = &old[i];
            let ch = |b: usize| match node.children[b] {
                -1 => -1,
                c => remap[c as usize],
            };
            let sig = (ch(0), ch(1), node.id, node.mask_len);

            remap[i] = *canon.entry(sig).or_insert_with(|| {
                out.push(TrieNode {
                    children: [sig.0, sig.1],
                    id: sig.2,
                    mask_len: sig.3,
                });
                (out.len() - 1) as i32
            });
        }

        // The root canonicalizes last; swap it into slot 0 and rewire the
        // two affected targets.
        let root = remap[0];
        if root != 0 {
            out.swap(0, root as usize);
            for node in &mut out {
                for c in &mut node.children {
                    if *c == 0 {
                        *c = root;
                    } else if *c == root {
                        *c = 0;
                    }
                }
            }
        }

        log::debug!("minimized node array: {} -> {} nodes", old.len(), out.len());

        self.nodes = out;
    }
}

fn parse_cidr(cidr: &str, label: &str) -> Result<IpNet> {
    cidr.parse().map_err(|_| Error::InvalidCidr {
        cidr: cidr.to_string(),
        label: label.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_index_has_root_only() {
        let idx = CidrIndex::new();
        assert_eq!(idx.len_nodes(), 1);
        assert_eq!(idx.len(), 0);
        assert_eq!(idx.len_labels(), 0);
        assert!(idx.is_empty());
    }

    #[test]
    fn test_add_cidr_ipv4() {
        let mut idx = CidrIndex::new();
        for (i, (cidr, label)) in [
            ("192.168.1.0/24", "net1"),
            ("10.0.0.0/8", "net2"),
            ("172.16.0.0/16", "net3"),
        ]
        .iter()
        .enumerate()
        {
            idx.add_cidr(cidr, label).unwrap();
            assert_eq!(idx.len(), i + 1);
        }
    }

    #[test]
    fn test_add_cidr_ipv6() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("2001:db8::/32", "net1").unwrap();
        idx.add_cidr("2001:db8:1::/48", "net2").unwrap();
        idx.add_cidr("2001:db8:2::/64", "net3").unwrap();
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn test_add_cidr_invalid() {
        let mut idx = CidrIndex::new();
        for cidr in [
            "256.256.256.256/32",
            "192.168.1.0/33",
            "2001:db8::/129",
            "not-a-cidr",
            "192.168.1.1",
        ] {
            let err = idx.add_cidr(cidr, "bad").unwrap_err();
            assert!(matches!(err, Error::InvalidCidr { .. }), "{cidr}");
        }
        assert_eq!(idx.len(), 0);
        assert_eq!(idx.len_nodes(), 1);
    }

    #[test]
    fn test_lookup_ipv4() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("192.168.1.0/24", "net1").unwrap();
        idx.add_cidr("10.0.0.0/8", "net2").unwrap();
        idx.add_cidr("172.16.0.0/12", "net3").unwrap();

        assert_eq!(idx.lookup("192.168.1.100"), Some("net1"));
        assert_eq!(idx.lookup("10.20.30.40"), Some("net2"));
        assert_eq!(idx.lookup("172.20.1.1"), Some("net3"));
        assert_eq!(idx.lookup("8.8.8.8"), None);
        assert_eq!(idx.lookup("invalid-ip"), None);
    }

    #[test]
    fn test_lookup_ipv6() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("2001:db8::/32", "net1").unwrap();
        idx.add_cidr("2001:db8:1::/48", "net2").unwrap();
        idx.add_cidr("2001:db8:2::/64", "net3").unwrap();

        assert_eq!(idx.lookup("2001:db8::1"), Some("net1"));
        assert_eq!(idx.lookup("2001:db8:1::abcd"), Some("net2"));
        assert_eq!(idx.lookup("2001:db8:2::1234"), Some("net3"));
        assert_eq!(idx.lookup("2001:db9::1"), None);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("192.168.0.0/16", "net1").unwrap();
        idx.add_cidr("192.168.1.0/24", "net2").unwrap();
        idx.add_cidr("192.168.1.128/25", "net3").unwrap();

        assert_eq!(idx.lookup("192.168.1.129"), Some("net3"));
        assert_eq!(idx.lookup("192.168.1.1"), Some("net2"));
        assert_eq!(idx.lookup("192.168.2.1"), Some("net1"));
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("192.168.1.128/25", "net3").unwrap();
        idx.add_cidr("192.168.1.0/24", "net2").unwrap();
        idx.add_cidr("192.168.0.0/16", "net1").unwrap();

        assert_eq!(idx.lookup("192.168.1.129"), Some("net3"));
        assert_eq!(idx.lookup("192.168.1.1"), Some("net2"));
        assert_eq!(idx.lookup("192.168.2.1"), Some("net1"));
    }

    #[test]
    fn test_empty_index_lookup() {
        let idx = CidrIndex::new();
        assert_eq!(idx.lookup("192.168.1.1"), None);
        assert_eq!(idx.lookup("2001:db8::1"), None);
        assert_eq!(idx.lookup("invalid-ip"), None);
    }

    #[test]
    fn test_label_reuse() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("192.168.1.0/24", "net1").unwrap();
        idx.add_cidr("192.168.2.0/24", "net1").unwrap();

        assert_eq!(idx.len_labels(), 1);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.lookup("192.168.1.5"), Some("net1"));
        assert_eq!(idx.lookup("192.168.2.5"), Some("net1"));
    }

    #[test]
    fn test_permissive_overwrite() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("192.168.1.0/24", "old").unwrap();
        idx.add_cidr("192.168.1.0/24", "new").unwrap();

        assert_eq!(idx.lookup("192.168.1.1"), Some("new"));
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn test_strict_rejects_duplicate_and_covered() {
        let mut idx = CidrIndex::new();
        idx.add_cidr_strict("192.168.1.0/24", "net1").unwrap();

        let err = idx.add_cidr_strict("192.168.1.0/24", "net2").unwrap_err();
        assert_eq!(
            err.to_string(),
            "overlap net2 with net1: 192.168.1.0/24"
        );

        let err = idx.add_cidr_strict("192.168.1.128/25", "net3").unwrap_err();
        assert_eq!(
            err.to_string(),
            "overlap net3 with net1: 192.168.1.128/25"
        );

        // Nothing was modified by the failed inserts.
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.len_labels(), 1);
        assert_eq!(idx.lookup("192.168.1.129"), Some("net1"));
    }

    #[test]
    fn test_strict_allows_shorter_prefix_over_longer() {
        let mut idx = CidrIndex::new();
        idx.add_cidr_strict("192.168.1.0/24", "net1").unwrap();
        idx.add_cidr_strict("192.168.0.0/16", "net2").unwrap();

        assert_eq!(idx.lookup("192.168.1.1"), Some("net1"));
        assert_eq!(idx.lookup("192.168.2.1"), Some("net2"));
    }

    #[test]
    fn test_host_bits_are_masked() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("192.168.1.130/25", "net1").unwrap();

        assert_eq!(idx.lookup("192.168.1.128"), Some("net1"));
        assert_eq!(idx.lookup("192.168.1.200"), Some("net1"));
        assert_eq!(idx.lookup("192.168.1.1"), None);
    }

    #[test]
    fn test_ipv4_mapped_lookup() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("192.168.0.0/16", "lan").unwrap();

        assert_eq!(idx.lookup("::ffff:192.168.1.1"), Some("lan"));
    }

    #[test]
    fn test_zero_length_prefix() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("0.0.0.0/0", "all").unwrap();

        assert_eq!(idx.lookup("8.8.8.8"), Some("all"));
        assert_eq!(idx.lookup("255.255.255.255"), Some("all"));
        assert_eq!(idx.len_nodes(), 1);
    }

    #[test]
    fn test_minimize_shares_subtrees() {
        let mut idx = CidrIndex::new();
        // Sibling /24s with the same label have isomorphic subtrees below
        // the point where their paths diverge.
        for i in 0..16u8 {
            idx.add_cidr(&format!("10.0.{i}.0/24"), "pool").unwrap();
        }

        let before = idx.len_nodes();
        idx.minimize();
        let after = idx.len_nodes();
        assert!(after < before, "{after} >= {before}");

        for i in 0..16u8 {
            assert_eq!(idx.lookup(&format!("10.0.{i}.7")), Some("pool"));
        }
        assert_eq!(idx.lookup("10.0.16.1"), None);
        assert_eq!(idx.lookup("10.1.0.1"), None);
    }

    #[test]
    fn test_minimize_is_idempotent() {
        let mut idx = CidrIndex::new();
        idx.add_cidr("192.168.0.0/16", "a").unwrap();
        idx.add_cidr("192.168.1.0/24", "b").unwrap();
        idx.add_cidr("10.0.0.0/8", "a").unwrap();
        idx.add_cidr("2001:db8::/32", "c").unwrap();

        idx.minimize();
        let nodes_once = idx.len_nodes();

        idx.minimize();
        assert_eq!(idx.len_nodes(), nodes_once);

        assert_eq!(idx.lookup("192.168.1.5"), Some("b"));
        assert_eq!(idx.lookup("192.168.2.5"), Some("a"));
        assert_eq!(idx.lookup("10.1.1.1"), Some("a"));
        assert_eq!(idx.lookup("2001:db8::1"), Some("c"));
    }

    #[test]
    fn test_minimize_empty_index() {
        let mut idx = CidrIndex::new();
        idx.minimize();
        assert_eq!(idx.len_nodes(), 1);
        assert_eq!(idx.lookup("1.2.3.4"), None);
    }

    #[test]
    fn test_wide_index() {
        let mut idx = CidrIndex::new_large();
        idx.add_cidr("192.168.1.0/24", "net1").unwrap();
        idx.add_cidr("2001:db8::/32", "net2").unwrap();

        assert_eq!(idx.lookup("192.168.1.1"), Some("net1"));
        assert_eq!(idx.lookup("2001:db8::1"), Some("net2"));
    }
}
