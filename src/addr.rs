//! Address canonicalization and bit-level prefix walking.

use std::net::IpAddr;

use ipnet::IpNet;

/// Canonical octet form of an IP address: 4 bytes for IPv4 (including
/// IPv4-mapped IPv6 addresses such as `::ffff:1.2.3.4`), 16 bytes for IPv6.
///
/// Bit `i` of an address, counted from the most significant bit of the
/// first octet, selects the child followed at trie depth `i`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Octets {
    buf: [u8; 16],
    len: usize,
}

impl Octets {
    /// Canonicalize an address for lookup.
    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::v4(v4.octets()),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => Self::v4(v4.octets()),
                None => Self::v6(v6.octets()),
            },
        }
    }

    /// Masked network octets and prefix length of a CIDR block.
    pub fn from_net(net: &IpNet) -> (Self, usize) {
        match net {
            IpNet::V4(n) => (Self::v4(n.network().octets()), n.prefix_len() as usize),
            IpNet::V6(n) => (Self::v6(n.network().octets()), n.prefix_len() as usize),
        }
    }

    fn v4(octets: [u8; 4]) -> Self {
        let mut buf = [0u8; 16];
        buf[..4].copy_from_slice(&octets);
        Self { buf, len: 4 }
    }

    fn v6(buf: [u8; 16]) -> Self {
        Self { buf, len: 16 }
    }

    /// Number of bits a walk may visit for this address family.
    pub fn max_bits(&self) -> usize {
        self.len * 8
    }

    /// Bit `i`, 0-based from the most significant bit.
    pub fn bit(&self, i: usize) -> usize {
        ((self.buf[i / 8] >> (7 - i % 8)) & 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_canonical_form() {
        let octets = Octets::from_ip("192.168.1.1".parse().unwrap());
        assert_eq!(octets.max_bits(), 32);
    }

    #[test]
    fn test_ipv4_mapped_is_canonicalized() {
        let mapped = Octets::from_ip("::ffff:192.168.1.1".parse().unwrap());
        let plain = Octets::from_ip("192.168.1.1".parse().unwrap());

        assert_eq!(mapped.max_bits(), 32);
        for i in 0..32 {
            assert_eq!(mapped.bit(i), plain.bit(i));
        }
    }

    #[test]
    fn test_ipv6_canonical_form() {
        let octets = Octets::from_ip("2001:db8::1".parse().unwrap());
        assert_eq!(octets.max_bits(), 128);
    }

    #[test]
    fn test_bit_order_is_msb_first() {
        // 128.0.0.1: bit 0 set, bits 1..31 clear except the last.
        let octets = Octets::from_ip("128.0.0.1".parse().unwrap());
        assert_eq!(octets.bit(0), 1);
        assert_eq!(octets.bit(1), 0);
        assert_eq!(octets.bit(30), 0);
        assert_eq!(octets.bit(31), 1);
    }

    #[test]
    fn test_net_is_masked_to_its_prefix() {
        // Host bits are dropped before the walk.
        let net: IpNet = "192.168.1.130/25".parse().unwrap();
        let (octets, mask_len) = Octets::from_net(&net);

        assert_eq!(mask_len, 25);
        // .130 & /25 mask -> .128: bit 24 set, bits 25.. cleared.
        assert_eq!(octets.bit(24), 1);
        assert_eq!(octets.bit(30), 0);
        assert_eq!(octets.bit(31), 0);
    }
}
