//! Prefix-aligned address ranges

use super::arith::{self, IPV4_WIDTH, IPV6_WIDTH};
use crate::{Error, Result};
use ipnet::IpNet;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Address width in bits (32 or 128)
    pub fn width(self) -> u8 {
        match self {
            AddressFamily::V4 => IPV4_WIDTH,
            AddressFamily::V6 => IPV6_WIDTH,
        }
    }

    fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

/// A contiguous, power-of-two sized block of addresses.
///
/// The start address is always the lowest address of the block (host bits
/// zero), so every value of this type is in canonical form. Ordering is by
/// family, then start address, then prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressRange {
    family: AddressFamily,
    start: u128,
    prefix_len: u8,
}

impl AddressRange {
    /// Build a range from a numeric address, clearing any host bits
    pub fn new(family: AddressFamily, addr: u128, prefix_len: u8) -> Result<Self> {
        let width = family.width();
        if prefix_len > width {
            return Err(Error::PrefixTooSpecific {
                requested: prefix_len,
                width,
            });
        }
        if addr > arith::max_address(width) {
            return Err(Error::InvalidFormat {
                input: format!("{addr:#x}/{prefix_len}"),
                reason: format!("address does not fit in {width} bits"),
            });
        }

        Ok(Self {
            family,
            start: addr & !arith::host_span(prefix_len, width),
            prefix_len,
        })
    }

    /// Parse `"<address>/<prefix_len>"`; host bits are masked off
    pub fn parse(text: &str) -> Result<Self> {
        parse_net(text).map(Self::from)
    }

    /// Parse `"<address>/<prefix_len>"`, rejecting an address with host bits
    /// set. Any spelling of the network address is accepted.
    pub fn parse_network(text: &str) -> Result<Self> {
        let net = parse_net(text)?;
        let range = Self::from(net);
        if net.addr() != net.network() {
            return Err(Error::InvalidFormat {
                input: text.to_string(),
                reason: format!("host bits set, expected {range}"),
            });
        }
        Ok(range)
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn width(&self) -> u8 {
        self.family.width()
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// First address, as an integer
    pub fn start(&self) -> u128 {
        self.start
    }

    /// Last address (inclusive), as an integer
    pub fn end(&self) -> u128 {
        self.start | self.host_span()
    }

    /// `block_size - 1`
    pub fn host_span(&self) -> u128 {
        arith::host_span(self.prefix_len, self.width())
    }

    /// Number of addresses; `None` only for `::/0`
    pub fn block_size(&self) -> Option<u128> {
        arith::block_size(self.prefix_len, self.width())
    }

    /// First address of the block
    pub fn network(&self) -> IpAddr {
        to_ip(self.family, self.start)
    }

    /// Last address of the block
    pub fn last_address(&self) -> IpAddr {
        to_ip(self.family, self.end())
    }

    /// Whether the numeric address falls inside this block
    pub fn contains_addr(&self, addr: u128) -> bool {
        self.start <= addr && addr <= self.end()
    }

    /// Whether `ip` falls inside this block
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        AddressFamily::of(&ip) == self.family && self.contains_addr(from_ip(ip))
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(&self, other: &AddressRange) -> bool {
        self.family == other.family && self.start <= other.start && other.end() <= self.end()
    }

    /// General interval overlap: `startA <= endB && startB <= endA`.
    ///
    /// Ranges of different families never overlap.
    pub fn overlaps(&self, other: &AddressRange) -> bool {
        self.family == other.family && self.start <= other.end() && other.start <= self.end()
    }

    /// Unsigned comparison of start addresses
    pub fn compare(&self, other: &AddressRange) -> Result<Ordering> {
        if self.family != other.family {
            return Err(Error::AddressFamilyMismatch(
                self.to_string(),
                other.to_string(),
            ));
        }
        Ok(self.start.cmp(&other.start))
    }
}

fn to_ip(family: AddressFamily, value: u128) -> IpAddr {
    match family {
        // Constructors guarantee IPv4 values fit in 32 bits
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
        AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

fn from_ip(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

impl From<IpNet> for AddressRange {
    fn from(net: IpNet) -> Self {
        let network = net.network();
        Self {
            family: AddressFamily::of(&network),
            start: from_ip(network),
            prefix_len: net.prefix_len(),
        }
    }
}

impl From<ipnet::Ipv4Net> for AddressRange {
    fn from(net: ipnet::Ipv4Net) -> Self {
        Self::from(IpNet::V4(net))
    }
}

impl From<ipnet::Ipv6Net> for AddressRange {
    fn from(net: ipnet::Ipv6Net) -> Self {
        Self::from(IpNet::V6(net))
    }
}

impl FromStr for AddressRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len)
    }
}

impl Serialize for AddressRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AddressRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        AddressRange::parse(&text).map_err(de::Error::custom)
    }
}

fn parse_net(text: &str) -> Result<IpNet> {
    text.trim()
        .parse()
        .map_err(|e: ipnet::AddrParseError| Error::InvalidFormat {
            input: text.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(text: &str) -> AddressRange {
        AddressRange::parse(text).unwrap()
    }

    #[test]
    fn test_parse_canonicalizes_host_bits() {
        let r = range("10.0.0.5/24");
        assert_eq!(r.to_string(), "10.0.0.0/24");
        assert_eq!(r.prefix_len(), 24);
        assert_eq!(r.family(), AddressFamily::V4);
    }

    #[test]
    fn test_parse_network_accepts_any_spelling() {
        for text in ["2001:db8::/32", "2001:0db8::/32", "2001:DB8::/32", " 10.0.0.0/16 "] {
            assert!(AddressRange::parse_network(text).is_ok(), "{text:?} should parse");
        }
        assert_eq!(
            AddressRange::parse_network("2001:DB8::/32").unwrap(),
            range("2001:db8::/32")
        );
    }

    #[test]
    fn test_parse_network_rejects_host_bits() {
        for text in ["10.0.0.1/16", "2001:db8::1/32"] {
            assert!(
                matches!(AddressRange::parse_network(text), Err(Error::InvalidFormat { .. })),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "10.0.0.0", "10.0.0.0/33", "not-a-cidr", "10.0.0.256/24"] {
            let result = AddressRange::parse(bad);
            assert!(
                matches!(result, Err(Error::InvalidFormat { .. })),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_ipv6_display_is_compressed() {
        let r = range("2001:0db8:0000:0000::/32");
        assert_eq!(r.to_string(), "2001:db8::/32");
        assert_eq!(r.width(), 128);
    }

    #[test]
    fn test_end_and_size() {
        let r = range("10.0.0.0/8");
        assert_eq!(r.last_address().to_string(), "10.255.255.255");
        assert_eq!(r.block_size(), Some(1 << 24));
        assert_eq!(range("::/0").block_size(), None);
        assert_eq!(range("::/0").end(), u128::MAX);
    }

    #[test]
    fn test_contains() {
        let outer = range("10.0.0.0/16");
        assert!(outer.contains(&range("10.0.5.0/24")));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&range("10.0.0.0/8")));
        assert!(!outer.contains(&range("10.1.0.0/24")));
        assert!(outer.contains_ip("10.0.255.255".parse().unwrap()));
        assert!(!outer.contains_ip("::1".parse().unwrap()));
    }

    #[test]
    fn test_overlaps_general_case() {
        let a = range("10.0.0.0/24");
        assert!(a.overlaps(&range("10.0.0.128/25")));
        assert!(a.overlaps(&range("10.0.0.0/8")));
        assert!(!a.overlaps(&range("10.0.1.0/24")));
        // Touching ranges do not overlap
        assert!(!range("10.0.0.0/25").overlaps(&range("10.0.0.128/25")));
        // Families never overlap
        assert!(!range("0.0.0.0/0").overlaps(&range("::/0")));
    }

    #[test]
    fn test_compare() {
        let a = range("10.0.0.0/24");
        let b = range("10.0.1.0/24");
        assert_eq!(a.compare(&b).unwrap(), Ordering::Less);
        assert_eq!(b.compare(&a).unwrap(), Ordering::Greater);
        assert_eq!(a.compare(&range("10.0.0.0/16")).unwrap(), Ordering::Equal);
        assert!(matches!(
            a.compare(&range("::/64")),
            Err(Error::AddressFamilyMismatch(_, _))
        ));
    }

    #[test]
    fn test_new_masks_and_validates() {
        let r = AddressRange::new(AddressFamily::V4, 0x0A00_00FF, 24).unwrap();
        assert_eq!(r.to_string(), "10.0.0.0/24");

        assert!(matches!(
            AddressRange::new(AddressFamily::V4, 0, 33),
            Err(Error::PrefixTooSpecific { .. })
        ));
        assert!(matches!(
            AddressRange::new(AddressFamily::V4, 1u128 << 32, 32),
            Err(Error::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let r = range("192.168.0.0/16");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"192.168.0.0/16\"");

        let back: AddressRange = serde_json::from_str("\"192.168.7.1/16\"").unwrap();
        assert_eq!(back, r);
        assert!(serde_json::from_str::<AddressRange>("\"bogus\"").is_err());
    }
}
