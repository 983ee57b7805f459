//! Router Solicitation / Router Advertisement codec
//!
//! Handles:
//! - RA header with M/O flags and the RFC 4191 default router preference
//! - Prefix Information Options (type 3)
//! - Route Information Options (type 24, RFC 4191)
//! - Router Solicitation detection and emission
//!
//! Packets start at the ICMPv6 type octet; the socket layer owns IPv6
//! framing and checksum verification, so the checksum field is emitted as
//! zero and ignored on parse.

use std::net::Ipv6Addr;

use ipnet::Ipv6Net;

use crate::error::{Error, Result};

/// IPv6 all-nodes multicast address, destination of unsolicited RAs.
pub const ALL_NODES_MULTICAST: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// IPv6 all-routers multicast address, destination of RSs.
pub const ALL_ROUTERS_MULTICAST: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

/// The maximum RA message length we handle.
pub const MAX_RA_MESSAGE_LEN: usize = 256;

const RA_HEADER_LEN: usize = 16;
const RS_HEADER_LEN: usize = 8;

const ICMP6_ROUTER_SOLICIT: u8 = 133;
const ICMP6_ROUTER_ADVERT: u8 = 134;

const OPTION_TYPE_PREFIX_INFO: u8 = 3;
const OPTION_TYPE_ROUTE_INFO: u8 = 24;

const RA_FLAG_MANAGED: u8 = 0x80;
const RA_FLAG_OTHER_CONFIG: u8 = 0x40;
const PIO_FLAG_ON_LINK: u8 = 0x80;
const PIO_FLAG_AUTONOMOUS: u8 = 0x40;

/// Route preference (RFC 4191), used both on the wire and in network data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoutePreference {
    Low,
    Medium,
    High,
}

impl RoutePreference {
    /// Decode the 2-bit Prf field. The reserved encoding yields `None`.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b00 => Some(RoutePreference::Medium),
            0b01 => Some(RoutePreference::High),
            0b11 => Some(RoutePreference::Low),
            _ => None,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            RoutePreference::Medium => 0b00,
            RoutePreference::High => 0b01,
            RoutePreference::Low => 0b11,
        }
    }
}

/// Parsed Router Advertisement header (RFC 4861 section 4.2).
///
/// The default header advertises a zero router lifetime: the border router
/// itself is not a default router unless it echoes an upstream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaHeader {
    pub hop_limit: u8,
    pub managed: bool,
    pub other_config: bool,
    pub default_router_preference: RoutePreference,
    /// Default router lifetime in seconds.
    pub router_lifetime: u16,
    /// Reachable time in milliseconds.
    pub reachable_time: u32,
    /// Retransmission timer in milliseconds.
    pub retrans_timer: u32,
}

impl Default for RaHeader {
    fn default() -> Self {
        Self {
            hop_limit: 0,
            managed: false,
            other_config: false,
            default_router_preference: RoutePreference::Medium,
            router_lifetime: 0,
            reachable_time: 0,
            retrans_timer: 0,
        }
    }
}

impl RaHeader {
    fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < RA_HEADER_LEN {
            return Err(Error::Parse("RA message shorter than header"));
        }
        if buf[0] != ICMP6_ROUTER_ADVERT || buf[1] != 0 {
            return Err(Error::Parse("not a Router Advertisement"));
        }

        let flags = buf[5];
        Ok(Self {
            hop_limit: buf[4],
            managed: flags & RA_FLAG_MANAGED != 0,
            other_config: flags & RA_FLAG_OTHER_CONFIG != 0,
            // Reserved Prf encoding degrades to medium (RFC 4191 section 2.2)
            default_router_preference: RoutePreference::from_bits(flags >> 3)
                .unwrap_or(RoutePreference::Medium),
            router_lifetime: u16::from_be_bytes([buf[6], buf[7]]),
            reachable_time: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            retrans_timer: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }

    fn emit(&self, buf: &mut Vec<u8>) {
        buf.push(ICMP6_ROUTER_ADVERT);
        buf.push(0); // code
        buf.extend_from_slice(&[0, 0]); // checksum, filled in by the socket layer
        buf.push(self.hop_limit);

        let mut flags = self.default_router_preference.to_bits() << 3;
        if self.managed {
            flags |= RA_FLAG_MANAGED;
        }
        if self.other_config {
            flags |= RA_FLAG_OTHER_CONFIG;
        }
        buf.push(flags);

        buf.extend_from_slice(&self.router_lifetime.to_be_bytes());
        buf.extend_from_slice(&self.reachable_time.to_be_bytes());
        buf.extend_from_slice(&self.retrans_timer.to_be_bytes());
    }
}

/// Prefix Information Option (RFC 4861 section 4.6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixInfoOption {
    pub prefix: Ipv6Net,
    pub on_link: bool,
    pub autonomous: bool,
    /// Valid lifetime in seconds.
    pub valid_lifetime: u32,
    /// Preferred lifetime in seconds.
    pub preferred_lifetime: u32,
}

/// Route Information Option (RFC 4191 section 2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteInfoOption {
    pub prefix: Ipv6Net,
    pub preference: RoutePreference,
    /// Route lifetime in seconds.
    pub route_lifetime: u32,
}

/// An option recognized inside a Router Advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaOption {
    PrefixInfo(PrefixInfoOption),
    RouteInfo(RouteInfoOption),
}

/// A parsed Router Advertisement: header plus recognized options.
#[derive(Debug, Clone)]
pub struct RouterAdvert {
    pub header: RaHeader,
    pub options: Vec<RaOption>,
}

impl RouterAdvert {
    /// Parse an RA message starting at the ICMPv6 type octet.
    ///
    /// Unknown option types are skipped; a malformed option aborts the
    /// whole message.
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if packet.len() > MAX_RA_MESSAGE_LEN {
            return Err(Error::Parse("RA message too long"));
        }

        let header = RaHeader::parse(packet)?;
        let mut options = Vec::new();
        let mut rest = &packet[RA_HEADER_LEN..];

        while !rest.is_empty() {
            if rest.len() < 2 {
                return Err(Error::Parse("truncated ND option"));
            }
            let option_len = rest[1] as usize * 8;
            if option_len == 0 || option_len > rest.len() {
                return Err(Error::Parse("bad ND option length"));
            }

            match rest[0] {
                OPTION_TYPE_PREFIX_INFO => {
                    options.push(RaOption::PrefixInfo(parse_prefix_info(&rest[..option_len])?));
                }
                OPTION_TYPE_ROUTE_INFO => {
                    // A reserved preference invalidates just this option
                    // (RFC 4191 section 2.3)
                    if let Some(rio) = parse_route_info(&rest[..option_len])? {
                        options.push(RaOption::RouteInfo(rio));
                    }
                }
                _ => {}
            }

            rest = &rest[option_len..];
        }

        Ok(Self { header, options })
    }

    pub fn prefix_info_options(&self) -> impl Iterator<Item = &PrefixInfoOption> {
        self.options.iter().filter_map(|option| match option {
            RaOption::PrefixInfo(pio) => Some(pio),
            _ => None,
        })
    }

    pub fn route_info_options(&self) -> impl Iterator<Item = &RouteInfoOption> {
        self.options.iter().filter_map(|option| match option {
            RaOption::RouteInfo(rio) => Some(rio),
            _ => None,
        })
    }
}

fn parse_prefix_info(buf: &[u8]) -> Result<PrefixInfoOption> {
    if buf.len() != 32 {
        return Err(Error::Parse("bad PIO length"));
    }

    let prefix_len = buf[2];
    if prefix_len > 128 {
        return Err(Error::Parse("bad PIO prefix length"));
    }

    let mut octets = [0u8; 16];
    octets.copy_from_slice(&buf[16..32]);
    let prefix = Ipv6Net::new(Ipv6Addr::from(octets), prefix_len)
        .map_err(|_| Error::Parse("bad PIO prefix length"))?
        .trunc();

    Ok(PrefixInfoOption {
        prefix,
        on_link: buf[3] & PIO_FLAG_ON_LINK != 0,
        autonomous: buf[3] & PIO_FLAG_AUTONOMOUS != 0,
        valid_lifetime: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        preferred_lifetime: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
    })
}

fn parse_route_info(buf: &[u8]) -> Result<Option<RouteInfoOption>> {
    if !(8..=24).contains(&buf.len()) {
        return Err(Error::Parse("bad RIO length"));
    }

    let prefix_len = buf[2];
    if prefix_len > 128 || prefix_len as usize > (buf.len() - 8) * 8 {
        return Err(Error::Parse("bad RIO prefix length"));
    }

    let preference = match RoutePreference::from_bits(buf[3] >> 3) {
        Some(preference) => preference,
        None => return Ok(None),
    };

    let mut octets = [0u8; 16];
    octets[..buf.len() - 8].copy_from_slice(&buf[8..]);
    let prefix = Ipv6Net::new(Ipv6Addr::from(octets), prefix_len)
        .map_err(|_| Error::Parse("bad RIO prefix length"))?
        .trunc();

    Ok(Some(RouteInfoOption {
        prefix,
        preference,
        route_lifetime: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
    }))
}

/// Incremental Router Advertisement builder, bounded to
/// [`MAX_RA_MESSAGE_LEN`] octets.
pub struct RaMessageBuilder {
    buf: Vec<u8>,
}

impl RaMessageBuilder {
    pub fn new(header: &RaHeader) -> Self {
        let mut buf = Vec::with_capacity(MAX_RA_MESSAGE_LEN);
        header.emit(&mut buf);
        Self { buf }
    }

    fn ensure_room(&self, option_len: usize) -> Result<()> {
        if self.buf.len() + option_len > MAX_RA_MESSAGE_LEN {
            return Err(Error::NoBufs("RA message buffer"));
        }
        Ok(())
    }

    /// Append a Prefix Information Option with both L and A flags set.
    pub fn push_prefix_info(
        &mut self,
        prefix: &Ipv6Net,
        valid_lifetime: u32,
        preferred_lifetime: u32,
    ) -> Result<()> {
        self.ensure_room(32)?;

        self.buf.push(OPTION_TYPE_PREFIX_INFO);
        self.buf.push(4); // length in units of 8 octets
        self.buf.push(prefix.prefix_len());
        self.buf.push(PIO_FLAG_ON_LINK | PIO_FLAG_AUTONOMOUS);
        self.buf.extend_from_slice(&valid_lifetime.to_be_bytes());
        self.buf.extend_from_slice(&preferred_lifetime.to_be_bytes());
        self.buf.extend_from_slice(&[0, 0, 0, 0]); // reserved
        self.buf.extend_from_slice(&prefix.network().octets());
        Ok(())
    }

    /// Append a Route Information Option, sized to the prefix length.
    pub fn push_route_info(
        &mut self,
        prefix: &Ipv6Net,
        route_lifetime: u32,
        preference: RoutePreference,
    ) -> Result<()> {
        let prefix_octets = match prefix.prefix_len() {
            0 => 0,
            1..=64 => 8,
            _ => 16,
        };
        self.ensure_room(8 + prefix_octets)?;

        self.buf.push(OPTION_TYPE_ROUTE_INFO);
        self.buf.push(1 + prefix_octets as u8 / 8);
        self.buf.push(prefix.prefix_len());
        self.buf.push(preference.to_bits() << 3);
        self.buf.extend_from_slice(&route_lifetime.to_be_bytes());
        self.buf
            .extend_from_slice(&prefix.network().octets()[..prefix_octets]);
        Ok(())
    }

    pub fn has_options(&self) -> bool {
        self.buf.len() > RA_HEADER_LEN
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Whether `packet` is a well-formed Router Solicitation.
pub fn is_router_solicit(packet: &[u8]) -> bool {
    packet.len() >= RS_HEADER_LEN && packet[0] == ICMP6_ROUTER_SOLICIT && packet[1] == 0
}

/// Build a Router Solicitation message with no options.
pub fn build_router_solicit() -> Vec<u8> {
    let mut buf = vec![0u8; RS_HEADER_LEN];
    buf[0] = ICMP6_ROUTER_SOLICIT;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv6Net {
        s.parse().unwrap()
    }

    #[test]
    fn test_ra_roundtrip() {
        let header = RaHeader {
            hop_limit: 64,
            managed: true,
            other_config: true,
            default_router_preference: RoutePreference::High,
            router_lifetime: 1800,
            reachable_time: 30_000,
            retrans_timer: 1000,
        };

        let mut builder = RaMessageBuilder::new(&header);
        builder
            .push_prefix_info(&net("2001:db8:1::/64"), 1800, 1800)
            .unwrap();
        builder
            .push_route_info(&net("fd00:cafe::/64"), 1800, RoutePreference::Low)
            .unwrap();
        builder
            .push_route_info(&net("2001:db8:2::/48"), 300, RoutePreference::Medium)
            .unwrap();
        assert!(builder.has_options());

        let packet = builder.finish();
        let ra = RouterAdvert::parse(&packet).unwrap();

        assert_eq!(ra.header, header);
        assert_eq!(
            ra.prefix_info_options().collect::<Vec<_>>(),
            vec![&PrefixInfoOption {
                prefix: net("2001:db8:1::/64"),
                on_link: true,
                autonomous: true,
                valid_lifetime: 1800,
                preferred_lifetime: 1800,
            }]
        );

        let rios: Vec<_> = ra.route_info_options().collect();
        assert_eq!(rios.len(), 2);
        assert_eq!(rios[0].prefix, net("fd00:cafe::/64"));
        assert_eq!(rios[0].preference, RoutePreference::Low);
        assert_eq!(rios[1].prefix, net("2001:db8:2::/48"));
        assert_eq!(rios[1].route_lifetime, 300);
    }

    #[test]
    fn test_default_header_advertises_nothing() {
        let header = RaHeader::default();
        assert_eq!(header.router_lifetime, 0);
        assert!(!header.managed);
        assert!(!header.other_config);

        let builder = RaMessageBuilder::new(&header);
        assert!(!builder.has_options());

        let packet = builder.finish();
        assert_eq!(packet.len(), 16);
        assert_eq!(RouterAdvert::parse(&packet).unwrap().header, header);
    }

    #[test]
    fn test_rio_default_route() {
        let mut builder = RaMessageBuilder::new(&RaHeader::default());
        builder
            .push_route_info(&net("::/0"), 600, RoutePreference::High)
            .unwrap();

        let packet = builder.finish();
        // ::/0 encodes as the 8-octet RIO form
        assert_eq!(packet.len(), 16 + 8);

        let ra = RouterAdvert::parse(&packet).unwrap();
        let rios: Vec<_> = ra.route_info_options().collect();
        assert_eq!(rios[0].prefix, net("::/0"));
        assert_eq!(rios[0].preference, RoutePreference::High);
    }

    #[test]
    fn test_reserved_rio_preference_is_skipped() {
        let mut builder = RaMessageBuilder::new(&RaHeader::default());
        builder
            .push_route_info(&net("2001:db8::/64"), 600, RoutePreference::Medium)
            .unwrap();
        let mut packet = builder.finish();

        // Patch in the reserved Prf encoding (0b10)
        packet[16 + 3] = 0b10 << 3;

        let ra = RouterAdvert::parse(&packet).unwrap();
        assert_eq!(ra.options.len(), 0);
    }

    #[test]
    fn test_reserved_header_preference_degrades_to_medium() {
        let mut builder = RaMessageBuilder::new(&RaHeader::default());
        builder
            .push_route_info(&net("2001:db8::/64"), 600, RoutePreference::Medium)
            .unwrap();
        let mut packet = builder.finish();
        packet[5] = 0b10 << 3;

        let ra = RouterAdvert::parse(&packet).unwrap();
        assert_eq!(
            ra.header.default_router_preference,
            RoutePreference::Medium
        );
    }

    #[test]
    fn test_malformed_messages_are_rejected() {
        // Too short for a header
        assert!(RouterAdvert::parse(&[ICMP6_ROUTER_ADVERT, 0, 0, 0]).is_err());

        // Wrong type
        let mut packet = RaMessageBuilder::new(&RaHeader::default()).finish();
        packet[0] = ICMP6_ROUTER_SOLICIT;
        assert!(RouterAdvert::parse(&packet).is_err());

        // Zero option length
        let mut packet = RaMessageBuilder::new(&RaHeader::default()).finish();
        packet.extend_from_slice(&[OPTION_TYPE_PREFIX_INFO, 0]);
        assert!(RouterAdvert::parse(&packet).is_err());

        // Option length beyond the end of the message
        let mut packet = RaMessageBuilder::new(&RaHeader::default()).finish();
        packet.extend_from_slice(&[OPTION_TYPE_PREFIX_INFO, 4, 64, 0]);
        assert!(RouterAdvert::parse(&packet).is_err());

        // Longer than the maximum handled RA
        let packet = vec![0u8; MAX_RA_MESSAGE_LEN + 1];
        assert!(RouterAdvert::parse(&packet).is_err());
    }

    #[test]
    fn test_unknown_options_are_skipped() {
        let mut packet = RaMessageBuilder::new(&RaHeader::default()).finish();
        // Source link-layer address option (type 1)
        packet.extend_from_slice(&[1, 1, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

        let ra = RouterAdvert::parse(&packet).unwrap();
        assert!(ra.options.is_empty());
    }

    #[test]
    fn test_builder_rejects_overflow() {
        let mut builder = RaMessageBuilder::new(&RaHeader::default());
        let prefix = net("2001:db8::/64");

        // 16-byte header + 7 * 32-byte PIOs = 240; the 8th would exceed 256
        for _ in 0..7 {
            builder.push_prefix_info(&prefix, 1800, 1800).unwrap();
        }
        assert!(matches!(
            builder.push_prefix_info(&prefix, 1800, 1800),
            Err(Error::NoBufs(_))
        ));
    }

    #[test]
    fn test_router_solicit() {
        let packet = build_router_solicit();
        assert!(is_router_solicit(&packet));
        assert!(!is_router_solicit(&packet[..4]));
        assert!(!is_router_solicit(
            &RaMessageBuilder::new(&RaHeader::default()).finish()
        ));
    }
}
