//! Local prefix generation and validation.
//!
//! A border router owns a single /48 ULA block (the BR-ULA prefix) from
//! which the OMR and NAT64 prefixes are carved by subnet id. The on-link
//! prefix for the infrastructure link is an independent random ULA /64.
//! All random prefixes come from the OS entropy source and are persisted by
//! the caller so they survive restarts.

use std::cmp::Ordering;
use std::net::Ipv6Addr;

use ipnet::Ipv6Net;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::ndp::PrefixInfoOption;
use crate::netdata::OnMeshPrefixConfig;

pub const BR_ULA_PREFIX_LEN: u8 = 48;
pub const OMR_PREFIX_LEN: u8 = 64;
pub const ON_LINK_PREFIX_LEN: u8 = 64;
pub const NAT64_PREFIX_LEN: u8 = 96;

/// Subnet id of the OMR prefix within the BR-ULA block.
const OMR_SUBNET_ID: u16 = 1;
/// Subnet id of the NAT64 prefix within the BR-ULA block.
const NAT64_SUBNET_ID: u16 = 2;

fn make_net(addr: Ipv6Addr, prefix_len: u8) -> Ipv6Net {
    Ipv6Net::new(addr, prefix_len)
        .expect("prefix length within bounds")
        .trunc()
}

/// Generate a random BR-ULA /48 prefix in fd00::/8 (RFC 4193).
pub fn generate_br_ula_prefix() -> Ipv6Net {
    let mut octets = [0u8; 16];
    octets[0] = 0xfd;
    OsRng.fill_bytes(&mut octets[1..6]);
    make_net(Ipv6Addr::from(octets), BR_ULA_PREFIX_LEN)
}

/// Derive the OMR /64 prefix from the BR-ULA block (subnet id 1).
pub fn derive_omr_prefix(br_ula: &Ipv6Net) -> Ipv6Net {
    let base = u128::from(br_ula.network());
    make_net(
        Ipv6Addr::from(base | (u128::from(OMR_SUBNET_ID) << 64)),
        OMR_PREFIX_LEN,
    )
}

/// Derive the NAT64 /96 prefix from the BR-ULA block (subnet id 2).
pub fn derive_nat64_prefix(br_ula: &Ipv6Net) -> Ipv6Net {
    let base = u128::from(br_ula.network());
    make_net(
        Ipv6Addr::from(base | (u128::from(NAT64_SUBNET_ID) << 64)),
        NAT64_PREFIX_LEN,
    )
}

/// Generate a random on-link ULA /64 prefix for the infrastructure link.
pub fn generate_on_link_prefix() -> Ipv6Net {
    let mut octets = [0u8; 16];
    octets[0] = 0xfd;
    OsRng.fill_bytes(&mut octets[1..8]);
    make_net(Ipv6Addr::from(octets), ON_LINK_PREFIX_LEN)
}

fn is_link_local(prefix: &Ipv6Net) -> bool {
    prefix.network().segments()[0] & 0xffc0 == 0xfe80
}

fn is_multicast(prefix: &Ipv6Net) -> bool {
    prefix.network().segments()[0] & 0xff00 == 0xff00
}

fn is_unique_local(prefix: &Ipv6Net) -> bool {
    prefix.network().segments()[0] & 0xfe00 == 0xfc00
}

fn is_global_unicast(prefix: &Ipv6Net) -> bool {
    prefix.network().segments()[0] & 0xe000 == 0x2000
}

/// Whether `prefix` is a valid BR-ULA block: a /48 inside fd00::/8.
pub fn is_valid_br_ula_prefix(prefix: &Ipv6Net) -> bool {
    prefix.prefix_len() == BR_ULA_PREFIX_LEN && prefix.network().octets()[0] == 0xfd
}

/// Whether `prefix` is a valid OMR prefix: a GUA or ULA /64.
pub fn is_valid_omr_prefix(prefix: &Ipv6Net) -> bool {
    prefix.prefix_len() == OMR_PREFIX_LEN
        && !is_link_local(prefix)
        && !is_multicast(prefix)
        && (is_unique_local(prefix) || is_global_unicast(prefix))
}

/// Whether an on-mesh prefix entry qualifies as an OMR prefix.
pub fn is_valid_omr_config(config: &OnMeshPrefixConfig) -> bool {
    is_valid_omr_prefix(&config.prefix) && config.slaac && config.on_mesh
}

/// Whether `prefix` can serve as an on-link prefix.
pub fn is_valid_on_link_prefix(prefix: &Ipv6Net) -> bool {
    prefix.prefix_len() == ON_LINK_PREFIX_LEN && !is_link_local(prefix) && !is_multicast(prefix)
}

/// Whether a received PIO advertises a usable on-link prefix: L and A flags
/// set, a non-zero valid lifetime not shorter than the preferred one.
pub fn is_valid_on_link_pio(pio: &PrefixInfoOption) -> bool {
    is_valid_on_link_prefix(&pio.prefix)
        && pio.on_link
        && pio.autonomous
        && pio.valid_lifetime > 0
        && pio.preferred_lifetime <= pio.valid_lifetime
}

/// Whether `prefix` is a valid NAT64 prefix: a /96 that is not link-local.
pub fn is_valid_nat64_prefix(prefix: &Ipv6Net) -> bool {
    prefix.prefix_len() == NAT64_PREFIX_LEN && !is_link_local(prefix) && !is_multicast(prefix)
}

/// Total order used wherever multiple border routers must converge on one
/// prefix: shorter prefixes sort first, equal lengths compare byte-wise.
pub fn prefix_cmp(a: &Ipv6Net, b: &Ipv6Net) -> Ordering {
    a.prefix_len()
        .cmp(&b.prefix_len())
        .then_with(|| a.network().octets().cmp(&b.network().octets()))
}
