//! Infrastructure interface adapter.

use std::net::Ipv6Addr;

use crate::error::Result;

/// Access to the IPv6 infrastructure link.
///
/// The engine sends and receives raw ICMPv6 messages (starting at the type
/// octet) through this seam; the implementation owns the socket, IPv6
/// framing, and checksumming. Received packets are delivered by the host
/// calling [`crate::routing::RoutingManager::handle_received`], and link
/// state changes by calling
/// [`crate::routing::RoutingManager::handle_infra_if_state_changed`].
pub trait InfraIf {
    /// Interface index of the infrastructure link. Zero means invalid.
    fn if_index(&self) -> u32;

    /// Whether the interface is up and usable.
    fn is_running(&self) -> bool;

    /// Whether `addr` is assigned to the infrastructure interface itself.
    ///
    /// Used to recognize Router Advertisements emitted by another agent on
    /// this same host, whose header parameters we echo instead of override.
    fn has_address(&self, addr: &Ipv6Addr) -> bool;

    /// Send an ICMPv6 message to `dst` on the infrastructure link.
    fn send(&mut self, packet: &[u8], dst: Ipv6Addr) -> Result<()>;
}
