//! Test doubles and packet builders for unit and integration tests.

#![allow(dead_code)]

use std::net::Ipv6Addr;

use ipnet::Ipv6Net;
use smoltcp::time::Instant;

use crate::error::Result;
use crate::infra::InfraIf;
use crate::ndp::{RaHeader, RaMessageBuilder, RoutePreference, RouterAdvert};
use crate::netdata::{ExternalRouteConfig, NetData, OnMeshPrefixConfig};
use crate::routing::RoutingManager;
use crate::store::SeedStore;

/// Scripted infrastructure interface that records every transmission.
#[derive(Debug, Default)]
pub struct TestInfraIf {
    if_index: u32,
    running: bool,
    addresses: Vec<Ipv6Addr>,
    fail_sends: bool,
    /// Every packet handed to `send`, with its destination.
    pub sent: Vec<(Vec<u8>, Ipv6Addr)>,
}

impl TestInfraIf {
    pub fn new(if_index: u32) -> Self {
        Self {
            if_index,
            running: true,
            addresses: Vec::new(),
            fail_sends: false,
            sent: Vec::new(),
        }
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.running = running;
        self
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn add_address(&mut self, addr: Ipv6Addr) {
        self.addresses.push(addr);
    }

    pub fn set_fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Parsed Router Advertisements sent so far, in order.
    pub fn sent_ras(&self) -> Vec<RouterAdvert> {
        self.sent
            .iter()
            .filter(|(packet, _)| packet.first() == Some(&134))
            .map(|(packet, _)| RouterAdvert::parse(packet).expect("sent RA parses"))
            .collect()
    }

    pub fn sent_rs_count(&self) -> usize {
        self.sent
            .iter()
            .filter(|(packet, _)| packet.first() == Some(&133))
            .count()
    }
}

impl InfraIf for TestInfraIf {
    fn if_index(&self) -> u32 {
        self.if_index
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn has_address(&self, addr: &Ipv6Addr) -> bool {
        self.addresses.contains(addr)
    }

    fn send(&mut self, packet: &[u8], dst: Ipv6Addr) -> Result<()> {
        if self.fail_sends {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "send failed").into());
        }
        self.sent.push((packet.to_vec(), dst));
        Ok(())
    }
}

/// In-memory mesh network data that records unpublish calls.
#[derive(Debug, Default)]
pub struct TestNetData {
    attached: bool,
    fail_publish: bool,
    on_mesh: Vec<OnMeshPrefixConfig>,
    routes: Vec<ExternalRouteConfig>,
    unpublished_route_log: Vec<Ipv6Net>,
}

impl TestNetData {
    pub fn new() -> Self {
        Self {
            attached: true,
            ..Self::default()
        }
    }

    pub fn with_attached(mut self, attached: bool) -> Self {
        self.attached = attached;
        self
    }

    pub fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub fn set_fail_publish(&mut self, fail: bool) {
        self.fail_publish = fail;
    }

    /// Inject an on-mesh prefix as if another border router published it.
    pub fn add_on_mesh_prefix(&mut self, config: OnMeshPrefixConfig) {
        self.on_mesh.retain(|existing| existing.prefix != config.prefix);
        self.on_mesh.push(config);
    }

    /// Inject an external route as if another border router published it.
    pub fn add_external_route(&mut self, config: ExternalRouteConfig) {
        self.routes.retain(|existing| existing.prefix != config.prefix);
        self.routes.push(config);
    }

    pub fn has_on_mesh_prefix(&self, prefix: &Ipv6Net) -> bool {
        self.on_mesh.iter().any(|config| config.prefix == *prefix)
    }

    pub fn on_mesh_prefix(&self, prefix: &Ipv6Net) -> Option<OnMeshPrefixConfig> {
        self.on_mesh
            .iter()
            .find(|config| config.prefix == *prefix)
            .copied()
    }

    pub fn has_external_route(&self, prefix: &Ipv6Net) -> bool {
        self.routes.iter().any(|config| config.prefix == *prefix)
    }

    pub fn external_route(&self, prefix: &Ipv6Net) -> Option<ExternalRouteConfig> {
        self.routes
            .iter()
            .find(|config| config.prefix == *prefix)
            .copied()
    }

    /// How many times `unpublish_external_route` was called for `prefix`.
    pub fn unpublished_routes(&self, prefix: &Ipv6Net) -> usize {
        self.unpublished_route_log
            .iter()
            .filter(|unpublished| *unpublished == prefix)
            .count()
    }
}

impl NetData for TestNetData {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn publish_on_mesh_prefix(&mut self, config: &OnMeshPrefixConfig) -> Result<()> {
        if self.fail_publish {
            return Err(crate::error::Error::NetDataPublish);
        }
        self.add_on_mesh_prefix(*config);
        Ok(())
    }

    fn unpublish_on_mesh_prefix(&mut self, prefix: &Ipv6Net) {
        self.on_mesh.retain(|config| config.prefix != *prefix);
    }

    fn publish_external_route(&mut self, config: &ExternalRouteConfig) -> Result<()> {
        if self.fail_publish {
            return Err(crate::error::Error::NetDataPublish);
        }
        self.add_external_route(*config);
        Ok(())
    }

    fn unpublish_external_route(&mut self, prefix: &Ipv6Net) {
        self.unpublished_route_log.push(*prefix);
        self.routes.retain(|config| config.prefix != *prefix);
    }

    fn on_mesh_prefixes(&self) -> Vec<OnMeshPrefixConfig> {
        self.on_mesh.clone()
    }

    fn external_routes(&self) -> Vec<ExternalRouteConfig> {
        self.routes.clone()
    }
}

/// Build an RA message with one PIO (L and A set).
pub fn ra_with_pio(prefix: Ipv6Net, valid: u32, preferred: u32) -> Vec<u8> {
    let mut builder = RaMessageBuilder::new(&RaHeader::default());
    builder
        .push_prefix_info(&prefix, valid, preferred)
        .expect("PIO fits");
    builder.finish()
}

/// Build an RA message with one RIO.
pub fn ra_with_rio(prefix: Ipv6Net, lifetime: u32, preference: RoutePreference) -> Vec<u8> {
    let mut builder = RaMessageBuilder::new(&RaHeader::default());
    builder
        .push_route_info(&prefix, lifetime, preference)
        .expect("RIO fits");
    builder.finish()
}

/// Build an RA message carrying only `header`, no options.
pub fn ra_with_header(header: RaHeader) -> Vec<u8> {
    RaMessageBuilder::new(&header).finish()
}

/// An on-mesh prefix entry the way a peer border router would publish it.
pub fn omr_config(prefix: Ipv6Net, preference: RoutePreference) -> OnMeshPrefixConfig {
    OnMeshPrefixConfig {
        prefix,
        preference,
        slaac: true,
        on_mesh: true,
        default_route: false,
        stable: true,
        preferred: true,
    }
}

/// Drive the manager's timers up to and including `deadline`.
///
/// Returns with `*now` set to `deadline`. Timers that re-arm within the
/// window are serviced in deadline order, mimicking the host event loop.
pub fn run_until<I: InfraIf, N: NetData, S: SeedStore>(
    manager: &mut RoutingManager<I, N, S>,
    now: &mut Instant,
    deadline: Instant,
) {
    while let Some(next) = manager.poll_at() {
        if next > deadline {
            break;
        }
        *now = next.max(*now);
        manager.poll(*now);
    }
    *now = deadline.max(*now);
}
