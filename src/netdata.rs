//! Mesh network data client.
//!
//! The mesh keeps a replicated store of on-mesh prefixes and external
//! routes. The engine publishes its local prefixes and the prefixes it
//! discovers on the infrastructure link through this seam, and reads back
//! what other border routers have published to converge with them. Change
//! notifications arrive through
//! [`crate::routing::RoutingManager::handle_notifier_events`].

use ipnet::Ipv6Net;

use crate::error::Result;
use crate::ndp::RoutePreference;

/// An on-mesh prefix entry in the mesh network data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnMeshPrefixConfig {
    pub prefix: Ipv6Net,
    pub preference: RoutePreference,
    /// Hosts may autoconfigure addresses from this prefix.
    pub slaac: bool,
    pub on_mesh: bool,
    /// This prefix's publisher is willing to act as a default router.
    pub default_route: bool,
    /// Stored in the stable (persistent) network data partition.
    pub stable: bool,
    pub preferred: bool,
}

/// An external route entry in the mesh network data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalRouteConfig {
    pub prefix: Ipv6Net,
    pub preference: RoutePreference,
    pub nat64: bool,
    pub stable: bool,
}

/// Client for the mesh's distributed network data store.
///
/// Publish calls are idempotent upserts keyed by prefix; unpublishing a
/// prefix that was never published is a no-op. Implementations must not
/// call back into the engine from within these methods.
pub trait NetData {
    /// Whether the mesh side is attached and the network data is reachable.
    fn is_attached(&self) -> bool;

    fn publish_on_mesh_prefix(&mut self, config: &OnMeshPrefixConfig) -> Result<()>;

    fn unpublish_on_mesh_prefix(&mut self, prefix: &Ipv6Net);

    fn publish_external_route(&mut self, config: &ExternalRouteConfig) -> Result<()>;

    fn unpublish_external_route(&mut self, prefix: &Ipv6Net);

    /// Snapshot of all on-mesh prefixes currently in the network data,
    /// including entries published by other border routers.
    fn on_mesh_prefixes(&self) -> Vec<OnMeshPrefixConfig>;

    /// Snapshot of all external routes currently in the network data.
    fn external_routes(&self) -> Vec<ExternalRouteConfig>;
}
