//! Discovered prefix table
//!
//! Soft-state store of the on-link and route prefixes learned from Router
//! Advertisements of peer routers on the infrastructure link. Entries are
//! owned by the router record they were heard from, expire when their valid
//! lifetime runs out, and are mirrored into the mesh network data as
//! external routes while alive. Any mutation raises a coalesced change
//! signal that the routing manager drains at the end of the event dispatch.

use std::net::Ipv6Addr;

use ipnet::Ipv6Net;
use smoltcp::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::ndp::{PrefixInfoOption, RaHeader, RouteInfoOption, RoutePreference};
use crate::netdata::{ExternalRouteConfig, NetData};
use crate::timer::Timer;

/// What to do with the network data when removing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetDataMode {
    /// Withdraw the prefix from the network data if we published it.
    UnpublishFromNetData,
    /// Leave the network data untouched.
    KeepInNetData,
}

/// The `::/0` prefix used for default-route entries.
pub fn default_route_prefix() -> Ipv6Net {
    Ipv6Net::new(Ipv6Addr::UNSPECIFIED, 0).expect("prefix length within bounds")
}

/// RFC 4862 section 5.5.3(e): a refresh may not cut the remaining valid
/// lifetime below two hours unless it advertises more than that itself.
const LIFETIME_CUT_FLOOR: u32 = 2 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    OnLink { preferred_lifetime: u32 },
    Route { preference: RoutePreference },
}

/// One discovered prefix, owned by the router record it was heard from.
#[derive(Debug, Clone)]
struct Entry {
    prefix: Ipv6Net,
    kind: EntryKind,
    last_update: Instant,
    /// Remaining validity in seconds from `last_update`. Zero schedules
    /// immediate removal.
    valid_lifetime: u32,
}

impl Entry {
    fn from_pio(now: Instant, pio: &PrefixInfoOption) -> Self {
        Self {
            prefix: pio.prefix,
            kind: EntryKind::OnLink {
                preferred_lifetime: pio.preferred_lifetime,
            },
            last_update: now,
            valid_lifetime: pio.valid_lifetime,
        }
    }

    fn from_rio(now: Instant, rio: &RouteInfoOption) -> Self {
        Self {
            prefix: rio.prefix,
            kind: EntryKind::Route {
                preference: rio.preference,
            },
            last_update: now,
            valid_lifetime: rio.route_lifetime,
        }
    }

    fn from_ra_header(now: Instant, header: &RaHeader) -> Self {
        Self {
            prefix: default_route_prefix(),
            kind: EntryKind::Route {
                preference: header.default_router_preference,
            },
            last_update: now,
            valid_lifetime: u32::from(header.router_lifetime),
        }
    }

    fn is_on_link(&self) -> bool {
        matches!(self.kind, EntryKind::OnLink { .. })
    }

    fn expire_time(&self) -> Instant {
        self.last_update + Duration::from_secs(u64::from(self.valid_lifetime))
    }

    fn stale_time(&self, stale_ra_time: u32) -> Instant {
        let stale_secs = self.valid_lifetime.min(stale_ra_time);
        self.last_update + Duration::from_secs(u64::from(stale_secs))
    }

    fn is_deprecated(&self, now: Instant) -> bool {
        match self.kind {
            EntryKind::OnLink { preferred_lifetime } => {
                now >= self.last_update + Duration::from_secs(u64::from(preferred_lifetime))
            }
            EntryKind::Route { .. } => false,
        }
    }

    /// Preference used when mirroring this entry into the network data.
    fn preference(&self) -> RoutePreference {
        match self.kind {
            EntryKind::OnLink { .. } => RoutePreference::Medium,
            EntryKind::Route { preference } => preference,
        }
    }

    /// Refresh an on-link entry from a newly received one, applying the
    /// RFC 4862 section 5.5.3(e) rule so a forged or stale advertisement
    /// cannot abruptly invalidate an established prefix. This also keeps
    /// deprecation continuous when another router takes over a prefix we
    /// were advertising ourselves.
    fn adopt_lifetimes_from(&mut self, new: &Entry) {
        if new.valid_lifetime > LIFETIME_CUT_FLOOR || new.expire_time() > self.expire_time() {
            self.valid_lifetime = new.valid_lifetime;
        } else if self.expire_time()
            > new.last_update + Duration::from_secs(u64::from(LIFETIME_CUT_FLOOR))
        {
            self.valid_lifetime = LIFETIME_CUT_FLOOR;
        }
        // Otherwise keep the remaining valid lifetime.

        if let (
            EntryKind::OnLink { preferred_lifetime },
            EntryKind::OnLink {
                preferred_lifetime: new_preferred,
            },
        ) = (&mut self.kind, &new.kind)
        {
            *preferred_lifetime = *new_preferred;
        }
        self.last_update = new.last_update;
    }
}

/// A peer router and the entries learned from its advertisements.
///
/// Invariant: a router record always holds at least one entry; records are
/// garbage-collected as soon as their last entry is removed.
#[derive(Debug)]
struct Router {
    address: Ipv6Addr,
    entries: Vec<Entry>,
}

/// Soft-state table of prefixes discovered from peer Router Advertisements.
#[derive(Debug)]
pub struct DiscoveredPrefixTable {
    routers: Vec<Router>,
    entry_count: usize,
    max_routers: usize,
    max_entries: usize,
    stale_ra_time: u32,
    timer: Timer,
    changed: bool,
    allow_default_route: bool,
}

impl DiscoveredPrefixTable {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            routers: Vec::new(),
            entry_count: 0,
            max_routers: config.max_discovered_routers,
            max_entries: config.max_discovered_prefixes,
            stale_ra_time: config.rtr_adv_stale_time,
            timer: Timer::new(),
            changed: false,
            allow_default_route: false,
        }
    }

    /// Process the default-route information in an RA header: a non-zero
    /// router lifetime installs an implicit `::/0` route entry for the
    /// sending router, zero removes it. A `::/0` RIO processed later in
    /// the same message overrides these values (RFC 4191 section 3.1).
    pub fn process_default_route<N: NetData>(
        &mut self,
        now: Instant,
        src: Ipv6Addr,
        header: &RaHeader,
        net_data: &mut N,
    ) {
        if header.router_lifetime == 0 {
            self.remove_entry_from_router(src, &default_route_prefix(), false, net_data);
        } else {
            self.upsert(src, Entry::from_ra_header(now, header), net_data);
        }
    }

    /// Upsert the on-link entry described by a PIO.
    pub fn process_pio<N: NetData>(
        &mut self,
        now: Instant,
        src: Ipv6Addr,
        pio: &PrefixInfoOption,
        net_data: &mut N,
    ) {
        debug!(
            prefix = %pio.prefix,
            valid = pio.valid_lifetime,
            preferred = pio.preferred_lifetime,
            "Processing PIO"
        );
        self.upsert(src, Entry::from_pio(now, pio), net_data);
    }

    /// Upsert the route entry described by an RIO. A zero lifetime removes
    /// the entry immediately rather than waiting for expiry.
    pub fn process_rio<N: NetData>(
        &mut self,
        now: Instant,
        src: Ipv6Addr,
        rio: &RouteInfoOption,
        net_data: &mut N,
    ) {
        debug!(
            prefix = %rio.prefix,
            lifetime = rio.route_lifetime,
            "Processing RIO"
        );
        if rio.route_lifetime == 0 {
            self.remove_entry_from_router(src, &rio.prefix, false, net_data);
        } else {
            self.upsert(src, Entry::from_rio(now, rio), net_data);
        }
    }

    /// The smallest non-deprecated discovered on-link prefix, if any.
    pub fn find_favored_on_link_prefix(&self, now: Instant) -> Option<Ipv6Net> {
        self.entries()
            .filter(|entry| {
                entry.is_on_link() && entry.valid_lifetime > 0 && !entry.is_deprecated(now)
            })
            .map(|entry| entry.prefix)
            .min_by(|a, b| crate::prefix::prefix_cmp(a, b))
    }

    pub fn contains_on_link_prefix(&self, prefix: &Ipv6Net) -> bool {
        self.entries()
            .any(|entry| entry.is_on_link() && entry.prefix == *prefix)
    }

    pub fn contains_route_prefix(&self, prefix: &Ipv6Net) -> bool {
        self.entries()
            .any(|entry| !entry.is_on_link() && entry.prefix == *prefix)
    }

    /// Remove the on-link entries for `prefix` from every router.
    pub fn remove_on_link_prefix<N: NetData>(
        &mut self,
        prefix: &Ipv6Net,
        mode: NetDataMode,
        net_data: &mut N,
    ) {
        self.remove_matching(prefix, true, mode, net_data);
    }

    /// Remove the route entries for `prefix` from every router.
    pub fn remove_route_prefix<N: NetData>(
        &mut self,
        prefix: &Ipv6Net,
        mode: NetDataMode,
        net_data: &mut N,
    ) {
        self.remove_matching(prefix, false, mode, net_data);
    }

    /// Drop the whole table, withdrawing every mirrored prefix.
    pub fn remove_all_entries<N: NetData>(&mut self, net_data: &mut N) {
        let mut prefixes: Vec<Ipv6Net> = self.entries().map(|entry| entry.prefix).collect();
        prefixes.sort_by(crate::prefix::prefix_cmp);
        prefixes.dedup();

        self.routers.clear();
        self.entry_count = 0;
        self.timer.stop();

        for prefix in &prefixes {
            if !(self.is_default_route(prefix) && !self.allow_default_route) {
                net_data.unpublish_external_route(prefix);
            }
        }
        if !prefixes.is_empty() {
            self.signal_changed();
        }
    }

    /// Age out entries that were not refreshed since `threshold` (the start
    /// of a router-solicitation burst): on-link entries are deprecated,
    /// route entries removed.
    pub fn remove_or_deprecate_old_entries<N: NetData>(
        &mut self,
        now: Instant,
        threshold: Instant,
        net_data: &mut N,
    ) {
        let mut aged = false;

        for router in &mut self.routers {
            for entry in &mut router.entries {
                if entry.last_update > threshold {
                    continue;
                }
                match &mut entry.kind {
                    EntryKind::OnLink { preferred_lifetime } => {
                        if *preferred_lifetime != 0 {
                            debug!(prefix = %entry.prefix, "Deprecating unrefreshed on-link prefix");
                            *preferred_lifetime = 0;
                            aged = true;
                        }
                    }
                    EntryKind::Route { .. } => {
                        debug!(prefix = %entry.prefix, "Dropping unrefreshed route prefix");
                        entry.valid_lifetime = 0;
                        aged = true;
                    }
                }
            }
        }

        self.remove_expired(now, net_data);
        if aged {
            self.signal_changed();
        }
    }

    /// The earliest time any entry becomes stale, clamped to `now`.
    /// Deprecated on-link entries are past refreshing and do not count, so
    /// they cannot re-trigger probing forever.
    pub fn calculate_next_stale_time(&self, now: Instant) -> Option<Instant> {
        self.entries()
            .filter(|entry| !(entry.is_on_link() && entry.is_deprecated(now)))
            .map(|entry| entry.stale_time(self.stale_ra_time).max(now))
            .min()
    }

    /// Gate publication of discovered `::/0` entries into the network data.
    pub fn set_allow_default_route<N: NetData>(&mut self, allow: bool, net_data: &mut N) {
        if self.allow_default_route == allow {
            return;
        }
        self.allow_default_route = allow;

        let prefix = default_route_prefix();
        if self.contains_route_prefix(&prefix) {
            if allow {
                self.update_net_data_for_prefix(&prefix, net_data);
            } else {
                net_data.unpublish_external_route(&prefix);
            }
        }
    }

    /// Re-publish the favored entry of every live prefix. Publication
    /// failures are retried here on each policy evaluation.
    pub fn publish_favored_entries<N: NetData>(&self, net_data: &mut N) {
        let mut prefixes: Vec<Ipv6Net> = self
            .entries()
            .filter(|entry| entry.valid_lifetime > 0)
            .map(|entry| entry.prefix)
            .collect();
        prefixes.sort_by(crate::prefix::prefix_cmp);
        prefixes.dedup();

        for prefix in &prefixes {
            self.update_net_data_for_prefix(prefix, net_data);
        }
    }

    /// Drop expired entries when the expiry timer is due.
    pub fn poll<N: NetData>(&mut self, now: Instant, net_data: &mut N) {
        if self.timer.take_if_due(now) {
            self.remove_expired(now, net_data);
        }
    }

    pub fn timer_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Drain the coalesced change signal.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn router_count(&self) -> usize {
        self.routers.len()
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.routers.iter().flat_map(|router| &router.entries)
    }

    fn is_default_route(&self, prefix: &Ipv6Net) -> bool {
        prefix.prefix_len() == 0
    }

    fn signal_changed(&mut self) {
        self.changed = true;
    }

    fn upsert<N: NetData>(&mut self, src: Ipv6Addr, new: Entry, net_data: &mut N) {
        let prefix = new.prefix;

        match self.routers.iter().position(|router| router.address == src) {
            Some(router_index) => {
                let router = &mut self.routers[router_index];
                match router
                    .entries
                    .iter()
                    .position(|entry| entry.prefix == prefix && entry.is_on_link() == new.is_on_link())
                {
                    Some(entry_index) => {
                        let entry = &mut router.entries[entry_index];
                        if entry.is_on_link() {
                            entry.adopt_lifetimes_from(&new);
                        } else {
                            *entry = new;
                        }
                    }
                    None => {
                        if self.entry_count >= self.max_entries {
                            warn!(prefix = %prefix, "Discovered prefix table full, dropping prefix");
                            return;
                        }
                        router.entries.push(new);
                        self.entry_count += 1;
                    }
                }
            }
            None => {
                if self.routers.len() >= self.max_routers {
                    warn!(src = %src, "Too many discovered routers, ignoring advertisement");
                    return;
                }
                if self.entry_count >= self.max_entries {
                    warn!(prefix = %prefix, "Discovered prefix table full, dropping prefix");
                    return;
                }
                self.routers.push(Router {
                    address: src,
                    entries: vec![new],
                });
                self.entry_count += 1;
            }
        }

        self.update_net_data_for_prefix(&prefix, net_data);
        self.schedule_next_expiry();
        self.signal_changed();
    }

    fn remove_entry_from_router<N: NetData>(
        &mut self,
        src: Ipv6Addr,
        prefix: &Ipv6Net,
        on_link: bool,
        net_data: &mut N,
    ) {
        let Some(router) = self.routers.iter_mut().find(|router| router.address == src) else {
            return;
        };
        let Some(index) = router
            .entries
            .iter()
            .position(|entry| entry.prefix == *prefix && entry.is_on_link() == on_link)
        else {
            return;
        };

        router.entries.remove(index);
        self.entry_count -= 1;
        self.gc_routers();
        self.update_net_data_for_prefix(prefix, net_data);
        self.schedule_next_expiry();
        self.signal_changed();
    }

    fn remove_matching<N: NetData>(
        &mut self,
        prefix: &Ipv6Net,
        on_link: bool,
        mode: NetDataMode,
        net_data: &mut N,
    ) {
        let mut removed = 0;
        for router in &mut self.routers {
            let before = router.entries.len();
            router
                .entries
                .retain(|entry| !(entry.prefix == *prefix && entry.is_on_link() == on_link));
            removed += before - router.entries.len();
        }
        if removed == 0 {
            return;
        }

        self.entry_count -= removed;
        self.gc_routers();
        if mode == NetDataMode::UnpublishFromNetData {
            self.update_net_data_for_prefix(prefix, net_data);
        }
        self.schedule_next_expiry();
        self.signal_changed();
    }

    fn remove_expired<N: NetData>(&mut self, now: Instant, net_data: &mut N) {
        let mut removed: Vec<Ipv6Net> = Vec::new();

        for router in &mut self.routers {
            let mut index = 0;
            while index < router.entries.len() {
                if router.entries[index].expire_time() <= now {
                    let entry = router.entries.remove(index);
                    debug!(prefix = %entry.prefix, "Discovered prefix expired");
                    removed.push(entry.prefix);
                } else {
                    index += 1;
                }
            }
        }

        if !removed.is_empty() {
            self.entry_count -= removed.len();
            self.gc_routers();

            removed.sort_by(crate::prefix::prefix_cmp);
            removed.dedup();
            for prefix in &removed {
                self.update_net_data_for_prefix(prefix, net_data);
            }
            self.signal_changed();
        }

        self.schedule_next_expiry();
    }

    fn gc_routers(&mut self) {
        self.routers.retain(|router| !router.entries.is_empty());
    }

    fn schedule_next_expiry(&mut self) {
        match self.entries().map(Entry::expire_time).min() {
            Some(deadline) => self.timer.fire_at(deadline),
            None => self.timer.stop(),
        }
    }

    /// Publish the favored live entry for `prefix`, or withdraw the prefix
    /// when no live entry remains.
    fn update_net_data_for_prefix<N: NetData>(&self, prefix: &Ipv6Net, net_data: &mut N) {
        let favored = self
            .entries()
            .filter(|entry| entry.prefix == *prefix && entry.valid_lifetime > 0)
            .max_by_key(|entry| entry.preference());

        match favored {
            Some(entry) => {
                if self.is_default_route(prefix) && !self.allow_default_route {
                    return;
                }
                let config = ExternalRouteConfig {
                    prefix: *prefix,
                    preference: entry.preference(),
                    nat64: false,
                    stable: true,
                };
                if net_data.publish_external_route(&config).is_err() {
                    warn!(prefix = %prefix, "Failed to publish discovered prefix");
                }
            }
            None => {
                if !(self.is_default_route(prefix) && !self.allow_default_route) {
                    net_data.unpublish_external_route(prefix);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::TestNetData;

    fn net(s: &str) -> Ipv6Net {
        s.parse().unwrap()
    }

    fn addr(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    fn pio(prefix: &str, valid: u32, preferred: u32) -> PrefixInfoOption {
        PrefixInfoOption {
            prefix: net(prefix),
            on_link: true,
            autonomous: true,
            valid_lifetime: valid,
            preferred_lifetime: preferred,
        }
    }

    fn rio(prefix: &str, lifetime: u32, preference: RoutePreference) -> RouteInfoOption {
        RouteInfoOption {
            prefix: net(prefix),
            preference,
            route_lifetime: lifetime,
        }
    }

    fn table() -> DiscoveredPrefixTable {
        DiscoveredPrefixTable::new(&RoutingConfig::default())
    }

    #[test]
    fn test_upsert_and_refresh() {
        let mut table = table();
        let mut net_data = TestNetData::new();
        let src = addr("fe80::1");
        let t0 = Instant::from_secs(0);

        table.process_rio(t0, src, &rio("2001:db8:2::/48", 600, RoutePreference::High), &mut net_data);
        assert!(table.contains_route_prefix(&net("2001:db8:2::/48")));
        assert_eq!(table.entry_count(), 1);
        assert!(table.take_changed());

        // The prefix is mirrored into the network data
        assert!(net_data.has_external_route(&net("2001:db8:2::/48")));

        // Receiving the same RIO again only refreshes the entry
        let t1 = Instant::from_secs(100);
        table.process_rio(t1, src, &rio("2001:db8:2::/48", 600, RoutePreference::High), &mut net_data);
        assert_eq!(table.entry_count(), 1);
        assert_eq!(table.timer_deadline(), Some(t1 + Duration::from_secs(600)));
    }

    #[test]
    fn test_expiry_unpublishes_once() {
        let mut table = table();
        let mut net_data = TestNetData::new();
        let src = addr("fe80::1");
        let t0 = Instant::from_secs(0);

        table.process_rio(t0, src, &rio("2001:db8:2::/48", 5, RoutePreference::Medium), &mut net_data);
        assert_eq!(table.timer_deadline(), Some(Instant::from_secs(5)));

        // Not yet due
        table.poll(Instant::from_secs(4), &mut net_data);
        assert_eq!(table.entry_count(), 1);

        table.poll(Instant::from_secs(5), &mut net_data);
        assert_eq!(table.entry_count(), 0);
        assert_eq!(table.router_count(), 0);
        assert!(!net_data.has_external_route(&net("2001:db8:2::/48")));
        assert_eq!(net_data.unpublished_routes(&net("2001:db8:2::/48")), 1);
    }

    #[test]
    fn test_zero_lifetime_removes_immediately() {
        let mut table = table();
        let mut net_data = TestNetData::new();
        let src = addr("fe80::1");
        let t0 = Instant::from_secs(0);

        table.process_rio(t0, src, &rio("2001:db8:2::/48", 1800, RoutePreference::Medium), &mut net_data);
        table.process_rio(
            Instant::from_secs(1),
            src,
            &rio("2001:db8:2::/48", 0, RoutePreference::Medium),
            &mut net_data,
        );

        assert_eq!(table.entry_count(), 0);
        assert!(!net_data.has_external_route(&net("2001:db8:2::/48")));
    }

    #[test]
    fn test_routers_with_no_entries_are_collected() {
        let mut table = table();
        let mut net_data = TestNetData::new();

        // A header with zero router lifetime and no options creates nothing
        table.process_default_route(
            Instant::from_secs(0),
            addr("fe80::1"),
            &RaHeader::default(),
            &mut net_data,
        );
        assert_eq!(table.router_count(), 0);

        // A non-zero lifetime creates the implicit ::/0 entry
        let header = RaHeader {
            router_lifetime: 1800,
            ..RaHeader::default()
        };
        table.process_default_route(Instant::from_secs(0), addr("fe80::1"), &header, &mut net_data);
        assert_eq!(table.router_count(), 1);
        assert!(table.contains_route_prefix(&default_route_prefix()));

        // Zero lifetime removes it and collects the router
        table.process_default_route(
            Instant::from_secs(1),
            addr("fe80::1"),
            &RaHeader::default(),
            &mut net_data,
        );
        assert_eq!(table.router_count(), 0);
    }

    #[test]
    fn test_default_route_publication_is_gated() {
        let mut table = table();
        let mut net_data = TestNetData::new();
        let header = RaHeader {
            router_lifetime: 1800,
            ..RaHeader::default()
        };

        table.process_default_route(Instant::from_secs(0), addr("fe80::1"), &header, &mut net_data);
        assert!(!net_data.has_external_route(&default_route_prefix()));

        table.set_allow_default_route(true, &mut net_data);
        assert!(net_data.has_external_route(&default_route_prefix()));

        table.set_allow_default_route(false, &mut net_data);
        assert!(!net_data.has_external_route(&default_route_prefix()));
    }

    #[test]
    fn test_favored_on_link_prefix() {
        let mut table = table();
        let mut net_data = TestNetData::new();
        let t0 = Instant::from_secs(0);

        assert_eq!(table.find_favored_on_link_prefix(t0), None);

        table.process_pio(t0, addr("fe80::1"), &pio("2001:db8:b::/64", 1800, 1800), &mut net_data);
        table.process_pio(t0, addr("fe80::2"), &pio("2001:db8:a::/64", 1800, 1800), &mut net_data);
        assert_eq!(
            table.find_favored_on_link_prefix(t0),
            Some(net("2001:db8:a::/64"))
        );

        // A deprecated prefix is not favored
        table.process_pio(t0, addr("fe80::3"), &pio("2001:db8:1::/64", 1800, 0), &mut net_data);
        assert_eq!(
            table.find_favored_on_link_prefix(Instant::from_secs(1)),
            Some(net("2001:db8:a::/64"))
        );
    }

    #[test]
    fn test_adopt_keeps_remaining_lifetime_on_short_refresh() {
        let mut table = table();
        let mut net_data = TestNetData::new();
        let src = addr("fe80::1");

        table.process_pio(Instant::from_secs(0), src, &pio("2001:db8:1::/64", 36_000, 1800), &mut net_data);

        // A refresh trying to cut the lifetime to 10 minutes is clamped to
        // the two-hour floor
        table.process_pio(Instant::from_secs(10), src, &pio("2001:db8:1::/64", 600, 600), &mut net_data);
        assert_eq!(
            table.timer_deadline(),
            Some(Instant::from_secs(10) + Duration::from_secs(7200))
        );

        // A refresh advertising more than two hours is taken as-is
        table.process_pio(Instant::from_secs(20), src, &pio("2001:db8:1::/64", 36_000, 1800), &mut net_data);
        assert_eq!(
            table.timer_deadline(),
            Some(Instant::from_secs(20) + Duration::from_secs(36_000))
        );
    }

    #[test]
    fn test_capacity_bounds() {
        let config = RoutingConfig {
            max_discovered_routers: 2,
            max_discovered_prefixes: 3,
            ..RoutingConfig::default()
        };
        let mut table = DiscoveredPrefixTable::new(&config);
        let mut net_data = TestNetData::new();
        let t0 = Instant::from_secs(0);

        table.process_rio(t0, addr("fe80::1"), &rio("fd00:1::/64", 600, RoutePreference::Medium), &mut net_data);
        table.process_rio(t0, addr("fe80::2"), &rio("fd00:2::/64", 600, RoutePreference::Medium), &mut net_data);

        // Third router is dropped
        table.process_rio(t0, addr("fe80::3"), &rio("fd00:3::/64", 600, RoutePreference::Medium), &mut net_data);
        assert_eq!(table.router_count(), 2);
        assert!(!table.contains_route_prefix(&net("fd00:3::/64")));

        // Entry pool caps across routers
        table.process_rio(t0, addr("fe80::1"), &rio("fd00:4::/64", 600, RoutePreference::Medium), &mut net_data);
        table.process_rio(t0, addr("fe80::1"), &rio("fd00:5::/64", 600, RoutePreference::Medium), &mut net_data);
        assert_eq!(table.entry_count(), 3);
        assert!(!table.contains_route_prefix(&net("fd00:5::/64")));
    }

    #[test]
    fn test_favored_entry_wins_publication() {
        let mut table = table();
        let mut net_data = TestNetData::new();
        let t0 = Instant::from_secs(0);
        let prefix = net("2001:db8:2::/48");

        table.process_rio(t0, addr("fe80::1"), &rio("2001:db8:2::/48", 600, RoutePreference::Low), &mut net_data);
        assert_eq!(net_data.external_route(&prefix).unwrap().preference, RoutePreference::Low);

        // A second router with higher preference takes over the publication
        table.process_rio(t0, addr("fe80::2"), &rio("2001:db8:2::/48", 600, RoutePreference::High), &mut net_data);
        assert_eq!(net_data.external_route(&prefix).unwrap().preference, RoutePreference::High);

        // Removing the favored router falls back to the remaining entry
        table.process_rio(
            Instant::from_secs(1),
            addr("fe80::2"),
            &rio("2001:db8:2::/48", 0, RoutePreference::High),
            &mut net_data,
        );
        assert_eq!(net_data.external_route(&prefix).unwrap().preference, RoutePreference::Low);
    }

    #[test]
    fn test_remove_or_deprecate_old_entries() {
        let mut table = table();
        let mut net_data = TestNetData::new();

        table.process_pio(Instant::from_secs(0), addr("fe80::1"), &pio("2001:db8:1::/64", 1800, 1800), &mut net_data);
        table.process_rio(Instant::from_secs(0), addr("fe80::1"), &rio("fd00:1::/64", 1800, RoutePreference::Medium), &mut net_data);
        table.process_rio(Instant::from_secs(50), addr("fe80::2"), &rio("fd00:2::/64", 1800, RoutePreference::Medium), &mut net_data);
        table.take_changed();

        // Entries last updated at or before t=10 age out
        table.remove_or_deprecate_old_entries(
            Instant::from_secs(60),
            Instant::from_secs(10),
            &mut net_data,
        );

        // The stale route entry is gone, the fresh one kept
        assert!(!table.contains_route_prefix(&net("fd00:1::/64")));
        assert!(table.contains_route_prefix(&net("fd00:2::/64")));

        // The stale on-link entry is deprecated, not removed
        assert!(table.contains_on_link_prefix(&net("2001:db8:1::/64")));
        assert_eq!(table.find_favored_on_link_prefix(Instant::from_secs(61)), None);
        assert!(table.take_changed());
    }

    #[test]
    fn test_next_stale_time() {
        let config = RoutingConfig::default();
        let mut table = DiscoveredPrefixTable::new(&config);
        let mut net_data = TestNetData::new();
        let t0 = Instant::from_secs(0);

        assert_eq!(table.calculate_next_stale_time(t0), None);

        // Stale time is capped by the configured stale interval
        table.process_rio(t0, addr("fe80::1"), &rio("fd00:1::/64", 3600, RoutePreference::Medium), &mut net_data);
        assert_eq!(
            table.calculate_next_stale_time(t0),
            Some(t0 + Duration::from_secs(u64::from(config.rtr_adv_stale_time)))
        );

        // A shorter-lived entry pulls the stale time in
        table.process_rio(t0, addr("fe80::1"), &rio("fd00:2::/64", 600, RoutePreference::Medium), &mut net_data);
        assert_eq!(
            table.calculate_next_stale_time(t0),
            Some(t0 + Duration::from_secs(600))
        );

        // Deprecated on-link entries cannot be refreshed and do not count
        table.process_pio(t0, addr("fe80::2"), &pio("2001:db8:1::/64", 3600, 0), &mut net_data);
        assert_eq!(
            table.calculate_next_stale_time(Instant::from_secs(1)),
            Some(t0 + Duration::from_secs(600))
        );
    }

    #[test]
    fn test_remove_all_entries() {
        let mut table = table();
        let mut net_data = TestNetData::new();
        let t0 = Instant::from_secs(0);

        table.process_pio(t0, addr("fe80::1"), &pio("2001:db8:1::/64", 1800, 1800), &mut net_data);
        table.process_rio(t0, addr("fe80::2"), &rio("fd00:1::/64", 1800, RoutePreference::Medium), &mut net_data);
        assert!(net_data.has_external_route(&net("2001:db8:1::/64")));

        table.remove_all_entries(&mut net_data);
        assert_eq!(table.entry_count(), 0);
        assert_eq!(table.router_count(), 0);
        assert_eq!(table.timer_deadline(), None);
        assert!(!net_data.has_external_route(&net("2001:db8:1::/64")));
        assert!(!net_data.has_external_route(&net("fd00:1::/64")));
    }
}
