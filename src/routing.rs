//! Routing policy engine
//!
//! Bridges a mesh network and an adjacent IPv6 infrastructure link:
//!
//! - owns the local OMR, NAT64, and on-link prefixes and publishes or
//!   withdraws them so that multiple border routers on the same link
//!   converge on a single owner without coordination
//! - speaks Neighbor Discovery on the infrastructure link: solicitation
//!   bursts on start, an initial advertisement burst, steady-state
//!   advertisements at randomized intervals, and probing of stale prefixes
//! - feeds Router Advertisements from peer routers into the
//!   [`DiscoveredPrefixTable`] and re-evaluates the routing policy whenever
//!   the table, the mesh network data, or the link state changes
//!
//! All methods run on the host's single event loop; time is passed in
//! explicitly and timers are polled through [`RoutingManager::poll`] /
//! [`RoutingManager::poll_at`].

use std::net::Ipv6Addr;

use ipnet::Ipv6Net;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smoltcp::time::{Duration, Instant};
use smoltcp::wire::Icmpv6Message;
use tracing::{debug, info, warn};

use crate::config::RoutingConfig;
use crate::discovered::DiscoveredPrefixTable;
use crate::error::{Error, Result};
use crate::infra::InfraIf;
use crate::ndp::{
    self, PrefixInfoOption, RaHeader, RaMessageBuilder, RaOption, RouteInfoOption,
    RoutePreference, RouterAdvert, ALL_NODES_MULTICAST, ALL_ROUTERS_MULTICAST,
};
use crate::netdata::{ExternalRouteConfig, NetData, OnMeshPrefixConfig};
use crate::prefix;
use crate::store::SeedStore;
use crate::timer::Timer;

/// Notifier events delivered by the mesh side of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct Events {
    /// The mesh role changed (attached or detached).
    pub role_changed: bool,
    /// The mesh network data changed.
    pub net_data_changed: bool,
}

/// An OMR prefix candidate for advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OmrPrefix {
    pub prefix: Ipv6Net,
    pub preference: RoutePreference,
}

impl OmrPrefix {
    /// Preference wins; ties converge on the smaller prefix.
    fn is_favored_over(&self, other: &OmrPrefix) -> bool {
        self.preference > other.preference
            || (self.preference == other.preference
                && prefix::prefix_cmp(&self.prefix, &other.prefix).is_lt())
    }
}

/// The border routing policy engine.
pub struct RoutingManager<I: InfraIf, N: NetData, S: SeedStore> {
    config: RoutingConfig,
    infra_if: I,
    net_data: N,
    store: S,
    rng: StdRng,

    initialized: bool,
    enabled: bool,
    running: bool,

    br_ula_prefix: Option<Ipv6Net>,
    local_omr_prefix: Option<Ipv6Net>,
    local_nat64_prefix: Option<Ipv6Net>,
    local_on_link_prefix: Option<Ipv6Net>,

    omr_published: bool,
    advertised_omr_prefixes: Vec<OmrPrefix>,
    advertising_local_nat64: bool,

    favored_discovered_on_link: Option<Ipv6Net>,
    advertising_local_on_link: bool,
    /// Last time the on-link prefix was advertised with a non-zero
    /// preferred lifetime; anchor for the deprecation window.
    time_advertised_on_link: Option<Instant>,
    on_link_deprecate_timer: Timer,
    on_link_withdraw_pending: bool,

    discovered: DiscoveredPrefixTable,

    ra_header: RaHeader,
    ra_header_last_update: Option<Instant>,
    learnt_ra_header_from_host: bool,

    stale_timer: Timer,
    routing_policy_timer: Timer,

    ra_count: u32,
    last_ra_send_time: Option<Instant>,

    rs_timer: Timer,
    rs_start_time: Option<Instant>,
    rs_count: u32,
}

impl<I: InfraIf, N: NetData, S: SeedStore> RoutingManager<I, N, S> {
    pub fn new(config: RoutingConfig, infra_if: I, net_data: N, store: S) -> Self {
        let discovered = DiscoveredPrefixTable::new(&config);
        Self {
            config,
            infra_if,
            net_data,
            store,
            rng: StdRng::from_entropy(),
            initialized: false,
            enabled: true,
            running: false,
            br_ula_prefix: None,
            local_omr_prefix: None,
            local_nat64_prefix: None,
            local_on_link_prefix: None,
            omr_published: false,
            advertised_omr_prefixes: Vec::new(),
            advertising_local_nat64: false,
            favored_discovered_on_link: None,
            advertising_local_on_link: false,
            time_advertised_on_link: None,
            on_link_deprecate_timer: Timer::new(),
            on_link_withdraw_pending: false,
            discovered,
            ra_header: RaHeader::default(),
            ra_header_last_update: None,
            learnt_ra_header_from_host: false,
            stale_timer: Timer::new(),
            routing_policy_timer: Timer::new(),
            ra_count: 0,
            last_ra_send_time: None,
            rs_timer: Timer::new(),
            rs_start_time: None,
            rs_count: 0,
        }
    }

    /// Initialize on the infrastructure interface: load or generate the
    /// local prefixes and start if the interface and the mesh are ready.
    pub fn init(&mut self, now: Instant) -> Result<()> {
        if self.initialized {
            return Err(Error::InvalidState);
        }
        if self.infra_if.if_index() == 0 {
            return Err(Error::InvalidArgs("infrastructure interface index"));
        }

        let br_ula = match self.store.load_br_ula_prefix() {
            Some(loaded) if prefix::is_valid_br_ula_prefix(&loaded) => {
                info!(prefix = %loaded, "Loaded BR ULA prefix");
                loaded
            }
            _ => {
                let generated = prefix::generate_br_ula_prefix();
                self.store.save_br_ula_prefix(&generated);
                info!(prefix = %generated, "Generated new BR ULA prefix");
                generated
            }
        };
        self.local_omr_prefix = Some(prefix::derive_omr_prefix(&br_ula));
        self.local_nat64_prefix = Some(prefix::derive_nat64_prefix(&br_ula));
        self.br_ula_prefix = Some(br_ula);

        let on_link = match self.store.load_on_link_prefix() {
            Some(loaded) if prefix::is_valid_on_link_prefix(&loaded) => {
                info!(prefix = %loaded, "Loaded on-link prefix");
                loaded
            }
            _ => {
                let generated = prefix::generate_on_link_prefix();
                self.store.save_on_link_prefix(&generated);
                info!(prefix = %generated, "Generated new on-link prefix");
                generated
            }
        };
        self.local_on_link_prefix = Some(on_link);

        self.initialized = true;
        self.evaluate_state(now);
        self.flush_deferred(now);
        Ok(())
    }

    /// Enable or disable the engine. Enabled by default.
    pub fn set_enabled(&mut self, now: Instant, enabled: bool) -> Result<()> {
        if !self.initialized {
            return Err(Error::InvalidState);
        }
        if self.enabled != enabled {
            self.enabled = enabled;
            self.evaluate_state(now);
            self.flush_deferred(now);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The local OMR prefix derived from the BR ULA block.
    pub fn omr_prefix(&self) -> Result<Ipv6Net> {
        self.local_omr_prefix.ok_or(Error::InvalidState)
    }

    /// The local on-link prefix for the infrastructure link.
    pub fn on_link_prefix(&self) -> Result<Ipv6Net> {
        self.local_on_link_prefix.ok_or(Error::InvalidState)
    }

    /// The local NAT64 prefix derived from the BR ULA block.
    pub fn nat64_prefix(&self) -> Result<Ipv6Net> {
        self.local_nat64_prefix.ok_or(Error::InvalidState)
    }

    pub fn infra_if(&self) -> &I {
        &self.infra_if
    }

    pub fn infra_if_mut(&mut self) -> &mut I {
        &mut self.infra_if
    }

    pub fn net_data(&self) -> &N {
        &self.net_data
    }

    pub fn net_data_mut(&mut self) -> &mut N {
        &mut self.net_data
    }

    /// Process an ICMPv6 message received on the infrastructure link.
    /// Malformed or undesired messages are dropped silently.
    pub fn handle_received(&mut self, now: Instant, packet: &[u8], src: Ipv6Addr) {
        if !self.running || packet.is_empty() {
            return;
        }

        match Icmpv6Message::from(packet[0]) {
            Icmpv6Message::RouterSolicit => self.handle_router_solicit(now, packet, src),
            Icmpv6Message::RouterAdvert => self.handle_router_advert(now, packet, src),
            _ => {}
        }

        self.flush_deferred(now);
    }

    /// React to the infrastructure interface going up or down.
    pub fn handle_infra_if_state_changed(&mut self, now: Instant) {
        self.evaluate_state(now);
        self.flush_deferred(now);
    }

    /// React to mesh notifier events.
    pub fn handle_notifier_events(&mut self, now: Instant, events: Events) {
        if events.role_changed {
            self.evaluate_state(now);
        }
        if self.running && events.net_data_changed {
            self.update_discovered_on_net_data_change();
            self.start_routing_policy_evaluation_jitter(now);
        }
        self.flush_deferred(now);
    }

    /// Fire all timers due at `now`, then run deferred work.
    pub fn poll(&mut self, now: Instant) {
        if self.rs_timer.take_if_due(now) {
            self.handle_router_solicit_timer(now);
        }
        self.discovered.poll(now, &mut self.net_data);
        if self.on_link_deprecate_timer.take_if_due(now) {
            self.handle_on_link_deprecate_timer(now);
        }
        if self.stale_timer.take_if_due(now) {
            self.handle_stale_timer(now);
        }
        if self.routing_policy_timer.take_if_due(now) && self.running {
            self.evaluate_routing_policy(now);
        }
        self.flush_deferred(now);
    }

    /// The earliest pending timer deadline, for the host's sleep.
    pub fn poll_at(&self) -> Option<Instant> {
        [
            self.rs_timer.deadline(),
            self.discovered.timer_deadline(),
            self.on_link_deprecate_timer.deadline(),
            self.stale_timer.deadline(),
            self.routing_policy_timer.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn evaluate_state(&mut self, now: Instant) {
        let should_run = self.enabled
            && self
                .br_ula_prefix
                .map_or(false, |ula| prefix::is_valid_br_ula_prefix(&ula))
            && self.infra_if.is_running()
            && self.net_data.is_attached();

        if should_run && !self.running {
            self.start(now);
        } else if !should_run && self.running {
            self.stop(now);
        }
    }

    fn start(&mut self, now: Instant) {
        info!("Border routing manager started");
        self.running = true;
        self.ra_header = RaHeader::default();
        self.ra_header_last_update = None;
        self.learnt_ra_header_from_host = false;
        self.start_router_solicitation_delay(now);
    }

    fn stop(&mut self, now: Instant) {
        self.unpublish_local_omr_prefix();

        if self.advertising_local_nat64 {
            if let Some(nat64) = self.local_nat64_prefix {
                self.net_data.unpublish_external_route(&nat64);
            }
            self.advertising_local_nat64 = false;
        }

        self.discovered.remove_all_entries(&mut self.net_data);
        self.favored_discovered_on_link = None;

        // One final RA withdrawing everything we were advertising.
        self.on_link_withdraw_pending =
            self.advertising_local_on_link || self.on_link_deprecate_timer.is_running();
        self.advertising_local_on_link = false;
        self.on_link_deprecate_timer.stop();
        self.send_router_advertisement(now, Vec::new());
        self.on_link_withdraw_pending = false;
        self.time_advertised_on_link = None;

        self.advertised_omr_prefixes.clear();
        self.ra_header = RaHeader::default();
        self.ra_header_last_update = None;
        self.learnt_ra_header_from_host = false;
        self.ra_count = 0;
        self.last_ra_send_time = None;

        self.rs_timer.stop();
        self.rs_start_time = None;
        self.rs_count = 0;
        self.routing_policy_timer.stop();
        self.stale_timer.stop();

        self.running = false;
        info!("Border routing manager stopped");
    }

    fn handle_router_solicit(&mut self, now: Instant, packet: &[u8], src: Ipv6Addr) {
        if !ndp::is_router_solicit(packet) {
            debug!(src = %src, "Dropping malformed Router Solicitation");
            return;
        }

        debug!(src = %src, "Received Router Solicitation");

        // Schedule an advertisement with a short random delay so a storm of
        // solicitations is answered by a single RA.
        let jitter = self.random_delay(self.config.ra_reply_jitter);
        self.start_routing_policy_evaluation_delay(now, jitter);
    }

    fn handle_router_advert(&mut self, now: Instant, packet: &[u8], src: Ipv6Addr) {
        let ra = match RouterAdvert::parse(packet) {
            Ok(ra) => ra,
            Err(error) => {
                debug!(src = %src, %error, "Dropping malformed Router Advertisement");
                return;
            }
        };

        debug!(src = %src, options = ra.options.len(), "Received Router Advertisement");

        self.discovered
            .process_default_route(now, src, &ra.header, &mut self.net_data);

        for option in &ra.options {
            match option {
                RaOption::PrefixInfo(pio) => {
                    if self.should_process_pio(pio) {
                        self.discovered.process_pio(now, src, pio, &mut self.net_data);
                    }
                }
                RaOption::RouteInfo(rio) => {
                    if self.should_process_rio(rio) {
                        self.discovered.process_rio(now, src, rio, &mut self.net_data);
                    }
                }
            }
        }

        // Remember the header of RA messages initiated from this host so
        // our own advertisements echo the upstream parameters.
        if self.infra_if.has_address(&src) {
            if self.is_router_solicitation_in_progress() {
                // The upstream router answered; end the solicitation burst
                // and move on to advertising.
                self.rs_timer.stop();
                self.rs_count = 0;
                self.start_routing_policy_evaluation_delay(now, Duration::ZERO);
            }
            self.update_router_advert_header(now, Some(&ra));
        }
    }

    fn should_process_pio(&self, pio: &PrefixInfoOption) -> bool {
        if !prefix::is_valid_on_link_pio(pio) {
            debug!(prefix = %pio.prefix, "Ignoring invalid on-link prefix in PIO");
            return false;
        }
        // Our own prefix is not a discovered one.
        self.local_on_link_prefix != Some(pio.prefix)
    }

    fn should_process_rio(&self, rio: &RouteInfoOption) -> bool {
        if self.local_omr_prefix == Some(rio.prefix) {
            return false;
        }
        // An OMR prefix already present in the network data reaches the
        // mesh without our help; tracking it would only echo it back.
        !self.net_data_contains_omr_prefix(&rio.prefix)
    }

    fn net_data_contains_omr_prefix(&self, prefix_net: &Ipv6Net) -> bool {
        self.net_data
            .on_mesh_prefixes()
            .iter()
            .any(|config| prefix::is_valid_omr_config(config) && config.prefix == *prefix_net)
    }

    fn update_router_advert_header(&mut self, now: Instant, ra: Option<&RouterAdvert>) {
        let old_header = self.ra_header;
        self.ra_header_last_update = Some(now);

        match ra {
            Some(ra) if ra.header.router_lifetime != 0 => {
                self.ra_header = ra.header;
                self.learnt_ra_header_from_host = true;
                debug!("Learnt RA header from host");
            }
            _ => {
                self.ra_header = RaHeader::default();
                self.learnt_ra_header_from_host = false;
            }
        }

        self.reset_discovered_prefix_stale_timer(now);

        if self.ra_header != old_header {
            // Re-advertise soon with the new header.
            self.start_routing_policy_evaluation_jitter(now);
        }
    }

    fn update_discovered_on_net_data_change(&mut self) {
        // OMR prefixes present in the network data are reachable through
        // the mesh itself; drop them from the discovered table. While at
        // it, note whether any of them asks for a default route.
        let mut allow_default_route = false;

        for config in self.net_data.on_mesh_prefixes() {
            if !prefix::is_valid_omr_config(&config) {
                continue;
            }
            if config.default_route {
                allow_default_route = true;
            }
            self.discovered.remove_route_prefix(
                &config.prefix,
                crate::discovered::NetDataMode::UnpublishFromNetData,
                &mut self.net_data,
            );
        }

        self.discovered
            .set_allow_default_route(allow_default_route, &mut self.net_data);
    }

    fn handle_discovered_prefix_table_changed(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        self.reset_discovered_prefix_stale_timer(now);
        self.start_routing_policy_evaluation_jitter(now);
    }

    fn flush_deferred(&mut self, now: Instant) {
        if self.discovered.take_changed() {
            self.handle_discovered_prefix_table_changed(now);
        }
    }

    // Router solicitation

    fn is_router_solicitation_in_progress(&self) -> bool {
        self.rs_timer.is_running() && self.rs_count < self.config.max_rtr_solicitations
    }

    fn start_router_solicitation_delay(&mut self, now: Instant) {
        if self.is_router_solicitation_in_progress() {
            return;
        }

        self.rs_count = 0;
        self.rs_start_time = Some(now);
        let delay = self.random_delay(self.config.max_rtr_solicitation_delay);
        debug!(delay_ms = delay.total_millis(), "Starting router solicitation");
        self.rs_timer.fire_at(now + delay);
    }

    fn handle_router_solicit_timer(&mut self, now: Instant) {
        if self.rs_count < self.config.max_rtr_solicitations {
            let next_delay = match self.send_router_solicitation() {
                Ok(()) => {
                    self.rs_count += 1;
                    self.config.rtr_solicitation_interval
                }
                Err(error) => {
                    warn!(%error, "Failed to send Router Solicitation");
                    self.config.rtr_solicitation_retry_delay
                }
            };
            self.rs_timer.fire_at(now + next_delay);
        } else {
            // The burst is over: age out whatever was not refreshed, then
            // re-evaluate and advertise.
            let threshold = self.rs_start_time.unwrap_or(now);
            self.discovered
                .remove_or_deprecate_old_entries(now, threshold, &mut self.net_data);

            if self.learnt_ra_header_from_host
                && self
                    .ra_header_last_update
                    .map_or(true, |last| last <= threshold)
            {
                self.update_router_advert_header(now, None);
            }

            self.rs_count = 0;
            self.start_routing_policy_evaluation_delay(now, Duration::ZERO);
        }
    }

    fn send_router_solicitation(&mut self) -> Result<()> {
        let packet = ndp::build_router_solicit();
        self.infra_if.send(&packet, ALL_ROUTERS_MULTICAST)?;
        debug!("Sent Router Solicitation");
        Ok(())
    }

    // Stale prefix probing

    fn reset_discovered_prefix_stale_timer(&mut self, now: Instant) {
        let mut next_stale = self.discovered.calculate_next_stale_time(now);

        if self.learnt_ra_header_from_host {
            if let Some(last_update) = self.ra_header_last_update {
                let header_stale = (last_update
                    + Duration::from_secs(u64::from(self.config.rtr_adv_stale_time)))
                .max(now);
                next_stale = Some(match next_stale {
                    Some(stale) => stale.min(header_stale),
                    None => header_stale,
                });
            }
        }

        match next_stale {
            Some(deadline) => self.stale_timer.fire_at(deadline),
            None => self.stale_timer.stop(),
        }
    }

    fn handle_stale_timer(&mut self, now: Instant) {
        info!("Stale prefixes or RA header detected, probing with router solicitation");
        self.start_router_solicitation_delay(now);
    }

    // Routing policy evaluation

    fn start_routing_policy_evaluation_jitter(&mut self, now: Instant) {
        let jitter = self.random_delay(self.config.routing_policy_evaluation_jitter);
        self.start_routing_policy_evaluation_delay(now, jitter);
    }

    fn start_routing_policy_evaluation_delay(&mut self, now: Instant, delay: Duration) {
        let mut evaluate_time = now + delay;

        // Keep the minimum spacing between consecutive advertisements.
        if let Some(last_send) = self.last_ra_send_time {
            evaluate_time = evaluate_time.max(last_send + self.config.min_delay_between_rtr_advs);
        }

        self.routing_policy_timer.fire_at_if_earlier(evaluate_time);
    }

    fn evaluate_routing_policy(&mut self, now: Instant) {
        debug!("Evaluating routing policy");

        self.evaluate_on_link_prefix(now);
        let new_omr_prefixes = self.evaluate_omr_prefix();
        self.evaluate_nat64_prefix();
        self.discovered.publish_favored_entries(&mut self.net_data);

        self.send_router_advertisement(now, new_omr_prefixes);

        if self.advertised_omr_prefixes.is_empty() {
            warn!("No OMR prefix advertised, will re-evaluate");
        }

        // Schedule the next unsolicited advertisement.
        let mut delay_secs = self.rng.gen_range(
            self.config.min_rtr_adv_interval.secs()..=self.config.max_rtr_adv_interval.secs(),
        );
        if self.ra_count < self.config.max_init_rtr_advertisements
            && delay_secs > self.config.max_init_rtr_adv_interval.secs()
        {
            delay_secs = self.config.max_init_rtr_adv_interval.secs();
        }
        debug!(delay_secs, "Next router advertisement scheduled");
        self.start_routing_policy_evaluation_delay(now, Duration::from_secs(delay_secs));
    }

    fn evaluate_on_link_prefix(&mut self, now: Instant) {
        // Do not decide while the solicitation burst is still collecting
        // answers.
        if self.is_router_solicitation_in_progress() {
            return;
        }

        self.favored_discovered_on_link = self.discovered.find_favored_on_link_prefix(now);

        match self.favored_discovered_on_link {
            None => {
                if !self.advertising_local_on_link {
                    if let Some(on_link) = self.local_on_link_prefix {
                        info!(prefix = %on_link, "Start advertising local on-link prefix");
                    }
                    self.advertising_local_on_link = true;
                    self.on_link_deprecate_timer.stop();
                }
            }
            Some(favored) => {
                if self.advertising_local_on_link {
                    info!(
                        favored = %favored,
                        "Peer on-link prefix favored, deprecating local on-link prefix"
                    );
                    self.advertising_local_on_link = false;
                    self.deprecate_on_link_prefix();
                }
            }
        }
    }

    fn deprecate_on_link_prefix(&mut self) {
        // Keep announcing the prefix with a zero preferred lifetime until
        // the already-distributed valid lifetime runs out.
        let Some(advertised_at) = self.time_advertised_on_link else {
            return;
        };
        let lifetime =
            Duration::from_secs(u64::from(self.config.default_on_link_prefix_lifetime));
        self.on_link_deprecate_timer.fire_at(advertised_at + lifetime);
    }

    fn handle_on_link_deprecate_timer(&mut self, now: Instant) {
        if let Some(on_link) = self.local_on_link_prefix {
            info!(prefix = %on_link, "Local on-link prefix expired");
        }
        self.on_link_withdraw_pending = true;
        self.start_routing_policy_evaluation_delay(now, Duration::ZERO);
    }

    fn evaluate_omr_prefix(&mut self) -> Vec<OmrPrefix> {
        let mut new_omr_prefixes: Vec<OmrPrefix> = Vec::new();

        for config in self.net_data.on_mesh_prefixes() {
            if !prefix::is_valid_omr_config(&config) {
                continue;
            }
            if new_omr_prefixes
                .iter()
                .any(|omr| omr.prefix == config.prefix)
            {
                continue;
            }
            new_omr_prefixes.push(OmrPrefix {
                prefix: config.prefix,
                preference: config.preference,
            });
        }

        // Highest preference first, byte order breaking ties. The favored
        // prefix leads, the cap drops the least favored candidates, and
        // RIOs go on the wire in this order.
        new_omr_prefixes.sort_by(|a, b| {
            b.preference
                .cmp(&a.preference)
                .then_with(|| prefix::prefix_cmp(&a.prefix, &b.prefix))
        });
        while new_omr_prefixes.len() > self.config.max_omr_prefixes {
            if let Some(dropped) = new_omr_prefixes.pop() {
                warn!(prefix = %dropped.prefix, "Too many OMR prefixes, ignoring");
            }
        }
        let favored = new_omr_prefixes.first().copied();

        if new_omr_prefixes.is_empty() {
            info!("No valid OMR prefix found in network data");
            if let Ok(local) = self.publish_local_omr_prefix() {
                new_omr_prefixes.push(local);
            }
        } else if let (Some(favored), Some(local)) = (favored, self.local_omr_prefix) {
            let local_omr = OmrPrefix {
                prefix: local,
                preference: RoutePreference::Low,
            };
            if self.omr_published && favored.prefix != local && favored.is_favored_over(&local_omr)
            {
                info!(favored = %favored.prefix, "A favored OMR prefix exists, withdrawing local one");
                self.unpublish_local_omr_prefix();
            }
        }

        new_omr_prefixes
    }

    fn publish_local_omr_prefix(&mut self) -> Result<OmrPrefix> {
        let local = self.local_omr_prefix.ok_or(Error::InvalidState)?;
        let config = OnMeshPrefixConfig {
            prefix: local,
            preference: RoutePreference::Low,
            slaac: true,
            on_mesh: true,
            default_route: false,
            stable: true,
            preferred: true,
        };

        match self.net_data.publish_on_mesh_prefix(&config) {
            Ok(()) => {
                self.omr_published = true;
                info!(prefix = %local, "Published local OMR prefix");
                Ok(OmrPrefix {
                    prefix: local,
                    preference: RoutePreference::Low,
                })
            }
            Err(error) => {
                warn!(prefix = %local, %error, "Failed to publish local OMR prefix");
                Err(Error::NetDataPublish)
            }
        }
    }

    fn unpublish_local_omr_prefix(&mut self) {
        if !self.omr_published {
            return;
        }
        if let Some(local) = self.local_omr_prefix {
            self.net_data.unpublish_on_mesh_prefix(&local);
            info!(prefix = %local, "Unpublished local OMR prefix");
        }
        self.omr_published = false;
    }

    fn evaluate_nat64_prefix(&mut self) {
        let Some(local_nat64) = self.local_nat64_prefix else {
            return;
        };

        // Find the favored (smallest) NAT64 prefix in the network data.
        let favored = self
            .net_data
            .external_routes()
            .into_iter()
            .filter(|route| route.nat64 && prefix::is_valid_nat64_prefix(&route.prefix))
            .map(|route| route.prefix)
            .min_by(|a, b| prefix::prefix_cmp(a, b));

        match favored {
            Some(favored) if favored != local_nat64 => {
                if self.advertising_local_nat64 {
                    info!(favored = %favored, "A favored NAT64 prefix exists, withdrawing local one");
                    self.net_data.unpublish_external_route(&local_nat64);
                    self.advertising_local_nat64 = false;
                }
            }
            _ => {
                if !self.advertising_local_nat64 {
                    let config = ExternalRouteConfig {
                        prefix: local_nat64,
                        preference: RoutePreference::Low,
                        nat64: true,
                        stable: true,
                    };
                    match self.net_data.publish_external_route(&config) {
                        Ok(()) => {
                            info!(prefix = %local_nat64, "Published local NAT64 prefix");
                            self.advertising_local_nat64 = true;
                        }
                        Err(error) => {
                            warn!(prefix = %local_nat64, %error, "Failed to publish local NAT64 prefix");
                        }
                    }
                }
            }
        }
    }

    fn send_router_advertisement(&mut self, now: Instant, new_omr_prefixes: Vec<OmrPrefix>) {
        let mut builder = RaMessageBuilder::new(&self.ra_header);

        if self.advertising_local_on_link
            || self.on_link_deprecate_timer.is_running()
            || self.on_link_withdraw_pending
        {
            if let Some(on_link) = self.local_on_link_prefix {
                let lifetime = self.config.default_on_link_prefix_lifetime;
                let (valid, preferred) = if self.advertising_local_on_link {
                    (lifetime, lifetime)
                } else if let Some(deadline) = self.on_link_deprecate_timer.deadline() {
                    (remaining_secs(deadline, now), 0)
                } else {
                    (0, 0)
                };

                if builder.push_prefix_info(&on_link, valid, preferred).is_err() {
                    debug!("RA buffer full, dropping PIO");
                } else if self.advertising_local_on_link {
                    self.time_advertised_on_link = Some(now);
                }
                self.on_link_withdraw_pending = false;
            }
        }

        // Withdraw the OMR prefixes no longer advertised.
        for old in &self.advertised_omr_prefixes {
            if !new_omr_prefixes.iter().any(|omr| omr.prefix == old.prefix)
                && builder
                    .push_route_info(&old.prefix, 0, old.preference)
                    .is_err()
            {
                debug!("RA buffer full, dropping withdrawal RIO");
            }
        }

        for omr in &new_omr_prefixes {
            if builder
                .push_route_info(
                    &omr.prefix,
                    self.config.default_omr_prefix_lifetime,
                    omr.preference,
                )
                .is_err()
            {
                debug!("RA buffer full, dropping RIO");
            }
        }

        if builder.has_options() {
            self.ra_count += 1;
            let packet = builder.finish();
            match self.infra_if.send(&packet, ALL_NODES_MULTICAST) {
                Ok(()) => {
                    self.last_ra_send_time = Some(now);
                    info!(
                        len = packet.len(),
                        omr_prefixes = new_omr_prefixes.len(),
                        "Sent Router Advertisement"
                    );
                }
                Err(error) => {
                    // The next scheduled advertisement carries current state.
                    warn!(%error, "Failed to send Router Advertisement");
                }
            }
        }

        self.advertised_omr_prefixes = new_omr_prefixes;
    }

    fn random_delay(&mut self, max: Duration) -> Duration {
        Duration::from_millis(self.rng.gen_range(0..=max.total_millis()))
    }
}

/// Whole seconds from `now` until `deadline`, clamped to zero.
fn remaining_secs(deadline: Instant, now: Instant) -> u32 {
    if deadline > now {
        (deadline - now).secs() as u32
    } else {
        0
    }
}
