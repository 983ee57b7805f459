//! Timing and capacity parameters for the routing engine.

use smoltcp::time::Duration;

/// Tunable parameters of the routing engine.
///
/// The defaults are the RFC 4861/4191 derived constants the protocol was
/// designed around. Tests shrink the timing fields to keep runs fast; the
/// capacity fields bound the discovered prefix table.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Maximum interval between unsolicited Router Advertisements.
    pub max_rtr_adv_interval: Duration,
    /// Minimum interval between unsolicited Router Advertisements.
    pub min_rtr_adv_interval: Duration,
    /// Maximum interval between the initial burst of Router Advertisements.
    pub max_init_rtr_adv_interval: Duration,
    /// Number of Router Advertisements sent at the shorter initial interval.
    pub max_init_rtr_advertisements: u32,
    /// Valid lifetime advertised for OMR prefixes, in seconds.
    pub default_omr_prefix_lifetime: u32,
    /// Valid/preferred lifetime advertised for the local on-link prefix, in seconds.
    pub default_on_link_prefix_lifetime: u32,
    /// Seconds after which an unrefreshed prefix or RA header is considered stale.
    pub rtr_adv_stale_time: u32,
    /// Number of Router Solicitations per burst.
    pub max_rtr_solicitations: u32,
    /// Interval between Router Solicitations within a burst.
    pub rtr_solicitation_interval: Duration,
    /// Maximum random delay before the first Router Solicitation.
    pub max_rtr_solicitation_delay: Duration,
    /// Delay before retrying a failed Router Solicitation transmission.
    pub rtr_solicitation_retry_delay: Duration,
    /// Maximum random delay before answering a Router Solicitation.
    pub ra_reply_jitter: Duration,
    /// Minimum spacing between two consecutive Router Advertisements.
    pub min_delay_between_rtr_advs: Duration,
    /// Maximum random delay before an event-triggered policy evaluation.
    pub routing_policy_evaluation_jitter: Duration,
    /// Maximum number of peer routers tracked in the discovered prefix table.
    pub max_discovered_routers: usize,
    /// Maximum number of prefix entries across all tracked routers.
    pub max_discovered_prefixes: usize,
    /// Maximum number of OMR prefixes advertised in a single RA.
    pub max_omr_prefixes: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_rtr_adv_interval: Duration::from_secs(600),
            min_rtr_adv_interval: Duration::from_secs(200),
            max_init_rtr_adv_interval: Duration::from_secs(16),
            max_init_rtr_advertisements: 3,
            default_omr_prefix_lifetime: 1800,
            default_on_link_prefix_lifetime: 1800,
            rtr_adv_stale_time: 1800,
            max_rtr_solicitations: 3,
            rtr_solicitation_interval: Duration::from_secs(4),
            max_rtr_solicitation_delay: Duration::from_secs(1),
            rtr_solicitation_retry_delay: Duration::from_secs(4),
            ra_reply_jitter: Duration::from_millis(500),
            min_delay_between_rtr_advs: Duration::from_millis(3000),
            routing_policy_evaluation_jitter: Duration::from_millis(1000),
            max_discovered_routers: 16,
            max_discovered_prefixes: 64,
            max_omr_prefixes: 8,
        }
    }
}
