//! Persistence for the randomly generated local prefixes.
//!
//! Only two blobs survive a restart: the BR-ULA /48 block and the local
//! on-link /64 prefix. Everything else in the engine is soft state rebuilt
//! from received messages.

use ipnet::Ipv6Net;

/// Storage for the persisted prefix seeds.
pub trait SeedStore {
    fn load_br_ula_prefix(&self) -> Option<Ipv6Net>;

    fn save_br_ula_prefix(&mut self, prefix: &Ipv6Net);

    fn load_on_link_prefix(&self) -> Option<Ipv6Net>;

    fn save_on_link_prefix(&mut self, prefix: &Ipv6Net);
}

/// In-memory store for tests and hosts that persist elsewhere.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    br_ula: Option<Ipv6Net>,
    on_link: Option<Ipv6Net>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the store, as a host restoring persisted state would.
    pub fn with_prefixes(br_ula: Option<Ipv6Net>, on_link: Option<Ipv6Net>) -> Self {
        Self { br_ula, on_link }
    }
}

impl SeedStore for MemStore {
    fn load_br_ula_prefix(&self) -> Option<Ipv6Net> {
        self.br_ula
    }

    fn save_br_ula_prefix(&mut self, prefix: &Ipv6Net) {
        self.br_ula = Some(*prefix);
    }

    fn load_on_link_prefix(&self) -> Option<Ipv6Net> {
        self.on_link
    }

    fn save_on_link_prefix(&mut self, prefix: &Ipv6Net) {
        self.on_link = Some(*prefix);
    }
}
