//! Geo/ASN enrichment with per-address memoization.
//!
//! Capture traffic is bursty and address-repetitive; without caching the
//! per-record database lookups dominate CPU and the pipeline stalls. The
//! cache is unbounded for the lifetime of one batch, which is fine because
//! batches are bounded to one capture file.

use ahash::{AHashMap, AHashSet};
use std::net::IpAddr;

/// Capability interface for resolving country/ASN metadata for an address.
///
/// Implemented by [`crate::MaxmindLookup`] in production and by counting
/// mocks in tests.
pub trait GeoAsnLookup {
    /// ISO country code for the address, if known.
    fn country(&self, addr: IpAddr) -> Option<String>;

    /// ASN identifier for the address, if known.
    fn asn(&self, addr: IpAddr) -> Option<String>;
}

/// Running cache sizes and distinct-country count, reported at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub geo_entries: usize,
    pub asn_entries: usize,
    pub distinct_countries: usize,
}

/// Memoizes an external geo/ASN lookup capability.
///
/// Negative results are cached too: repeated lookups of an address the
/// databases do not know must not hit the capability again.
pub struct EnrichmentCache<L> {
    lookup: L,
    countries: AHashMap<IpAddr, Option<String>>,
    asns: AHashMap<IpAddr, Option<String>>,
    distinct_countries: AHashSet<String>,
}

impl<L: GeoAsnLookup> EnrichmentCache<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            countries: AHashMap::new(),
            asns: AHashMap::new(),
            distinct_countries: AHashSet::new(),
        }
    }

    /// Country code for the address; the capability is consulted at most
    /// once per distinct address.
    pub fn country(&mut self, addr: IpAddr) -> Option<String> {
        if let Some(cached) = self.countries.get(&addr) {
            return cached.clone();
        }
        let result = self.lookup.country(addr);
        if let Some(ref country) = result {
            self.distinct_countries.insert(country.clone());
        }
        self.countries.insert(addr, result.clone());
        result
    }

    /// ASN identifier for the address; independently cached.
    pub fn asn(&mut self, addr: IpAddr) -> Option<String> {
        if let Some(cached) = self.asns.get(&addr) {
            return cached.clone();
        }
        let result = self.lookup.asn(addr);
        self.asns.insert(addr, result.clone());
        result
    }

    /// Snapshot of the running counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            geo_entries: self.countries.len(),
            asn_entries: self.asns.len(),
            distinct_countries: self.distinct_countries.len(),
        }
    }
}
