//! Maxmind-backed implementation of the geo/ASN lookup capability.

use std::net::IpAddr;
use std::path::Path;

use crate::enrich::GeoAsnLookup;
use crate::error::{Error, Result};

#[derive(serde::Deserialize)]
struct CountryRecord {
    country: Option<CountryInfo>,
}

#[derive(serde::Deserialize)]
struct CountryInfo {
    iso_code: Option<String>,
}

#[derive(serde::Deserialize)]
struct AsnRecord {
    autonomous_system_number: Option<u32>,
    autonomous_system_organization: Option<String>,
}

/// Geo/ASN resolution backed by a pair of maxmind databases
/// (GeoLite2-Country and GeoLite2-ASN or equivalents).
#[derive(Debug)]
pub struct MaxmindLookup {
    country_reader: maxminddb::Reader<Vec<u8>>,
    asn_reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxmindLookup {
    /// Open both databases. Either failing is an error: enrichment without
    /// its databases is a misconfiguration, not a degraded mode.
    pub fn open(country_db: &Path, asn_db: &Path) -> Result<Self> {
        let country_reader = maxminddb::Reader::open_readfile(country_db)
            .map_err(|e| Error::GeoIp(format!("{}: {}", country_db.display(), e)))?;
        let asn_reader = maxminddb::Reader::open_readfile(asn_db)
            .map_err(|e| Error::GeoIp(format!("{}: {}", asn_db.display(), e)))?;
        Ok(Self {
            country_reader,
            asn_reader,
        })
    }

    /// Open from in-memory database images.
    pub fn from_bytes(country_db: Vec<u8>, asn_db: Vec<u8>) -> Result<Self> {
        let country_reader = maxminddb::Reader::from_source(country_db)
            .map_err(|e| Error::GeoIp(e.to_string()))?;
        let asn_reader =
            maxminddb::Reader::from_source(asn_db).map_err(|e| Error::GeoIp(e.to_string()))?;
        Ok(Self {
            country_reader,
            asn_reader,
        })
    }
}

impl GeoAsnLookup for MaxmindLookup {
    fn country(&self, addr: IpAddr) -> Option<String> {
        let record: CountryRecord = self.country_reader.lookup(addr).ok()?;
        record.country?.iso_code
    }

    fn asn(&self, addr: IpAddr) -> Option<String> {
        let record: AsnRecord = self.asn_reader.lookup(addr).ok()?;
        let number = record.autonomous_system_number?;
        Some(match record.autonomous_system_organization {
            Some(org) => format!("AS{} {}", number, org),
            None => format!("AS{}", number),
        })
    }
}
