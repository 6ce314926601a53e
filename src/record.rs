//! Correlated packet input and assembled output records.

use chrono::{DateTime, Utc};
use std::net::IpAddr;

use crate::classifier::ResolverDirectory;
use crate::enrich::{EnrichmentCache, GeoAsnLookup};

/// Transport protocol the correlated pair was carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Udp,
    Tcp,
}

impl TransportProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportProtocol::Udp => "udp",
            TransportProtocol::Tcp => "tcp",
        }
    }
}

/// Decoded DNS message fields relevant to the output record.
#[derive(Debug, Clone)]
pub struct DnsSummary {
    pub id: u16,
    pub qname: String,
    pub qtype: u16,
    pub rcode: u16,
    pub answer_count: u16,
}

/// A correlated DNS query and its (optional) response, produced by the
/// external capture/decoding stage. Consumed by value; never retained
/// beyond record assembly.
#[derive(Debug, Clone)]
pub struct PacketCombination {
    pub timestamp: DateTime<Utc>,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: TransportProtocol,
    pub query: DnsSummary,
    pub response: Option<DnsSummary>,
}

/// One finalized output record: all correlated-pair fields plus the
/// classifier match and geo/ASN annotations, text fields sanitized.
#[derive(Debug, Clone)]
pub struct AssembledRecord {
    pub timestamp: DateTime<Utc>,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: TransportProtocol,
    pub dns_id: u16,
    pub qname: String,
    pub qtype: u16,
    pub rcode: Option<u16>,
    pub answer_count: Option<u16>,
    pub resolver: Option<String>,
    pub country: Option<String>,
    pub asn: Option<String>,
}

/// Combine a correlated pair with classification and cached enrichment.
///
/// Classification and enrichment are both keyed on the packet's source
/// address.
pub fn assemble<L: GeoAsnLookup>(
    packet: PacketCombination,
    directory: &ResolverDirectory,
    cache: &mut EnrichmentCache<L>,
) -> AssembledRecord {
    let resolver = directory.classify(packet.src).map(String::from);
    let country = cache.country(packet.src);
    let asn = cache.asn(packet.src);

    AssembledRecord {
        timestamp: packet.timestamp,
        src: packet.src,
        dst: packet.dst,
        src_port: packet.src_port,
        dst_port: packet.dst_port,
        protocol: packet.protocol,
        dns_id: packet.query.id,
        qname: sanitize(&packet.query.qname),
        qtype: packet.query.qtype,
        rcode: packet.response.as_ref().map(|r| r.rcode),
        answer_count: packet.response.as_ref().map(|r| r.answer_count),
        resolver,
        country,
        asn,
    }
}

/// Replace every byte outside printable ASCII [0x20, 0x7E] with its
/// `0x`-prefixed two-digit hex form.
///
/// Question names can carry arbitrary binary bytes; the output must never
/// contain control characters that would corrupt downstream text tooling.
/// Total (never fails) and idempotent, since the output is all printable
/// ASCII.
pub fn sanitize(text: &str) -> String {
    let mut filtered = String::with_capacity(text.len());
    for byte in text.bytes() {
        if (0x20..=0x7e).contains(&byte) {
            filtered.push(byte as char);
        } else {
            filtered.push_str(&format!("0x{:02x}", byte));
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{NetworkClassifier, SubnetSource};
    use std::fs;

    struct StaticLookup;

    impl GeoAsnLookup for StaticLookup {
        fn country(&self, addr: IpAddr) -> Option<String> {
            match addr {
                IpAddr::V4(v4) if v4.octets()[0] == 8 => Some("US".to_string()),
                _ => None,
            }
        }

        fn asn(&self, addr: IpAddr) -> Option<String> {
            match addr {
                IpAddr::V4(v4) if v4.octets()[0] == 8 => Some("AS15169 Google".to_string()),
                _ => None,
            }
        }
    }

    fn test_directory(dir: &std::path::Path) -> ResolverDirectory {
        let path = dir.join("google.txt");
        fs::write(&path, "8.8.8.0/24\n8.8.4.0/24\n").unwrap();
        let mut directory = ResolverDirectory::new(vec![NetworkClassifier::new(
            "google-public-dns",
            "google-resolvers",
            SubnetSource::File(path),
        )]);
        directory.init_all(None);
        directory
    }

    fn test_packet(src: &str, qname: &str) -> PacketCombination {
        PacketCombination {
            timestamp: "2016-04-01T12:30:45Z".parse().unwrap(),
            src: src.parse().unwrap(),
            dst: "192.0.2.53".parse().unwrap(),
            src_port: 53000,
            dst_port: 53,
            protocol: TransportProtocol::Udp,
            query: DnsSummary {
                id: 0x1234,
                qname: qname.to_string(),
                qtype: 1,
                rcode: 0,
                answer_count: 0,
            },
            response: Some(DnsSummary {
                id: 0x1234,
                qname: qname.to_string(),
                qtype: 1,
                rcode: 0,
                answer_count: 2,
            }),
        }
    }

    #[test]
    fn test_assemble_classified_and_enriched() {
        let dir = tempfile::tempdir().unwrap();
        let directory = test_directory(dir.path());
        let mut cache = EnrichmentCache::new(StaticLookup);

        let record = assemble(test_packet("8.8.8.8", "example.com."), &directory, &mut cache);

        assert_eq!(record.resolver.as_deref(), Some("google-public-dns"));
        assert_eq!(record.country.as_deref(), Some("US"));
        assert_eq!(record.asn.as_deref(), Some("AS15169 Google"));
        assert_eq!(record.rcode, Some(0));
        assert_eq!(record.answer_count, Some(2));
        assert_eq!(record.qname, "example.com.");
    }

    #[test]
    fn test_assemble_unclassified() {
        let dir = tempfile::tempdir().unwrap();
        let directory = test_directory(dir.path());
        let mut cache = EnrichmentCache::new(StaticLookup);

        let record = assemble(test_packet("192.0.2.7", "example.com."), &directory, &mut cache);

        assert_eq!(record.resolver, None);
        assert_eq!(record.country, None);
        assert_eq!(record.asn, None);
    }

    #[test]
    fn test_assemble_query_only() {
        let dir = tempfile::tempdir().unwrap();
        let directory = test_directory(dir.path());
        let mut cache = EnrichmentCache::new(StaticLookup);

        let mut packet = test_packet("8.8.4.4", "example.com.");
        packet.response = None;
        let record = assemble(packet, &directory, &mut cache);

        assert_eq!(record.rcode, None);
        assert_eq!(record.answer_count, None);
    }

    #[test]
    fn test_sanitize_passthrough() {
        assert_eq!(sanitize("www.example.com."), "www.example.com.");
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("a b~!"), "a b~!");
    }

    #[test]
    fn test_sanitize_replaces_nonprintable() {
        assert_eq!(sanitize("a\x00b"), "a0x00b");
        assert_eq!(sanitize("x\x1fy\x7f"), "x0x1fy0x7f");
        // Multi-byte UTF-8 is hex-escaped byte by byte
        assert_eq!(sanitize("é"), "0xc30xa9");
    }

    #[test]
    fn test_sanitize_idempotent() {
        for input in ["plain.example.com.", "a\x00b", "é\tz", "\x7f\u{80}"] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
        }
    }
}
