//! dnspipe - DNS capture enrichment pipeline.
//!
//! This crate takes correlated DNS query/response pairs produced by an
//! upstream capture/decoding stage, classifies each remote endpoint against
//! known resolver/operator CIDR lists, enriches records with geo/ASN
//! metadata, and writes the result as partitioned Parquet for analytical
//! querying.
//!
//! # Features
//!
//! - **Subnet matching**: IPv4 and IPv6 CIDR membership tests
//! - **Classifier sources**: local files, HTTPS list downloads, and DNS TXT
//!   lookups, each with graceful degradation and an on-disk fallback cache
//! - **Enrichment caching**: at most one geo/ASN database hit per distinct
//!   address per batch, negative results included
//! - **Partitioned output**: Hive-style `year=/month=/day=` Parquet
//!   partitions with Snappy compression
//!
//! # Quick Start
//!
//! ```ignore
//! use dnspipe::{
//!     MaxmindLookup, NetworkClassifier, Pipeline, ResolverDirectory, SubnetSource,
//! };
//! use std::path::Path;
//!
//! // Configure classifiers in evaluation order; first match wins.
//! let mut directory = ResolverDirectory::new(vec![
//!     NetworkClassifier::new(
//!         "google-public-dns",
//!         "google-resolvers",
//!         SubnetSource::DnsTxt("locations.publicdns.goog".into()),
//!     ),
//!     NetworkClassifier::new(
//!         "opendns",
//!         "opendns-resolvers",
//!         SubnetSource::File("conf/opendns-ranges.txt".into()),
//!     ),
//! ]);
//! directory.init_all(Some(Path::new("/var/cache/dnspipe")));
//!
//! let lookup = MaxmindLookup::open(
//!     Path::new("GeoLite2-Country.mmdb"),
//!     Path::new("GeoLite2-ASN.mmdb"),
//! )?;
//!
//! // One pipeline per input batch; the directory is shared read-only.
//! let pipeline = Pipeline::new(&directory, lookup, "/data/dns/ns1");
//! let summary = pipeline.run(packets)?;
//! println!("{} records written", summary.records_written);
//! ```
//!
//! # Degraded mode
//!
//! A classifier whose population yields zero subnets (bad file, lookup
//! timeout) answers no-match instead of failing; a batch with zero working
//! classifiers still completes and writes records with null classification.
//! Only dataset lifecycle failures are fatal.

mod enrich;
mod error;
mod geoip;
mod pipeline;
mod record;
mod subnet;
mod writer;

pub mod classifier;

// Re-export core types
pub use error::{Error, Result};
pub use subnet::Subnet;

// Re-export classifier types
pub use classifier::{NetworkClassifier, ResolverDirectory, SubnetSource, LOOKUP_TIMEOUT};

// Re-export enrichment types
pub use enrich::{CacheStats, EnrichmentCache, GeoAsnLookup};
pub use geoip::MaxmindLookup;

// Re-export record types
pub use record::{
    assemble, sanitize, AssembledRecord, DnsSummary, PacketCombination, TransportProtocol,
};

// Re-export writer types
pub use writer::{output_schema, PartitionKey, PartitionedWriter, DEFAULT_BATCH_ROWS};

// Re-export pipeline driver
pub use pipeline::{BatchSummary, PacketSource, Pipeline};
