//! Batch pipeline driver.
//!
//! Ties a read-only [`ResolverDirectory`], one [`EnrichmentCache`], and one
//! [`PartitionedWriter`] to a packet source and runs a single capture batch
//! to completion. The directory may be shared across concurrent batches;
//! cache and writer belong to exactly one batch.

use std::path::PathBuf;

use crate::classifier::ResolverDirectory;
use crate::enrich::{EnrichmentCache, GeoAsnLookup};
use crate::error::Result;
use crate::record::{assemble, PacketCombination};
use crate::writer::PartitionedWriter;

/// Capability interface yielding correlated query/response pairs.
///
/// Finite per batch and not restartable once consumed. Any iterator over
/// [`PacketCombination`] qualifies.
pub trait PacketSource {
    fn next_packet(&mut self) -> Option<PacketCombination>;
}

impl<I: Iterator<Item = PacketCombination>> PacketSource for I {
    fn next_packet(&mut self) -> Option<PacketCombination> {
        self.next()
    }
}

/// Final counters for one completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub records_written: u64,
    pub partitions: usize,
    pub distinct_countries: usize,
    pub geo_cache_entries: usize,
    pub asn_cache_entries: usize,
}

/// One pipeline instance per input batch.
pub struct Pipeline<'a, L> {
    directory: &'a ResolverDirectory,
    cache: EnrichmentCache<L>,
    writer: PartitionedWriter,
}

impl<'a, L: GeoAsnLookup> Pipeline<'a, L> {
    pub fn new(
        directory: &'a ResolverDirectory,
        lookup: L,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            directory,
            cache: EnrichmentCache::new(lookup),
            writer: PartitionedWriter::new(output),
        }
    }

    /// Run the batch to completion.
    ///
    /// Dataset lifecycle failures (open, creation, write) are fatal and
    /// propagate; once writing starts there is no partial-batch resumption.
    pub fn run<S: PacketSource>(mut self, mut source: S) -> Result<BatchSummary> {
        self.writer.open()?;

        while let Some(packet) = source.next_packet() {
            let record = assemble(packet, self.directory, &mut self.cache);
            self.writer.write(&record)?;
        }

        let stats = self.cache.stats();
        self.writer.close(&stats)?;

        Ok(BatchSummary {
            records_written: self.writer.records_written(),
            partitions: self.writer.partitions_opened(),
            distinct_countries: stats.distinct_countries,
            geo_cache_entries: stats.geo_entries,
            asn_cache_entries: stats.asn_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{NetworkClassifier, SubnetSource};
    use crate::record::{DnsSummary, TransportProtocol};
    use std::fs;
    use std::net::IpAddr;

    struct NullLookup;

    impl GeoAsnLookup for NullLookup {
        fn country(&self, _addr: IpAddr) -> Option<String> {
            None
        }

        fn asn(&self, _addr: IpAddr) -> Option<String> {
            None
        }
    }

    fn packet(src: &str) -> PacketCombination {
        PacketCombination {
            timestamp: "2016-04-01T12:00:00Z".parse().unwrap(),
            src: src.parse().unwrap(),
            dst: "192.0.2.53".parse().unwrap(),
            src_port: 50000,
            dst_port: 53,
            protocol: TransportProtocol::Udp,
            query: DnsSummary {
                id: 1,
                qname: "example.com.".to_string(),
                qtype: 1,
                rcode: 0,
                answer_count: 0,
            },
            response: None,
        }
    }

    #[test]
    fn test_run_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let directory = ResolverDirectory::new(Vec::new());

        let pipeline = Pipeline::new(&directory, NullLookup, dir.path().join("out"));
        let summary = pipeline.run(std::iter::empty::<PacketCombination>());

        let summary = summary.unwrap();
        assert_eq!(summary.records_written, 0);
        assert_eq!(summary.partitions, 0);
    }

    #[test]
    fn test_run_with_degraded_directory_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let broken = NetworkClassifier::new(
            "broken",
            "broken-cache",
            SubnetSource::File(dir.path().join("missing.txt")),
        );
        let mut directory = ResolverDirectory::new(vec![broken]);
        directory.init_all(None);

        let pipeline = Pipeline::new(&directory, NullLookup, dir.path().join("out"));
        let summary = pipeline
            .run(vec![packet("8.8.8.8"), packet("1.1.1.1")].into_iter())
            .unwrap();

        assert_eq!(summary.records_written, 2);
        assert_eq!(summary.distinct_countries, 0);
    }

    #[test]
    fn test_run_fails_on_stale_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join(".metadata"), "stale").unwrap();

        let directory = ResolverDirectory::new(Vec::new());
        let pipeline = Pipeline::new(&directory, NullLookup, &out);
        assert!(pipeline.run(std::iter::empty::<PacketCombination>()).is_err());
    }
}
