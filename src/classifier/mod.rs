//! Named resolver-network classifiers.
//!
//! A classifier owns one named, ordered set of subnets and the logic to
//! populate it from exactly one data source. Population happens once at
//! process start; afterwards the classifier is read-only. A classifier
//! whose population yields zero subnets is *degraded*: it stays queryable
//! and always answers no-match, and the rest of the pipeline continues.

mod directory;
mod source;

pub use directory::ResolverDirectory;
pub use source::{SubnetSource, LOOKUP_TIMEOUT};

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::subnet::Subnet;

/// A named rule set matching addresses to a known network/operator.
pub struct NetworkClassifier {
    name: String,
    source_id: String,
    source: SubnetSource,
    subnets: Vec<Subnet>,
}

impl NetworkClassifier {
    /// Create an unpopulated classifier.
    ///
    /// `name` is the display/classification label; `source_id` identifies
    /// the on-disk subnet cache file and is deliberately decoupled from the
    /// display name.
    pub fn new(name: &str, source_id: &str, source: SubnetSource) -> Self {
        Self {
            name: name.to_string(),
            source_id: source_id.to_string(),
            source,
            subnets: Vec::new(),
        }
    }

    /// Populate the subnet set from the configured source.
    ///
    /// Per-line parse failures are logged and skipped. A source-level
    /// failure falls back to the cached list under `cache_dir` (if any);
    /// when that also fails the classifier ends up degraded. Nothing here
    /// propagates to the caller.
    pub fn init(&mut self, cache_dir: Option<&Path>) {
        match self.source.fetch() {
            Ok(candidates) => {
                self.subnets = parse_candidates(&self.name, &candidates);
                if self.subnets.is_empty() {
                    log::error!(
                        "classifier {}: no usable subnets from {}",
                        self.name,
                        self.source.describe()
                    );
                } else if let Some(dir) = cache_dir {
                    if let Err(e) = self.persist_cache(dir) {
                        log::warn!(
                            "classifier {}: could not persist subnet cache: {}",
                            self.name,
                            e
                        );
                    }
                }
            }
            Err(e) => {
                log::error!("classifier {}: {}", self.name, e);
                if let Some(dir) = cache_dir {
                    match self.load_cache(dir) {
                        Ok(candidates) => {
                            self.subnets = parse_candidates(&self.name, &candidates);
                            log::info!(
                                "classifier {}: loaded {} subnets from cache",
                                self.name,
                                self.subnets.len()
                            );
                        }
                        Err(cache_err) => {
                            log::warn!(
                                "classifier {}: no cached subnets: {}",
                                self.name,
                                cache_err
                            );
                        }
                    }
                }
            }
        }

        if self.is_degraded() {
            log::error!(
                "classifier {} is degraded; all queries will return no match",
                self.name
            );
        }
    }

    /// True iff any owned subnet contains the address.
    ///
    /// O(number of subnets); population happens once, so queries are the
    /// hot path and the subnet counts stay small.
    pub fn matches(&self, addr: IpAddr) -> bool {
        self.subnets.iter().any(|subnet| subnet.contains(addr))
    }

    /// Classification label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache-file identifier.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Owned subnets in discovery order.
    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    /// Number of owned subnets.
    pub fn subnet_count(&self) -> usize {
        self.subnets.len()
    }

    /// A degraded classifier has zero usable subnets and always answers
    /// no-match.
    pub fn is_degraded(&self) -> bool {
        self.subnets.is_empty()
    }

    fn cache_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.source_id)
    }

    /// Persist the current subnet list one-per-line, atomically.
    fn persist_cache(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let tmp = dir.join(format!("{}.tmp", self.source_id));
        let mut body = self
            .subnets
            .iter()
            .map(Subnet::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        body.push('\n');
        fs::write(&tmp, body)?;
        fs::rename(&tmp, self.cache_path(dir))?;
        Ok(())
    }

    fn load_cache(&self, dir: &Path) -> Result<Vec<String>> {
        let content = fs::read_to_string(self.cache_path(dir))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Parse candidates into subnets, skipping and logging bad lines.
fn parse_candidates(name: &str, candidates: &[String]) -> Vec<Subnet> {
    let mut subnets = Vec::new();
    for candidate in candidates {
        match Subnet::parse(candidate) {
            Ok(subnet) => {
                log::info!("classifier {}: add range {}", name, subnet);
                subnets.push(subnet);
            }
            Err(e) => log::warn!("classifier {}: skipping line: {}", name, e),
        }
    }
    subnets
}
