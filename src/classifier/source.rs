//! Classifier data-source strategies.
//!
//! Each classifier is populated from exactly one source: a local file, an
//! HTTPS list download, or a DNS TXT record lookup against a well-known
//! name. All fetch failures surface as `ClassifierSourceUnavailable` so the
//! owning classifier can degrade instead of aborting the pipeline.

use flate2::read::GzDecoder;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::Resolver;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Bound on remote lookups during classifier init. Open resolvers can take
/// a long time to answer.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Where a classifier's subnets come from.
#[derive(Debug, Clone)]
pub enum SubnetSource {
    /// Local file, one CIDR or bare address per line.
    File(PathBuf),
    /// HTTPS list download in the same line format, optionally gzipped.
    Url(String),
    /// DNS TXT record where each entry is `<cidr> <location>`.
    DnsTxt(String),
}

impl SubnetSource {
    /// Fetch raw candidate subnet strings from this source.
    pub fn fetch(&self) -> Result<Vec<String>> {
        match self {
            SubnetSource::File(path) => fetch_file(path),
            SubnetSource::Url(url) => fetch_url(url),
            SubnetSource::DnsTxt(name) => fetch_txt(name),
        }
    }

    /// Human-readable source description for logging.
    pub fn describe(&self) -> String {
        match self {
            SubnetSource::File(path) => format!("file {}", path.display()),
            SubnetSource::Url(url) => format!("url {}", url),
            SubnetSource::DnsTxt(name) => format!("TXT {}", name),
        }
    }
}

fn fetch_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::ClassifierSourceUnavailable(format!("{}: {}", path.display(), e))
    })?;
    Ok(candidate_lines(&content))
}

fn fetch_url(url: &str) -> Result<Vec<String>> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| Error::ClassifierSourceUnavailable(format!("{}: {}", url, e)))?;

    let mut raw = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut raw)
        .map_err(|e| Error::ClassifierSourceUnavailable(format!("{}: {}", url, e)))?;

    let body = if is_gzip(&raw) {
        let mut decoder = GzDecoder::new(&raw[..]);
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).map_err(|e| {
            Error::ClassifierSourceUnavailable(format!("{}: gzip: {}", url, e))
        })?;
        decompressed
    } else {
        raw
    };

    Ok(candidate_lines(&String::from_utf8_lossy(&body)))
}

fn fetch_txt(name: &str) -> Result<Vec<String>> {
    let fqdn = if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    };

    let mut opts = ResolverOpts::default();
    opts.timeout = LOOKUP_TIMEOUT;
    // Every init must issue a fresh query
    opts.cache_size = 0;

    let resolver = Resolver::new(ResolverConfig::default(), opts)
        .map_err(|e| Error::ClassifierSourceUnavailable(format!("resolver: {}", e)))?;

    let lookup = resolver
        .txt_lookup(&fqdn)
        .map_err(|e| Error::ClassifierSourceUnavailable(format!("TXT {}: {}", fqdn, e)))?;

    let mut candidates = Vec::new();
    for record in lookup.iter() {
        for data in record.txt_data() {
            candidates.extend(txt_candidates(&String::from_utf8_lossy(data)));
        }
    }
    Ok(candidates)
}

/// One candidate per non-empty line, surrounding whitespace stripped.
fn candidate_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// TXT record entries carry `<cidr> <location>` pairs; the first token of
/// each two-token line is the CIDR. Anything else is skipped.
pub(crate) fn txt_candidates(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.len() {
            0 => {}
            2 => candidates.push(tokens[0].to_string()),
            _ => log::warn!("skipping malformed TXT entry: {}", line.trim()),
        }
    }
    candidates
}

fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}
