//! Ordered aggregate of all configured classifiers.

use std::net::IpAddr;
use std::path::Path;

use super::NetworkClassifier;

/// Aggregates the configured classifiers and answers "which network, if
/// any, does this address belong to".
///
/// Classifiers are evaluated in the order they were configured and the
/// first match wins; an address present in several source lists always
/// classifies as the earliest configured network, not an arbitrary one.
/// Immutable after `init_all`, so it can be shared across concurrent
/// batches without locking.
pub struct ResolverDirectory {
    classifiers: Vec<NetworkClassifier>,
}

impl ResolverDirectory {
    /// Build a directory from classifiers in evaluation order.
    pub fn new(classifiers: Vec<NetworkClassifier>) -> Self {
        Self { classifiers }
    }

    /// Run `init` for every classifier.
    ///
    /// Failures are per-classifier and non-fatal; one classifier degrading
    /// never blocks the others. A batch with zero working classifiers still
    /// runs, writing records without classification.
    pub fn init_all(&mut self, cache_dir: Option<&Path>) {
        for classifier in &mut self.classifiers {
            classifier.init(cache_dir);
        }

        let working = self
            .classifiers
            .iter()
            .filter(|c| !c.is_degraded())
            .count();
        if working == 0 {
            log::warn!(
                "all {} classifiers degraded; records will carry no classification",
                self.classifiers.len()
            );
        } else {
            log::info!(
                "{}/{} classifiers initialized",
                working,
                self.classifiers.len()
            );
        }
    }

    /// Name of the first classifier (in configured order) containing the
    /// address, or `None`.
    pub fn classify(&self, addr: IpAddr) -> Option<&str> {
        self.classifiers
            .iter()
            .find(|c| c.matches(addr))
            .map(|c| c.name())
    }

    /// The configured classifiers, in evaluation order.
    pub fn classifiers(&self) -> &[NetworkClassifier] {
        &self.classifiers
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SubnetSource;
    use std::fs;

    fn classifier_with(dir: &Path, name: &str, lines: &str) -> NetworkClassifier {
        let path = dir.join(format!("{}.txt", name));
        fs::write(&path, lines).unwrap();
        NetworkClassifier::new(name, &format!("{}-cache", name), SubnetSource::File(path))
    }

    #[test]
    fn test_classify_first_match_in_configured_order() {
        let dir = tempfile::tempdir().unwrap();
        // Both classifiers claim 8.8.8.0/24; configured order decides
        let a = classifier_with(dir.path(), "alpha", "8.8.8.0/24\n");
        let b = classifier_with(dir.path(), "beta", "8.8.0.0/16\n");

        let mut directory = ResolverDirectory::new(vec![a, b]);
        directory.init_all(None);

        assert_eq!(directory.classify("8.8.8.8".parse().unwrap()), Some("alpha"));
        // Only beta covers this one
        assert_eq!(directory.classify("8.8.1.1".parse().unwrap()), Some("beta"));
        assert_eq!(directory.classify("1.1.1.1".parse().unwrap()), None);
    }

    #[test]
    fn test_one_failing_classifier_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let broken = NetworkClassifier::new(
            "broken",
            "broken-cache",
            SubnetSource::File(dir.path().join("missing.txt")),
        );
        let working = classifier_with(dir.path(), "working", "8.8.8.0/24\n");

        let mut directory = ResolverDirectory::new(vec![broken, working]);
        directory.init_all(None);

        assert!(directory.classifiers()[0].is_degraded());
        assert_eq!(
            directory.classify("8.8.8.5".parse().unwrap()),
            Some("working")
        );
    }

    #[test]
    fn test_all_degraded_still_answers() {
        let dir = tempfile::tempdir().unwrap();
        let broken = NetworkClassifier::new(
            "broken",
            "broken-cache",
            SubnetSource::File(dir.path().join("missing.txt")),
        );

        let mut directory = ResolverDirectory::new(vec![broken]);
        directory.init_all(None);

        assert_eq!(directory.classify("8.8.8.8".parse().unwrap()), None);
    }

    #[test]
    fn test_empty_directory() {
        let directory = ResolverDirectory::new(Vec::new());
        assert!(directory.is_empty());
        assert_eq!(directory.len(), 0);
        assert_eq!(directory.classify("8.8.8.8".parse().unwrap()), None);
    }
}
