use std::collections::BTreeSet;
use std::fmt;

use log::{info, warn, Level};
use logging_timer::timer;

use crate::collections::Collection;
use crate::index::IndexSource;
use crate::sampling::SampleSelector;

/// How the children of several parents combine into one membership set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Children are spread across distinct parents.
    Union,
    /// Every member shares the same parents; keep the common children.
    Intersect,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Union => "union",
            MergeStrategy::Intersect => "intersect",
        }
    }

    /// A single distinct parent overall, or at least two sampled records
    /// with identical parent sets, means co-parents of one group. Anything
    /// else, including one record naming several parents, is distributed.
    pub fn from_evidence(parent_sets: &[BTreeSet<String>], distinct_parents: usize) -> Self {
        if distinct_parents <= 1 {
            return MergeStrategy::Intersect;
        }
        match parent_sets.split_first() {
            Some((first, rest)) if !rest.is_empty() && rest.iter().all(|set| set == first) => {
                MergeStrategy::Intersect
            }
            _ => MergeStrategy::Union,
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A collection whose sampled members declared parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCollection {
    collection: Collection,
    parent_ids: Vec<String>,
    merge_strategy: MergeStrategy,
}

impl DetectedCollection {
    pub fn new(
        collection: Collection,
        parent_ids: Vec<String>,
        merge_strategy: MergeStrategy,
    ) -> Self {
        DetectedCollection {
            collection,
            parent_ids,
            merge_strategy,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn parent_ids(&self) -> &[String] {
        &self.parent_ids
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        self.merge_strategy
    }
}

/// Parent declarations gathered from one collection's sample.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SampleEvidence {
    /// Exact parent set of each sampled record that had parents.
    parent_sets: Vec<BTreeSet<String>>,
    /// Distinct parent ids in first-observed order.
    parent_ids: Vec<String>,
    failed: usize,
}

impl SampleEvidence {
    pub fn record(&mut self, parents: &[String]) {
        if parents.is_empty() {
            return;
        }
        for parent in parents {
            if !self.parent_ids.contains(parent) {
                self.parent_ids.push(parent.clone());
            }
        }
        self.parent_sets.push(parents.iter().cloned().collect());
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn is_parent_child(&self) -> bool {
        !self.parent_sets.is_empty()
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        MergeStrategy::from_evidence(&self.parent_sets, self.parent_ids.len())
    }

    /// `None` unless at least one sampled record declared a parent.
    pub fn classify(self, collection: &Collection) -> Option<DetectedCollection> {
        if !self.is_parent_child() {
            return None;
        }
        let merge_strategy = self.merge_strategy();
        Some(DetectedCollection::new(collection.clone(), self.parent_ids, merge_strategy))
    }
}

#[derive(Debug, Default)]
pub struct DetectionSummary {
    pub checked: usize,
    pub failed_samples: usize,
    pub detected: Vec<DetectedCollection>,
}

pub struct Detector<'a, S, P> {
    index: &'a mut S,
    sampler: &'a mut P,
    sample_size: usize,
}

impl<'a, S, P> Detector<'a, S, P>
where
    S: IndexSource,
    P: SampleSelector,
{
    pub fn new(index: &'a mut S, sampler: &'a mut P, sample_size: usize) -> Self {
        Detector {
            index,
            sampler,
            sample_size,
        }
    }

    /// Probes a random sample of the collection's members for declared parents.
    /// A failed probe is logged and dropped from the evidence.
    pub async fn sample(&mut self, collection: &Collection) -> SampleEvidence {
        let mut evidence = SampleEvidence::default();

        for id in self.sampler.pick(collection.ids(), self.sample_size) {
            match self.index.fetch_record(id).await {
                Ok(record) => evidence.record(&record.parents),
                Err(e) => {
                    warn!("  Error fetching {}: {}", id, e);
                    evidence.record_failure();
                }
            }
        }

        evidence
    }

    pub async fn detect_all(&mut self, collections: &[Collection]) -> DetectionSummary {
        let _tmr = timer!(Level::Debug; "Detector.detect_all", "{} collections", collections.len());
        let mut summary = DetectionSummary::default();
        let total = collections.len();

        for collection in collections {
            summary.checked += 1;
            let evidence = self.sample(collection).await;
            summary.failed_samples += evidence.failed();

            match evidence.classify(collection) {
                Some(detected) => {
                    let parents = detected.parent_ids().len();
                    info!(
                        "  [{}/{}] {} - PARENT/CHILD ({} parent{}{})",
                        summary.checked,
                        total,
                        collection.name(),
                        parents,
                        if parents > 1 { "s" } else { "" },
                        if detected.merge_strategy() == MergeStrategy::Union {
                            ", distributed"
                        } else {
                            ""
                        }
                    );
                    summary.detected.push(detected);
                }
                None => {
                    if summary.checked % 50 == 0 {
                        info!("  [{}/{}] scanning...", summary.checked, total);
                    }
                }
            }
        }

        info!(
            "Detected {} parent/child collections out of {}",
            summary.detected.len(),
            total
        );
        summary
    }
}
