use std::collections::HashSet;

use log::{info, Level};
use logging_timer::timer;

use crate::children::{fetch_all_children, ChildSet};
use crate::detect::{DetectedCollection, MergeStrategy};
use crate::error::ParentScanError;
use crate::index::IndexSource;

/// Number of unconfirmed ids printed per collection before summarizing.
const LOGGED_MISMATCH_IDS: usize = 5;

/// Combines each parent's children into the set the local list is checked against.
pub fn merge_children(mut sets: Vec<ChildSet>, strategy: MergeStrategy) -> ChildSet {
    if sets.len() <= 1 {
        return sets.pop().unwrap_or_default();
    }

    match strategy {
        MergeStrategy::Union => {
            let mut merged = ChildSet::new();
            for set in &sets {
                merged.extend(set.iter());
            }
            merged
        }
        MergeStrategy::Intersect => {
            let mut sets = sets.into_iter();
            let mut merged = sets.next().unwrap_or_default();
            for other in sets {
                merged.retain(|id| other.contains(id));
            }
            merged
        }
    }
}

/// Differences between a local membership list and the index's children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discrepancy {
    /// Local ids the index does not list as children, in local order.
    pub in_file_not_api: Vec<String>,
    /// Index children missing locally, in index order. Expected when the
    /// local corpus lags behind the index.
    pub in_api_not_file: Vec<String>,
}

impl Discrepancy {
    pub fn between(local_ids: &[String], ground_truth: &ChildSet) -> Self {
        let local: ChildSet = local_ids.iter().map(String::as_str).collect();

        let in_file_not_api = local
            .iter()
            .filter(|id| !ground_truth.contains(id))
            .map(str::to_owned)
            .collect();
        let in_api_not_file = ground_truth
            .iter()
            .filter(|id| !local.contains(id))
            .map(str::to_owned)
            .collect();

        Discrepancy {
            in_file_not_api,
            in_api_not_file,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.in_file_not_api.is_empty() && self.in_api_not_file.is_empty()
    }
}

/// A detected collection checked against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCollection {
    pub name: String,
    pub slug: String,
    pub parent_ids: Vec<String>,
    pub merge_strategy: MergeStrategy,
    pub local_count: usize,
    pub discrepancy: Discrepancy,
}

impl VerifiedCollection {
    pub fn new(detected: &DetectedCollection, discrepancy: Discrepancy) -> Self {
        let collection = detected.collection();
        let local_count = collection.ids().iter().collect::<HashSet<_>>().len();

        VerifiedCollection {
            name: collection.name().to_owned(),
            slug: collection.symbol().to_owned(),
            parent_ids: detected.parent_ids().to_vec(),
            merge_strategy: detected.merge_strategy(),
            local_count,
            discrepancy,
        }
    }

    /// Always equal to the number of local ids the index does not confirm.
    pub fn mismatch_count(&self) -> usize {
        self.discrepancy.in_file_not_api.len()
    }
}

/// Enumerates every parent of a detected collection and diffs the merged
/// children against the local list. Enumeration failures are fatal.
pub async fn verify_collection<S>(
    index: &mut S,
    detected: &DetectedCollection,
) -> Result<VerifiedCollection, ParentScanError>
where
    S: IndexSource,
{
    let collection = detected.collection();
    let _tmr = timer!(Level::Debug; "verify_collection", "{}", collection.symbol());
    info!("Verifying: {}", collection.name());

    let mut child_sets = Vec::with_capacity(detected.parent_ids().len());
    for parent_id in detected.parent_ids() {
        let children = fetch_all_children(index, parent_id).await?;
        info!(
            "  Parent {}... has {} children",
            short_id(parent_id),
            children.len()
        );
        child_sets.push(children);
    }

    let parent_count = child_sets.len();
    let ground_truth = merge_children(child_sets, detected.merge_strategy());
    if parent_count > 1 {
        match detected.merge_strategy() {
            MergeStrategy::Union => info!(
                "  Unioned {} parent sets -> {} total children",
                parent_count,
                ground_truth.len()
            ),
            MergeStrategy::Intersect => info!(
                "  Intersected {} parent sets -> {} shared children",
                parent_count,
                ground_truth.len()
            ),
        }
    }

    let discrepancy = Discrepancy::between(collection.ids(), &ground_truth);
    let verified = VerifiedCollection::new(detected, discrepancy);
    log_findings(&verified);

    Ok(verified)
}

fn log_findings(verified: &VerifiedCollection) {
    let in_file_not_api = &verified.discrepancy.in_file_not_api;
    let in_api_not_file = &verified.discrepancy.in_api_not_file;

    if !in_file_not_api.is_empty() {
        info!(
            "  MISMATCH: {} IDs in file but NOT in API children",
            in_file_not_api.len()
        );
        for id in in_file_not_api.iter().take(LOGGED_MISMATCH_IDS) {
            info!("    - {}", id);
        }
        if in_file_not_api.len() > LOGGED_MISMATCH_IDS {
            info!(
                "    ... and {} more",
                in_file_not_api.len() - LOGGED_MISMATCH_IDS
            );
        }
    }

    if !in_api_not_file.is_empty() {
        info!(
            "  Note: {} IDs in API but not in file (expected)",
            in_api_not_file.len()
        );
    }

    if in_file_not_api.is_empty() {
        info!(
            "  OK - all {} file IDs confirmed as children",
            verified.local_count
        );
    }
}

fn short_id(id: &str) -> &str {
    id.char_indices().nth(12).map_or(id, |(i, _)| &id[..i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::Collection;
    use crate::index::fake::FakeIndex;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn set(ids: &[&str]) -> ChildSet {
        ids.iter().copied().collect()
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn detected(ids: &[&str], parents: &[&str], strategy: MergeStrategy) -> DetectedCollection {
        DetectedCollection::new(
            Collection::new("slug", "Name", strings(ids)),
            strings(parents),
            strategy,
        )
    }

    #[test]
    fn test_intersect_and_union_of_two_sets() {
        let sets = vec![set(&["1", "2", "3"]), set(&["2", "3", "4"])];

        let intersect = merge_children(sets.clone(), MergeStrategy::Intersect);
        assert_eq!(intersect.iter().collect::<Vec<_>>(), vec!["2", "3"]);

        let union = merge_children(sets, MergeStrategy::Union);
        assert_eq!(union.iter().collect::<Vec<_>>(), vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn test_single_parent_is_unmodified() {
        for strategy in [MergeStrategy::Union, MergeStrategy::Intersect] {
            let merged = merge_children(vec![set(&["a", "b"])], strategy);
            assert_eq!(merged, set(&["a", "b"]));
        }
        assert!(merge_children(Vec::new(), MergeStrategy::Intersect).is_empty());
    }

    #[test]
    fn test_intersect_over_three_sets() {
        let sets = vec![set(&["1", "2", "3"]), set(&["2", "3"]), set(&["3", "9"])];
        let merged = merge_children(sets, MergeStrategy::Intersect);
        assert_eq!(merged.iter().collect::<Vec<_>>(), vec!["3"]);
    }

    #[test]
    fn test_discrepancy_keeps_source_order() {
        let local = strings(&["z", "x", "q", "x", "p"]);
        let truth = set(&["w", "x", "z", "v"]);

        let diff = Discrepancy::between(&local, &truth);

        assert_eq!(diff.in_file_not_api, strings(&["q", "p"]));
        assert_eq!(diff.in_api_not_file, strings(&["w", "v"]));
        assert!(!diff.is_clean());
    }

    #[tokio::test]
    async fn test_local_subset_of_single_parent() {
        let mut index = FakeIndex::new().with_pages("p", &[&["X", "Y"], &["Z", "W"]]);
        let detected = detected(&["X", "Y", "Z"], &["p"], MergeStrategy::Intersect);

        let verified = verify_collection(&mut index, &detected).await.unwrap();

        assert_eq!(verified.discrepancy.in_file_not_api, Vec::<String>::new());
        assert_eq!(verified.discrepancy.in_api_not_file, strings(&["W"]));
        assert_eq!(verified.mismatch_count(), 0);
        assert_eq!(verified.local_count, 3);
        assert_eq!(verified.parent_ids, strings(&["p"]));
    }

    #[tokio::test]
    async fn test_distributed_parents_are_unioned() {
        let mut index = FakeIndex::new()
            .with_pages("p1", &[&["a", "b"]])
            .with_pages("p2", &[&["c"]]);
        let detected = detected(&["a", "b", "c", "stray"], &["p1", "p2"], MergeStrategy::Union);

        let verified = verify_collection(&mut index, &detected).await.unwrap();

        assert_eq!(verified.discrepancy.in_file_not_api, strings(&["stray"]));
        assert!(verified.discrepancy.in_api_not_file.is_empty());
        assert_eq!(verified.mismatch_count(), 1);
    }

    #[tokio::test]
    async fn test_co_parents_are_intersected() {
        let mut index = FakeIndex::new()
            .with_pages("p1", &[&["a", "b", "solo1"]])
            .with_pages("p2", &[&["b", "a", "solo2"]]);
        let detected = detected(&["a", "b"], &["p1", "p2"], MergeStrategy::Intersect);

        let verified = verify_collection(&mut index, &detected).await.unwrap();

        assert!(verified.discrepancy.is_clean());
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_fatal() {
        let mut index = FakeIndex::new()
            .with_pages("p1", &[&["a"]])
            .with_pages("p2", &[&["a"], &["b"]])
            .failing("p2/1");
        let detected = detected(&["a"], &["p1", "p2"], MergeStrategy::Union);

        let result = verify_collection(&mut index, &detected).await;

        assert!(matches!(result, Err(ParentScanError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_verification_is_idempotent() {
        let mut index = FakeIndex::new()
            .with_pages("p1", &[&["a", "b"], &["c"]])
            .with_pages("p2", &[&["c", "d"]]);
        let detected = detected(&["a", "d", "e"], &["p1", "p2"], MergeStrategy::Union);

        let first = verify_collection(&mut index, &detected).await.unwrap();
        let second = verify_collection(&mut index, &detected).await.unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_id("short"), "short");
    }

    fn id_vec() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-f]{1,2}", 0..12)
    }

    proptest! {
        #[test]
        fn prop_discrepancy_sides_are_disjoint(local in id_vec(), truth in id_vec()) {
            let truth: ChildSet = truth.into_iter().collect();
            let diff = Discrepancy::between(&local, &truth);

            for id in &diff.in_file_not_api {
                prop_assert!(local.contains(id));
                prop_assert!(!truth.contains(id));
                prop_assert!(!diff.in_api_not_file.contains(id));
            }
            for id in &diff.in_api_not_file {
                prop_assert!(truth.contains(id));
                prop_assert!(!local.contains(id));
            }
        }

        #[test]
        fn prop_intersection_within_union(sets in prop::collection::vec(id_vec(), 1..4)) {
            let sets: Vec<ChildSet> = sets.into_iter().map(|s| s.into_iter().collect()).collect();
            let union = merge_children(sets.clone(), MergeStrategy::Union);
            let intersect = merge_children(sets.clone(), MergeStrategy::Intersect);

            for id in intersect.iter() {
                prop_assert!(union.contains(id));
                prop_assert!(sets.iter().all(|s| s.contains(id)));
            }
            for id in union.iter() {
                prop_assert!(sets.iter().any(|s| s.contains(id)));
            }
        }
    }
}
