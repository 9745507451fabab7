/// Locale-aware name ordering for output records
///
/// Collection names are display strings ("Bitcoin Frogs", "bitmap", "Élan")
/// and must sort the way a human reads them rather than by code point.
use std::cmp::Ordering;

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};

use crate::error::ParentScanError;

/// Name comparator backed by an ICU root-locale collator with default
/// (tertiary) strength: accents and case break ties but never dominate.
pub struct NameCollator {
    collator: CollatorBorrowed<'static>,
}

impl NameCollator {
    pub fn new() -> Result<Self, ParentScanError> {
        let collator = Collator::try_new(Default::default(), CollatorOptions::default())
            .map_err(|e| ParentScanError::Error(format!("Failed to create ICU collator: {}", e)))?;

        Ok(NameCollator { collator })
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.collator.compare(a, b)
    }

    /// Stable sort by a name key, so equal names keep their input order.
    pub fn sort_by_name<T, F>(&self, items: &mut [T], name: F)
    where
        F: Fn(&T) -> &str,
    {
        items.sort_by(|a, b| self.compare(name(a), name(b)));
    }
}
