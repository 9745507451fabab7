use std::collections::HashSet;

use log::{debug, Level};
use logging_timer::timer;

use crate::error::ParentScanError;
use crate::index::IndexSource;

/// A set of item ids that remembers first-insertion order, so reports list
/// ids in the order the index returned them.
#[derive(Debug, Clone, Default)]
pub struct ChildSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl ChildSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id was already present.
    pub fn insert(&mut self, id: String) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.insert(id.clone());
        self.order.push(id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|id| id.as_str())
    }

    /// Keeps only the ids for which `keep` returns true, preserving order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        let members = &mut self.members;
        self.order.retain(|id| {
            let kept = keep(id);
            if !kept {
                members.remove(id);
            }
            kept
        });
    }
}

/// Equality is set equality; insertion order is only for reporting.
impl PartialEq for ChildSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for ChildSet {}

impl<S: Into<String>> FromIterator<S> for ChildSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ChildSet::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for ChildSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for id in iter {
            self.insert(id.into());
        }
    }
}

/// Drains every page of `parent_id`'s children, starting at page 0, until a
/// page reports no more. Any failed page fails the whole enumeration; a
/// partial set is never returned.
pub async fn fetch_all_children<S>(
    index: &mut S,
    parent_id: &str,
) -> Result<ChildSet, ParentScanError>
where
    S: IndexSource,
{
    let _tmr = timer!(Level::Debug; "fetch_all_children", "{}", parent_id);
    let mut children = ChildSet::new();
    let mut page_index = 0;

    loop {
        let page = index.fetch_children_page(parent_id, page_index).await?;
        debug!(
            "Parent {} page {}: {} ids (more: {})",
            parent_id,
            page_index,
            page.ids.len(),
            page.more
        );
        children.extend(page.ids);
        if !page.more {
            break;
        }
        page_index += 1;
    }

    Ok(children)
}
