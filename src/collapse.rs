use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{report, IntegrityError};
use crate::model::{ElementKey, ThreadElement};
use crate::tree::ThreadTree;

pub const DEFAULT_UNRAVEL_STEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseReason {
    Manual,
    SkippedLoading,
    Filtered,
}

/// Identity of a collapse group: its two boundary sibling ids. Displays as
/// `start..end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId {
    pub start_id: String,
    pub end_id: String,
}

impl GroupId {
    pub fn new(start_id: impl Into<String>, end_id: impl Into<String>) -> Self {
        Self {
            start_id: start_id.into(),
            end_id: end_id.into(),
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_id, self.end_id)
    }
}

/// A contiguous run of top-level siblings, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseGroup {
    pub start_id: String,
    pub end_id: String,
    pub reason: CollapseReason,
}

impl CollapseGroup {
    pub fn id(&self) -> GroupId {
        GroupId::new(self.start_id.clone(), self.end_id.clone())
    }

    /// Ordered sibling index range, or `None` when a boundary no longer
    /// resolves.
    pub fn span(&self, tree: &ThreadTree) -> Option<(usize, usize)> {
        let start = tree.sibling_index(&self.start_id)?;
        let end = tree.sibling_index(&self.end_id)?;
        Some((start.min(end), start.max(end)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollapseId {
    /// A single element; its descendants are hidden, the element is not.
    Level(ElementKey),
    Group(GroupId),
}

impl fmt::Display for CollapseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollapseId::Level(key) => write!(f, "{key}"),
            CollapseId::Group(id) => write!(f, "group:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapseChange {
    pub id: CollapseId,
    pub collapsed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelTotals {
    pub posts: usize,
    pub comments: usize,
}

type Listener = Box<dyn FnMut(&[CollapseChange])>;

pub struct CollapseManager {
    collapsed: BTreeSet<CollapseId>,
    groups: Vec<CollapseGroup>,
    pending: Vec<CollapseChange>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    unravel_step: usize,
}

impl Default for CollapseManager {
    fn default() -> Self {
        Self::new(DEFAULT_UNRAVEL_STEP)
    }
}

impl fmt::Debug for CollapseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollapseManager")
            .field("collapsed", &self.collapsed)
            .field("groups", &self.groups)
            .field("pending", &self.pending.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl CollapseManager {
    pub fn new(unravel_step: usize) -> Self {
        Self {
            collapsed: BTreeSet::new(),
            groups: Vec::new(),
            pending: Vec::new(),
            listeners: Vec::new(),
            next_subscription: 0,
            unravel_step: unravel_step.max(1),
        }
    }

    pub fn is_collapsed(&self, id: &CollapseId) -> bool {
        self.collapsed.contains(id)
    }

    pub fn collapsed(&self) -> impl Iterator<Item = &CollapseId> {
        self.collapsed.iter()
    }

    pub fn groups(&self) -> &[CollapseGroup] {
        &self.groups
    }

    pub fn group(&self, group_id: &GroupId) -> Option<&CollapseGroup> {
        self.groups
            .iter()
            .find(|group| group.start_id == group_id.start_id && group.end_id == group_id.end_id)
    }

    pub fn collapse_level(&mut self, id: CollapseId) {
        if self.collapsed.insert(id.clone()) {
            tracing::debug!(id = %id, "collapse_level");
            self.pending.push(CollapseChange {
                id,
                collapsed: true,
            });
        }
    }

    /// Removing a group id also forgets the group definition.
    pub fn uncollapse_level(&mut self, id: &CollapseId) {
        if self.collapsed.remove(id) {
            tracing::debug!(id = %id, "uncollapse_level");
            self.pending.push(CollapseChange {
                id: id.clone(),
                collapsed: false,
            });
        }
        if let CollapseId::Group(group_id) = id {
            self.groups.retain(|group| group.id() != *group_id);
        }
    }

    pub fn toggle_level(&mut self, id: CollapseId) -> bool {
        if self.is_collapsed(&id) {
            self.uncollapse_level(&id);
            false
        } else {
            self.collapse_level(id);
            true
        }
    }

    /// Registers a group between two top-level siblings and returns its id.
    /// The group is not collapsed until `collapse_level` is called with it.
    pub fn add_collapse_group(
        &mut self,
        start_id: &str,
        end_id: &str,
        reason: CollapseReason,
        tree: &ThreadTree,
    ) -> Option<GroupId> {
        let mut group = CollapseGroup {
            start_id: start_id.to_string(),
            end_id: end_id.to_string(),
            reason,
        };
        let (start, _) = self.resolve(&group, tree)?;
        if tree.sibling_index(&group.start_id) != Some(start) {
            std::mem::swap(&mut group.start_id, &mut group.end_id);
        }
        let id = group.id();
        if self.group(&id).is_none() {
            tracing::debug!(group = %id, reason = ?reason, "collapse_group_added");
            self.groups.push(group);
        }
        Some(id)
    }

    /// Reveals `unravel_step` siblings from one end of a group. Returns the id
    /// of the remaining smaller group, or `None` once the group is gone.
    pub fn partially_uncollapse_group(
        &mut self,
        group_id: &GroupId,
        from_end: bool,
        tree: &ThreadTree,
    ) -> Option<GroupId> {
        let group = self.group(group_id)?.clone();
        let old_id = CollapseId::Group(group_id.clone());
        let Some((start, end)) = self.resolve(&group, tree) else {
            self.uncollapse_level(&old_id);
            return None;
        };
        if end - start + 1 <= self.unravel_step {
            self.uncollapse_level(&old_id);
            return None;
        }

        let (start, end) = if from_end {
            (start, end - self.unravel_step)
        } else {
            (start + self.unravel_step, end)
        };
        let siblings = tree.top_level_siblings();
        let remaining = CollapseGroup {
            start_id: siblings[start].id.clone(),
            end_id: siblings[end].id.clone(),
            reason: group.reason,
        };
        let was_collapsed = self.is_collapsed(&old_id);
        self.uncollapse_level(&old_id);
        let new_id = remaining.id();
        tracing::debug!(from = %group_id, to = %new_id, "collapse_group_unravelled");
        self.groups.push(remaining);
        if was_collapsed {
            self.collapse_level(CollapseId::Group(new_id.clone()));
        }
        Some(new_id)
    }

    /// Uncollapses and forgets every group registered with `reason`.
    pub fn remove_groups(&mut self, reason: CollapseReason) {
        let ids: Vec<GroupId> = self
            .groups
            .iter()
            .filter(|group| group.reason == reason)
            .map(CollapseGroup::id)
            .collect();
        for id in ids {
            self.uncollapse_level(&CollapseId::Group(id));
        }
    }

    fn resolve(&self, group: &CollapseGroup, tree: &ThreadTree) -> Option<(usize, usize)> {
        let span = group.span(tree);
        if span.is_none() {
            report_stale(group, tree);
        }
        span
    }

    /// Drops groups whose boundaries vanished and levels whose elements did,
    /// after the thread was reloaded.
    pub fn retain_valid(&mut self, tree: &ThreadTree) {
        let stale: Vec<CollapseGroup> = self
            .groups
            .iter()
            .filter(|group| group.span(tree).is_none())
            .cloned()
            .collect();
        for group in stale {
            report_stale(&group, tree);
            self.uncollapse_level(&CollapseId::Group(group.id()));
        }
        let missing: Vec<CollapseId> = self
            .collapsed
            .iter()
            .filter(|id| match id {
                CollapseId::Level(key) => !tree.contains(key),
                CollapseId::Group(group_id) => self.group(group_id).is_none(),
            })
            .cloned()
            .collect();
        for id in missing {
            tracing::debug!(id = %id, "collapse_level_dropped");
            self.uncollapse_level(&id);
        }
    }

    /// Forgets every collapsed id and group, recording the transitions.
    pub fn clear(&mut self) {
        let ids: Vec<CollapseId> = self.collapsed.iter().cloned().collect();
        for id in &ids {
            self.uncollapse_level(id);
        }
        self.groups.clear();
    }

    /// The collapsed group hiding this element, if any.
    pub fn hiding_group(&self, element: &ThreadElement, tree: &ThreadTree) -> Option<&CollapseGroup> {
        let sibling = tree.top_level_of(element)?;
        let index = tree.sibling_index(sibling)?;
        self.groups.iter().find(|group| {
            self.collapsed.contains(&CollapseId::Group(group.id()))
                && group
                    .span(tree)
                    .is_some_and(|(start, end)| start <= index && index <= end)
        })
    }

    /// Whether a collapsed ancestor hides this element.
    pub fn hidden_by_level(&self, element: &ThreadElement, tree: &ThreadTree) -> bool {
        if !self
            .collapsed
            .iter()
            .any(|id| matches!(id, CollapseId::Level(_)))
        {
            return false;
        }
        tree.element_ancestors(element)
            .into_iter()
            .any(|key| self.collapsed.contains(&CollapseId::Level(key)))
    }

    /// Posts and comments a group spans, counted over the full sequence.
    pub fn level_totals(
        &self,
        group_id: &GroupId,
        full_sequence: &[ThreadElement],
        tree: &ThreadTree,
    ) -> Option<LevelTotals> {
        let group = self.group(group_id)?;
        let (start, end) = self.resolve(group, tree)?;
        let in_span = |element: &ThreadElement| {
            tree.top_level_of(element)
                .and_then(|sibling| tree.sibling_index(sibling))
                .is_some_and(|index| start <= index && index <= end)
        };
        let first = full_sequence.iter().position(|element| in_span(element))?;
        let last = full_sequence.iter().rposition(|element| in_span(element))?;
        let slice = &full_sequence[first..=last];
        let posts = slice.iter().filter(|element| element.is_post()).count();
        Some(LevelTotals {
            posts,
            comments: slice.len() - posts,
        })
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&[CollapseChange]) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    pub fn clear_subscribers(&mut self) {
        self.listeners.clear();
    }

    /// Ends an update cycle: hands every transition recorded since the last
    /// flush to each subscriber in one batch.
    pub fn flush(&mut self) -> Vec<CollapseChange> {
        let batch = std::mem::take(&mut self.pending);
        if !batch.is_empty() {
            for (_, listener) in &mut self.listeners {
                listener(&batch);
            }
        }
        batch
    }
}

fn report_stale(group: &CollapseGroup, tree: &ThreadTree) {
    let boundary = if tree.sibling_index(&group.start_id).is_none() {
        &group.start_id
    } else {
        &group.end_id
    };
    report(IntegrityError::StaleGroupBoundary {
        group: group.id().to_string(),
        boundary: boundary.clone(),
    });
}
