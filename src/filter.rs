use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{ElementKey, Post, ThreadElement};
use crate::sequence::{self as sequencer, SubMode, ViewContext, ViewMode};
use crate::tree::ThreadTree;

/// Category label that matches posts carrying no category tags.
pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Empty means every category passes.
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub excluded_notices: BTreeSet<String>,
}

impl FilterConfig {
    pub fn is_identity(&self) -> bool {
        self.categories.is_empty() && self.excluded_notices.is_empty()
    }

    fn hides_notice(&self, post: &Post) -> bool {
        post.content_notices
            .iter()
            .any(|notice| self.excluded_notices.contains(notice))
    }

    fn admits_category(&self, post: &Post) -> bool {
        if self.categories.is_empty() {
            return true;
        }
        if post.category_tags.is_empty() {
            return self.categories.contains(UNCATEGORIZED);
        }
        post.category_tags
            .iter()
            .any(|tag| self.categories.contains(tag))
    }
}

/// Drops posts failing the active filters, and the comments replying to them.
/// `sequence` must be the unfiltered sequence of the active view; in threaded
/// mode its order is the reference for re-inserted ancestors.
pub fn filter_sequence(
    sequence: &[ThreadElement],
    filters: &FilterConfig,
    mode: ViewMode,
    tree: &ThreadTree,
) -> Vec<ThreadElement> {
    if filters.is_identity() {
        return sequence.to_vec();
    }

    let mut kept: HashSet<&str> = sequence
        .iter()
        .filter_map(ThreadElement::as_post)
        .filter(|post| !filters.hides_notice(post) && filters.admits_category(post))
        .map(|post| post.id.as_str())
        .collect();

    if mode != ViewMode::Gallery {
        // Notice exclusion cascades to every descendant. Ancestors are checked
        // against the tree, not the sequence, so "new" views cascade too.
        kept.retain(|id| {
            !tree
                .ancestors(id)
                .any(|ancestor| filters.hides_notice(ancestor))
        });
    }

    let mut restored: HashSet<&str> = HashSet::new();
    if mode == ViewMode::Threaded {
        for id in &kept {
            for ancestor in tree.ancestors(id) {
                if kept.contains(ancestor.id.as_str()) || !restored.insert(ancestor.id.as_str()) {
                    break;
                }
            }
        }
    }

    let filtered: Vec<ThreadElement> = sequence
        .iter()
        .filter(|element| match element {
            ThreadElement::Post(post) => {
                kept.contains(post.id.as_str()) || restored.contains(post.id.as_str())
            }
            ThreadElement::Comment(comment) => kept.contains(comment.parent_post_id.as_str()),
        })
        .cloned()
        .collect();

    let in_sequence: HashSet<&str> = sequence
        .iter()
        .filter_map(ThreadElement::as_post)
        .map(|post| post.id.as_str())
        .collect();
    if restored.iter().any(|id| !in_sequence.contains(id)) {
        return with_missing_ancestors(sequence, filtered, &restored, tree);
    }

    tracing::debug!(
        mode = %mode,
        before = sequence.len(),
        after = filtered.len(),
        "thread_sequence_filtered"
    );
    filtered
}

/// Restored ancestors that the input sequence does not contain (a "new"
/// view, say) are placed by their position in the full threaded order.
fn with_missing_ancestors(
    input: &[ThreadElement],
    filtered: Vec<ThreadElement>,
    restored: &HashSet<&str>,
    tree: &ThreadTree,
) -> Vec<ThreadElement> {
    let reference = sequencer::sequence(ViewContext::new(ViewMode::Threaded, SubMode::All), tree);
    let rank: HashMap<ElementKey, usize> = reference
        .iter()
        .enumerate()
        .map(|(index, element)| (element.key(), index))
        .collect();

    let present: HashSet<ElementKey> = filtered.iter().map(ThreadElement::key).collect();
    let mut combined = filtered;
    for id in restored {
        let key = ElementKey::Post((*id).to_string());
        if present.contains(&key) {
            continue;
        }
        if let Some(node) = tree.node(id) {
            combined.push(ThreadElement::Post(node.post.clone()));
        }
    }
    combined.sort_by_key(|element| rank.get(&element.key()).copied().unwrap_or(usize::MAX));
    tracing::debug!(
        before = input.len(),
        after = combined.len(),
        "thread_sequence_filtered_with_ancestors"
    );
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockThreadSource;
    use crate::model::fixtures::*;
    use crate::model::ThreadSnapshot;
    use crate::sequence::sequence;

    fn filters(categories: &[&str], notices: &[&str]) -> FilterConfig {
        FilterConfig {
            categories: categories.iter().map(|s| s.to_string()).collect(),
            excluded_notices: notices.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn run(snapshot: &ThreadSnapshot, mode: ViewMode, config: &FilterConfig) -> Vec<String> {
        let tree = ThreadTree::build(snapshot);
        let seq = sequence(ViewContext::new(mode, SubMode::All), &tree);
        filter_sequence(&seq, config, mode, &tree)
            .iter()
            .map(|element| element.id().to_string())
            .collect()
    }

    fn gore_thread() -> ThreadSnapshot {
        let mut p2 = post("P2", Some("P1"), 1);
        p2.content_notices = vec!["gore".into()];
        snapshot(
            vec![post("P1", None, 0), p2, post("P3", Some("P2"), 2)],
            vec![comment("c2", "P2", 3), comment("c1", "P1", 4)],
        )
    }

    #[test]
    fn identity_when_nothing_is_active() {
        let snapshot = gore_thread();
        assert_eq!(
            run(&snapshot, ViewMode::Threaded, &FilterConfig::default()),
            vec!["P1", "c1", "P2", "c2", "P3"]
        );
    }

    #[test]
    fn notice_cascades_in_timeline() {
        let snapshot = gore_thread();
        assert_eq!(
            run(&snapshot, ViewMode::Timeline, &filters(&[], &["gore"])),
            vec!["P1", "c1"]
        );
    }

    #[test]
    fn notice_cascades_in_threaded_without_restoring() {
        let snapshot = gore_thread();
        assert_eq!(
            run(&snapshot, ViewMode::Threaded, &filters(&[], &["gore"])),
            vec!["P1", "c1"]
        );
    }

    #[test]
    fn gallery_does_not_cascade() {
        let snapshot = gore_thread();
        assert_eq!(
            run(&snapshot, ViewMode::Gallery, &filters(&[], &["gore"])),
            vec!["P3"]
        );
    }

    #[test]
    fn category_filter_restores_ancestors_in_threaded() {
        let mut leaf = post("leaf", Some("mid"), 2);
        leaf.category_tags = vec!["art".into()];
        let mut other = post("other", Some("root"), 3);
        other.category_tags = vec!["music".into()];
        let snapshot = snapshot(
            vec![post("root", None, 0), post("mid", Some("root"), 1), leaf, other],
            vec![comment("on-mid", "mid", 4), comment("on-leaf", "leaf", 5)],
        );
        let config = filters(&["art"], &[]);
        assert_eq!(
            run(&snapshot, ViewMode::Threaded, &config),
            vec!["root", "mid", "leaf", "on-leaf"]
        );
        // Category exclusion does not cascade, and nothing is restored.
        assert_eq!(run(&snapshot, ViewMode::Timeline, &config), vec!["leaf", "on-leaf"]);
    }

    #[test]
    fn uncategorized_label_admits_untagged_posts() {
        let mut tagged = post("tagged", Some("root"), 1);
        tagged.category_tags = vec!["art".into()];
        let snapshot = snapshot(vec![post("root", None, 0), tagged], Vec::new());
        assert_eq!(
            run(&snapshot, ViewMode::Timeline, &filters(&[UNCATEGORIZED], &[])),
            vec!["root"]
        );
        assert_eq!(
            run(&snapshot, ViewMode::Timeline, &filters(&["art", UNCATEGORIZED], &[])),
            vec!["root", "tagged"]
        );
    }

    #[test]
    fn restored_ancestors_join_new_only_views() {
        let mut fresh = post("fresh", Some("old"), 2);
        fresh.is_new = true;
        fresh.category_tags = vec!["art".into()];
        let snapshot = snapshot(
            vec![post("root", None, 0), post("old", Some("root"), 1), fresh],
            Vec::new(),
        );
        let tree = ThreadTree::build(&snapshot);
        let seq = sequence(ViewContext::new(ViewMode::Threaded, SubMode::New), &tree);
        let out = filter_sequence(&seq, &filters(&["art"], &[]), ViewMode::Threaded, &tree);
        assert_eq!(ids(&out), vec!["root", "old", "fresh"]);
    }

    #[test]
    fn threaded_results_stay_connected() {
        let configs = [
            filters(&["art"], &[]),
            filters(&[], &["gore"]),
            filters(&["music", UNCATEGORIZED], &["spoiler"]),
        ];
        for seed in 0..15 {
            let tree = ThreadTree::build(&MockThreadSource::generate(seed, 40));
            let seq = sequence(ViewContext::new(ViewMode::Threaded, SubMode::All), &tree);
            for config in &configs {
                let out = filter_sequence(&seq, config, ViewMode::Threaded, &tree);
                let present: HashSet<&str> = out
                    .iter()
                    .filter(|element| element.is_post())
                    .map(ThreadElement::id)
                    .collect();
                for id in &present {
                    if let Some(parent) = tree.node(id).and_then(|node| node.parent.as_ref()) {
                        assert!(present.contains(parent.id.as_str()), "seed {seed}: {id} orphaned");
                    }
                }
            }
        }
    }

    #[test]
    fn stricter_filters_never_grow_the_result() {
        let ladder = [
            filters(&[], &[]),
            filters(&[], &["gore"]),
            filters(&[], &["gore", "spoiler"]),
        ];
        let categories = [
            filters(&["art", "music", UNCATEGORIZED], &[]),
            filters(&["art", "music"], &[]),
            filters(&["art"], &[]),
        ];
        for seed in 0..15 {
            let tree = ThreadTree::build(&MockThreadSource::generate(seed, 40));
            for mode in [ViewMode::Threaded, ViewMode::Timeline, ViewMode::Gallery] {
                let seq = sequence(ViewContext::new(mode, SubMode::All), &tree);
                for steps in [&ladder, &categories] {
                    let sizes: Vec<usize> = steps
                        .iter()
                        .map(|config| filter_sequence(&seq, config, mode, &tree).len())
                        .collect();
                    assert!(sizes.windows(2).all(|pair| pair[0] >= pair[1]), "seed {seed} {mode}: {sizes:?}");
                }
            }
        }
    }
}
