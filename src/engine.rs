use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::collapse::{
    CollapseChange, CollapseId, CollapseManager, CollapseReason, GroupId, LevelTotals,
    SubscriptionId,
    DEFAULT_UNRAVEL_STEP,
};
use crate::error::{report, IntegrityError};
use crate::filter::{filter_sequence, FilterConfig};
use crate::idle::{IdleHandle, IdleQueue};
use crate::model::{ElementKey, ThreadElement, ThreadSnapshot};
use crate::navigator;
use crate::sequence::{sequence, SubMode, ViewContext, ViewMode};
use crate::tree::ThreadTree;
use crate::window::{DisplayMore, DisplayWindow, WindowPlan, DEFAULT_FIRST_LOAD_SIZE, DEFAULT_LOAD_MORE_STEP};

/// The rendering layer, as far as navigation is concerned.
pub trait Viewport {
    /// Whether the element's on-screen position is already above the reader.
    fn has_been_scrolled_past(&self, element: &ThreadElement) -> bool;
    fn scroll_to(&mut self, element: &ThreadElement);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub first_load_size: usize,
    pub load_more_step: usize,
    pub unravel_step: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            first_load_size: DEFAULT_FIRST_LOAD_SIZE,
            load_more_step: DEFAULT_LOAD_MORE_STEP,
            unravel_step: DEFAULT_UNRAVEL_STEP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayOutcome {
    AlreadyDisplayed,
    Grown {
        displayed: usize,
        /// Group created over the top-level siblings jumped across.
        skipped_group: Option<GroupId>,
    },
    NotFound,
}

/// One line of output for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Element {
        element: ThreadElement,
        depth: usize,
        /// The element's own level is collapsed; its descendants are omitted.
        collapsed: bool,
    },
    Collapsed {
        group_id: GroupId,
        reason: CollapseReason,
        totals: LevelTotals,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IdleTask {
    DisplayMore,
    ScrollTo(ElementKey),
}

/// Display state for one open thread. Owns every derived structure; drop it
/// (or call `teardown`) when the thread view goes away.
#[derive(Debug)]
pub struct ThreadEngine {
    settings: EngineSettings,
    tree: ThreadTree,
    full: Vec<ThreadElement>,
    sequences: HashMap<ViewContext, Vec<ThreadElement>>,
    active: Vec<ThreadElement>,
    view: ViewContext,
    filters: FilterConfig,
    fetching: bool,
    window: DisplayWindow,
    collapse: CollapseManager,
    idle: IdleQueue<IdleTask>,
    continuation: Option<IdleHandle>,
    current: Option<usize>,
}

impl Default for ThreadEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl ThreadEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            tree: ThreadTree::default(),
            full: Vec::new(),
            sequences: HashMap::new(),
            active: Vec::new(),
            view: ViewContext::default(),
            filters: FilterConfig::default(),
            fetching: false,
            window: DisplayWindow::new(settings.first_load_size, settings.load_more_step),
            collapse: CollapseManager::new(settings.unravel_step),
            idle: IdleQueue::new(),
            continuation: None,
            current: None,
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn tree(&self) -> &ThreadTree {
        &self.tree
    }

    pub fn view(&self) -> ViewContext {
        self.view
    }

    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    pub fn window(&self) -> &DisplayWindow {
        &self.window
    }

    pub fn collapse(&self) -> &CollapseManager {
        &self.collapse
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// Whether an idle continuation is armed.
    pub fn has_idle_work(&self) -> bool {
        !self.idle.is_empty()
    }

    /// Replaces the thread contents. Everything derived is rebuilt; collapse
    /// state survives only where it still resolves.
    pub fn load_snapshot(&mut self, snapshot: &ThreadSnapshot) {
        self.tree = ThreadTree::build(snapshot);
        self.full = sequence(ViewContext::new(ViewMode::Threaded, SubMode::All), &self.tree);
        self.sequences.clear();
        self.window.reset();
        self.current = None;
        self.idle.cancel_all();
        self.continuation = None;
        self.collapse.retain_valid(&self.tree);
        self.refresh_active();
        tracing::info!(
            posts = self.tree.posts().len(),
            comments = self.tree.comment_count(),
            view = %self.view.mode,
            "thread_snapshot_loaded"
        );
        self.commit();
    }

    pub fn set_view(&mut self, view: ViewContext) {
        if view == self.view {
            return;
        }
        tracing::debug!(mode = %view.mode, sub_mode = %view.sub_mode, show_cover = view.show_cover, "view_changed");
        self.view = view;
        self.window.reset();
        self.current = None;
        // Skipped ranges belong to the old window.
        self.collapse.remove_groups(CollapseReason::SkippedLoading);
        self.refresh_active();
        self.commit();
    }

    pub fn set_filters(&mut self, filters: FilterConfig) {
        if filters == self.filters {
            return;
        }
        self.filters = filters;
        self.current = None;
        self.refresh_active();
        self.commit();
    }

    /// Idle continuation pauses while the data source is fetching.
    pub fn set_fetching(&mut self, fetching: bool) {
        self.fetching = fetching;
        self.rearm();
    }

    /// The filtered sequence for the active view.
    pub fn active_sequence(&self) -> &[ThreadElement] {
        &self.active
    }

    /// The full threaded sequence, unfiltered.
    pub fn full_sequence(&self) -> &[ThreadElement] {
        &self.full
    }

    /// The loaded prefix of the active sequence.
    pub fn displayed(&self) -> &[ThreadElement] {
        &self.active[..self.window.displayed(self.active.len())]
    }

    pub fn position(&self, key: &ElementKey) -> Option<usize> {
        self.active.iter().position(|element| element.matches(key))
    }

    /// The loaded prefix with collapse state applied.
    pub fn rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut last_group: Option<GroupId> = None;
        let threaded = self.view.mode == ViewMode::Threaded;
        for element in self.displayed() {
            // Groups span top-level siblings, which are contiguous only in
            // threaded order.
            let hiding = threaded
                .then(|| self.collapse.hiding_group(element, &self.tree))
                .flatten();
            if let Some(group) = hiding {
                let group_id = group.id();
                if last_group.as_ref() != Some(&group_id) {
                    let totals = self
                        .collapse
                        .level_totals(&group_id, &self.full, &self.tree)
                        .unwrap_or_default();
                    rows.push(Row::Collapsed {
                        group_id: group_id.clone(),
                        reason: group.reason,
                        totals,
                    });
                    last_group = Some(group_id);
                }
                continue;
            }
            last_group = None;
            if self.collapse.hidden_by_level(element, &self.tree) {
                continue;
            }
            rows.push(Row::Element {
                element: element.clone(),
                depth: self.depth_of(element),
                collapsed: self
                    .collapse
                    .is_collapsed(&CollapseId::Level(element.key())),
            });
        }
        rows
    }

    fn depth_of(&self, element: &ThreadElement) -> usize {
        let depth = self.tree.depth_of(element);
        if self.view.mode == ViewMode::Threaded {
            return depth;
        }
        // Flat views only indent replies relative to their post.
        let post_depth = self
            .tree
            .element(&ElementKey::Post(element.post_id().to_string()))
            .map(|post| self.tree.depth_of(&post))
            .unwrap_or(0);
        depth.saturating_sub(post_depth)
    }

    pub fn display_more(&mut self) -> DisplayMore {
        self.cancel_continuation();
        let more = self.window.display_more(self.active.len());
        tracing::debug!(displayed = more.displayed, has_more = more.has_more, "display_more");
        self.rearm();
        self.commit();
        more
    }

    /// Makes sure `key` is loaded and not hidden by collapse state.
    pub fn display_to_element(&mut self, key: &ElementKey) -> DisplayOutcome {
        let Some(index) = self.position(key) else {
            report(IntegrityError::UnknownElement { key: key.clone() });
            return DisplayOutcome::NotFound;
        };
        let tree = (self.view.mode == ViewMode::Threaded).then_some(&self.tree);
        let outcome = match self.window.plan(index, &self.active, tree) {
            WindowPlan::AlreadyDisplayed => DisplayOutcome::AlreadyDisplayed,
            WindowPlan::Grow {
                max_displayed,
                skipped,
            } => {
                let skipped_group = skipped.and_then(|(start, end)| {
                    let id = self.collapse.add_collapse_group(
                        &start,
                        &end,
                        CollapseReason::SkippedLoading,
                        &self.tree,
                    )?;
                    self.collapse.collapse_level(CollapseId::Group(id.clone()));
                    Some(id)
                });
                self.cancel_continuation();
                self.window.grow_to(max_displayed);
                tracing::debug!(element = %key, max_displayed, skipped = ?skipped_group, "display_to_element");
                DisplayOutcome::Grown {
                    displayed: self.window.displayed(self.active.len()),
                    skipped_group,
                }
            }
        };
        self.reveal(index);
        self.rearm();
        self.commit();
        outcome
    }

    fn reveal(&mut self, index: usize) {
        let element = self.active[index].clone();
        while let Some(group) = self.collapse.hiding_group(&element, &self.tree) {
            let id = CollapseId::Group(group.id());
            self.collapse.uncollapse_level(&id);
        }
        for key in self.tree.element_ancestors(&element) {
            self.collapse.uncollapse_level(&CollapseId::Level(key));
        }
    }

    pub fn collapse_level(&mut self, id: CollapseId) {
        self.collapse.collapse_level(id);
        self.commit();
    }

    pub fn uncollapse_level(&mut self, id: &CollapseId) {
        self.collapse.uncollapse_level(id);
        self.commit();
    }

    pub fn toggle_level(&mut self, id: CollapseId) -> bool {
        let collapsed = self.collapse.toggle_level(id);
        self.commit();
        collapsed
    }

    pub fn add_collapse_group(&mut self, start_id: &str, end_id: &str, reason: CollapseReason) -> Option<GroupId> {
        let id = self
            .collapse
            .add_collapse_group(start_id, end_id, reason, &self.tree);
        self.commit();
        id
    }

    pub fn partially_uncollapse_group(&mut self, group_id: &GroupId, from_end: bool) -> Option<GroupId> {
        let rest = self
            .collapse
            .partially_uncollapse_group(group_id, from_end, &self.tree);
        self.commit();
        rest
    }

    pub fn level_totals(&self, group_id: &GroupId) -> Option<LevelTotals> {
        self.collapse.level_totals(group_id, &self.full, &self.tree)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&[CollapseChange]) + 'static) -> SubscriptionId {
        self.collapse.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.collapse.unsubscribe(id)
    }

    /// Jumps to the next element the reader has not scrolled past.
    pub fn beam_next(&mut self, viewport: &mut dyn Viewport) -> Option<ElementKey> {
        let active = &self.active;
        let target = navigator::next(self.current, active.len(), |index| {
            viewport.has_been_scrolled_past(&active[index])
        })?;
        Some(self.beam_to(target, viewport))
    }

    pub fn beam_previous(&mut self, viewport: &mut dyn Viewport) -> Option<ElementKey> {
        let target = navigator::previous(self.current, self.active.len(), self.view.mode)?;
        Some(self.beam_to(target, viewport))
    }

    fn beam_to(&mut self, index: usize, viewport: &mut dyn Viewport) -> ElementKey {
        let element = self.active[index].clone();
        let key = element.key();
        self.current = Some(index);
        match self.display_to_element(&key) {
            DisplayOutcome::AlreadyDisplayed => viewport.scroll_to(&element),
            // The grown window has to be painted before the target has a
            // position to scroll to.
            _ => {
                self.idle.schedule(IdleTask::ScrollTo(key.clone()));
            }
        }
        tracing::debug!(element = %key, index, "beam_to");
        key
    }

    /// Runs deferred work until the budget is spent. At least one task runs
    /// per call when any is pending. Returns the number of tasks run.
    pub fn run_idle(&mut self, viewport: &mut dyn Viewport, budget: Duration) -> usize {
        let started = Instant::now();
        let mut ran = 0;
        while ran == 0 || started.elapsed() < budget {
            let Some((handle, task)) = self.idle.pop() else {
                break;
            };
            ran += 1;
            match task {
                IdleTask::DisplayMore => {
                    if self.continuation == Some(handle) {
                        self.continuation = None;
                    }
                    if self.continues_in_idle() {
                        self.window.display_more(self.active.len());
                        self.rearm();
                    }
                }
                IdleTask::ScrollTo(key) => match self.position(&key) {
                    Some(index) => viewport.scroll_to(&self.active[index]),
                    None => report(IntegrityError::UnknownElement { key }),
                },
            }
        }
        self.commit();
        ran
    }

    /// Stops all deferred work and drops subscribers.
    pub fn teardown(&mut self) {
        self.idle.cancel_all();
        self.continuation = None;
        self.collapse.clear_subscribers();
        tracing::debug!("thread_engine_torn_down");
    }

    fn continues_in_idle(&self) -> bool {
        self.view.mode == ViewMode::Threaded
            && !self.fetching
            && self.window.has_more(self.active.len())
    }

    fn cancel_continuation(&mut self) {
        if let Some(handle) = self.continuation.take() {
            self.idle.cancel(handle);
        }
    }

    fn rearm(&mut self) {
        self.cancel_continuation();
        if self.continues_in_idle() {
            self.continuation = Some(self.idle.schedule(IdleTask::DisplayMore));
        }
    }

    fn refresh_active(&mut self) {
        let view = self.view;
        let tree = &self.tree;
        let unfiltered = self
            .sequences
            .entry(view)
            .or_insert_with(|| sequence(view, tree));
        self.active = filter_sequence(unfiltered, &self.filters, view.mode, tree);
        self.rearm();
    }

    fn commit(&mut self) {
        self.collapse.flush();
    }
}

impl Drop for ThreadEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeViewport {
        past: HashSet<ElementKey>,
        scrolled: Vec<ElementKey>,
    }

    impl Viewport for FakeViewport {
        fn has_been_scrolled_past(&self, element: &ThreadElement) -> bool {
            self.past.contains(&element.key())
        }

        fn scroll_to(&mut self, element: &ThreadElement) {
            self.scrolled.push(element.key());
        }
    }

    fn settings(first: usize, step: usize) -> EngineSettings {
        EngineSettings {
            first_load_size: first,
            load_more_step: step,
            unravel_step: 5,
        }
    }

    fn engine_with(snapshot: &ThreadSnapshot, first: usize, step: usize) -> ThreadEngine {
        let mut engine = ThreadEngine::new(settings(first, step));
        engine.load_snapshot(snapshot);
        engine
    }

    fn post_key(id: &str) -> ElementKey {
        ElementKey::Post(id.into())
    }

    #[test]
    fn idle_continuation_loads_everything_in_threaded_mode() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        assert_eq!(engine.displayed().len(), 5);
        assert!(engine.has_idle_work());
        let mut viewport = FakeViewport::default();
        let ran = engine.run_idle(&mut viewport, Duration::from_secs(60));
        assert_eq!(ran, 3);
        assert_eq!(engine.displayed().len(), 31);
        assert!(!engine.has_idle_work());
    }

    #[test]
    fn idle_round_runs_one_task_on_zero_budget() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        let mut viewport = FakeViewport::default();
        assert_eq!(engine.run_idle(&mut viewport, Duration::ZERO), 1);
        assert_eq!(engine.displayed().len(), 15);
        assert!(engine.has_idle_work());
    }

    #[test]
    fn idle_continuation_waits_for_fetch_and_threaded_mode() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        engine.set_fetching(true);
        assert!(!engine.has_idle_work());
        engine.set_fetching(false);
        assert!(engine.has_idle_work());

        engine.set_view(ViewContext::new(ViewMode::Timeline, SubMode::All));
        assert!(!engine.has_idle_work());
        assert_eq!(engine.displayed().len(), 5);
    }

    #[test]
    fn explicit_display_more_replaces_pending_continuation() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        let more = engine.display_more();
        assert_eq!(more, DisplayMore { displayed: 15, has_more: true });
        assert_eq!(engine.idle.len(), 1);
    }

    #[test]
    fn view_change_resets_window() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        engine.display_more();
        engine.set_view(ViewContext::new(ViewMode::Timeline, SubMode::Latest));
        assert_eq!(engine.window().max_displayed(), 5);
        assert_eq!(engine.displayed()[0].id(), "t30");
    }

    #[test]
    fn far_jump_collapses_skipped_siblings() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        let outcome = engine.display_to_element(&post_key("t20"));
        assert_eq!(
            outcome,
            DisplayOutcome::Grown {
                displayed: 29,
                skipped_group: Some(GroupId::new("t5", "t19")),
            }
        );
        assert!(engine
            .collapse()
            .is_collapsed(&CollapseId::Group(GroupId::new("t5", "t19"))));
        let rows = engine.rows();
        assert!(matches!(
            &rows[5],
            Row::Collapsed { group_id, reason: CollapseReason::SkippedLoading, totals }
                if *group_id == GroupId::new("t5", "t19") && totals.posts == 15
        ));
        assert!(matches!(&rows[6], Row::Element { element, .. } if element.id() == "t20"));

        assert_eq!(engine.display_to_element(&post_key("t3")), DisplayOutcome::AlreadyDisplayed);
        assert_eq!(engine.display_to_element(&post_key("nope")), DisplayOutcome::NotFound);
    }

    #[test]
    fn jumping_into_a_collapsed_range_reveals_it() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        engine.display_to_element(&post_key("t20"));
        let outcome = engine.display_to_element(&post_key("t10"));
        assert_eq!(outcome, DisplayOutcome::AlreadyDisplayed);
        assert!(engine.collapse().groups().is_empty());
    }

    #[test]
    fn unravel_through_engine() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        engine.display_to_element(&post_key("t20"));
        let rest = engine
            .partially_uncollapse_group(&GroupId::new("t5", "t19"), true)
            .unwrap();
        assert_eq!(rest, GroupId::new("t5", "t14"));
        assert_eq!(
            engine.level_totals(&rest),
            Some(LevelTotals {
                posts: 10,
                comments: 0
            })
        );
    }

    #[test]
    fn subscribers_see_one_batch_per_operation() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        let batches: Rc<RefCell<Vec<usize>>> = Rc::default();
        let sink = batches.clone();
        let id = engine.subscribe(move |batch| sink.borrow_mut().push(batch.len()));
        engine.display_to_element(&post_key("t20"));
        engine.display_to_element(&post_key("t10"));
        assert_eq!(*batches.borrow(), vec![1, 1]);
        assert!(engine.unsubscribe(id));
    }

    #[test]
    fn collapsed_level_hides_descendants() {
        let snapshot = snapshot(
            vec![post("r", None, 0), post("a", Some("r"), 1), post("a1", Some("a"), 2), post("b", Some("r"), 3)],
            vec![comment("ca", "a", 4)],
        );
        let mut engine = engine_with(&snapshot, 10, 10);
        assert!(engine.toggle_level(CollapseId::Level(post_key("a"))));
        let ids: Vec<String> = engine
            .rows()
            .iter()
            .filter_map(|row| match row {
                Row::Element { element, collapsed, .. } => Some(format!("{}{}", element.id(), if *collapsed { "+" } else { "" })),
                Row::Collapsed { .. } => None,
            })
            .collect();
        assert_eq!(ids, vec!["r", "a+", "b"]);

        engine.display_to_element(&ElementKey::Comment("ca".into()));
        assert!(!engine.collapse().is_collapsed(&CollapseId::Level(post_key("a"))));
    }

    #[test]
    fn beam_next_scrolls_now_or_after_render() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        let mut viewport = FakeViewport::default();
        viewport.past.insert(post_key("p0"));

        assert_eq!(engine.beam_next(&mut viewport), Some(post_key("t1")));
        assert_eq!(viewport.scrolled, vec![post_key("t1")]);

        for id in 2..=19 {
            viewport.past.insert(post_key(&format!("t{id}")));
        }
        assert_eq!(engine.beam_next(&mut viewport), Some(post_key("t20")));
        assert_eq!(viewport.scrolled.len(), 1);
        engine.run_idle(&mut viewport, Duration::from_secs(60));
        assert_eq!(viewport.scrolled.last(), Some(&post_key("t20")));
        assert_eq!(engine.current(), Some(20));
    }

    #[test]
    fn beam_previous_respects_mode() {
        let mut engine = engine_with(&flat_thread(3), 10, 10);
        let mut viewport = FakeViewport::default();
        assert_eq!(engine.beam_previous(&mut viewport), Some(post_key("t3")));

        engine.set_view(ViewContext::new(ViewMode::Timeline, SubMode::All));
        assert_eq!(engine.beam_previous(&mut viewport), None);
        engine.beam_next(&mut viewport);
        assert_eq!(engine.current(), Some(0));
        assert_eq!(engine.beam_previous(&mut viewport), None);
    }

    #[test]
    fn empty_thread_is_inert() {
        let mut engine = engine_with(&ThreadSnapshot::default(), 5, 5);
        let mut viewport = FakeViewport::default();
        assert!(engine.displayed().is_empty());
        assert!(engine.rows().is_empty());
        assert_eq!(engine.beam_next(&mut viewport), None);
        assert_eq!(engine.beam_previous(&mut viewport), None);
        assert_eq!(engine.display_more(), DisplayMore { displayed: 0, has_more: false });
    }

    #[test]
    fn reload_drops_stale_groups_and_resets_window() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        engine.display_to_element(&post_key("t20"));
        engine.load_snapshot(&flat_thread(10));
        assert!(engine.collapse().groups().is_empty());
        assert_eq!(engine.window().max_displayed(), 5);
        assert_eq!(engine.current(), None);
    }

    #[test]
    fn filters_apply_to_active_sequence() {
        let mut tagged = post("t2", Some("p0"), 2);
        tagged.content_notices = vec!["spoiler".into()];
        let snapshot = snapshot(vec![post("p0", None, 0), post("t1", Some("p0"), 1), tagged], Vec::new());
        let mut engine = engine_with(&snapshot, 10, 10);
        engine.set_filters(FilterConfig {
            excluded_notices: ["spoiler".to_string()].into_iter().collect(),
            ..FilterConfig::default()
        });
        assert_eq!(ids(engine.active_sequence()), vec!["p0", "t1"]);
        assert_eq!(engine.full_sequence().len(), 3);
    }

    #[test]
    fn view_change_drops_skipped_ranges_and_flat_views_ignore_groups() {
        let mut engine = engine_with(&flat_thread(30), 5, 10);
        engine.display_to_element(&post_key("t20"));
        let manual = engine
            .add_collapse_group("t1", "t2", CollapseReason::Manual)
            .unwrap();
        engine.collapse_level(CollapseId::Group(manual.clone()));

        engine.set_view(ViewContext::new(ViewMode::Timeline, SubMode::All));
        assert!(engine.collapse().group(&GroupId::new("t5", "t19")).is_none());
        assert!(engine.collapse().group(&manual).is_some());
        while engine.display_more().has_more {}
        let rows = engine.rows();
        assert!(rows.iter().all(|row| matches!(row, Row::Element { .. })));
        assert_eq!(rows.len(), 31);

        engine.set_view(ViewContext::new(ViewMode::Threaded, SubMode::All));
        let rows = engine.rows();
        let collapsed: Vec<&GroupId> = rows
            .iter()
            .filter_map(|row| match row {
                Row::Collapsed { group_id, .. } => Some(group_id),
                Row::Element { .. } => None,
            })
            .collect();
        assert_eq!(collapsed, vec![&manual]);
    }
}
