use crate::model::ThreadElement;
use crate::tree::ThreadTree;

pub const DEFAULT_FIRST_LOAD_SIZE: usize = 10;
pub const DEFAULT_LOAD_MORE_STEP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMore {
    pub displayed: usize,
    pub has_more: bool,
}

/// How a jump target becomes loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowPlan {
    AlreadyDisplayed,
    Grow {
        max_displayed: usize,
        /// First and last top-level sibling skipped on the way, when the jump
        /// passes over more than one of them.
        skipped: Option<(String, String)>,
    },
}

/// Count of leading sequence elements handed to the renderer. Grows within a
/// view session and resets when the view changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayWindow {
    max_displayed: usize,
    first_load_size: usize,
    load_more_step: usize,
}

impl Default for DisplayWindow {
    fn default() -> Self {
        Self::new(DEFAULT_FIRST_LOAD_SIZE, DEFAULT_LOAD_MORE_STEP)
    }
}

impl DisplayWindow {
    pub fn new(first_load_size: usize, load_more_step: usize) -> Self {
        let first_load_size = first_load_size.max(1);
        Self {
            max_displayed: first_load_size,
            first_load_size,
            load_more_step: load_more_step.max(1),
        }
    }

    pub fn max_displayed(&self) -> usize {
        self.max_displayed
    }

    pub fn load_more_step(&self) -> usize {
        self.load_more_step
    }

    pub fn reset(&mut self) {
        self.max_displayed = self.first_load_size;
    }

    pub fn displayed(&self, len: usize) -> usize {
        self.max_displayed.min(len)
    }

    pub fn has_more(&self, len: usize) -> bool {
        self.max_displayed < len
    }

    pub fn display_more(&mut self, len: usize) -> DisplayMore {
        let grown = (self.max_displayed + self.load_more_step).min(len);
        self.max_displayed = self.max_displayed.max(grown);
        DisplayMore {
            displayed: self.displayed(len),
            has_more: self.has_more(len),
        }
    }

    /// Works out what loading `target` takes without changing anything, so the
    /// caller can register skipped ranges before the window grows.
    pub fn plan(&self, target: usize, sequence: &[ThreadElement], tree: Option<&ThreadTree>) -> WindowPlan {
        if target < self.max_displayed {
            return WindowPlan::AlreadyDisplayed;
        }
        let len = sequence.len();
        let max_displayed = (target + self.load_more_step - 1).min(len).max(target + 1);
        let skipped = tree.and_then(|tree| skipped_siblings(sequence, self.max_displayed, target, tree));
        WindowPlan::Grow {
            max_displayed,
            skipped,
        }
    }

    pub fn grow_to(&mut self, max_displayed: usize) {
        self.max_displayed = self.max_displayed.max(max_displayed);
    }
}

/// Top-level siblings lying entirely between the loaded prefix and the
/// target's own sibling.
fn skipped_siblings(
    sequence: &[ThreadElement],
    loaded: usize,
    target: usize,
    tree: &ThreadTree,
) -> Option<(String, String)> {
    let sibling_at = |index: usize| {
        sequence
            .get(index)
            .and_then(|element| tree.top_level_of(element))
            .and_then(|sibling| tree.sibling_index(sibling))
    };
    let target_sibling = sibling_at(target)?;
    let partially_loaded = loaded.checked_sub(1).and_then(sibling_at);
    let first = (loaded..target)
        .filter_map(sibling_at)
        .find(|sibling| Some(*sibling) != partially_loaded)?;
    if target_sibling <= first + 1 {
        return None;
    }
    let siblings = tree.top_level_siblings();
    Some((
        siblings[first].id.clone(),
        siblings[target_sibling - 1].id.clone(),
    ))
}
