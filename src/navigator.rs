//! Index arithmetic for jumping to the next or previous element.

use crate::sequence::ViewMode;

/// Next element after `current` that the reader has not scrolled past,
/// wrapping around. Falls back to the first element when every other element
/// has been scrolled past. `None` only for an empty sequence.
pub fn next(current: Option<usize>, len: usize, mut scrolled_past: impl FnMut(usize) -> bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let (start, steps) = match current {
        Some(index) => (index + 1, len - 1),
        None => (0, len),
    };
    let found = (0..steps)
        .map(|offset| (start + offset) % len)
        .find(|index| !scrolled_past(*index));
    Some(found.unwrap_or(0))
}

/// One step back. Threaded views wrap to the end; other views stop at the
/// start because earlier pages may not be loaded.
pub fn previous(current: Option<usize>, len: usize, mode: ViewMode) -> Option<usize> {
    if len == 0 {
        return None;
    }
    match (current, mode) {
        (Some(index), _) if index > 0 => Some((index - 1).min(len - 1)),
        (_, ViewMode::Threaded) => Some(len - 1),
        _ => None,
    }
}
