use std::collections::HashMap;
use std::fmt::Write as _;

use crate::collapse::CollapseReason;
use crate::engine::{Row, Viewport};
use crate::model::{ElementKey, ThreadElement};

const INDENT: &str = "  ";

pub fn describe(element: &ThreadElement) -> String {
    let mut out = match element {
        ThreadElement::Post(post) => {
            let mut line = format!("post {}", post.id);
            for tag in &post.category_tags {
                let _ = write!(line, " #{tag}");
            }
            for notice in &post.content_notices {
                let _ = write!(line, " !{notice}");
            }
            line
        }
        ThreadElement::Comment(comment) => format!("comment {}", comment.id),
    };
    if element.is_new() {
        out.push_str(" (new)");
    }
    if element.is_own() {
        out.push_str(" (own)");
    }
    out
}

fn reason_label(reason: CollapseReason) -> &'static str {
    match reason {
        CollapseReason::Manual => "collapsed",
        CollapseReason::SkippedLoading => "not loaded",
        CollapseReason::Filtered => "filtered",
    }
}

pub fn render_row(row: &Row) -> String {
    match row {
        Row::Element {
            element,
            depth,
            collapsed,
        } => {
            let marker = if *collapsed { "[+] " } else { "" };
            format!("{}{marker}{}", INDENT.repeat(*depth), describe(element))
        }
        Row::Collapsed {
            group_id,
            reason,
            totals,
        } => format!(
            "{INDENT}[{group_id}: {} posts, {} comments {}]",
            totals.posts,
            totals.comments,
            reason_label(*reason)
        ),
    }
}

pub fn render(rows: &[Row]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

/// Line-based viewport over rendered rows. The scroll position is the row
/// shown at the top.
#[derive(Debug, Clone, Default)]
pub struct TextViewport {
    positions: HashMap<ElementKey, usize>,
    scroll_top: usize,
}

impl TextViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-reads row positions after the rows changed.
    pub fn sync(&mut self, rows: &[Row]) {
        self.positions = rows
            .iter()
            .enumerate()
            .filter_map(|(line, row)| match row {
                Row::Element { element, .. } => Some((element.key(), line)),
                Row::Collapsed { .. } => None,
            })
            .collect();
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn set_scroll_top(&mut self, line: usize) {
        self.scroll_top = line;
    }
}

impl Viewport for TextViewport {
    fn has_been_scrolled_past(&self, element: &ThreadElement) -> bool {
        self.positions
            .get(&element.key())
            .is_some_and(|line| *line < self.scroll_top)
    }

    fn scroll_to(&mut self, element: &ThreadElement) {
        match self.positions.get(&element.key()) {
            Some(line) => self.scroll_top = *line,
            None => tracing::debug!(element = %element.key(), "scroll_target_not_rendered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collapse::{GroupId, LevelTotals};
    use crate::model::fixtures::*;
    use std::sync::Arc;

    fn row(element: ThreadElement, depth: usize, collapsed: bool) -> Row {
        Row::Element {
            element,
            depth,
            collapsed,
        }
    }

    #[test]
    fn renders_rows_with_indentation_and_markers() {
        let mut tagged = post("a", Some("r"), 1);
        tagged.category_tags = vec!["art".into()];
        tagged.content_notices = vec!["gore".into()];
        tagged.is_new = true;
        let mut reply = comment("c", "a", 2);
        reply.is_own = true;
        let rows = vec![
            row(ThreadElement::Post(Arc::new(post("r", None, 0))), 0, false),
            row(ThreadElement::Post(Arc::new(tagged)), 1, true),
            row(ThreadElement::Comment(Arc::new(reply)), 2, false),
            Row::Collapsed {
                group_id: GroupId::new("b", "d"),
                reason: CollapseReason::SkippedLoading,
                totals: LevelTotals {
                    posts: 3,
                    comments: 4,
                },
            },
        ];
        assert_eq!(
            render(&rows),
            "post r\n  [+] post a #art !gore (new)\n    comment c (own)\n  [b..d: 3 posts, 4 comments not loaded]\n"
        );
    }

    #[test]
    fn viewport_tracks_positions() {
        let elements: Vec<ThreadElement> = ["r", "a", "b"]
            .iter()
            .map(|id| ThreadElement::Post(Arc::new(post(id, None, 0))))
            .collect();
        let rows: Vec<Row> = elements.iter().cloned().map(|e| row(e, 0, false)).collect();
        let mut viewport = TextViewport::new();
        viewport.sync(&rows);
        viewport.scroll_to(&elements[2]);
        assert_eq!(viewport.scroll_top(), 2);
        assert!(viewport.has_been_scrolled_past(&elements[0]));
        assert!(!viewport.has_been_scrolled_past(&elements[2]));

        let hidden = ThreadElement::Post(Arc::new(post("x", None, 0)));
        viewport.scroll_to(&hidden);
        assert_eq!(viewport.scroll_top(), 2);
        assert!(!viewport.has_been_scrolled_past(&hidden));
    }
}
