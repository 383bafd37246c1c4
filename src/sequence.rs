use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::model::{Post, ThreadElement};
use crate::tree::{CommentThreadInfo, ThreadTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Threaded,
    Timeline,
    Gallery,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Threaded => "threaded",
            ViewMode::Timeline => "timeline",
            ViewMode::Gallery => "gallery",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "threaded" | "thread" => Ok(ViewMode::Threaded),
            "timeline" => Ok(ViewMode::Timeline),
            "gallery" => Ok(ViewMode::Gallery),
            other => bail!("unknown view mode {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubMode {
    #[default]
    All,
    New,
    Latest,
}

impl SubMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubMode::All => "all",
            SubMode::New => "new",
            SubMode::Latest => "latest",
        }
    }
}

impl fmt::Display for SubMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(SubMode::All),
            "new" => Ok(SubMode::New),
            "latest" => Ok(SubMode::Latest),
            other => bail!("unknown sub mode {other:?}"),
        }
    }
}

/// What the view-mode context currently asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ViewContext {
    #[serde(default)]
    pub mode: ViewMode,
    #[serde(default)]
    pub sub_mode: SubMode,
    #[serde(default)]
    pub show_cover: bool,
}

impl ViewContext {
    pub fn new(mode: ViewMode, sub_mode: SubMode) -> Self {
        Self {
            mode,
            sub_mode,
            show_cover: false,
        }
    }

    /// The "all" variant of this view, which the filter uses as the global
    /// ordering reference.
    pub fn with_all(self) -> Self {
        Self {
            sub_mode: SubMode::All,
            ..self
        }
    }
}

pub fn sequence(view: ViewContext, tree: &ThreadTree) -> Vec<ThreadElement> {
    if tree.is_empty() {
        return Vec::new();
    }
    let all = match view.mode {
        ViewMode::Threaded => threaded(tree),
        ViewMode::Timeline => chronological(tree),
        ViewMode::Gallery => gallery(tree, view.show_cover),
    };
    match (view.mode, view.sub_mode) {
        (_, SubMode::All) | (ViewMode::Threaded, SubMode::Latest) => all,
        (_, SubMode::New) => all.into_iter().filter(ThreadElement::is_new).collect(),
        (_, SubMode::Latest) => {
            let mut reversed = all;
            reversed.reverse();
            reversed
        }
    }
}

/// Depth-first pre-order over posts, each post followed by its replies.
fn threaded(tree: &ThreadTree) -> Vec<ThreadElement> {
    let mut out = Vec::with_capacity(tree.posts().len() + tree.comment_count());
    let mut stack: Vec<Arc<Post>> = tree.root().cloned().into_iter().collect();
    while let Some(post) = stack.pop() {
        if let Some(node) = tree.node(&post.id) {
            stack.extend(node.children.iter().rev().cloned());
        }
        push_post(tree, &post, &mut out);
    }
    out
}

/// Posts by creation time, ties in source order, each followed by its replies.
fn chronological(tree: &ThreadTree) -> Vec<ThreadElement> {
    let mut posts = tree.posts().to_vec();
    posts.sort_by_key(|post| post.created_at);
    let mut out = Vec::with_capacity(posts.len() + tree.comment_count());
    for post in &posts {
        push_post(tree, post, &mut out);
    }
    out
}

fn gallery(tree: &ThreadTree, show_cover: bool) -> Vec<ThreadElement> {
    let all = chronological(tree);
    if show_cover {
        return all;
    }
    let Some(cover) = tree.root() else {
        return all;
    };
    all.into_iter()
        .filter(|element| element.post_id() != cover.id)
        .collect()
}

fn push_post(tree: &ThreadTree, post: &Arc<Post>, out: &mut Vec<ThreadElement>) {
    out.push(ThreadElement::Post(post.clone()));
    if let Some(info) = tree.replies(&post.id) {
        push_replies(info, out);
    }
}

/// Unrolls each reply root: the whole chain first, then the branches hanging
/// off its links, depth-first, before the next root.
pub fn push_replies(info: &CommentThreadInfo, out: &mut Vec<ThreadElement>) {
    let mut stack: Vec<_> = info.roots.iter().rev().collect();
    while let Some(start) = stack.pop() {
        let mut links = vec![start];
        let mut current = start;
        while let Some(next) = info.chain_successor.get(&current.id) {
            links.push(next);
            current = next;
        }
        out.extend(links.iter().map(|link| ThreadElement::Comment((*link).clone())));
        let branches: Vec<_> = links
            .iter()
            .filter_map(|link| info.branch_children.get(&link.id))
            .flatten()
            .collect();
        stack.extend(branches.into_iter().rev());
    }
}
