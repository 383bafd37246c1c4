use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{report, IntegrityError};
use crate::model::{Comment, ElementKey, Post, ThreadElement, ThreadSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct PostNode {
    pub post: Arc<Post>,
    pub parent: Option<Arc<Post>>,
    pub children: Vec<Arc<Post>>,
}

/// Reply structure of a single post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentThreadInfo {
    /// Comments with neither a chain parent nor a branch parent.
    pub roots: Vec<Arc<Comment>>,
    /// Next fragment of a chain, keyed by the previous fragment's id.
    pub chain_successor: HashMap<String, Arc<Comment>>,
    /// Branch replies keyed by the comment they reply to.
    pub branch_children: HashMap<String, Vec<Arc<Comment>>>,
    pub total_count: usize,
    pub new_count: usize,
    parents: HashMap<String, String>,
    depths: HashMap<String, usize>,
}

impl CommentThreadInfo {
    fn build(post_id: &str, comments: &[&Comment]) -> Self {
        let mut info = CommentThreadInfo::default();
        let mut order: Vec<Arc<Comment>> = Vec::with_capacity(comments.len());
        let mut seen = HashSet::new();
        for comment in comments {
            if comment.parent_post_id != post_id {
                report(IntegrityError::UnknownCommentPost {
                    comment: comment.id.clone(),
                    post: comment.parent_post_id.clone(),
                });
                continue;
            }
            if !seen.insert(comment.id.as_str()) {
                report(IntegrityError::DuplicateId {
                    key: ElementKey::Comment(comment.id.clone()),
                });
                continue;
            }
            order.push(Arc::new((*comment).clone()));
        }

        for comment in &order {
            if let Some(previous) = comment.chain_parent_id.as_deref() {
                if previous == comment.id || !seen.contains(previous) {
                    report(IntegrityError::UnknownParentComment {
                        comment: comment.id.clone(),
                        parent: previous.to_string(),
                    });
                } else if info.chain_successor.contains_key(previous) {
                    report(IntegrityError::DuplicateChainLink {
                        comment: comment.id.clone(),
                        parent: previous.to_string(),
                    });
                } else {
                    info.chain_successor
                        .insert(previous.to_string(), comment.clone());
                    info.parents
                        .insert(comment.id.clone(), previous.to_string());
                    continue;
                }
            }
            // A chain link that did not resolve falls back to the branch parent.
            match comment.parent_comment_id.as_deref() {
                Some(parent) if parent != comment.id && seen.contains(parent) => {
                    info.branch_children
                        .entry(parent.to_string())
                        .or_default()
                        .push(comment.clone());
                    info.parents.insert(comment.id.clone(), parent.to_string());
                }
                Some(parent) => {
                    report(IntegrityError::UnknownParentComment {
                        comment: comment.id.clone(),
                        parent: parent.to_string(),
                    });
                    info.roots.push(comment.clone());
                }
                None => info.roots.push(comment.clone()),
            }
        }

        let roots = info.roots.clone();
        for root in &roots {
            info.mark_reachable(root, 0);
        }
        // Anything left over sits on a parent cycle. Cut it loose as a root.
        for comment in &order {
            if info.depths.contains_key(&comment.id) {
                continue;
            }
            report(IntegrityError::UnreachableComment {
                comment: comment.id.clone(),
            });
            info.detach(comment);
            info.roots.push(comment.clone());
            info.mark_reachable(comment, 0);
        }

        info.total_count = order.len();
        info.new_count = order.iter().filter(|comment| comment.is_new).count();
        info
    }

    fn detach(&mut self, comment: &Arc<Comment>) {
        let Some(parent) = self.parents.remove(&comment.id) else {
            return;
        };
        if self
            .chain_successor
            .get(&parent)
            .is_some_and(|next| next.id == comment.id)
        {
            self.chain_successor.remove(&parent);
        } else if let Some(children) = self.branch_children.get_mut(&parent) {
            children.retain(|child| child.id != comment.id);
            if children.is_empty() {
                self.branch_children.remove(&parent);
            }
        }
    }

    fn mark_reachable(&mut self, start: &Arc<Comment>, depth: usize) {
        let mut stack = vec![(start.clone(), depth)];
        while let Some((comment, depth)) = stack.pop() {
            if self.depths.insert(comment.id.clone(), depth).is_some() {
                continue;
            }
            if let Some(next) = self.chain_successor.get(&comment.id) {
                stack.push((next.clone(), depth));
            }
            if let Some(children) = self.branch_children.get(&comment.id) {
                stack.extend(children.iter().map(|child| (child.clone(), depth + 1)));
            }
        }
    }

    /// The comment this one continues or branches from.
    pub fn parent_of(&self, comment_id: &str) -> Option<&str> {
        self.parents.get(comment_id).map(String::as_str)
    }

    /// Visual nesting below the post: chain fragments share their
    /// predecessor's depth, branches add one.
    pub fn depth_of(&self, comment_id: &str) -> Option<usize> {
        self.depths.get(comment_id).copied()
    }

    pub fn contains(&self, comment_id: &str) -> bool {
        self.depths.contains_key(comment_id)
    }

    fn comments(&self) -> impl Iterator<Item = &Arc<Comment>> {
        self.roots
            .iter()
            .chain(self.chain_successor.values())
            .chain(self.branch_children.values().flatten())
    }
}

/// Parent/child lookups for one thread. Rebuilt wholesale from each snapshot.
#[derive(Debug, Clone, Default)]
pub struct ThreadTree {
    root: Option<Arc<Post>>,
    posts: Vec<Arc<Post>>,
    nodes: HashMap<String, PostNode>,
    replies: HashMap<String, CommentThreadInfo>,
    comments: HashMap<String, Arc<Comment>>,
    top_level: HashMap<String, String>,
    sibling_index: HashMap<String, usize>,
    depths: HashMap<String, usize>,
}

impl ThreadTree {
    pub fn build(snapshot: &ThreadSnapshot) -> Self {
        let mut posts: Vec<Arc<Post>> = Vec::with_capacity(snapshot.posts.len());
        let mut seen = HashSet::new();
        for post in &snapshot.posts {
            if seen.insert(post.id.as_str()) {
                posts.push(Arc::new(post.clone()));
            } else {
                report(IntegrityError::DuplicateId {
                    key: ElementKey::Post(post.id.clone()),
                });
            }
        }

        let Some(root) = posts.iter().find(|post| post.parent_post_id.is_none()).cloned() else {
            if !posts.is_empty() {
                tracing::debug!(posts = posts.len(), "thread_without_root");
            }
            return ThreadTree::default();
        };

        let mut parent_of: HashMap<String, String> = HashMap::new();
        for post in posts.iter().filter(|post| post.id != root.id) {
            let parent = match post.parent_post_id.as_deref() {
                None => {
                    report(IntegrityError::ExtraRoot {
                        post: post.id.clone(),
                    });
                    root.id.clone()
                }
                Some(parent) if !seen.contains(parent) => {
                    report(IntegrityError::UnknownParentPost {
                        post: post.id.clone(),
                        parent: parent.to_string(),
                    });
                    root.id.clone()
                }
                Some(parent) => parent.to_string(),
            };
            parent_of.insert(post.id.clone(), parent);
        }

        let mut children: HashMap<String, Vec<Arc<Post>>> = HashMap::new();
        for post in &posts {
            if let Some(parent) = parent_of.get(&post.id) {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(post.clone());
            }
        }

        let mut reachable = HashSet::new();
        collect_subtree(&root.id, &children, &mut reachable);
        for post in &posts {
            if reachable.contains(&post.id) {
                continue;
            }
            report(IntegrityError::UnreachablePost {
                post: post.id.clone(),
            });
            if let Some(old) = parent_of.insert(post.id.clone(), root.id.clone()) {
                if let Some(siblings) = children.get_mut(&old) {
                    siblings.retain(|sibling| sibling.id != post.id);
                }
            }
            children
                .entry(root.id.clone())
                .or_default()
                .push(post.clone());
            collect_subtree(&post.id, &children, &mut reachable);
        }

        let by_id: HashMap<&str, &Arc<Post>> =
            posts.iter().map(|post| (post.id.as_str(), post)).collect();
        let mut nodes = HashMap::with_capacity(posts.len());
        for post in &posts {
            let parent = parent_of
                .get(&post.id)
                .and_then(|parent| by_id.get(parent.as_str()))
                .map(|parent| (*parent).clone());
            nodes.insert(
                post.id.clone(),
                PostNode {
                    post: post.clone(),
                    parent,
                    children: children.remove(&post.id).unwrap_or_default(),
                },
            );
        }

        let mut tree = ThreadTree {
            root: Some(root.clone()),
            posts,
            nodes,
            replies: HashMap::new(),
            comments: HashMap::new(),
            top_level: HashMap::new(),
            sibling_index: HashMap::new(),
            depths: HashMap::new(),
        };
        tree.index_top_level();

        for (post_id, comments) in &snapshot.comments {
            if tree.nodes.contains_key(post_id) {
                continue;
            }
            for comment in comments {
                report(IntegrityError::UnknownCommentPost {
                    comment: comment.id.clone(),
                    post: post_id.clone(),
                });
            }
        }

        // Posts in source order, so a comment id listed under several posts
        // stays with the first of them.
        let post_ids: Vec<String> = tree.posts.iter().map(|post| post.id.clone()).collect();
        for post_id in &post_ids {
            let Some(comments) = snapshot.comments.get(post_id) else {
                continue;
            };
            let unclaimed: Vec<&Comment> = comments
                .iter()
                .filter(|comment| {
                    let claimed = tree.comments.contains_key(&comment.id);
                    if claimed {
                        report(IntegrityError::DuplicateId {
                            key: ElementKey::Comment(comment.id.clone()),
                        });
                    }
                    !claimed
                })
                .collect();
            let info = CommentThreadInfo::build(post_id, &unclaimed);
            if info.total_count == 0 {
                continue;
            }
            for comment in info.comments() {
                tree.comments.insert(comment.id.clone(), comment.clone());
            }
            tree.replies.insert(post_id.clone(), info);
        }

        tracing::debug!(
            root = %root.id,
            posts = tree.posts.len(),
            comments = tree.comment_count(),
            "thread_tree_built"
        );
        tree
    }

    fn index_top_level(&mut self) {
        let Some(root) = self.root.clone() else {
            return;
        };
        self.depths.insert(root.id.clone(), 0);
        let siblings = self.top_level_siblings().to_vec();
        for (index, sibling) in siblings.iter().enumerate() {
            self.sibling_index.insert(sibling.id.clone(), index);
            let mut stack = vec![(sibling.clone(), 1usize)];
            while let Some((post, depth)) = stack.pop() {
                self.top_level.insert(post.id.clone(), sibling.id.clone());
                self.depths.insert(post.id.clone(), depth);
                if let Some(node) = self.nodes.get(&post.id) {
                    stack.extend(node.children.iter().map(|child| (child.clone(), depth + 1)));
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<&Arc<Post>> {
        self.root.as_ref()
    }

    /// Posts in source order.
    pub fn posts(&self) -> &[Arc<Post>] {
        &self.posts
    }

    pub fn node(&self, post_id: &str) -> Option<&PostNode> {
        self.nodes.get(post_id)
    }

    pub fn replies(&self, post_id: &str) -> Option<&CommentThreadInfo> {
        self.replies.get(post_id)
    }

    /// Looks an element up by key across posts and comments.
    pub fn element(&self, key: &ElementKey) -> Option<ThreadElement> {
        match key {
            ElementKey::Post(id) => self
                .nodes
                .get(id)
                .map(|node| ThreadElement::Post(node.post.clone())),
            ElementKey::Comment(id) => self
                .comments
                .get(id)
                .map(|comment| ThreadElement::Comment(comment.clone())),
        }
    }

    pub fn contains(&self, key: &ElementKey) -> bool {
        match key {
            ElementKey::Post(id) => self.nodes.contains_key(id),
            ElementKey::Comment(id) => self.comments.contains_key(id),
        }
    }

    pub fn comment_count(&self) -> usize {
        self.replies.values().map(|info| info.total_count).sum()
    }

    /// Direct children of the thread root.
    pub fn top_level_siblings(&self) -> &[Arc<Post>] {
        self.root
            .as_ref()
            .and_then(|root| self.nodes.get(&root.id))
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn sibling_index(&self, post_id: &str) -> Option<usize> {
        self.sibling_index.get(post_id).copied()
    }

    /// The top-level sibling an element hangs under. The root and replies to
    /// the root have none.
    pub fn top_level_of(&self, element: &ThreadElement) -> Option<&str> {
        self.top_level.get(element.post_id()).map(String::as_str)
    }

    /// Ancestor posts from the immediate parent up to the root.
    pub fn ancestors<'a>(&'a self, post_id: &str) -> impl Iterator<Item = &'a Arc<Post>> + 'a {
        let first = self.nodes.get(post_id).and_then(|node| node.parent.as_ref());
        std::iter::successors(first, move |post| {
            self.nodes.get(&post.id).and_then(|node| node.parent.as_ref())
        })
    }

    /// Every structural ancestor of an element, nearest first: parent comments
    /// for a comment, then its post and that post's ancestors.
    pub fn element_ancestors(&self, element: &ThreadElement) -> Vec<ElementKey> {
        let mut keys = Vec::new();
        let post_id = match element {
            ThreadElement::Post(post) => post.id.as_str(),
            ThreadElement::Comment(comment) => {
                if let Some(info) = self.replies.get(&comment.parent_post_id) {
                    let mut current = comment.id.as_str();
                    while let Some(parent) = info.parent_of(current) {
                        keys.push(ElementKey::Comment(parent.to_string()));
                        current = parent;
                    }
                }
                keys.push(ElementKey::Post(comment.parent_post_id.clone()));
                comment.parent_post_id.as_str()
            }
        };
        keys.extend(self.ancestors(post_id).map(|post| ElementKey::Post(post.id.clone())));
        keys
    }

    /// Indentation level for rendering.
    pub fn depth_of(&self, element: &ThreadElement) -> usize {
        match element {
            ThreadElement::Post(post) => self.depths.get(&post.id).copied().unwrap_or(0),
            ThreadElement::Comment(comment) => {
                let post_depth = self
                    .depths
                    .get(&comment.parent_post_id)
                    .copied()
                    .unwrap_or(0);
                let comment_depth = self
                    .replies
                    .get(&comment.parent_post_id)
                    .and_then(|info| info.depth_of(&comment.id))
                    .unwrap_or(0);
                post_depth + 1 + comment_depth
            }
        }
    }
}

fn collect_subtree(
    start: &str,
    children: &HashMap<String, Vec<Arc<Post>>>,
    reachable: &mut HashSet<String>,
) {
    let mut stack = vec![start.to_string()];
    while let Some(id) = stack.pop() {
        if !reachable.insert(id.clone()) {
            continue;
        }
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().map(|kid| kid.id.clone()));
        }
    }
}
