use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub parent_post_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub category_tags: Vec<String>,
    #[serde(default)]
    pub content_notices: Vec<String>,
    #[serde(default)]
    pub index_tags: Vec<String>,
    #[serde(default)]
    pub whisper_tags: Vec<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_own: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub parent_post_id: String,
    /// Comment this one branches off from.
    #[serde(default)]
    pub parent_comment_id: Option<String>,
    /// Previous fragment of the same logical reply.
    #[serde(default)]
    pub chain_parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_own: bool,
}

/// Raw thread contents as supplied by the server. Comments are grouped by the
/// post they reply to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub comments: HashMap<String, Vec<Comment>>,
}

impl ThreadSnapshot {
    pub fn comment_count(&self) -> usize {
        self.comments.values().map(Vec::len).sum()
    }
}

/// Identity of a sequence element. Posts and comments live in separate id
/// spaces, so the kind is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ElementKey {
    Post(String),
    Comment(String),
}

impl ElementKey {
    pub fn id(&self) -> &str {
        match self {
            ElementKey::Post(id) | ElementKey::Comment(id) => id,
        }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKey::Post(id) => write!(f, "post:{id}"),
            ElementKey::Comment(id) => write!(f, "comment:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThreadElement {
    Post(Arc<Post>),
    Comment(Arc<Comment>),
}

impl ThreadElement {
    pub fn key(&self) -> ElementKey {
        match self {
            ThreadElement::Post(post) => ElementKey::Post(post.id.clone()),
            ThreadElement::Comment(comment) => ElementKey::Comment(comment.id.clone()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ThreadElement::Post(post) => &post.id,
            ThreadElement::Comment(comment) => &comment.id,
        }
    }

    pub fn matches(&self, key: &ElementKey) -> bool {
        match (self, key) {
            (ThreadElement::Post(post), ElementKey::Post(id)) => post.id == *id,
            (ThreadElement::Comment(comment), ElementKey::Comment(id)) => comment.id == *id,
            _ => false,
        }
    }

    pub fn is_new(&self) -> bool {
        match self {
            ThreadElement::Post(post) => post.is_new,
            ThreadElement::Comment(comment) => comment.is_new,
        }
    }

    pub fn is_own(&self) -> bool {
        match self {
            ThreadElement::Post(post) => post.is_own,
            ThreadElement::Comment(comment) => comment.is_own,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            ThreadElement::Post(post) => post.created_at,
            ThreadElement::Comment(comment) => comment.created_at,
        }
    }

    /// The post this element belongs to: itself for posts, the replied-to
    /// post for comments.
    pub fn post_id(&self) -> &str {
        match self {
            ThreadElement::Post(post) => &post.id,
            ThreadElement::Comment(comment) => &comment.parent_post_id,
        }
    }

    pub fn as_post(&self) -> Option<&Arc<Post>> {
        match self {
            ThreadElement::Post(post) => Some(post),
            ThreadElement::Comment(_) => None,
        }
    }

    pub fn is_post(&self) -> bool {
        matches!(self, ThreadElement::Post(_))
    }
}
