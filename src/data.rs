use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::model::{Comment, Post, ThreadSnapshot};

/// Where thread snapshots come from.
pub trait ThreadSource {
    fn load_thread(&self, thread_id: &str) -> Result<ThreadSnapshot>;
}

/// Reads snapshots from files. `thread_id` is a path, resolved against `base`
/// when relative.
#[derive(Debug, Clone, Default)]
pub struct FileThreadSource {
    base: Option<PathBuf>,
}

impl FileThreadSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn resolve(&self, thread_id: &str) -> PathBuf {
        let path = Path::new(thread_id);
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ThreadSource for FileThreadSource {
    fn load_thread(&self, thread_id: &str) -> Result<ThreadSnapshot> {
        let path = self.resolve(thread_id);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read thread snapshot at {}", path.display()))?;
        let yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml")
        );
        let snapshot: ThreadSnapshot = if yaml {
            serde_yaml::from_str(&data)
                .with_context(|| format!("Failed to parse thread snapshot at {}", path.display()))?
        } else {
            serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse thread snapshot at {}", path.display()))?
        };
        tracing::debug!(
            path = %path.display(),
            posts = snapshot.posts.len(),
            comments = snapshot.comment_count(),
            "thread_snapshot_read"
        );
        Ok(snapshot)
    }
}

const CATEGORIES: &[&str] = &["art", "music"];
const NOTICES: &[&str] = &["gore", "spoiler"];

/// Deterministic offline threads for demos and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockThreadSource {
    pub seed: u64,
    pub posts: usize,
}

impl Default for MockThreadSource {
    fn default() -> Self {
        Self { seed: 0, posts: 24 }
    }
}

impl ThreadSource for MockThreadSource {
    fn load_thread(&self, thread_id: &str) -> Result<ThreadSnapshot> {
        let mut snapshot = Self::generate(self.seed, self.posts);
        if let Some(root) = snapshot.posts.first_mut() {
            root.index_tags.push(thread_id.to_string());
        }
        Ok(snapshot)
    }
}

impl MockThreadSource {
    /// A well-formed thread of `posts` posts: `p0` is the root, every other
    /// post replies to an earlier one, and each post carries a few chain and
    /// branch comments.
    pub fn generate(seed: u64, posts: usize) -> ThreadSnapshot {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
        let mut clock = 0i64;
        let mut tick = |rng: &mut StdRng| -> DateTime<Utc> {
            clock += rng.gen_range(1..=30);
            start + Duration::minutes(clock)
        };

        let mut snapshot = ThreadSnapshot::default();
        for index in 0..posts {
            let parent_post_id = (index > 0).then(|| {
                // Lean towards shallow threads so top-level runs are long.
                let parent = if rng.gen_bool(0.5) { 0 } else { rng.gen_range(0..index) };
                format!("p{parent}")
            });
            let mut post = Post {
                id: format!("p{index}"),
                parent_post_id,
                created_at: tick(&mut rng),
                category_tags: Vec::new(),
                content_notices: Vec::new(),
                index_tags: Vec::new(),
                whisper_tags: Vec::new(),
                is_new: rng.gen_bool(0.3),
                is_own: rng.gen_bool(0.1),
            };
            if rng.gen_bool(0.6) {
                if let Some(category) = CATEGORIES.choose(&mut rng) {
                    post.category_tags.push((*category).to_string());
                }
            }
            if rng.gen_bool(0.2) {
                if let Some(notice) = NOTICES.choose(&mut rng) {
                    post.content_notices.push((*notice).to_string());
                }
            }

            let count = rng.gen_range(0..=4);
            let mut comments: Vec<Comment> = Vec::with_capacity(count);
            let mut continued: HashSet<usize> = HashSet::new();
            for number in 0..count {
                let mut comment = Comment {
                    id: format!("p{index}c{number}"),
                    parent_post_id: post.id.clone(),
                    parent_comment_id: None,
                    chain_parent_id: None,
                    created_at: tick(&mut rng),
                    is_new: rng.gen_bool(0.3),
                    is_own: rng.gen_bool(0.1),
                };
                if number > 0 {
                    match rng.gen_range(0..3) {
                        0 if continued.insert(number - 1) => {
                            comment.chain_parent_id = Some(comments[number - 1].id.clone());
                        }
                        1 => {
                            let parent = rng.gen_range(0..number);
                            comment.parent_comment_id = Some(comments[parent].id.clone());
                        }
                        _ => {}
                    }
                }
                comments.push(comment);
            }
            if !comments.is_empty() {
                snapshot.comments.insert(post.id.clone(), comments);
            }
            snapshot.posts.push(post);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ThreadTree;
    use tempfile::tempdir;

    #[test]
    fn generated_threads_are_deterministic_and_well_formed() {
        let a = MockThreadSource::generate(7, 25);
        let b = MockThreadSource::generate(7, 25);
        assert_eq!(a, b);
        assert_eq!(a.posts.len(), 25);
        assert!(a.posts[0].parent_post_id.is_none());
        let tree = ThreadTree::build(&a);
        assert_eq!(tree.posts().len(), 25);
        assert_eq!(tree.comment_count(), a.comment_count());
        let roots: usize = a
            .comments
            .keys()
            .filter_map(|post| tree.replies(post))
            .map(|info| info.roots.len())
            .sum();
        let parentless: usize = a
            .comments
            .values()
            .flatten()
            .filter(|c| c.chain_parent_id.is_none() && c.parent_comment_id.is_none())
            .count();
        assert_eq!(roots, parentless);
    }

    #[test]
    fn reads_json_and_yaml_snapshots() {
        let dir = tempdir().unwrap();
        let snapshot = MockThreadSource::generate(3, 6);
        fs::write(dir.path().join("thread.json"), serde_json::to_string(&snapshot).unwrap()).unwrap();
        fs::write(dir.path().join("thread.yaml"), serde_yaml::to_string(&snapshot).unwrap()).unwrap();

        let source = FileThreadSource::with_base(dir.path());
        assert_eq!(source.load_thread("thread.json").unwrap(), snapshot);
        assert_eq!(source.load_thread("thread.yaml").unwrap(), snapshot);
        let err = source.load_thread("missing.json").unwrap_err();
        assert!(format!("{err:#}").contains("missing.json"));
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.json");
        fs::write(
            &path,
            r#"{"posts":[{"id":"a","created_at":"2024-01-01T00:00:00Z"}],
                "comments":{"a":[{"id":"c","parent_post_id":"a","created_at":"2024-01-01T00:01:00Z"}]}}"#,
        )
        .unwrap();
        let snapshot = FileThreadSource::new()
            .load_thread(path.to_str().unwrap())
            .unwrap();
        assert_eq!(snapshot.posts[0].parent_post_id, None);
        assert!(snapshot.posts[0].category_tags.is_empty());
        assert_eq!(snapshot.comment_count(), 1);
    }

    #[test]
    fn mock_source_tags_root_with_thread_id() {
        let snapshot = MockThreadSource::default().load_thread("demo").unwrap();
        assert_eq!(snapshot.posts[0].index_tags, vec!["demo".to_string()]);
    }
}
